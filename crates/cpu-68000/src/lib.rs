//! Motorola 68000 CPU core with deadline-driven execution.
//!
//! The core runs whole instructions and charges each one's cycle cost from
//! the documented 68000 timing, scaled to the shared master-cycle unit so
//! its counter can be compared directly with the other processors in the
//! system. Memory goes through a 256-entry page map where every 64KB page
//! is either a byte-addressable buffer or a pair of I/O handler callbacks.
//!
//! Two instances of [`Cpu68000`] with separate maps model the MAIN and SUB
//! processors of the CD-equipped console.

pub mod alu;
pub mod cpu;
mod arith;
mod branches;
mod decode;
mod ea;
mod exceptions;
pub mod flags;
mod immediates;
mod logic;
pub mod memmap;
mod misc;
pub mod registers;
mod shifts;
pub mod timing;

pub use alu::Size;
pub use cpu::{Context, Cpu68000, IdlePoll, IrqLine, RunMode, INT_ACK_AUTOVECTOR,
    INT_ACK_SPURIOUS, STOP_LEVEL_HALT, STOP_LEVEL_STOP};
pub use ea::AddrMode;
pub use flags::{Status, C, N, S, T, V, X, Z};
pub use memmap::{Fault, IoHandlers, MemoryMap, PageBuf, page_buf};
pub use registers::Registers;
