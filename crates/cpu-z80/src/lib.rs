//! NMOS Z80 CPU core with deadline-driven execution.
//!
//! The interpreter runs whole instructions and charges T-state costs from
//! the documented tables, scaled by [`tables::Z80_MUL`] so the counter is
//! directly comparable with the 68000s sharing the master clock. Memory is
//! banked in 1KB pages; each page reads or writes either a shared buffer
//! or an I/O handler.

pub mod cpu;
pub mod flags;
pub mod memmap;
pub mod registers;
pub mod tables;

pub use cpu::{Context, Z80};
pub use flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
pub use memmap::{BankBuf, ReadBank, WriteBank, Z80Memory};
pub use registers::Registers;
