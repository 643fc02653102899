//! Core traits and types for deadline-synchronized CPU emulation.
//!
//! Every processor counts time in master cycles of the shared crystal. The
//! frame runner picks deadlines in that unit and each processor runs up to
//! them. No component ever gets ahead of a deadline.

mod clock;
mod observable;
mod processor;

pub use clock::MasterClock;
pub use observable::{Observable, Value};
pub use processor::Processor;
