//! Processor trait: the run-to-deadline contract.

/// A processor driven by master-cycle deadlines.
///
/// The frame runner computes a target master-cycle count and calls `run` on
/// each active processor in turn. A processor executes instructions, each
/// advancing its own cycle counter, until the counter meets the deadline.
/// Peripherals advance to the same deadline between calls and may raise
/// interrupt lines that the processor samples on its next `run`.
pub trait Processor {
    /// Reset the processor to its power-on state.
    fn reset(&mut self);

    /// Run until the cycle counter reaches `deadline` master cycles.
    ///
    /// Returns immediately if the counter is already at or past the
    /// deadline. A halted processor advances its counter straight to the
    /// deadline so the schedule stays consistent.
    fn run(&mut self, deadline: u32);

    /// Current master-cycle counter.
    fn cycles(&self) -> u32;

    /// Subtract one frame's worth of cycles from the counter.
    ///
    /// Called by the frame runner at frame end so counters stay small.
    /// Relative ordering between processors is preserved.
    fn rebase_cycles(&mut self, frame_cycles: u32);
}
