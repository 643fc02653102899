//! The 68000 processor: state, bus access, run loop, interrupt lines.
//!
//! Execution is instruction-granular: `run(deadline)` decodes and executes
//! whole instructions, charging each one's documented cycle cost (scaled by
//! [`timing::MUL`]) until the master-cycle counter reaches the deadline.
//! Interrupts are sampled between instructions, on SR writes, and after the
//! one-instruction latency path used by the video control port.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use emu_core::{Observable, Processor, Value};

use crate::flags::{C, N, SR_MASK, T, V, X, Z};
use crate::memmap::{Fault, IoHandlers, MemoryMap};
use crate::registers::Registers;
use crate::timing::{exception_cycles, EX_RESET};

/// Guest executed STOP; cleared by an interrupt above the mask.
pub const STOP_LEVEL_STOP: u32 = 1;
/// Externally asserted HALT; cleared only by `clear_halt`.
pub const STOP_LEVEL_HALT: u32 = 2;

/// Interrupt-acknowledge sentinel: take the autovector (`0x18 + level`).
pub const INT_ACK_AUTOVECTOR: u32 = 0xFFFF_FFFF;
/// Interrupt-acknowledge sentinel: take the spurious interrupt vector.
pub const INT_ACK_SPURIOUS: u32 = 0xFFFF_FFFE;

/// Function code: user data space.
pub const FC_USER_DATA: u32 = 1;
/// Function code: user program space.
pub const FC_USER_PROGRAM: u32 = 2;
/// Function code: supervisor data space.
pub const FC_SUPERVISOR_DATA: u32 = 5;
/// Function code: supervisor program space.
pub const FC_SUPERVISOR_PROGRAM: u32 = 6;

pub(crate) type Exec = Result<(), Fault>;

/// Execution mode with respect to group-0 exception processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RunMode {
    /// Ordinary instruction execution.
    #[default]
    Normal,
    /// Processing a reset or address-error exception. A second address
    /// error in this window is a double fault and halts the CPU.
    Group0,
}

/// Access-info I/N bit state for the group-0 frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub(crate) enum InstrMode {
    #[default]
    Instruction,
    Exception,
}

#[derive(Debug, Clone, Copy, Default)]
struct IrqState {
    level: u8,
    delay: Option<u8>,
    delay_busy: bool,
}

/// Shared interrupt line for one 68000.
///
/// Peripherals hold clones and assert levels from inside their memory
/// handlers; the CPU samples the line between instructions. Level 7 is
/// level-triggered here, not edge-triggered like the real part's NMI: it
/// is serviced only while it exceeds the mask, so a mask of 7 blocks it.
/// Integrators relying on true NMI semantics must pulse the line.
#[derive(Clone, Default)]
pub struct IrqLine {
    state: Rc<Cell<IrqState>>,
}

impl IrqLine {
    /// Overwrite the recorded IPL (0 clears the request).
    pub fn set_irq(&self, level: u32) {
        let mut s = self.state.get();
        s.level = (level & 7) as u8;
        self.state.set(s);
    }

    /// OR a 3-bit mask into the recorded IPL.
    pub fn update_irq(&self, mask: u32) {
        let mut s = self.state.get();
        s.level |= (mask & 7) as u8;
        self.state.set(s);
    }

    /// Raise the IPL with one instruction of latency.
    ///
    /// The CPU finishes the instruction whose memory access raised the
    /// request, retires exactly one further instruction, then records the
    /// level and samples. The latency pass is skipped when the in-flight
    /// opcode is a MOVE.L (it is mid-way through two word writes when the
    /// request arrives); the level is then recorded at the next boundary.
    /// Requests arriving while one is already latched are dropped.
    pub fn set_irq_delay(&self, level: u32) {
        let mut s = self.state.get();
        if s.delay_busy || s.delay.is_some() {
            return;
        }
        s.delay = Some((level & 7) as u8);
        self.state.set(s);
    }

    /// Current recorded IPL.
    #[must_use]
    pub fn level(&self) -> u8 {
        self.state.get().level
    }

    fn set_level(&self, level: u8) {
        let mut s = self.state.get();
        s.level = level & 7;
        self.state.set(s);
    }

    fn take_delay(&self) -> Option<u8> {
        let mut s = self.state.get();
        let delay = s.delay.take();
        self.state.set(s);
        delay
    }

    fn set_delay_busy(&self, busy: bool) {
        let mut s = self.state.get();
        s.delay_busy = busy;
        self.state.set(s);
    }

    fn snapshot(&self) -> IrqState {
        self.state.get()
    }

    fn restore(&self, s: IrqState) {
        self.state.set(s);
    }
}

/// Idle-loop polling state.
///
/// A memory handler that recognises the guest spinning on a flag records
/// the loop here; the scheduler may then fast-forward the CPU to its
/// deadline instead of burning host time on the loop body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IdlePoll {
    /// PC of the polling instruction.
    pub pc: u32,
    /// Cycle count when the loop was first seen.
    pub cycle: u32,
    /// True once the loop is confirmed.
    pub detected: bool,
}

/// Serializable processor context.
///
/// Captures everything `run` depends on except the memory map, which the
/// host reconstructs from the ROM/RAM topology at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Context {
    pub regs: Registers,
    pub cycles: u32,
    pub cycle_end: u32,
    pub ir: u16,
    pub stopped: u32,
    pub run_mode: RunMode,
    pub int_level: u8,
    pub irq_delay: Option<u8>,
    pub tracing: bool,
    pub aerr_enabled: bool,
    pub poll: IdlePoll,
}

/// Motorola 68000 CPU.
pub struct Cpu68000 {
    pub regs: Registers,
    /// This CPU's view of the shared bus.
    pub(crate) map: MemoryMap,

    /// Current master-cycle count.
    pub(crate) cycles: u32,
    /// Deadline for the current execution slice.
    pub(crate) cycle_end: u32,

    /// Instruction register (opcode being executed).
    pub(crate) ir: u16,
    /// PC at the start of the current instruction.
    pub(crate) instr_start_pc: u32,

    /// STOP/HALT bitmask.
    pub(crate) stopped: u32,
    pub(crate) run_mode: RunMode,
    pub(crate) instr_mode: InstrMode,
    /// Trace latched at the start of the current instruction.
    pub(crate) tracing: bool,
    /// Odd word/long accesses raise address errors when set.
    pub(crate) aerr_enabled: bool,

    pub(crate) irq: IrqLine,

    /// Idle-loop polling state, written by peripherals.
    pub poll: IdlePoll,

    int_ack: Box<dyn FnMut(u32) -> u32>,
    reset_instr: Option<Box<dyn FnMut()>>,
    tas_instr: Option<Box<dyn FnMut() -> bool>>,
    set_fc: Option<Box<dyn FnMut(u32)>>,

    #[cfg(debug_assertions)]
    illegal_trace_count: u32,
}

impl Cpu68000 {
    /// Create a CPU whose unmapped pages behave as open bus.
    #[must_use]
    pub fn new() -> Self {
        Self::with_default_io(IoHandlers::open_bus())
    }

    /// Create a CPU with host-supplied handlers for unmapped pages.
    #[must_use]
    pub fn with_default_io(default_io: IoHandlers) -> Self {
        let irq = IrqLine::default();
        let ack_line = irq.clone();
        Self {
            regs: Registers::new(),
            map: MemoryMap::new(default_io),
            cycles: 0,
            cycle_end: 0,
            ir: 0,
            instr_start_pc: 0,
            stopped: 0,
            run_mode: RunMode::Normal,
            instr_mode: InstrMode::Instruction,
            tracing: false,
            aerr_enabled: true,
            irq,
            poll: IdlePoll::default(),
            // Default acknowledge: clear the request and autovector.
            int_ack: Box::new(move |_level| {
                ack_line.set_irq(0);
                INT_ACK_AUTOVECTOR
            }),
            reset_instr: None,
            tas_instr: None,
            set_fc: None,
            #[cfg(debug_assertions)]
            illegal_trace_count: 0,
        }
    }

    // === Host configuration ===

    /// The memory map (mutate only between `run` calls).
    pub fn map_mut(&mut self) -> &mut MemoryMap {
        &mut self.map
    }

    /// Read-only view of the memory map.
    #[must_use]
    pub fn map(&self) -> &MemoryMap {
        &self.map
    }

    /// The interrupt line peripherals should clone.
    #[must_use]
    pub fn irq_line(&self) -> IrqLine {
        self.irq.clone()
    }

    /// Register the interrupt-acknowledge callback. It receives the level
    /// being serviced, must clear the device's request, and returns a
    /// vector number or one of the `INT_ACK_*` sentinels.
    pub fn set_int_ack_callback(&mut self, callback: impl FnMut(u32) -> u32 + 'static) {
        self.int_ack = Box::new(callback);
    }

    /// Register the RESET-instruction callback (machine-wide reset pulse).
    pub fn set_reset_instr_callback(&mut self, callback: impl FnMut() + 'static) {
        self.reset_instr = Some(Box::new(callback));
    }

    /// Register the TAS callback; returning false denies the write-back.
    pub fn set_tas_instr_callback(&mut self, callback: impl FnMut() -> bool + 'static) {
        self.tas_instr = Some(Box::new(callback));
    }

    /// Register the function-code hook, notified on every bus access.
    pub fn set_fc_callback(&mut self, callback: impl FnMut(u32) + 'static) {
        self.set_fc = Some(Box::new(callback));
    }

    /// Enable or disable address-error checking at runtime.
    pub fn set_address_error_enabled(&mut self, enabled: bool) {
        self.aerr_enabled = enabled;
    }

    // === IRQ and halt lines (per-CPU operations; delegate to the line) ===

    /// Overwrite the recorded IPL. See [`IrqLine::set_irq`] for the
    /// level-7 divergence from real NMI behavior.
    pub fn set_irq(&mut self, level: u32) {
        self.irq.set_irq(level);
    }

    /// OR a mask into the recorded IPL.
    pub fn update_irq(&mut self, mask: u32) {
        self.irq.update_irq(mask);
    }

    /// Raise the IPL with one instruction of latency. See
    /// [`IrqLine::set_irq_delay`] for the MOVE.L exclusion.
    pub fn set_irq_delay(&mut self, level: u32) {
        self.irq.set_irq_delay(level);
    }

    /// Assert the HALT line.
    pub fn pulse_halt(&mut self) {
        self.stopped |= STOP_LEVEL_HALT;
    }

    /// Release the HALT line.
    pub fn clear_halt(&mut self) {
        self.stopped &= !STOP_LEVEL_HALT;
    }

    /// STOP/HALT bitmask (0 = running).
    #[must_use]
    pub const fn stopped(&self) -> u32 {
        self.stopped
    }

    /// True while the HALT level is asserted (double fault or host pulse).
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.stopped & STOP_LEVEL_HALT != 0
    }

    /// Current master-cycle counter.
    #[must_use]
    pub const fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Set the master-cycle counter (host use at init/rebase).
    pub fn set_cycles(&mut self, cycles: u32) {
        self.cycles = cycles;
    }

    /// Fast-forward a detected idle loop to the slice deadline.
    pub fn fast_forward(&mut self) {
        if self.cycles < self.cycle_end {
            self.cycles = self.cycle_end;
        }
    }

    // === Context save/load ===

    /// Capture the processor context. The memory map is not captured.
    #[must_use]
    pub fn save_context(&self) -> Context {
        let irq = self.irq.snapshot();
        Context {
            regs: self.regs,
            cycles: self.cycles,
            cycle_end: self.cycle_end,
            ir: self.ir,
            stopped: self.stopped,
            run_mode: self.run_mode,
            int_level: irq.level,
            irq_delay: irq.delay,
            tracing: self.tracing,
            aerr_enabled: self.aerr_enabled,
            poll: self.poll,
        }
    }

    /// Restore a previously captured context.
    pub fn restore_context(&mut self, ctx: &Context) {
        self.regs = ctx.regs;
        self.cycles = ctx.cycles;
        self.cycle_end = ctx.cycle_end;
        self.ir = ctx.ir;
        self.stopped = ctx.stopped;
        self.run_mode = ctx.run_mode;
        self.tracing = ctx.tracing;
        self.aerr_enabled = ctx.aerr_enabled;
        self.poll = ctx.poll;
        self.irq.restore(IrqState {
            level: ctx.int_level,
            delay: ctx.irq_delay,
            delay_busy: false,
        });
    }

    // === Bus access ===

    pub(crate) fn data_fc(&self) -> u32 {
        if self.regs.is_supervisor() { FC_SUPERVISOR_DATA } else { FC_USER_DATA }
    }

    pub(crate) fn program_fc(&self) -> u32 {
        if self.regs.is_supervisor() { FC_SUPERVISOR_PROGRAM } else { FC_USER_PROGRAM }
    }

    fn notify_fc(&mut self, fc: u32) {
        if let Some(hook) = &mut self.set_fc {
            hook(fc);
        }
    }

    fn check_address(&self, address: u32, write: bool, fc: u32) -> Exec {
        if address & 1 != 0 && self.aerr_enabled {
            return Err(Fault { address, write, fc });
        }
        Ok(())
    }

    pub(crate) fn read_8(&mut self, address: u32) -> u32 {
        let fc = self.data_fc();
        self.notify_fc(fc);
        self.map.read_8(address)
    }

    pub(crate) fn read_16(&mut self, address: u32) -> Result<u32, Fault> {
        let fc = self.data_fc();
        self.notify_fc(fc);
        self.check_address(address, false, fc)?;
        Ok(self.map.read_16(address))
    }

    pub(crate) fn read_32(&mut self, address: u32) -> Result<u32, Fault> {
        let fc = self.data_fc();
        self.notify_fc(fc);
        self.check_address(address, false, fc)?;
        Ok(self.map.read_32(address))
    }

    pub(crate) fn write_8(&mut self, address: u32, value: u32) {
        let fc = self.data_fc();
        self.notify_fc(fc);
        self.map.write_8(address, value);
    }

    pub(crate) fn write_16(&mut self, address: u32, value: u32) -> Exec {
        let fc = self.data_fc();
        self.notify_fc(fc);
        self.check_address(address, true, fc)?;
        self.map.write_16(address, value);
        Ok(())
    }

    pub(crate) fn write_32(&mut self, address: u32, value: u32) -> Exec {
        let fc = self.data_fc();
        self.notify_fc(fc);
        self.check_address(address, true, fc)?;
        self.map.write_32(address, value);
        Ok(())
    }

    /// Read sized data at `address` (byte reads cannot fault).
    pub(crate) fn read_sized(&mut self, address: u32, size: crate::Size) -> Result<u32, Fault> {
        match size {
            crate::Size::Byte => Ok(self.read_8(address)),
            crate::Size::Word => self.read_16(address),
            crate::Size::Long => self.read_32(address),
        }
    }

    pub(crate) fn write_sized(&mut self, address: u32, value: u32, size: crate::Size) -> Exec {
        match size {
            crate::Size::Byte => {
                self.write_8(address, value);
                Ok(())
            }
            crate::Size::Word => self.write_16(address, value),
            crate::Size::Long => self.write_32(address, value),
        }
    }

    /// Fetch the word at PC from program space and advance PC.
    pub(crate) fn read_imm_16(&mut self) -> Result<u32, Fault> {
        let fc = self.program_fc();
        self.notify_fc(fc);
        self.check_address(self.regs.pc, false, fc)?;
        let value = self.map.read_16(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(2);
        Ok(value)
    }

    pub(crate) fn read_imm_32(&mut self) -> Result<u32, Fault> {
        let hi = self.read_imm_16()?;
        let lo = self.read_imm_16()?;
        Ok((hi << 16) | lo)
    }

    // === Stack ===

    pub(crate) fn push_16(&mut self, value: u32) -> Exec {
        let sp = self.regs.active_sp().wrapping_sub(2);
        self.regs.set_active_sp(sp);
        self.write_16(sp, value)
    }

    pub(crate) fn push_32(&mut self, value: u32) -> Exec {
        let sp = self.regs.active_sp().wrapping_sub(4);
        self.regs.set_active_sp(sp);
        self.write_32(sp, value)
    }

    pub(crate) fn pull_16(&mut self) -> Result<u32, Fault> {
        let sp = self.regs.active_sp();
        self.regs.set_active_sp(sp.wrapping_add(2));
        self.read_16(sp)
    }

    pub(crate) fn pull_32(&mut self) -> Result<u32, Fault> {
        let sp = self.regs.active_sp();
        self.regs.set_active_sp(sp.wrapping_add(4));
        self.read_32(sp)
    }

    // === Program flow ===

    pub(crate) fn jump(&mut self, new_pc: u32) {
        self.regs.pc = new_pc;
    }

    /// Load PC from the vector table (vector table reads are long-aligned
    /// data reads and cannot raise address errors).
    pub(crate) fn jump_vector(&mut self, vector: u32) {
        let fc = self.data_fc();
        self.notify_fc(fc);
        self.regs.pc = self.map.read_32(vector << 2);
    }

    // === Status register ===

    /// Assemble the SR with only defined bits visible.
    #[must_use]
    pub fn get_sr(&self) -> u16 {
        self.regs.sr & SR_MASK
    }

    /// Set the CCR (low byte); system byte untouched.
    pub(crate) fn set_ccr(&mut self, value: u32) {
        self.regs.sr = (self.regs.sr & 0xFF00) | (value as u16 & crate::flags::CCR_MASK);
    }

    /// Set the full SR and sample interrupts (mask may have dropped).
    pub fn set_sr(&mut self, value: u32) {
        self.regs.sr = value as u16 & SR_MASK;
        self.check_interrupts();
    }

    /// Set SR without the interrupt check (exception entry paths).
    pub(crate) fn set_sr_noint(&mut self, value: u32) {
        self.regs.sr = value as u16 & SR_MASK;
    }

    /// Charge `clocks` CPU clocks, scaled to master cycles.
    pub(crate) fn use_cycles(&mut self, clocks: u32) {
        self.cycles += clocks * crate::timing::MUL;
    }

    // === Run loop ===

    /// Execute until the cycle counter reaches `deadline`.
    pub fn run(&mut self, deadline: u32) {
        if self.cycles >= deadline {
            return;
        }
        self.cycle_end = deadline;

        // Service anything peripherals raised since the last slice.
        self.check_interrupts();

        if self.stopped != 0 {
            self.cycles = deadline;
            return;
        }

        while self.cycles < deadline {
            self.step();
            if self.stopped != 0 {
                self.cycles = deadline;
                break;
            }
            // Interrupts are sampled at instruction boundaries.
            self.check_interrupts();
            if self.stopped != 0 {
                self.cycles = deadline;
                break;
            }
        }
    }

    /// Execute one instruction plus any trace/latency follow-up.
    fn step(&mut self) {
        self.execute_one();
        self.resolve_irq_delay();
    }

    fn execute_one(&mut self) {
        self.instr_mode = InstrMode::Instruction;
        self.tracing = self.regs.is_trace();
        self.instr_start_pc = self.regs.pc;
        let start_cycles = self.cycles;

        let result = self.read_imm_16().and_then(|opcode| {
            self.ir = opcode as u16;
            self.execute(opcode as u16)
        });
        if let Err(fault) = result {
            // The faulting instruction contributes no cycles; the
            // exception's cost replaces it.
            self.cycles = start_cycles;
            self.begin_address_error(&fault);
            return;
        }

        if self.tracing {
            self.exception_trace();
        }
    }

    /// Resolve a latched delayed-IRQ request at an instruction boundary.
    fn resolve_irq_delay(&mut self) {
        let Some(level) = self.irq.take_delay() else {
            return;
        };
        if self.ir & 0xF000 != 0x2000 && self.stopped == 0 {
            // One instruction of latency; further delay requests raised by
            // this instruction are dropped, matching the hardware-observed
            // single-slot behavior.
            self.irq.set_delay_busy(true);
            self.execute_one();
            self.irq.set_delay_busy(false);
        }
        self.irq.set_level(level);
        self.check_interrupts();
    }

    /// Sample the interrupt line against the mask.
    ///
    /// Strict greater-than: level 7 does not pierce a mask of 7 (the
    /// level-triggered divergence documented on [`IrqLine`]).
    pub(crate) fn check_interrupts(&mut self) {
        let level = u32::from(self.irq.level());
        if level > u32::from(self.regs.interrupt_mask()) {
            self.service_interrupt(level);
        }
    }

    fn service_interrupt(&mut self, level: u32) {
        if let Err(fault) = self.exception_interrupt(level) {
            self.begin_address_error(&fault);
        }
    }

    /// Interrupt acknowledge through the host callback.
    pub(crate) fn int_ack(&mut self, level: u32) -> u32 {
        (self.int_ack)(level)
    }

    /// RESET instruction: pulse the peripheral reset callback.
    pub(crate) fn reset_peripherals(&mut self) {
        if let Some(hook) = &mut self.reset_instr {
            hook();
        }
    }

    /// TAS write-back arbitration; defaults to permitting the write.
    pub(crate) fn tas_writeback(&mut self) -> bool {
        match &mut self.tas_instr {
            Some(hook) => hook(),
            None => true,
        }
    }

    /// Pulse the RESET pin: supervisor mode, mask 7, SP and PC fetched
    /// from vectors 0 and 1, reset exception cost charged.
    pub fn reset(&mut self) {
        self.stopped = 0;
        self.run_mode = RunMode::Group0;
        self.tracing = false;
        self.regs.sr &= !T;
        self.regs.sr |= crate::flags::S;
        self.regs.set_interrupt_mask(7);
        self.irq.restore(IrqState::default());

        let fc = self.program_fc();
        self.notify_fc(fc);
        self.regs.ssp = self.map.read_32(0);
        self.regs.pc = self.map.read_32(4);

        self.run_mode = RunMode::Normal;
        self.cycles += exception_cycles(EX_RESET);
    }

    /// Log an illegal opcode in debug builds (bounded), then raise the
    /// illegal-instruction exception.
    pub(crate) fn log_illegal(&mut self) {
        #[cfg(debug_assertions)]
        {
            if self.illegal_trace_count < 128 {
                eprintln!(
                    "  M68K ILLEGAL: opcode=${:04X} pc=${:08X}",
                    self.ir, self.instr_start_pc
                );
                self.illegal_trace_count += 1;
            }
        }
    }
}

impl Default for Cpu68000 {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Cpu68000 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cpu68000")
            .field("regs", &self.regs)
            .field("cycles", &self.cycles)
            .field("cycle_end", &self.cycle_end)
            .field("ir", &self.ir)
            .field("stopped", &self.stopped)
            .field("run_mode", &self.run_mode)
            .finish_non_exhaustive()
    }
}

impl Processor for Cpu68000 {
    fn reset(&mut self) {
        Cpu68000::reset(self);
    }

    fn run(&mut self, deadline: u32) {
        Cpu68000::run(self, deadline);
    }

    fn cycles(&self) -> u32 {
        self.cycles
    }

    fn rebase_cycles(&mut self, frame_cycles: u32) {
        self.cycles = self.cycles.saturating_sub(frame_cycles);
    }
}

// === Register peek/poke by name ===

const M68000_QUERY_PATHS: &[&str] = &[
    "d0", "d1", "d2", "d3", "d4", "d5", "d6", "d7",
    "a0", "a1", "a2", "a3", "a4", "a5", "a6", "a7",
    "sp", "usp", "isp",
    "pc",
    "sr", "ccr", "ir",
    "pref_addr", "pref_data",
    "flags.x", "flags.n", "flags.z", "flags.v", "flags.c",
    "flags.s", "flags.t",
    "int_mask", "int_level",
    "halted", "stopped", "cycles",
];

impl Observable for Cpu68000 {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix('d') {
            if let Ok(n) = rest.parse::<usize>() {
                if n < 8 {
                    return Some(self.regs.d[n].into());
                }
            }
        }
        if let Some(rest) = path.strip_prefix('a') {
            if let Ok(n) = rest.parse::<usize>() {
                if n < 8 {
                    return Some(self.regs.a(n).into());
                }
            }
        }
        match path {
            "sp" => Some(self.regs.active_sp().into()),
            "usp" => Some(if self.regs.is_supervisor() { self.regs.usp } else { self.regs.active_sp() }.into()),
            "isp" => Some(if self.regs.is_supervisor() { self.regs.active_sp() } else { self.regs.ssp }.into()),
            "pc" => Some(self.regs.pc.into()),
            "sr" => Some(Value::U16(self.get_sr())),
            "ccr" => Some(self.regs.ccr().into()),
            "ir" => Some(Value::U16(self.ir)),
            // Prefetch is not emulated; peeks are well-defined zeros.
            "pref_addr" | "pref_data" => Some(Value::U32(0)),
            "flags.x" => Some((self.regs.sr & X != 0).into()),
            "flags.n" => Some((self.regs.sr & N != 0).into()),
            "flags.z" => Some((self.regs.sr & Z != 0).into()),
            "flags.v" => Some((self.regs.sr & V != 0).into()),
            "flags.c" => Some((self.regs.sr & C != 0).into()),
            "flags.s" => Some(self.regs.is_supervisor().into()),
            "flags.t" => Some(self.regs.is_trace().into()),
            "int_mask" => Some(self.regs.interrupt_mask().into()),
            "int_level" => Some(self.irq.level().into()),
            "halted" => Some(self.is_halted().into()),
            "stopped" => Some((self.stopped != 0).into()),
            "cycles" => Some(self.cycles.into()),
            _ => None,
        }
    }

    fn poke(&mut self, path: &str, value: u32) -> bool {
        if let Some(rest) = path.strip_prefix('d') {
            if let Ok(n) = rest.parse::<usize>() {
                if n < 8 {
                    self.regs.d[n] = value;
                    return true;
                }
            }
        }
        if let Some(rest) = path.strip_prefix('a') {
            if let Ok(n) = rest.parse::<usize>() {
                if n < 8 {
                    self.regs.set_a(n, value);
                    return true;
                }
            }
        }
        match path {
            "sp" => self.regs.set_active_sp(value),
            "usp" => {
                if self.regs.is_supervisor() {
                    self.regs.usp = value;
                } else {
                    self.regs.set_active_sp(value);
                }
            }
            "isp" => {
                if self.regs.is_supervisor() {
                    self.regs.set_active_sp(value);
                } else {
                    self.regs.ssp = value;
                }
            }
            "pc" => self.jump(value),
            "sr" => self.set_sr(value),
            "ccr" => self.set_ccr(value),
            "ir" => self.ir = value as u16,
            _ => return false,
        }
        true
    }

    fn query_paths(&self) -> &'static [&'static str] {
        M68000_QUERY_PATHS
    }
}
