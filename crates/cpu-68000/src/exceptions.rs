//! Exception processing.
//!
//! Two frame shapes exist on the 68000:
//! - 3-word frame (PC long + SR word) for traps, trace, privilege
//!   violation, A/F-line, illegal instruction, and all interrupts;
//! - group-0 frame (PC + SR + IR + fault address + access-info word) for
//!   address errors.
//!
//! Frame pushes go through the ordinary checked word-write path, so an odd
//! supervisor stack pointer sends a group-0 exception into the double-fault
//! path instead of silently writing through.

use crate::cpu::{Cpu68000, Exec, InstrMode, RunMode, INT_ACK_AUTOVECTOR, INT_ACK_SPURIOUS,
    STOP_LEVEL_HALT, STOP_LEVEL_STOP};
use crate::flags::{S, T};
use crate::memmap::Fault;
use crate::timing::{exception_cycles, EX_1010, EX_1111, EX_ADDRESS_ERROR, EX_AUTOVECTOR,
    EX_ILLEGAL, EX_PRIVILEGE, EX_TRACE, EX_UNINITIALIZED};

/// Access-info word: R/W bit (set = read).
const INFO_READ: u32 = 0x10;
/// Access-info word: I/N bit (set = not executing an instruction).
const INFO_NOT_INSTRUCTION: u32 = 0x08;

impl Cpu68000 {
    /// Begin exception processing: capture SR, clear trace, enter
    /// supervisor mode. Returns the SR to stack.
    pub(crate) fn init_exception(&mut self) -> u32 {
        let sr = u32::from(self.get_sr());
        self.tracing = false;
        self.regs.sr &= !T;
        self.regs.sr |= S;
        sr
    }

    /// Stack the 3-word frame: PC (long), then SR (word) on top.
    pub(crate) fn stack_frame_3word(&mut self, pc: u32, sr: u32) -> Exec {
        self.push_32(pc)?;
        self.push_16(sr)
    }

    /// Group 1/2 exception with the PC of the *next* instruction (TRAP,
    /// TRAPV, CHK, zero divide): used after the instruction completed its
    /// stream reads.
    pub(crate) fn exception_trap(&mut self, vector: u32) -> Exec {
        let sr = self.init_exception();
        self.instr_mode = InstrMode::Exception;
        self.stack_frame_3word(self.regs.pc, sr)?;
        self.jump_vector(vector);
        self.cycles += exception_cycles(vector);
        Ok(())
    }

    /// Group 1 exception with the PC of the *current* instruction
    /// (illegal, A/F-line, privilege violation): the faulted opcode
    /// re-executes after the handler fixes things up.
    fn exception_at_instruction(&mut self, vector: u32) -> Exec {
        let sr = self.init_exception();
        self.instr_mode = InstrMode::Exception;
        self.stack_frame_3word(self.instr_start_pc, sr)?;
        self.jump_vector(vector);
        self.cycles += exception_cycles(vector);
        Ok(())
    }

    pub(crate) fn exception_illegal(&mut self) -> Exec {
        self.log_illegal();
        self.exception_at_instruction(EX_ILLEGAL)
    }

    pub(crate) fn exception_privilege_violation(&mut self) -> Exec {
        self.exception_at_instruction(EX_PRIVILEGE)
    }

    pub(crate) fn exception_1010(&mut self) -> Exec {
        self.exception_at_instruction(EX_1010)
    }

    pub(crate) fn exception_1111(&mut self) -> Exec {
        self.exception_at_instruction(EX_1111)
    }

    /// Trace exception, taken after an instruction that started with T set.
    /// Trace nullifies a STOP state.
    pub(crate) fn exception_trace(&mut self) {
        let sr = self.init_exception();
        self.instr_mode = InstrMode::Exception;
        let frame = self
            .stack_frame_3word(self.regs.pc, sr)
            .map(|()| {
                self.jump_vector(EX_TRACE);
                self.cycles += exception_cycles(EX_TRACE);
            });
        self.stopped &= !STOP_LEVEL_STOP;
        if let Err(fault) = frame {
            self.begin_address_error(&fault);
        }
    }

    /// Service an interrupt at `level`.
    ///
    /// Wakes a STOPped CPU; a HALTed CPU stays down. The acknowledge
    /// callback picks the vector (or a sentinel); a vector whose table
    /// entry reads zero falls back to the uninitialized-interrupt vector.
    pub(crate) fn exception_interrupt(&mut self, level: u32) -> Exec {
        self.instr_mode = InstrMode::Exception;

        self.stopped &= STOP_LEVEL_HALT;
        if self.stopped != 0 {
            return Ok(());
        }

        // Acknowledge: the device clears its request and picks the vector
        let ack = self.int_ack(level);
        let vector = match ack {
            INT_ACK_AUTOVECTOR => EX_AUTOVECTOR + level,
            INT_ACK_SPURIOUS => EX_AUTOVECTOR,
            v => v & 0xFF,
        };

        let sr = self.init_exception();

        // Mask rises to the level being serviced
        self.regs.set_interrupt_mask(level as u8);

        let mut new_pc = self.map.read_32(vector << 2);
        if new_pc == 0 {
            new_pc = self.map.read_32(EX_UNINITIALIZED << 2);
        }

        self.stack_frame_3word(self.regs.pc, sr)?;
        self.jump(new_pc);

        self.cycles += exception_cycles(vector);
        Ok(())
    }

    /// Address-error entry point. The caller has already restored the
    /// cycle counter to the instruction start.
    pub(crate) fn begin_address_error(&mut self, fault: &Fault) {
        let sr = self.init_exception();

        // A group-0 fault during group-0 processing is catastrophic
        if self.run_mode == RunMode::Group0 {
            self.stopped = STOP_LEVEL_HALT;
            self.cycles = self.cycle_end;
            return;
        }
        self.run_mode = RunMode::Group0;

        let info = if fault.write { 0 } else { INFO_READ }
            | match self.instr_mode {
                InstrMode::Instruction => 0,
                InstrMode::Exception => INFO_NOT_INSTRUCTION,
            }
            | (fault.fc & 7);

        let frame = self
            .push_32(self.regs.pc)
            .and_then(|()| self.push_16(sr))
            .and_then(|()| self.push_16(u32::from(self.ir)))
            .and_then(|()| self.push_32(fault.address))
            .and_then(|()| self.push_16(info));

        if frame.is_err() {
            // Double fault while stacking the frame (odd SSP)
            self.stopped = STOP_LEVEL_HALT;
            self.cycles = self.cycle_end;
            return;
        }

        self.jump_vector(EX_ADDRESS_ERROR);
        self.cycles += exception_cycles(EX_ADDRESS_ERROR);
        self.run_mode = RunMode::Normal;
    }
}
