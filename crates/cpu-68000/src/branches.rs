//! Control transfer: Bcc/BRA/BSR, JMP/JSR, and the return family.

use crate::cpu::{Cpu68000, Exec};
use crate::ea::AddrMode;
use crate::flags::Status;
use crate::timing::jmp_time;

impl Cpu68000 {
    /// `0110 CCCC DDDDDDDD`: BRA (cc=0), BSR (cc=1), Bcc otherwise.
    /// A zero 8-bit displacement selects the 16-bit form.
    pub(crate) fn exec_branch(&mut self, op: u16) -> Exec {
        let cc = ((op >> 8) & 0x0F) as u8;
        let disp8 = op as u8;
        // Displacements are relative to the word after the opcode
        let base = self.regs.pc;

        if cc == 1 {
            // BSR
            let target = if disp8 == 0 {
                let disp = self.read_imm_16()? as i16;
                base.wrapping_add(disp as u32)
            } else {
                base.wrapping_add(disp8 as i8 as u32)
            };
            self.push_32(self.regs.pc)?;
            self.jump(target);
            self.use_cycles(18);
            return Ok(());
        }

        let taken = Status::condition(self.regs.sr, cc);
        if disp8 == 0 {
            let disp = self.read_imm_16()? as i16;
            if taken {
                self.jump(base.wrapping_add(disp as u32));
                self.use_cycles(10);
            } else {
                self.use_cycles(12);
            }
        } else if taken {
            self.jump(base.wrapping_add(disp8 as i8 as u32));
            self.use_cycles(10);
        } else {
            self.use_cycles(8);
        }
        Ok(())
    }

    /// JMP <ea>.
    pub(crate) fn exec_jmp(&mut self, op: u16) -> Exec {
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        if !self.is_control_mode(ea) {
            return self.illegal();
        }
        let target = self.control_ea(ea)?;
        self.jump(target);
        self.use_cycles(jmp_time(ea));
        Ok(())
    }

    /// JSR <ea>.
    pub(crate) fn exec_jsr(&mut self, op: u16) -> Exec {
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        if !self.is_control_mode(ea) {
            return self.illegal();
        }
        let target = self.control_ea(ea)?;
        self.push_32(self.regs.pc)?;
        self.jump(target);
        self.use_cycles(jmp_time(ea) + 8);
        Ok(())
    }

    /// RTS.
    pub(crate) fn exec_rts(&mut self) -> Exec {
        let pc = self.pull_32()?;
        self.jump(pc);
        self.use_cycles(16);
        Ok(())
    }

    /// RTR: CCR then PC from the stack.
    pub(crate) fn exec_rtr(&mut self) -> Exec {
        let ccr = self.pull_16()?;
        self.set_ccr(ccr);
        let pc = self.pull_32()?;
        self.jump(pc);
        self.use_cycles(20);
        Ok(())
    }

    /// RTE (privileged): SR then PC; a dropped mask re-samples interrupts.
    pub(crate) fn exec_rte(&mut self) -> Exec {
        if !self.regs.is_supervisor() {
            return self.exception_privilege_violation();
        }
        let sr = self.pull_16()?;
        let pc = self.pull_32()?;
        self.jump(pc);
        self.use_cycles(20);
        self.set_sr(sr);
        Ok(())
    }

    /// Control addressing modes valid for JMP/JSR/LEA/PEA.
    pub(crate) fn is_control_mode(&self, ea: AddrMode) -> bool {
        matches!(
            ea,
            AddrMode::AddrInd(_)
                | AddrMode::AddrIndDisp(_)
                | AddrMode::AddrIndIndex(_)
                | AddrMode::AbsShort
                | AddrMode::AbsLong
                | AddrMode::PcDisp
                | AddrMode::PcIndex
        )
    }
}
