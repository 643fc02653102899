//! Group 0x0: immediate ALU operations (including the CCR/SR forms),
//! static and dynamic bit operations, and MOVEP.

use crate::alu::Size;
use crate::cpu::{Cpu68000, Exec};
use crate::ea::AddrMode;
use crate::timing::ea_time;

impl Cpu68000 {
    /// `0000 XXX OOO MMMRRR`.
    pub(crate) fn exec_group0(&mut self, op: u16) -> Exec {
        if op & 0x0100 != 0 {
            // Dynamic bit ops, or MOVEP when the EA field says An
            if op & 0x0038 == 0x0008 {
                return self.exec_movep(op);
            }
            return self.exec_bitop_dynamic(op);
        }

        match (op >> 9) & 7 {
            0 => self.exec_imm_alu(op, ImmOp::Or),
            1 => self.exec_imm_alu(op, ImmOp::And),
            2 => self.exec_imm_alu(op, ImmOp::Sub),
            3 => self.exec_imm_alu(op, ImmOp::Add),
            4 => self.exec_bitop_static(op),
            5 => self.exec_imm_alu(op, ImmOp::Eor),
            6 => self.exec_imm_alu(op, ImmOp::Cmp),
            _ => self.illegal(),
        }
    }

    fn exec_imm_alu(&mut self, op: u16, kind: ImmOp) -> Exec {
        let Some(size) = Size::from_bits((op >> 6) & 3) else {
            return self.illegal();
        };
        let mode = ((op >> 3) & 7) as u8;
        let ea_reg = (op & 7) as u8;

        // ORI/ANDI/EORI #imm,CCR (byte) and #imm,SR (word)
        if mode == 7 && ea_reg == 4 {
            return match kind {
                ImmOp::Or => self.exec_imm_to_status(size, |sr, imm| sr | imm),
                ImmOp::And => self.exec_imm_to_status(size, |sr, imm| sr & imm),
                ImmOp::Eor => self.exec_imm_to_status(size, |sr, imm| sr ^ imm),
                _ => self.illegal(),
            };
        }

        let Some(ea) = AddrMode::decode(mode, ea_reg) else {
            return self.illegal();
        };
        if !ea.is_data_alterable() || ea == AddrMode::Immediate {
            return self.illegal();
        }

        let imm = match size {
            Size::Byte => self.read_imm_16()? & 0xFF,
            Size::Word => self.read_imm_16()?,
            Size::Long => self.read_imm_32()?,
        };
        let loc = self.resolve_ea(ea, size)?;
        let dst = self.operand_read(loc, size)?;

        match kind {
            ImmOp::Cmp => {
                self.alu_cmp(imm, dst, size);
                let base = match (size, ea.is_memory()) {
                    (Size::Long, false) => 14,
                    (Size::Long, true) => 12,
                    (_, _) => 8,
                };
                self.use_cycles(base + ea_time(ea, size));
                return Ok(());
            }
            ImmOp::Add => {
                let res = self.alu_add(imm, dst, size, false, false);
                self.operand_write(loc, res, size)?;
            }
            ImmOp::Sub => {
                let res = self.alu_sub(imm, dst, size, false, false);
                self.operand_write(loc, res, size)?;
            }
            ImmOp::Or | ImmOp::And | ImmOp::Eor => {
                let res = match kind {
                    ImmOp::Or => dst | imm,
                    ImmOp::And => dst & imm,
                    _ => dst ^ imm,
                } & size.mask();
                self.operand_write(loc, res, size)?;
                self.set_flags_move(res, size);
            }
        }

        let base = match (size, ea.is_memory()) {
            (Size::Long, false) => 16,
            (Size::Long, true) => 20,
            (_, false) => 8,
            (_, true) => 12,
        };
        self.use_cycles(base + ea_time(ea, size));
        Ok(())
    }

    /// ORI/ANDI/EORI to CCR (byte) or SR (word, privileged).
    fn exec_imm_to_status(&mut self, size: Size, f: fn(u32, u32) -> u32) -> Exec {
        match size {
            Size::Byte => {
                let imm = self.read_imm_16()? & 0xFF;
                let ccr = u32::from(self.regs.ccr());
                self.set_ccr(f(ccr, imm));
                self.use_cycles(20);
                Ok(())
            }
            Size::Word => {
                if !self.regs.is_supervisor() {
                    return self.exception_privilege_violation();
                }
                let imm = self.read_imm_16()?;
                let sr = u32::from(self.get_sr());
                self.use_cycles(20);
                self.set_sr(f(sr, imm));
                Ok(())
            }
            Size::Long => self.illegal(),
        }
    }

    /// MOVEP: byte lanes on alternating addresses, word or long.
    fn exec_movep(&mut self, op: u16) -> Exec {
        let dreg = ((op >> 9) & 7) as u8;
        let areg = (op & 7) as usize;
        let opmode = (op >> 6) & 7;
        let disp = self.read_imm_16()? as i16;
        let addr = self.regs.a(areg).wrapping_add(disp as u32);

        match opmode {
            // (d16,Ay) -> Dx
            4 | 5 => {
                let long = opmode == 5;
                let mut value = 0u32;
                let count = if long { 4 } else { 2 };
                for i in 0..count {
                    let byte = self.read_8(addr.wrapping_add(i * 2));
                    value = (value << 8) | byte;
                }
                let size = if long { Size::Long } else { Size::Word };
                self.write_data_reg(dreg, value, size);
                self.use_cycles(if long { 24 } else { 16 });
            }
            // Dx -> (d16,Ay)
            6 | 7 => {
                let long = opmode == 7;
                let value = self.regs.d[dreg as usize];
                let count = if long { 4u32 } else { 2 };
                for i in 0..count {
                    let shift = 8 * (count - 1 - i);
                    self.write_8(addr.wrapping_add(i * 2), (value >> shift) & 0xFF);
                }
                self.use_cycles(if long { 24 } else { 16 });
            }
            _ => return self.illegal(),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImmOp {
    Or,
    And,
    Sub,
    Add,
    Eor,
    Cmp,
}
