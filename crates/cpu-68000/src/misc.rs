//! MOVE/MOVEA and the group 0x4 miscellany: status moves, MOVEM, LEA/PEA,
//! LINK/UNLK, TRAP/TRAPV, CHK, and the supervisor control opcodes.

use crate::alu::Size;
use crate::cpu::{Cpu68000, Exec};
use crate::ea::AddrMode;
use crate::flags::V;
use crate::timing::{ea_time, lea_ea_time, move_dest_time, movem_ea_extra, EX_TRAPV, EX_TRAP_BASE};

impl Cpu68000 {
    /// Groups 0x1-0x3: MOVE and MOVEA.
    pub(crate) fn exec_move(&mut self, op: u16) -> Exec {
        let Some(size) = Size::from_move_bits(op >> 12) else {
            return self.illegal();
        };
        let Some(src) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        let Some(dst) = AddrMode::decode(((op >> 6) & 7) as u8, ((op >> 9) & 7) as u8) else {
            return self.illegal();
        };

        if size == Size::Byte && matches!(src, AddrMode::AddrReg(_)) {
            return self.illegal();
        }

        // MOVEA: address destination, word sign-extends, no flags
        if let AddrMode::AddrReg(r) = dst {
            if size == Size::Byte {
                return self.illegal();
            }
            let value = size.sign_extend(self.fetch_ea(src, size)?);
            self.regs.set_a(r as usize, value);
            self.use_cycles(4 + ea_time(src, size));
            return Ok(());
        }

        if !dst.is_data_alterable() || dst == AddrMode::Immediate {
            return self.illegal();
        }

        let value = self.fetch_ea(src, size)?;
        let loc = self.resolve_ea(dst, size)?;
        self.operand_write(loc, value, size)?;
        self.set_flags_move(value, size);
        self.use_cycles(4 + ea_time(src, size) + move_dest_time(dst, size));
        Ok(())
    }

    /// Group 0x4 decode.
    pub(crate) fn exec_group4(&mut self, op: u16) -> Exec {
        // LEA and CHK carry a register field in bits 11-9
        match (op >> 6) & 7 {
            7 => return self.exec_lea(op),
            6 => return self.exec_chk(op),
            _ => {}
        }

        match (op >> 8) & 0x0F {
            0x0 => match (op >> 6) & 3 {
                3 => self.exec_move_from_sr(op),
                sz => self.exec_neg(op, Size::from_bits(sz).unwrap_or(Size::Byte), true),
            },
            0x2 => match (op >> 6) & 3 {
                // MOVE from CCR is a 68010 addition
                3 => self.illegal(),
                sz => self.exec_clr(op, Size::from_bits(sz).unwrap_or(Size::Byte)),
            },
            0x4 => match (op >> 6) & 3 {
                3 => self.exec_move_to_ccr(op),
                sz => self.exec_neg(op, Size::from_bits(sz).unwrap_or(Size::Byte), false),
            },
            0x6 => match (op >> 6) & 3 {
                3 => self.exec_move_to_sr(op),
                sz => self.exec_not(op, Size::from_bits(sz).unwrap_or(Size::Byte)),
            },
            0x8 => match (op >> 6) & 3 {
                0 => self.exec_nbcd(op),
                1 => {
                    if op & 0x0038 == 0 {
                        self.exec_swap(op)
                    } else {
                        self.exec_pea(op)
                    }
                }
                2 => {
                    if op & 0x0038 == 0 {
                        self.exec_ext(op, Size::Word)
                    } else {
                        self.exec_movem_store(op, Size::Word)
                    }
                }
                _ => {
                    if op & 0x0038 == 0 {
                        self.exec_ext(op, Size::Long)
                    } else {
                        self.exec_movem_store(op, Size::Long)
                    }
                }
            },
            0xA => match (op >> 6) & 3 {
                3 => {
                    if op == 0x4AFC {
                        self.exception_illegal()
                    } else {
                        self.exec_tas(op)
                    }
                }
                sz => self.exec_tst(op, Size::from_bits(sz).unwrap_or(Size::Byte)),
            },
            0xC => match (op >> 6) & 3 {
                2 => self.exec_movem_load(op, Size::Word),
                3 => self.exec_movem_load(op, Size::Long),
                _ => self.illegal(),
            },
            0xE => self.exec_group4e(op),
            _ => self.illegal(),
        }
    }

    fn exec_group4e(&mut self, op: u16) -> Exec {
        match op {
            0x4E70 => self.exec_reset(),
            0x4E71 => {
                // NOP
                self.use_cycles(4);
                Ok(())
            }
            0x4E72 => self.exec_stop(),
            0x4E73 => self.exec_rte(),
            0x4E75 => self.exec_rts(),
            0x4E76 => {
                // TRAPV
                self.use_cycles(4);
                if self.regs.sr & V != 0 {
                    return self.exception_trap(EX_TRAPV);
                }
                Ok(())
            }
            0x4E77 => self.exec_rtr(),
            0x4E40..=0x4E4F => {
                // TRAP #n
                let vector = EX_TRAP_BASE + u32::from(op & 0x0F);
                self.exception_trap(vector)
            }
            0x4E50..=0x4E57 => self.exec_link(op),
            0x4E58..=0x4E5F => self.exec_unlk(op),
            0x4E60..=0x4E67 => self.exec_move_to_usp(op),
            0x4E68..=0x4E6F => self.exec_move_from_usp(op),
            0x4E80..=0x4EBF => self.exec_jsr(op),
            0x4EC0..=0x4EFF => self.exec_jmp(op),
            _ => self.illegal(),
        }
    }

    fn exec_lea(&mut self, op: u16) -> Exec {
        let reg = ((op >> 9) & 7) as usize;
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        if !self.is_control_mode(ea) {
            return self.illegal();
        }
        let addr = self.control_ea(ea)?;
        self.regs.set_a(reg, addr);
        self.use_cycles(4 + lea_ea_time(ea));
        Ok(())
    }

    fn exec_pea(&mut self, op: u16) -> Exec {
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        if !self.is_control_mode(ea) {
            return self.illegal();
        }
        let addr = self.control_ea(ea)?;
        self.push_32(addr)?;
        self.use_cycles(12 + lea_ea_time(ea));
        Ok(())
    }

    fn exec_move_from_sr(&mut self, op: u16) -> Exec {
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        if !ea.is_data_alterable() || ea == AddrMode::Immediate {
            return self.illegal();
        }
        let sr = u32::from(self.get_sr());
        let loc = self.resolve_ea(ea, Size::Word)?;
        // The 68000 reads the destination before rewriting it
        let _ = self.operand_read(loc, Size::Word)?;
        self.operand_write(loc, sr, Size::Word)?;
        self.use_cycles(if ea.is_memory() { 8 + ea_time(ea, Size::Word) } else { 6 });
        Ok(())
    }

    fn exec_move_to_ccr(&mut self, op: u16) -> Exec {
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        if matches!(ea, AddrMode::AddrReg(_)) {
            return self.illegal();
        }
        let value = self.fetch_ea(ea, Size::Word)?;
        self.set_ccr(value);
        self.use_cycles(12 + ea_time(ea, Size::Word));
        Ok(())
    }

    fn exec_move_to_sr(&mut self, op: u16) -> Exec {
        if !self.regs.is_supervisor() {
            return self.exception_privilege_violation();
        }
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        if matches!(ea, AddrMode::AddrReg(_)) {
            return self.illegal();
        }
        let value = self.fetch_ea(ea, Size::Word)?;
        self.use_cycles(12 + ea_time(ea, Size::Word));
        self.set_sr(value);
        Ok(())
    }

    fn exec_link(&mut self, op: u16) -> Exec {
        let reg = (op & 7) as usize;
        let disp = self.read_imm_16()? as i16;
        if reg == 7 {
            // LINK A7 frames the already-decremented stack pointer
            let sp = self.regs.active_sp().wrapping_sub(4);
            self.regs.set_active_sp(sp);
            self.write_32(sp, sp)?;
        } else {
            let an = self.regs.a(reg);
            self.push_32(an)?;
            self.regs.set_a(reg, self.regs.active_sp());
        }
        let sp = self.regs.active_sp();
        self.regs.set_active_sp(sp.wrapping_add(disp as u32));
        self.use_cycles(16);
        Ok(())
    }

    fn exec_unlk(&mut self, op: u16) -> Exec {
        let reg = (op & 7) as usize;
        self.regs.set_active_sp(self.regs.a(reg));
        let value = self.pull_32()?;
        self.regs.set_a(reg, value);
        self.use_cycles(12);
        Ok(())
    }

    fn exec_move_to_usp(&mut self, op: u16) -> Exec {
        if !self.regs.is_supervisor() {
            return self.exception_privilege_violation();
        }
        self.regs.usp = self.regs.a((op & 7) as usize);
        self.use_cycles(4);
        Ok(())
    }

    fn exec_move_from_usp(&mut self, op: u16) -> Exec {
        if !self.regs.is_supervisor() {
            return self.exception_privilege_violation();
        }
        let usp = self.regs.usp;
        self.regs.set_a((op & 7) as usize, usp);
        self.use_cycles(4);
        Ok(())
    }

    /// RESET: pulse the peripheral reset line (privileged).
    fn exec_reset(&mut self) -> Exec {
        if !self.regs.is_supervisor() {
            return self.exception_privilege_violation();
        }
        self.reset_peripherals();
        self.use_cycles(132);
        Ok(())
    }

    /// MOVEM regs,<ea>. For -(An) the mask is bit-reversed and registers
    /// are stored descending, A7 first.
    fn exec_movem_store(&mut self, op: u16, size: Size) -> Exec {
        let mask = self.read_imm_16()?;
        let mode = ((op >> 3) & 7) as u8;
        let ea_reg = (op & 7) as u8;
        let Some(ea) = AddrMode::decode(mode, ea_reg) else {
            return self.illegal();
        };
        let step = size.bytes();
        let mut count = 0u32;

        match ea {
            AddrMode::AddrIndPreDec(r) => {
                let mut addr = self.regs.a(r as usize);
                for bit in 0..16 {
                    if mask & (1 << bit) == 0 {
                        continue;
                    }
                    // Bit 0 is A7, bit 15 is D0
                    let value = if bit < 8 {
                        self.regs.a(7 - bit)
                    } else {
                        self.regs.d[15 - bit]
                    };
                    addr = addr.wrapping_sub(step);
                    self.write_sized(addr, value, size)?;
                    count += 1;
                }
                self.regs.set_a(r as usize, addr);
            }
            AddrMode::AddrInd(_)
            | AddrMode::AddrIndDisp(_)
            | AddrMode::AddrIndIndex(_)
            | AddrMode::AbsShort
            | AddrMode::AbsLong => {
                let mut addr = self.control_ea(ea)?;
                for bit in 0..16 {
                    if mask & (1 << bit) == 0 {
                        continue;
                    }
                    let value = if bit < 8 {
                        self.regs.d[bit]
                    } else {
                        self.regs.a(bit - 8)
                    };
                    self.write_sized(addr, value, size)?;
                    addr = addr.wrapping_add(step);
                    count += 1;
                }
            }
            _ => return self.illegal(),
        }

        let per_reg = if size == Size::Long { 8 } else { 4 };
        self.use_cycles(8 + movem_ea_extra(ea) + per_reg * count);
        Ok(())
    }

    /// MOVEM <ea>,regs. Word loads sign-extend into the full register.
    fn exec_movem_load(&mut self, op: u16, size: Size) -> Exec {
        let mask = self.read_imm_16()?;
        let mode = ((op >> 3) & 7) as u8;
        let ea_reg = (op & 7) as u8;
        let Some(ea) = AddrMode::decode(mode, ea_reg) else {
            return self.illegal();
        };
        let step = size.bytes();
        let mut count = 0u32;

        let mut addr = match ea {
            AddrMode::AddrIndPostInc(r) => self.regs.a(r as usize),
            AddrMode::AddrInd(_)
            | AddrMode::AddrIndDisp(_)
            | AddrMode::AddrIndIndex(_)
            | AddrMode::AbsShort
            | AddrMode::AbsLong
            | AddrMode::PcDisp
            | AddrMode::PcIndex => self.control_ea(ea)?,
            _ => return self.illegal(),
        };

        for bit in 0..16 {
            if mask & (1 << bit) == 0 {
                continue;
            }
            let value = size.sign_extend(self.read_sized(addr, size)?);
            if bit < 8 {
                self.regs.d[bit] = value;
            } else {
                self.regs.set_a(bit - 8, value);
            }
            addr = addr.wrapping_add(step);
            count += 1;
        }

        if let AddrMode::AddrIndPostInc(r) = ea {
            self.regs.set_a(r as usize, addr);
        }

        let per_reg = if size == Size::Long { 8 } else { 4 };
        self.use_cycles(12 + movem_ea_extra(ea) + per_reg * count);
        Ok(())
    }
}
