//! Arithmetic families: ADD/SUB/CMP and friends, ADDQ/SUBQ/Scc/DBcc,
//! multiply/divide, and the BCD trio.

use crate::alu::Size;
use crate::cpu::{Cpu68000, Exec, STOP_LEVEL_STOP};
use crate::ea::AddrMode;
use crate::flags::{Status, C, N, V, X, Z};
use crate::timing::{ea_time, EX_CHK, EX_ZERO_DIVIDE};

impl Cpu68000 {
    /// Groups 0x9 (SUB) and 0xD (ADD): `xxxx RRR OOO MMMRRR`.
    pub(crate) fn exec_add_sub(&mut self, op: u16, adding: bool) -> Exec {
        let reg = ((op >> 9) & 7) as u8;
        let opmode = (op >> 6) & 7;
        let mode = ((op >> 3) & 7) as u8;
        let ea_reg = (op & 7) as u8;

        match opmode {
            // <ea> op Dn
            0 | 1 | 2 => {
                let size = Size::from_bits(opmode).unwrap_or(Size::Byte);
                let Some(ea) = AddrMode::decode(mode, ea_reg) else {
                    return self.illegal();
                };
                if size == Size::Byte && matches!(ea, AddrMode::AddrReg(_)) {
                    return self.illegal();
                }
                let src = self.fetch_ea(ea, size)?;
                let dst = self.read_data_reg(reg, size);
                let res = if adding {
                    self.alu_add(src, dst, size, false, false)
                } else {
                    self.alu_sub(src, dst, size, false, false)
                };
                self.write_data_reg(reg, res, size);
                let base = match size {
                    Size::Long if !ea.is_memory() => 8,
                    Size::Long => 6,
                    _ => 4,
                };
                self.use_cycles(base + ea_time(ea, size));
                Ok(())
            }
            // ADDA.W / SUBA.W
            3 => self.exec_adda_suba(op, Size::Word, adding),
            // Dn op <ea>, or ADDX/SUBX
            4 | 5 | 6 => {
                let size = Size::from_bits(opmode - 4).unwrap_or(Size::Byte);
                match mode {
                    // ADDX/SUBX Dy,Dx
                    0 => self.exec_addx_subx_reg(reg, ea_reg, size, adding),
                    // ADDX/SUBX -(Ay),-(Ax)
                    1 => self.exec_addx_subx_mem(reg, ea_reg, size, adding),
                    _ => {
                        let Some(ea) = AddrMode::decode(mode, ea_reg) else {
                            return self.illegal();
                        };
                        if !ea.is_data_alterable() || ea == AddrMode::Immediate {
                            return self.illegal();
                        }
                        let loc = self.resolve_ea(ea, size)?;
                        let dst = self.operand_read(loc, size)?;
                        let src = self.read_data_reg(reg, size);
                        let res = if adding {
                            self.alu_add(src, dst, size, false, false)
                        } else {
                            self.alu_sub(src, dst, size, false, false)
                        };
                        self.operand_write(loc, res, size)?;
                        let base = if size == Size::Long { 12 } else { 8 };
                        self.use_cycles(base + ea_time(ea, size));
                        Ok(())
                    }
                }
            }
            // ADDA.L / SUBA.L
            _ => self.exec_adda_suba(op, Size::Long, adding),
        }
    }

    fn exec_adda_suba(&mut self, op: u16, size: Size, adding: bool) -> Exec {
        let reg = ((op >> 9) & 7) as usize;
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        let src = size.sign_extend(self.fetch_ea(ea, size)?);
        let dst = self.regs.a(reg);
        // Address arithmetic is always full-width and touches no flags
        self.regs.set_a(reg, dst.wrapping_add(if adding { src } else { src.wrapping_neg() }));
        let base = match size {
            Size::Long if ea.is_memory() => 6,
            _ => 8,
        };
        self.use_cycles(base + ea_time(ea, size));
        Ok(())
    }

    fn exec_addx_subx_reg(&mut self, rx: u8, ry: u8, size: Size, adding: bool) -> Exec {
        let src = self.read_data_reg(ry, size);
        let dst = self.read_data_reg(rx, size);
        let res = if adding {
            self.alu_add(src, dst, size, true, true)
        } else {
            self.alu_sub(src, dst, size, true, true)
        };
        self.write_data_reg(rx, res, size);
        self.use_cycles(if size == Size::Long { 8 } else { 4 });
        Ok(())
    }

    fn exec_addx_subx_mem(&mut self, rx: u8, ry: u8, size: Size, adding: bool) -> Exec {
        let src_loc = self.resolve_ea(AddrMode::AddrIndPreDec(ry), size)?;
        let src = self.operand_read(src_loc, size)?;
        let dst_loc = self.resolve_ea(AddrMode::AddrIndPreDec(rx), size)?;
        let dst = self.operand_read(dst_loc, size)?;
        let res = if adding {
            self.alu_add(src, dst, size, true, true)
        } else {
            self.alu_sub(src, dst, size, true, true)
        };
        self.operand_write(dst_loc, res, size)?;
        self.use_cycles(if size == Size::Long { 30 } else { 18 });
        Ok(())
    }

    /// Group 0xB: CMP, CMPA, CMPM, EOR.
    pub(crate) fn exec_cmp_eor(&mut self, op: u16) -> Exec {
        let reg = ((op >> 9) & 7) as u8;
        let opmode = (op >> 6) & 7;
        let mode = ((op >> 3) & 7) as u8;
        let ea_reg = (op & 7) as u8;

        match opmode {
            // CMP <ea>,Dn
            0 | 1 | 2 => {
                let size = Size::from_bits(opmode).unwrap_or(Size::Byte);
                let Some(ea) = AddrMode::decode(mode, ea_reg) else {
                    return self.illegal();
                };
                if size == Size::Byte && matches!(ea, AddrMode::AddrReg(_)) {
                    return self.illegal();
                }
                let src = self.fetch_ea(ea, size)?;
                let dst = self.read_data_reg(reg, size);
                self.alu_cmp(src, dst, size);
                let base = if size == Size::Long { 6 } else { 4 };
                self.use_cycles(base + ea_time(ea, size));
                Ok(())
            }
            // CMPA.W / CMPA.L
            3 | 7 => {
                let size = if opmode == 3 { Size::Word } else { Size::Long };
                let Some(ea) = AddrMode::decode(mode, ea_reg) else {
                    return self.illegal();
                };
                let src = size.sign_extend(self.fetch_ea(ea, size)?);
                let dst = self.regs.a(reg as usize);
                self.alu_cmp(src, dst, Size::Long);
                self.use_cycles(6 + ea_time(ea, size));
                Ok(())
            }
            // EOR Dn,<ea> / CMPM (Ay)+,(Ax)+
            _ => {
                let size = Size::from_bits(opmode - 4).unwrap_or(Size::Byte);
                if mode == 1 {
                    // CMPM (Ay)+,(Ax)+
                    let src_loc = self.resolve_ea(AddrMode::AddrIndPostInc(ea_reg), size)?;
                    let src = self.operand_read(src_loc, size)?;
                    let dst_loc = self.resolve_ea(AddrMode::AddrIndPostInc(reg), size)?;
                    let dst = self.operand_read(dst_loc, size)?;
                    self.alu_cmp(src, dst, size);
                    self.use_cycles(if size == Size::Long { 20 } else { 12 });
                    return Ok(());
                }
                let Some(ea) = AddrMode::decode(mode, ea_reg) else {
                    return self.illegal();
                };
                if !ea.is_data_alterable() || ea == AddrMode::Immediate {
                    return self.illegal();
                }
                let loc = self.resolve_ea(ea, size)?;
                let dst = self.operand_read(loc, size)?;
                let res = (dst ^ self.read_data_reg(reg, size)) & size.mask();
                self.operand_write(loc, res, size)?;
                self.set_flags_move(res, size);
                let base = match (size, ea.is_memory()) {
                    (Size::Long, false) => 8,
                    (Size::Long, true) => 12,
                    (_, false) => 4,
                    (_, true) => 8,
                };
                self.use_cycles(base + ea_time(ea, size));
                Ok(())
            }
        }
    }

    /// Group 0x8: OR, DIVU/DIVS, SBCD.
    pub(crate) fn exec_group8(&mut self, op: u16) -> Exec {
        let opmode = (op >> 6) & 7;
        let mode = ((op >> 3) & 7) as u8;
        match opmode {
            0 | 1 | 2 | 4 | 5 | 6 => {
                if opmode == 4 && mode <= 1 {
                    return self.exec_sbcd(op);
                }
                self.exec_logic_binary(op, |d, s| d | s)
            }
            3 => self.exec_divu(op),
            _ => self.exec_divs(op),
        }
    }

    /// Group 0xC: AND, MULU/MULS, ABCD, EXG.
    pub(crate) fn exec_group_c(&mut self, op: u16) -> Exec {
        let opmode = (op >> 6) & 7;
        let mode = ((op >> 3) & 7) as u8;
        match opmode {
            0 | 1 | 2 => self.exec_logic_binary(op, |d, s| d & s),
            3 => self.exec_mul(op, false),
            4 => {
                if mode <= 1 {
                    self.exec_abcd(op)
                } else {
                    self.exec_logic_binary(op, |d, s| d & s)
                }
            }
            5 => {
                if mode <= 1 {
                    self.exec_exg(op)
                } else {
                    self.exec_logic_binary(op, |d, s| d & s)
                }
            }
            6 => match mode {
                0 => self.illegal(),
                1 => self.exec_exg(op),
                _ => self.exec_logic_binary(op, |d, s| d & s),
            },
            _ => self.exec_mul(op, true),
        }
    }

    fn exec_divu(&mut self, op: u16) -> Exec {
        let reg = ((op >> 9) & 7) as u8;
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        if matches!(ea, AddrMode::AddrReg(_)) {
            return self.illegal();
        }
        let divisor = self.fetch_ea(ea, Size::Word)?;
        self.use_cycles(ea_time(ea, Size::Word));
        if divisor == 0 {
            return self.exception_trap(EX_ZERO_DIVIDE);
        }
        let dividend = self.regs.d[reg as usize];
        let quotient = dividend / divisor;
        let remainder = dividend % divisor;
        self.use_cycles(Self::divu_cycles(dividend, divisor as u16));
        if quotient > 0xFFFF {
            // Overflow leaves the destination intact; N is forced set
            self.regs.sr = (self.regs.sr & !(Z | C)) | N | V;
            return Ok(());
        }
        self.regs.d[reg as usize] = (remainder << 16) | quotient;
        let mut sr = self.regs.sr & !(N | Z | V | C);
        if quotient == 0 {
            sr |= Z;
        }
        if quotient & 0x8000 != 0 {
            sr |= N;
        }
        self.regs.sr = sr;
        Ok(())
    }

    fn exec_divs(&mut self, op: u16) -> Exec {
        let reg = ((op >> 9) & 7) as u8;
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        if matches!(ea, AddrMode::AddrReg(_)) {
            return self.illegal();
        }
        let divisor = self.fetch_ea(ea, Size::Word)? as u16 as i16;
        self.use_cycles(ea_time(ea, Size::Word));
        if divisor == 0 {
            return self.exception_trap(EX_ZERO_DIVIDE);
        }
        let dividend = self.regs.d[reg as usize] as i32;
        self.use_cycles(Self::divs_cycles(dividend, divisor));

        if dividend == i32::MIN && divisor == -1 {
            // Quotient overflow
            self.regs.sr = (self.regs.sr & !(Z | C)) | N | V;
            return Ok(());
        }
        let quotient = dividend / i32::from(divisor);
        let remainder = dividend % i32::from(divisor);
        if quotient > 0x7FFF || quotient < -0x8000 {
            self.regs.sr = (self.regs.sr & !(Z | C)) | N | V;
            return Ok(());
        }
        self.regs.d[reg as usize] = ((remainder as u32) << 16) | (quotient as u32 & 0xFFFF);
        let mut sr = self.regs.sr & !(N | Z | V | C);
        if quotient == 0 {
            sr |= Z;
        }
        if quotient < 0 {
            sr |= N;
        }
        self.regs.sr = sr;
        Ok(())
    }

    fn exec_mul(&mut self, op: u16, signed: bool) -> Exec {
        let reg = ((op >> 9) & 7) as u8;
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        if matches!(ea, AddrMode::AddrReg(_)) {
            return self.illegal();
        }
        let src = self.fetch_ea(ea, Size::Word)?;
        let dst = self.regs.d[reg as usize] & 0xFFFF;
        let res = if signed {
            ((src as u16 as i16 as i32) * (dst as u16 as i16 as i32)) as u32
        } else {
            src * dst
        };
        self.regs.d[reg as usize] = res;
        self.set_flags_move(res, Size::Long);
        let compute = if signed {
            Self::muls_cycles(src as u16)
        } else {
            Self::mulu_cycles(src as u16)
        };
        self.use_cycles(compute + ea_time(ea, Size::Word));
        Ok(())
    }

    fn exec_abcd(&mut self, op: u16) -> Exec {
        let rx = ((op >> 9) & 7) as u8;
        let ry = (op & 7) as u8;
        let mem_form = op & 0x0008 != 0;
        let extend = self.x_flag();

        if mem_form {
            let src_loc = self.resolve_ea(AddrMode::AddrIndPreDec(ry), Size::Byte)?;
            let src = self.operand_read(src_loc, Size::Byte)?;
            let dst_loc = self.resolve_ea(AddrMode::AddrIndPreDec(rx), Size::Byte)?;
            let dst = self.operand_read(dst_loc, Size::Byte)?;
            let (res, carry, overflow) = Self::bcd_add(src as u8, dst as u8, extend);
            self.set_bcd_flags(res, carry, overflow);
            self.operand_write(dst_loc, u32::from(res), Size::Byte)?;
            self.use_cycles(18);
        } else {
            let src = self.read_data_reg(ry, Size::Byte) as u8;
            let dst = self.read_data_reg(rx, Size::Byte) as u8;
            let (res, carry, overflow) = Self::bcd_add(src, dst, extend);
            self.set_bcd_flags(res, carry, overflow);
            self.write_data_reg(rx, u32::from(res), Size::Byte);
            self.use_cycles(6);
        }
        Ok(())
    }

    fn exec_sbcd(&mut self, op: u16) -> Exec {
        let rx = ((op >> 9) & 7) as u8;
        let ry = (op & 7) as u8;
        let mem_form = op & 0x0008 != 0;
        let extend = self.x_flag();

        if mem_form {
            let src_loc = self.resolve_ea(AddrMode::AddrIndPreDec(ry), Size::Byte)?;
            let src = self.operand_read(src_loc, Size::Byte)?;
            let dst_loc = self.resolve_ea(AddrMode::AddrIndPreDec(rx), Size::Byte)?;
            let dst = self.operand_read(dst_loc, Size::Byte)?;
            let (res, borrow, overflow) = Self::bcd_sub(dst as u8, src as u8, extend);
            self.set_bcd_flags(res, borrow, overflow);
            self.operand_write(dst_loc, u32::from(res), Size::Byte)?;
            self.use_cycles(18);
        } else {
            let src = self.read_data_reg(ry, Size::Byte) as u8;
            let dst = self.read_data_reg(rx, Size::Byte) as u8;
            let (res, borrow, overflow) = Self::bcd_sub(dst, src, extend);
            self.set_bcd_flags(res, borrow, overflow);
            self.write_data_reg(rx, u32::from(res), Size::Byte);
            self.use_cycles(6);
        }
        Ok(())
    }

    /// NBCD <ea>: 0 - dst - X in BCD.
    pub(crate) fn exec_nbcd(&mut self, op: u16) -> Exec {
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        if !ea.is_data_alterable() || ea == AddrMode::Immediate {
            return self.illegal();
        }
        let extend = self.x_flag();
        let loc = self.resolve_ea(ea, Size::Byte)?;
        let dst = self.operand_read(loc, Size::Byte)?;
        let (res, borrow, overflow) = Self::bcd_sub(0, dst as u8, extend);
        self.set_bcd_flags(res, borrow, overflow);
        self.operand_write(loc, u32::from(res), Size::Byte)?;
        self.use_cycles(if ea.is_memory() { 8 + ea_time(ea, Size::Byte) } else { 6 });
        Ok(())
    }

    /// BCD flags: X and C from carry, V from bit-7 correction, Z sticky.
    fn set_bcd_flags(&mut self, res: u8, carry: bool, overflow: bool) {
        let mut sr = self.regs.sr & !(N | V | C | X);
        sr = Status::set_if(sr, C | X, carry);
        sr = Status::set_if(sr, V, overflow);
        if res & 0x80 != 0 {
            sr |= N;
        }
        if res != 0 {
            sr &= !Z;
        }
        self.regs.sr = sr;
    }

    fn exec_exg(&mut self, op: u16) -> Exec {
        let rx = ((op >> 9) & 7) as usize;
        let ry = (op & 7) as usize;
        match (op >> 3) & 0x1F {
            // EXG Dx,Dy
            0x08 => self.regs.d.swap(rx, ry),
            // EXG Ax,Ay
            0x09 => {
                let tmp = self.regs.a(rx);
                let other = self.regs.a(ry);
                self.regs.set_a(rx, other);
                self.regs.set_a(ry, tmp);
            }
            // EXG Dx,Ay
            0x11 => {
                let tmp = self.regs.d[rx];
                self.regs.d[rx] = self.regs.a(ry);
                self.regs.set_a(ry, tmp);
            }
            _ => return self.illegal(),
        }
        self.use_cycles(6);
        Ok(())
    }

    /// Group 0x5: ADDQ/SUBQ, Scc, DBcc.
    pub(crate) fn exec_group5(&mut self, op: u16) -> Exec {
        if op & 0x00C0 == 0x00C0 {
            let cc = ((op >> 8) & 0x0F) as u8;
            if op & 0x0038 == 0x0008 {
                return self.exec_dbcc(op, cc);
            }
            return self.exec_scc(op, cc);
        }

        let size = Size::from_bits((op >> 6) & 3).unwrap_or(Size::Byte);
        let data = {
            let q = (op >> 9) & 7;
            if q == 0 { 8 } else { u32::from(q) }
        };
        let subtract = op & 0x0100 != 0;
        let mode = ((op >> 3) & 7) as u8;
        let ea_reg = (op & 7) as u8;

        // ADDQ/SUBQ to An: whole register, no flags, word/long only
        if mode == 1 {
            if size == Size::Byte {
                return self.illegal();
            }
            let a = self.regs.a(ea_reg as usize);
            let res = if subtract { a.wrapping_sub(data) } else { a.wrapping_add(data) };
            self.regs.set_a(ea_reg as usize, res);
            self.use_cycles(8);
            return Ok(());
        }

        let Some(ea) = AddrMode::decode(mode, ea_reg) else {
            return self.illegal();
        };
        if !ea.is_data_alterable() || ea == AddrMode::Immediate {
            return self.illegal();
        }
        let loc = self.resolve_ea(ea, size)?;
        let dst = self.operand_read(loc, size)?;
        let res = if subtract {
            self.alu_sub(data, dst, size, false, false)
        } else {
            self.alu_add(data, dst, size, false, false)
        };
        self.operand_write(loc, res, size)?;
        let base = match (size, ea.is_memory()) {
            (Size::Long, false) => 8,
            (Size::Long, true) => 12,
            (_, false) => 4,
            (_, true) => 8,
        };
        self.use_cycles(base + ea_time(ea, size));
        Ok(())
    }

    fn exec_scc(&mut self, op: u16, cc: u8) -> Exec {
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        if !ea.is_data_alterable() || ea == AddrMode::Immediate {
            return self.illegal();
        }
        let truth = Status::condition(self.regs.sr, cc);
        let value = if truth { 0xFF } else { 0x00 };
        let loc = self.resolve_ea(ea, Size::Byte)?;
        self.operand_write(loc, value, Size::Byte)?;
        let base = if ea.is_memory() {
            8 + ea_time(ea, Size::Byte)
        } else if truth {
            6
        } else {
            4
        };
        self.use_cycles(base);
        Ok(())
    }

    fn exec_dbcc(&mut self, op: u16, cc: u8) -> Exec {
        let reg = (op & 7) as usize;
        let base = self.regs.pc;
        let disp = self.read_imm_16()? as i16;
        if Status::condition(self.regs.sr, cc) {
            self.use_cycles(12);
            return Ok(());
        }
        let counter = (self.regs.d[reg] as u16).wrapping_sub(1);
        self.regs.d[reg] = (self.regs.d[reg] & 0xFFFF_0000) | u32::from(counter);
        if counter == 0xFFFF {
            // Counter expired: fall through
            self.use_cycles(14);
        } else {
            self.jump(base.wrapping_add(disp as u32));
            self.use_cycles(10);
        }
        Ok(())
    }

    /// CHK <ea>,Dn: trap if Dn < 0 or Dn > bound.
    pub(crate) fn exec_chk(&mut self, op: u16) -> Exec {
        let reg = ((op >> 9) & 7) as u8;
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        if matches!(ea, AddrMode::AddrReg(_)) {
            return self.illegal();
        }
        let bound = self.fetch_ea(ea, Size::Word)? as u16 as i16;
        let value = self.regs.d[reg as usize] as u16 as i16;
        self.use_cycles(10 + ea_time(ea, Size::Word));
        if value < 0 {
            self.regs.sr |= N;
            return self.exception_trap(EX_CHK);
        }
        if value > bound {
            self.regs.sr &= !N;
            return self.exception_trap(EX_CHK);
        }
        Ok(())
    }

    /// STOP #imm: load SR, stop until an interrupt above the mask.
    pub(crate) fn exec_stop(&mut self) -> Exec {
        if !self.regs.is_supervisor() {
            return self.exception_privilege_violation();
        }
        let new_sr = self.read_imm_16()?;
        self.use_cycles(4);
        self.stopped |= STOP_LEVEL_STOP;
        self.set_sr(new_sr);
        if self.stopped != 0 {
            self.cycles = self.cycle_end.max(self.cycles);
        }
        Ok(())
    }
}
