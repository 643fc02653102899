//! Logic and single-operand families: AND/OR (shared body), NOT, TST,
//! CLR, NEG/NEGX, EXT, SWAP, TAS, MOVEQ, and the bit operations.

use crate::alu::Size;
use crate::cpu::{Cpu68000, Exec};
use crate::ea::AddrMode;
use crate::flags::{Status, C, N, V, Z};
use crate::timing::ea_time;

impl Cpu68000 {
    /// Shared body for AND and OR: `xxxx RRR OOO MMMRRR` with the
    /// direction encoded in the opmode. Callers peel off the special
    /// mode-0/1 encodings (ABCD/SBCD/EXG) first.
    pub(crate) fn exec_logic_binary(&mut self, op: u16, f: fn(u32, u32) -> u32) -> Exec {
        let reg = ((op >> 9) & 7) as u8;
        let opmode = (op >> 6) & 7;
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        if matches!(ea, AddrMode::AddrReg(_)) {
            return self.illegal();
        }

        if opmode < 3 {
            // <ea> op Dn
            let size = Size::from_bits(opmode).unwrap_or(Size::Byte);
            let src = self.fetch_ea(ea, size)?;
            let dst = self.read_data_reg(reg, size);
            let res = f(dst, src) & size.mask();
            self.write_data_reg(reg, res, size);
            self.set_flags_move(res, size);
            let base = match size {
                Size::Long if !ea.is_memory() => 8,
                Size::Long => 6,
                _ => 4,
            };
            self.use_cycles(base + ea_time(ea, size));
        } else {
            // Dn op <ea>: memory-alterable destinations only
            let size = Size::from_bits(opmode - 4).unwrap_or(Size::Byte);
            if !ea.is_memory() || !ea.is_data_alterable() {
                return self.illegal();
            }
            let loc = self.resolve_ea(ea, size)?;
            let dst = self.operand_read(loc, size)?;
            let res = f(dst, self.read_data_reg(reg, size)) & size.mask();
            self.operand_write(loc, res, size)?;
            self.set_flags_move(res, size);
            let base = if size == Size::Long { 12 } else { 8 };
            self.use_cycles(base + ea_time(ea, size));
        }
        Ok(())
    }

    /// NOT <ea>.
    pub(crate) fn exec_not(&mut self, op: u16, size: Size) -> Exec {
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        if !ea.is_data_alterable() || ea == AddrMode::Immediate {
            return self.illegal();
        }
        let loc = self.resolve_ea(ea, size)?;
        let dst = self.operand_read(loc, size)?;
        let res = !dst & size.mask();
        self.operand_write(loc, res, size)?;
        self.set_flags_move(res, size);
        self.charge_single_operand(ea, size);
        Ok(())
    }

    /// CLR <ea>. The 68000 performs a read cycle before the clearing
    /// write; the read value is discarded.
    pub(crate) fn exec_clr(&mut self, op: u16, size: Size) -> Exec {
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        if !ea.is_data_alterable() || ea == AddrMode::Immediate {
            return self.illegal();
        }
        let loc = self.resolve_ea(ea, size)?;
        let _ = self.operand_read(loc, size)?;
        self.operand_write(loc, 0, size)?;
        self.regs.sr = (self.regs.sr & !(N | V | C)) | Z;
        self.charge_single_operand(ea, size);
        Ok(())
    }

    /// NEG <ea> (0 - dst) or NEGX <ea> (0 - dst - X).
    pub(crate) fn exec_neg(&mut self, op: u16, size: Size, with_x: bool) -> Exec {
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        if !ea.is_data_alterable() || ea == AddrMode::Immediate {
            return self.illegal();
        }
        let loc = self.resolve_ea(ea, size)?;
        let dst = self.operand_read(loc, size)?;
        let res = self.alu_sub(dst, 0, size, with_x, with_x);
        self.operand_write(loc, res, size)?;
        self.charge_single_operand(ea, size);
        Ok(())
    }

    /// TST <ea>.
    pub(crate) fn exec_tst(&mut self, op: u16, size: Size) -> Exec {
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        if !ea.is_data_alterable() || ea == AddrMode::Immediate {
            return self.illegal();
        }
        let value = self.fetch_ea(ea, size)?;
        self.set_flags_move(value, size);
        self.use_cycles(4 + ea_time(ea, size));
        Ok(())
    }

    /// TAS <ea>: read, set NZ (VC cleared), then write back with bit 7
    /// set if the host arbiter permits (open-bus targets deny it).
    pub(crate) fn exec_tas(&mut self, op: u16) -> Exec {
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        if !ea.is_data_alterable() || ea == AddrMode::Immediate {
            return self.illegal();
        }
        let loc = self.resolve_ea(ea, Size::Byte)?;
        let value = self.operand_read(loc, Size::Byte)?;
        self.set_flags_move(value, Size::Byte);
        if self.tas_writeback() {
            self.operand_write(loc, value | 0x80, Size::Byte)?;
        }
        self.use_cycles(if ea.is_memory() { 10 + ea_time(ea, Size::Byte) } else { 4 });
        Ok(())
    }

    /// EXT.W / EXT.L Dn.
    pub(crate) fn exec_ext(&mut self, op: u16, to: Size) -> Exec {
        let reg = (op & 7) as u8;
        let res = match to {
            Size::Word => Size::Byte.sign_extend(self.regs.d[reg as usize]),
            _ => Size::Word.sign_extend(self.regs.d[reg as usize]),
        };
        self.write_data_reg(reg, res, to);
        self.set_flags_move(res, to);
        self.use_cycles(4);
        Ok(())
    }

    /// SWAP Dn.
    pub(crate) fn exec_swap(&mut self, op: u16) -> Exec {
        let reg = (op & 7) as usize;
        let value = self.regs.d[reg];
        let res = value.rotate_left(16);
        self.regs.d[reg] = res;
        self.set_flags_move(res, Size::Long);
        self.use_cycles(4);
        Ok(())
    }

    /// MOVEQ #d8,Dn.
    pub(crate) fn exec_moveq(&mut self, op: u16) -> Exec {
        if op & 0x0100 != 0 {
            return self.illegal();
        }
        let res = op as u8 as i8 as u32;
        self.regs.d[((op >> 9) & 7) as usize] = res;
        self.set_flags_move(res, Size::Long);
        self.use_cycles(4);
        Ok(())
    }

    /// Dynamic bit operations: BTST/BCHG/BCLR/BSET Dn,<ea>.
    pub(crate) fn exec_bitop_dynamic(&mut self, op: u16) -> Exec {
        let bit_reg = ((op >> 9) & 7) as usize;
        let kind = (op >> 6) & 3;
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        let bit = self.regs.d[bit_reg];
        self.exec_bitop(ea, kind, bit, false)
    }

    /// Static bit operations: BTST/BCHG/BCLR/BSET #imm,<ea>.
    pub(crate) fn exec_bitop_static(&mut self, op: u16) -> Exec {
        let kind = (op >> 6) & 3;
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        let bit = self.read_imm_16()?;
        self.exec_bitop(ea, kind, bit, true)
    }

    /// Bit ops address a long in a data register, a byte in memory.
    fn exec_bitop(&mut self, ea: AddrMode, kind: u16, bit: u32, from_imm: bool) -> Exec {
        match ea {
            AddrMode::AddrReg(_) => return self.illegal(),
            // Only dynamic BTST may take an immediate or PC-relative source
            AddrMode::Immediate if from_imm || kind != 0 => return self.illegal(),
            AddrMode::PcDisp | AddrMode::PcIndex if kind != 0 => return self.illegal(),
            _ => {}
        }

        let imm_extra = if from_imm { 4 } else { 0 };

        if ea == AddrMode::Immediate {
            // BTST Dn,#imm
            let value = self.read_imm_16()? & 0xFF;
            let mask = 1u32 << (bit & 7);
            self.regs.sr = Status::set_if(self.regs.sr, Z, value & mask == 0);
            self.use_cycles(6);
            return Ok(());
        }
        if let AddrMode::DataReg(r) = ea {
            let mask = 1u32 << (bit & 31);
            let dst = self.regs.d[r as usize];
            self.regs.sr = Status::set_if(self.regs.sr, Z, dst & mask == 0);
            let res = match kind {
                0 => {
                    self.use_cycles(6 + imm_extra);
                    return Ok(());
                }
                1 => dst ^ mask,
                2 => dst & !mask,
                _ => dst | mask,
            };
            self.regs.d[r as usize] = res;
            self.use_cycles(match kind {
                1 | 3 => 8,
                _ => 10,
            } + imm_extra);
            return Ok(());
        }

        let mask = 1u32 << (bit & 7);
        let loc = self.resolve_ea(ea, Size::Byte)?;
        let dst = self.operand_read(loc, Size::Byte)?;
        self.regs.sr = Status::set_if(self.regs.sr, Z, dst & mask == 0);
        let res = match kind {
            0 => {
                self.use_cycles(4 + imm_extra + ea_time(ea, Size::Byte));
                return Ok(());
            }
            1 => dst ^ mask,
            2 => dst & !mask,
            _ => dst | mask,
        };
        self.operand_write(loc, res, Size::Byte)?;
        self.use_cycles(8 + imm_extra + ea_time(ea, Size::Byte));
        Ok(())
    }

    /// Single-operand RMW timing: reg 4/6, memory 8/12 plus the fetch.
    fn charge_single_operand(&mut self, ea: AddrMode, size: Size) {
        let clocks = match (size, ea.is_memory()) {
            (Size::Long, false) => 6,
            (Size::Long, true) => 12 + ea_time(ea, size),
            (_, false) => 4,
            (_, true) => 8 + ea_time(ea, size),
        };
        self.use_cycles(clocks);
    }
}
