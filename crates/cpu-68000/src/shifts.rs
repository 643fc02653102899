//! Shift and rotate family (group 0xE): register forms with immediate or
//! register counts, and the memory form that shifts a word by one.

use crate::alu::Size;
use crate::cpu::{Cpu68000, Exec};
use crate::ea::AddrMode;
use crate::flags::{Status, C, N, V, X, Z};
use crate::timing::ea_time;

/// Shift kind from the type bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShiftKind {
    Arithmetic,
    Logical,
    RotateX,
    Rotate,
}

impl Cpu68000 {
    /// `1110 CCC D SS I TT RRR` register shifts, `1110 0TT D 11 MMMRRR`
    /// memory shifts.
    pub(crate) fn exec_shift_rotate(&mut self, op: u16) -> Exec {
        if op & 0x00C0 == 0x00C0 {
            return self.exec_shift_mem(op);
        }

        let left = op & 0x0100 != 0;
        let size = Size::from_bits((op >> 6) & 3).unwrap_or(Size::Byte);
        let kind = match (op >> 3) & 3 {
            0 => ShiftKind::Arithmetic,
            1 => ShiftKind::Logical,
            2 => ShiftKind::RotateX,
            _ => ShiftKind::Rotate,
        };
        let reg = (op & 7) as u8;

        let count = if op & 0x0020 != 0 {
            self.regs.d[((op >> 9) & 7) as usize] & 63
        } else {
            let q = (op >> 9) & 7;
            if q == 0 { 8 } else { u32::from(q) }
        };

        let value = self.read_data_reg(reg, size);
        let res = self.shift_value(value, count, size, kind, left);
        self.write_data_reg(reg, res, size);

        let base = if size == Size::Long { 8 } else { 6 };
        self.use_cycles(base + 2 * count);
        Ok(())
    }

    /// Memory form: word-sized, shift count of one.
    fn exec_shift_mem(&mut self, op: u16) -> Exec {
        let kind = match (op >> 9) & 7 {
            0 => ShiftKind::Arithmetic,
            1 => ShiftKind::Logical,
            2 => ShiftKind::RotateX,
            3 => ShiftKind::Rotate,
            _ => return self.illegal(),
        };
        let left = op & 0x0100 != 0;
        let Some(ea) = AddrMode::decode(((op >> 3) & 7) as u8, (op & 7) as u8) else {
            return self.illegal();
        };
        if !ea.is_memory() || !ea.is_data_alterable() {
            return self.illegal();
        }
        let loc = self.resolve_ea(ea, Size::Word)?;
        let value = self.operand_read(loc, Size::Word)?;
        let res = self.shift_value(value, 1, Size::Word, kind, left);
        self.operand_write(loc, res, Size::Word)?;
        self.use_cycles(8 + ea_time(ea, Size::Word));
        Ok(())
    }

    /// Perform the shift/rotate and update flags. Handles counts past the
    /// operand width (register counts go up to 63).
    fn shift_value(&mut self, value: u32, count: u32, size: Size, kind: ShiftKind, left: bool) -> u32 {
        let bits = size.bits();
        let mask = size.mask();
        let msb = size.msb();

        if count == 0 {
            // N/Z always refresh; C clears except ROX which copies X
            let mut sr = Status::update_nz(self.regs.sr, value & mask, msb) & !(V | C);
            if kind == ShiftKind::RotateX && sr & X != 0 {
                sr |= C;
            }
            self.regs.sr = sr;
            return value & mask;
        }

        let (res, carry, overflow) = match kind {
            ShiftKind::Arithmetic if left => {
                // V: set when the sign changes at any point of the shift
                let overflow = if count >= bits {
                    value & mask != 0
                } else {
                    // Bits that must all match the original sign
                    let watch = (mask << (bits - 1 - count)) & mask;
                    let field = value & watch;
                    field != 0 && field != watch
                };
                let res = if count >= bits { 0 } else { (value << count) & mask };
                let carry = if count > bits {
                    false
                } else {
                    value >> (bits - count) & 1 != 0
                };
                (res, carry, overflow)
            }
            ShiftKind::Arithmetic => {
                let signed = size.sign_extend(value) as i32;
                let res = if count >= bits {
                    (signed >> 31) as u32 & mask
                } else {
                    (signed >> count) as u32 & mask
                };
                let carry = if count > bits {
                    signed < 0
                } else {
                    signed >> (count - 1) & 1 != 0
                };
                (res, carry, false)
            }
            ShiftKind::Logical if left => {
                let res = if count >= bits { 0 } else { (value << count) & mask };
                let carry = count <= bits && value >> (bits - count) & 1 != 0;
                (res, carry, false)
            }
            ShiftKind::Logical => {
                let res = if count >= bits { 0 } else { (value & mask) >> count };
                let carry = count <= bits && (value >> (count - 1)) & 1 != 0;
                (res, carry, false)
            }
            ShiftKind::RotateX => {
                // Rotate through the X flag: width is bits+1
                let x = u32::from(self.regs.sr & X != 0);
                let width = bits + 1;
                let shift = count % width;
                let wide = u64::from(value & mask) | (u64::from(x) << bits);
                let rotated = if left {
                    (wide << shift | wide >> (width - shift)) & ((1u64 << width) - 1)
                } else {
                    (wide >> shift | wide << (width - shift)) & ((1u64 << width) - 1)
                };
                let res = (rotated as u32) & mask;
                let carry = rotated >> bits & 1 != 0;
                (res, carry, false)
            }
            ShiftKind::Rotate => {
                let shift = count % bits;
                let v = value & mask;
                let res = if shift == 0 {
                    v
                } else if left {
                    (v << shift | v >> (bits - shift)) & mask
                } else {
                    (v >> shift | v << (bits - shift)) & mask
                };
                let carry = if left {
                    res & 1 != 0
                } else {
                    res & msb != 0
                };
                (res, carry, false)
            }
        };

        let mut sr = Status::update_nz(self.regs.sr, res, msb) & !(V | C);
        sr = Status::set_if(sr, V, overflow);
        sr = Status::set_if(sr, C, carry);
        // X follows C for shifts and ROX, but plain rotates leave it alone
        if kind != ShiftKind::Rotate {
            sr = Status::set_if(sr, X, carry);
        }
        self.regs.sr = sr;
        res
    }
}
