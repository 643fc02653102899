//! Instruction execution for the Z80.
//!
//! Dispatch is by table group: unprefixed, CB, ED, XY (DD/FD with the
//! index register substituted), and XYCB. Cycle costs are charged at each
//! dispatch site from the matching table, so chained prefixes pay the
//! prefix cost and bump R once per prefix byte while only the last prefix
//! wins the register substitution.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

use crate::flags::{tables, CF, HF, NF, PF, SF, VF, XF, YF, ZF};
use crate::tables::{CC_CB, CC_ED, CC_XY, CC_XYCB};

use super::Z80;

/// Which index register a DD/FD prefix selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Index {
    Ix,
    Iy,
}

impl Z80 {
    // =========================================================================
    // Register selectors
    // =========================================================================

    /// 8-bit register by field value. Index 6 is (HL) and handled by the
    /// caller.
    fn get_r8(&self, i: u8) -> u8 {
        match i {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => self.regs.h,
            5 => self.regs.l,
            _ => self.regs.a,
        }
    }

    fn set_r8(&mut self, i: u8, value: u8) {
        match i {
            0 => self.regs.b = value,
            1 => self.regs.c = value,
            2 => self.regs.d = value,
            3 => self.regs.e = value,
            4 => self.regs.h = value,
            5 => self.regs.l = value,
            _ => self.regs.a = value,
        }
    }

    /// 16-bit register pair by field value (SP variant).
    fn get_rp(&self, i: u8) -> u16 {
        match i {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.regs.hl(),
            _ => self.regs.sp,
        }
    }

    fn set_rp(&mut self, i: u8, value: u16) {
        match i {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.regs.set_hl(value),
            _ => self.regs.sp = value,
        }
    }

    /// Condition by field value: NZ, Z, NC, C, PO, PE, P, M.
    fn cond(&self, i: u8) -> bool {
        let f = self.regs.f;
        match i {
            0 => f & ZF == 0,
            1 => f & ZF != 0,
            2 => f & CF == 0,
            3 => f & CF != 0,
            4 => f & PF == 0,
            5 => f & PF != 0,
            6 => f & SF == 0,
            _ => f & SF != 0,
        }
    }

    const fn idx_get(&self, index: Index) -> u16 {
        match index {
            Index::Ix => self.regs.ix,
            Index::Iy => self.regs.iy,
        }
    }

    const fn idx_set(&mut self, index: Index, value: u16) {
        match index {
            Index::Ix => self.regs.ix = value,
            Index::Iy => self.regs.iy = value,
        }
    }

    /// Indexed effective address: IX/IY + signed displacement. Sets WZ.
    fn idx_ea(&mut self, index: Index) -> u16 {
        let d = self.arg() as i8;
        let ea = self.idx_get(index).wrapping_add(d as u16);
        self.regs.wz = ea;
        self.ea = ea;
        ea
    }

    // =========================================================================
    // Transfer helpers
    // =========================================================================

    fn jp(&mut self) {
        let target = self.arg_16();
        self.regs.pc = target;
        self.regs.wz = target;
    }

    fn jp_cond(&mut self, cond: bool) {
        let target = self.arg_16();
        self.regs.wz = target;
        if cond {
            self.regs.pc = target;
        }
    }

    fn jr(&mut self) {
        let d = self.arg() as i8;
        self.regs.pc = self.regs.pc.wrapping_add(d as u16);
        self.regs.wz = self.regs.pc;
    }

    fn jr_cond(&mut self, cond: bool, opcode: u8) {
        if cond {
            self.jr();
            self.charge_ex(opcode);
        } else {
            self.regs.pc = self.regs.pc.wrapping_add(1);
        }
    }

    fn call(&mut self) {
        let target = self.arg_16();
        self.regs.wz = target;
        self.push_16(self.regs.pc);
        self.regs.pc = target;
    }

    fn call_cond(&mut self, cond: bool, opcode: u8) {
        let target = self.arg_16();
        self.regs.wz = target;
        if cond {
            self.push_16(self.regs.pc);
            self.regs.pc = target;
            self.charge_ex(opcode);
        }
    }

    fn ret(&mut self) {
        self.regs.pc = self.pop_16();
        self.regs.wz = self.regs.pc;
    }

    fn ret_cond(&mut self, cond: bool, opcode: u8) {
        if cond {
            self.ret();
            self.charge_ex(opcode);
        }
    }

    fn rst(&mut self, addr: u16) {
        self.push_16(self.regs.pc);
        self.regs.pc = addr;
        self.regs.wz = addr;
    }

    // =========================================================================
    // Rotate/shift helpers (CB group); flags from the parity table
    // =========================================================================

    fn rlc(&mut self, value: u8) -> u8 {
        let c = if value & 0x80 != 0 { CF } else { 0 };
        let res = value.rotate_left(1);
        self.regs.f = tables().szp[usize::from(res)] | c;
        res
    }

    fn rrc(&mut self, value: u8) -> u8 {
        let c = if value & 0x01 != 0 { CF } else { 0 };
        let res = value.rotate_right(1);
        self.regs.f = tables().szp[usize::from(res)] | c;
        res
    }

    fn rl(&mut self, value: u8) -> u8 {
        let c = if value & 0x80 != 0 { CF } else { 0 };
        let res = (value << 1) | (self.regs.f & CF);
        self.regs.f = tables().szp[usize::from(res)] | c;
        res
    }

    fn rr(&mut self, value: u8) -> u8 {
        let c = if value & 0x01 != 0 { CF } else { 0 };
        let res = (value >> 1) | (self.regs.f << 7);
        self.regs.f = tables().szp[usize::from(res)] | c;
        res
    }

    fn sla(&mut self, value: u8) -> u8 {
        let c = if value & 0x80 != 0 { CF } else { 0 };
        let res = value << 1;
        self.regs.f = tables().szp[usize::from(res)] | c;
        res
    }

    fn sra(&mut self, value: u8) -> u8 {
        let c = if value & 0x01 != 0 { CF } else { 0 };
        let res = (value >> 1) | (value & 0x80);
        self.regs.f = tables().szp[usize::from(res)] | c;
        res
    }

    /// Undocumented SLL: shifts left and sets bit 0.
    fn sll(&mut self, value: u8) -> u8 {
        let c = if value & 0x80 != 0 { CF } else { 0 };
        let res = (value << 1) | 0x01;
        self.regs.f = tables().szp[usize::from(res)] | c;
        res
    }

    fn srl(&mut self, value: u8) -> u8 {
        let c = if value & 0x01 != 0 { CF } else { 0 };
        let res = value >> 1;
        self.regs.f = tables().szp[usize::from(res)] | c;
        res
    }

    fn cb_transform(&mut self, kind: u8, value: u8) -> u8 {
        match kind {
            0 => self.rlc(value),
            1 => self.rrc(value),
            2 => self.rl(value),
            3 => self.rr(value),
            4 => self.sla(value),
            5 => self.sra(value),
            6 => self.sll(value),
            _ => self.srl(value),
        }
    }

    // =========================================================================
    // Misc helpers
    // =========================================================================

    fn daa(&mut self) {
        let a = self.regs.a;
        let f = self.regs.f;
        let mut res = a;
        if f & NF != 0 {
            if f & HF != 0 || a & 0x0F > 9 {
                res = res.wrapping_sub(6);
            }
            if f & CF != 0 || a > 0x99 {
                res = res.wrapping_sub(0x60);
            }
        } else {
            if f & HF != 0 || a & 0x0F > 9 {
                res = res.wrapping_add(6);
            }
            if f & CF != 0 || a > 0x99 {
                res = res.wrapping_add(0x60);
            }
        }
        self.regs.f = (f & (CF | NF))
            | u8::from(a > 0x99)
            | ((a ^ res) & HF)
            | tables().szp[usize::from(res)];
        self.regs.a = res;
    }

    fn neg(&mut self) {
        let value = self.regs.a;
        self.regs.a = 0;
        self.sub_a(value);
    }

    fn rrd(&mut self) {
        let hl = self.regs.hl();
        let n = self.rm(hl);
        self.regs.wz = hl.wrapping_add(1);
        self.wm(hl, (n >> 4) | (self.regs.a << 4));
        self.regs.a = (self.regs.a & 0xF0) | (n & 0x0F);
        self.regs.f = (self.regs.f & CF) | tables().szp[usize::from(self.regs.a)];
    }

    fn rld(&mut self) {
        let hl = self.regs.hl();
        let n = self.rm(hl);
        self.regs.wz = hl.wrapping_add(1);
        self.wm(hl, (n << 4) | (self.regs.a & 0x0F));
        self.regs.a = (self.regs.a & 0xF0) | (n >> 4);
        self.regs.f = (self.regs.f & CF) | tables().szp[usize::from(self.regs.a)];
    }

    fn ex_sp_16(&mut self, value: u16) -> u16 {
        let tmp = self.rm_16(self.regs.sp);
        self.wm_16(self.regs.sp, value);
        self.regs.wz = tmp;
        tmp
    }

    // =========================================================================
    // Block instructions. Each pass is a full instruction; repeats rewind
    // PC by two so interrupts can preempt between passes.
    // =========================================================================

    fn ldi_ldd(&mut self, forward: bool) {
        let hl = self.regs.hl();
        let de = self.regs.de();
        let io = self.rm(hl);
        self.wm(de, io);
        let mut f = self.regs.f & (SF | ZF | CF);
        let n = self.regs.a.wrapping_add(io);
        if n & 0x02 != 0 {
            f |= YF;
        }
        if n & 0x08 != 0 {
            f |= XF;
        }
        let step = if forward { 1u16 } else { 0xFFFF };
        self.regs.set_hl(hl.wrapping_add(step));
        self.regs.set_de(de.wrapping_add(step));
        let bc = self.regs.bc().wrapping_sub(1);
        self.regs.set_bc(bc);
        if bc != 0 {
            f |= VF;
        }
        self.regs.f = f;
    }

    fn cpi_cpd(&mut self, forward: bool) {
        let hl = self.regs.hl();
        let val = self.rm(hl);
        let a = self.regs.a;
        let mut res = a.wrapping_sub(val);
        if forward {
            self.regs.wz = self.regs.wz.wrapping_add(1);
            self.regs.set_hl(hl.wrapping_add(1));
        } else {
            self.regs.wz = self.regs.wz.wrapping_sub(1);
            self.regs.set_hl(hl.wrapping_sub(1));
        }
        let bc = self.regs.bc().wrapping_sub(1);
        self.regs.set_bc(bc);
        let mut f = (self.regs.f & CF)
            | (tables().sz[usize::from(res)] & !(YF | XF))
            | ((a ^ val ^ res) & HF)
            | NF;
        if f & HF != 0 {
            res = res.wrapping_sub(1);
        }
        if res & 0x02 != 0 {
            f |= YF;
        }
        if res & 0x08 != 0 {
            f |= XF;
        }
        if bc != 0 {
            f |= VF;
        }
        self.regs.f = f;
    }

    fn ini_ind(&mut self, forward: bool) {
        let bc = self.regs.bc();
        let io = self.port_read(bc);
        self.regs.wz = if forward { bc.wrapping_add(1) } else { bc.wrapping_sub(1) };
        self.charge_ex(if forward { 0xA2 } else { 0xAA });
        self.regs.b = self.regs.b.wrapping_sub(1);
        let hl = self.regs.hl();
        self.wm(hl, io);
        self.regs.set_hl(if forward { hl.wrapping_add(1) } else { hl.wrapping_sub(1) });
        let c_step = if forward {
            self.regs.c.wrapping_add(1)
        } else {
            self.regs.c.wrapping_sub(1)
        };
        self.in_out_block_flags(io, c_step);
    }

    fn outi_outd(&mut self, forward: bool) {
        let hl = self.regs.hl();
        let io = self.rm(hl);
        self.regs.b = self.regs.b.wrapping_sub(1);
        let bc = self.regs.bc();
        self.regs.wz = if forward { bc.wrapping_add(1) } else { bc.wrapping_sub(1) };
        self.port_write(bc, io);
        self.regs.set_hl(if forward { hl.wrapping_add(1) } else { hl.wrapping_sub(1) });
        let l = self.regs.l;
        self.in_out_block_flags(io, l);
    }

    /// Shared I/O block flags: N from the data sign, H/C from the port
    /// adder overflow, parity from the folded counter.
    fn in_out_block_flags(&mut self, io: u8, adder: u8) {
        let b = self.regs.b;
        let mut f = tables().sz[usize::from(b)];
        if io & SF != 0 {
            f |= NF;
        }
        let t = u16::from(adder) + u16::from(io);
        if t & 0x100 != 0 {
            f |= HF | CF;
        }
        f |= tables().szp[usize::from((t as u8 & 0x07) ^ b)] & PF;
        self.regs.f = f;
    }

    fn block_repeat_bc(&mut self, opcode: u8) {
        if self.regs.bc() != 0 {
            self.regs.pc = self.regs.pc.wrapping_sub(2);
            self.regs.wz = self.regs.pc.wrapping_add(1);
            self.charge_ex(opcode);
        }
    }

    fn block_repeat_b(&mut self, opcode: u8) {
        if self.regs.b != 0 {
            self.regs.pc = self.regs.pc.wrapping_sub(2);
            self.charge_ex(opcode);
        }
    }

    // =========================================================================
    // Unprefixed instructions
    // =========================================================================

    pub(crate) fn exec_unprefixed(&mut self, op: u8) {
        match op {
            // NOP
            0x00 => {}

            // LD rr,nn
            0x01 | 0x11 | 0x21 | 0x31 => {
                let value = self.arg_16();
                self.set_rp((op >> 4) & 3, value);
            }

            // LD (BC),A / LD (DE),A
            0x02 | 0x12 => {
                let addr = if op == 0x02 { self.regs.bc() } else { self.regs.de() };
                self.wm(addr, self.regs.a);
                self.regs.wz =
                    (u16::from(self.regs.a) << 8) | (addr.wrapping_add(1) & 0xFF);
            }

            // INC rr / DEC rr
            0x03 | 0x13 | 0x23 | 0x33 => {
                let rp = (op >> 4) & 3;
                let value = self.get_rp(rp).wrapping_add(1);
                self.set_rp(rp, value);
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                let rp = (op >> 4) & 3;
                let value = self.get_rp(rp).wrapping_sub(1);
                self.set_rp(rp, value);
            }

            // INC r / DEC r / LD r,n (r != (HL))
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x3C => {
                let r = (op >> 3) & 7;
                let res = self.inc_8(self.get_r8(r));
                self.set_r8(r, res);
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x3D => {
                let r = (op >> 3) & 7;
                let res = self.dec_8(self.get_r8(r));
                self.set_r8(r, res);
            }
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x3E => {
                let value = self.arg();
                self.set_r8((op >> 3) & 7, value);
            }

            // INC/DEC/LD (HL)
            0x34 => {
                let hl = self.regs.hl();
                let res = self.inc_8(self.rm(hl));
                self.wm(hl, res);
            }
            0x35 => {
                let hl = self.regs.hl();
                let res = self.dec_8(self.rm(hl));
                self.wm(hl, res);
            }
            0x36 => {
                let value = self.arg();
                self.wm(self.regs.hl(), value);
            }

            // Accumulator rotates
            0x07 => {
                self.regs.a = self.regs.a.rotate_left(1);
                self.regs.f = (self.regs.f & (SF | ZF | PF))
                    | (self.regs.a & (YF | XF | CF));
            }
            0x0F => {
                self.regs.f = (self.regs.f & (SF | ZF | PF)) | (self.regs.a & CF);
                self.regs.a = self.regs.a.rotate_right(1);
                self.regs.f |= self.regs.a & (YF | XF);
            }
            0x17 => {
                let res = (self.regs.a << 1) | (self.regs.f & CF);
                let c = if self.regs.a & 0x80 != 0 { CF } else { 0 };
                self.regs.f = (self.regs.f & (SF | ZF | PF)) | c | (res & (YF | XF));
                self.regs.a = res;
            }
            0x1F => {
                let res = (self.regs.a >> 1) | (self.regs.f << 7);
                let c = if self.regs.a & 0x01 != 0 { CF } else { 0 };
                self.regs.f = (self.regs.f & (SF | ZF | PF)) | c | (res & (YF | XF));
                self.regs.a = res;
            }

            // EX AF,AF'
            0x08 => {
                core::mem::swap(&mut self.regs.a, &mut self.regs.a_alt);
                core::mem::swap(&mut self.regs.f, &mut self.regs.f_alt);
            }

            // ADD HL,rr
            0x09 | 0x19 | 0x29 | 0x39 => {
                let src = self.get_rp((op >> 4) & 3);
                let res = self.add_16(self.regs.hl(), src);
                self.regs.set_hl(res);
            }

            // LD A,(BC) / LD A,(DE)
            0x0A | 0x1A => {
                let addr = if op == 0x0A { self.regs.bc() } else { self.regs.de() };
                self.regs.a = self.rm(addr);
                self.regs.wz = addr.wrapping_add(1);
            }

            // DJNZ
            0x10 => {
                self.regs.b = self.regs.b.wrapping_sub(1);
                self.jr_cond(self.regs.b != 0, 0x10);
            }

            // JR / JR cc
            0x18 => self.jr(),
            0x20 => self.jr_cond(self.regs.f & ZF == 0, 0x20),
            0x28 => self.jr_cond(self.regs.f & ZF != 0, 0x28),
            0x30 => self.jr_cond(self.regs.f & CF == 0, 0x30),
            0x38 => self.jr_cond(self.regs.f & CF != 0, 0x38),

            // LD (nn),HL / LD HL,(nn)
            0x22 => {
                let ea = self.arg_16();
                self.wm_16(ea, self.regs.hl());
                self.regs.wz = ea.wrapping_add(1);
            }
            0x2A => {
                let ea = self.arg_16();
                let value = self.rm_16(ea);
                self.regs.set_hl(value);
                self.regs.wz = ea.wrapping_add(1);
            }

            // DAA / CPL / SCF / CCF
            0x27 => self.daa(),
            0x2F => {
                self.regs.a = !self.regs.a;
                self.regs.f = (self.regs.f & (SF | ZF | PF | CF))
                    | HF
                    | NF
                    | (self.regs.a & (YF | XF));
            }
            0x37 => {
                self.regs.f =
                    (self.regs.f & (SF | ZF | PF)) | CF | (self.regs.a & (YF | XF));
            }
            0x3F => {
                self.regs.f = ((self.regs.f & (SF | ZF | PF | CF))
                    | ((self.regs.f & CF) << 4)
                    | (self.regs.a & (YF | XF)))
                    ^ CF;
            }

            // LD (nn),A / LD A,(nn)
            0x32 => {
                let ea = self.arg_16();
                self.wm(ea, self.regs.a);
                self.regs.wz =
                    (u16::from(self.regs.a) << 8) | (ea.wrapping_add(1) & 0xFF);
            }
            0x3A => {
                let ea = self.arg_16();
                self.regs.a = self.rm(ea);
                self.regs.wz = ea.wrapping_add(1);
            }

            // HALT: PC rewinds so the opcode refetches until an interrupt
            0x76 => self.enter_halt(),

            // LD r,r' matrix
            0x40..=0x7F => {
                let dst = (op >> 3) & 7;
                let src = op & 7;
                if src == 6 {
                    let value = self.rm(self.regs.hl());
                    self.set_r8(dst, value);
                } else if dst == 6 {
                    self.wm(self.regs.hl(), self.get_r8(src));
                } else {
                    let value = self.get_r8(src);
                    self.set_r8(dst, value);
                }
            }

            // ALU A,r matrix
            0x80..=0xBF => {
                let src = op & 7;
                let value = if src == 6 {
                    self.rm(self.regs.hl())
                } else {
                    self.get_r8(src)
                };
                self.alu_a((op >> 3) & 7, value);
            }

            // RET cc / RET
            0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => {
                let cond = self.cond((op >> 3) & 7);
                self.ret_cond(cond, op);
            }
            0xC9 => self.ret(),

            // POP / PUSH
            0xC1 | 0xD1 | 0xE1 => {
                let value = self.pop_16();
                self.set_rp((op >> 4) & 3, value);
            }
            0xF1 => {
                let value = self.pop_16();
                self.regs.set_af(value);
            }
            0xC5 | 0xD5 | 0xE5 => {
                let value = self.get_rp((op >> 4) & 3);
                self.push_16(value);
            }
            0xF5 => self.push_16(self.regs.af()),

            // JP / JP cc
            0xC3 => self.jp(),
            0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => {
                let cond = self.cond((op >> 3) & 7);
                self.jp_cond(cond);
            }
            0xE9 => self.regs.pc = self.regs.hl(),

            // CALL / CALL cc
            0xCD => self.call(),
            0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => {
                let cond = self.cond((op >> 3) & 7);
                self.call_cond(cond, op);
            }

            // ALU A,n
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let value = self.arg();
                self.alu_a((op >> 3) & 7, value);
            }

            // RST n
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                self.rst(u16::from(op & 0x38));
            }

            // OUT (n),A / IN A,(n): A rides the high address byte
            0xD3 => {
                let port = u16::from(self.arg()) | (u16::from(self.regs.a) << 8);
                self.port_write(port, self.regs.a);
                self.regs.wz = (u16::from(self.regs.a) << 8)
                    | ((port.wrapping_add(1)) & 0xFF);
            }
            0xDB => {
                let port = u16::from(self.arg()) | (u16::from(self.regs.a) << 8);
                self.regs.a = self.port_read(port);
                self.regs.wz = port.wrapping_add(1);
            }

            // EXX / EX DE,HL / EX (SP),HL
            0xD9 => {
                core::mem::swap(&mut self.regs.b, &mut self.regs.b_alt);
                core::mem::swap(&mut self.regs.c, &mut self.regs.c_alt);
                core::mem::swap(&mut self.regs.d, &mut self.regs.d_alt);
                core::mem::swap(&mut self.regs.e, &mut self.regs.e_alt);
                core::mem::swap(&mut self.regs.h, &mut self.regs.h_alt);
                core::mem::swap(&mut self.regs.l, &mut self.regs.l_alt);
            }
            0xEB => {
                let de = self.regs.de();
                let hl = self.regs.hl();
                self.regs.set_de(hl);
                self.regs.set_hl(de);
            }
            0xE3 => {
                let hl = self.regs.hl();
                let tmp = self.ex_sp_16(hl);
                self.regs.set_hl(tmp);
            }

            // LD SP,HL
            0xF9 => self.regs.sp = self.regs.hl(),

            // DI / EI
            0xF3 => {
                self.regs.iff1 = false;
                self.regs.iff2 = false;
            }
            0xFB => {
                self.regs.iff1 = true;
                self.regs.iff2 = true;
                self.after_ei = true;
            }

            // Prefixes
            0xCB => {
                self.r_inc();
                let next = self.rop();
                self.charge(CC_CB[usize::from(next)]);
                self.exec_cb(next);
            }
            0xED => {
                self.r_inc();
                let next = self.rop();
                self.charge(CC_ED[usize::from(next)]);
                self.exec_ed(next);
            }
            0xDD => self.exec_index(Index::Ix),
            0xFD => self.exec_index(Index::Iy),
        }
    }

    /// ALU operation on A by field value.
    fn alu_a(&mut self, kind: u8, value: u8) {
        match kind {
            0 => self.add_a(value),
            1 => self.adc_a(value),
            2 => self.sub_a(value),
            3 => self.sbc_a(value),
            4 => self.and_a(value),
            5 => self.xor_a(value),
            6 => self.or_a(value),
            _ => self.cp_a(value),
        }
    }

    // =========================================================================
    // CB-prefixed instructions
    // =========================================================================

    fn exec_cb(&mut self, op: u8) {
        let reg = op & 7;
        let bit = (op >> 3) & 7;

        match op >> 6 {
            // Rotates and shifts
            0 => {
                if reg == 6 {
                    let hl = self.regs.hl();
                    let value = self.rm(hl);
                    let res = self.cb_transform(bit, value);
                    self.wm(hl, res);
                } else {
                    let value = self.get_r8(reg);
                    let res = self.cb_transform(bit, value);
                    self.set_r8(reg, res);
                }
            }
            // BIT b,r / BIT b,(HL)
            1 => {
                if reg == 6 {
                    let value = self.rm(self.regs.hl());
                    self.regs.f = (self.regs.f & CF)
                        | HF
                        | (tables().sz_bit[usize::from(value & (1 << bit))] & !(YF | XF))
                        | ((self.regs.wz >> 8) as u8 & (YF | XF));
                } else {
                    let value = self.get_r8(reg);
                    self.regs.f = (self.regs.f & CF)
                        | HF
                        | (tables().sz_bit[usize::from(value & (1 << bit))] & !(YF | XF))
                        | (value & (YF | XF));
                }
            }
            // RES b,r
            2 => {
                if reg == 6 {
                    let hl = self.regs.hl();
                    let value = self.rm(hl) & !(1 << bit);
                    self.wm(hl, value);
                } else {
                    let value = self.get_r8(reg) & !(1 << bit);
                    self.set_r8(reg, value);
                }
            }
            // SET b,r
            _ => {
                if reg == 6 {
                    let hl = self.regs.hl();
                    let value = self.rm(hl) | (1 << bit);
                    self.wm(hl, value);
                } else {
                    let value = self.get_r8(reg) | (1 << bit);
                    self.set_r8(reg, value);
                }
            }
        }
    }

    // =========================================================================
    // ED-prefixed instructions
    // =========================================================================

    fn exec_ed(&mut self, op: u8) {
        match op {
            // IN r,(C)
            0x40 | 0x48 | 0x50 | 0x58 | 0x60 | 0x68 | 0x78 => {
                let value = self.port_read(self.regs.bc());
                self.regs.f = (self.regs.f & CF) | tables().szp[usize::from(value)];
                self.set_r8((op >> 3) & 7, value);
                if op == 0x78 {
                    self.regs.wz = self.regs.bc().wrapping_add(1);
                }
            }
            // IN (C): flags only
            0x70 => {
                let value = self.port_read(self.regs.bc());
                self.regs.f = (self.regs.f & CF) | tables().szp[usize::from(value)];
            }
            // OUT (C),r
            0x41 | 0x49 | 0x51 | 0x59 | 0x61 | 0x69 | 0x79 => {
                self.port_write(self.regs.bc(), self.get_r8((op >> 3) & 7));
                if op == 0x79 {
                    self.regs.wz = self.regs.bc().wrapping_add(1);
                }
            }
            // OUT (C),0
            0x71 => self.port_write(self.regs.bc(), 0),

            // SBC/ADC HL,rr
            0x42 | 0x52 | 0x62 | 0x72 => {
                let src = self.get_rp((op >> 4) & 3);
                self.sbc_16(src);
            }
            0x4A | 0x5A | 0x6A | 0x7A => {
                let src = self.get_rp((op >> 4) & 3);
                self.adc_16(src);
            }

            // LD (nn),rr / LD rr,(nn)
            0x43 | 0x53 | 0x63 | 0x73 => {
                let ea = self.arg_16();
                self.wm_16(ea, self.get_rp((op >> 4) & 3));
                self.regs.wz = ea.wrapping_add(1);
            }
            0x4B | 0x5B | 0x6B | 0x7B => {
                let ea = self.arg_16();
                let value = self.rm_16(ea);
                self.set_rp((op >> 4) & 3, value);
                self.regs.wz = ea.wrapping_add(1);
            }

            // NEG (all mirrors)
            0x44 | 0x4C | 0x54 | 0x5C | 0x64 | 0x6C | 0x74 | 0x7C => self.neg(),

            // RETN/RETI: IFF1 restored from IFF2
            0x45 | 0x55 | 0x65 | 0x75 | 0x4D | 0x5D | 0x6D | 0x7D => {
                self.ret();
                self.regs.iff1 = self.regs.iff2;
            }

            // IM 0/1/2
            0x46 | 0x4E | 0x66 | 0x6E => self.regs.im = 0,
            0x56 | 0x76 => self.regs.im = 1,
            0x5E | 0x7E => self.regs.im = 2,

            // Interrupt/refresh register moves
            0x47 => self.regs.i = self.regs.a,
            0x4F => self.regs.set_r(self.regs.a),
            // LD A,I and LD A,R expose IFF2 through P/V
            0x57 => {
                self.regs.a = self.regs.i;
                self.regs.f = (self.regs.f & CF)
                    | tables().sz[usize::from(self.regs.a)]
                    | (u8::from(self.regs.iff2) << 2);
            }
            0x5F => {
                self.regs.a = self.regs.r_value();
                self.regs.f = (self.regs.f & CF)
                    | tables().sz[usize::from(self.regs.a)]
                    | (u8::from(self.regs.iff2) << 2);
            }

            // RRD/RLD
            0x67 => self.rrd(),
            0x6F => self.rld(),

            // Block transfers, compares, and I/O
            0xA0 => self.ldi_ldd(true),
            0xA8 => self.ldi_ldd(false),
            0xA1 => self.cpi_cpd(true),
            0xA9 => self.cpi_cpd(false),
            0xA2 => self.ini_ind(true),
            0xAA => self.ini_ind(false),
            0xA3 => self.outi_outd(true),
            0xAB => self.outi_outd(false),
            0xB0 => {
                self.ldi_ldd(true);
                self.block_repeat_bc(0xB0);
            }
            0xB8 => {
                self.ldi_ldd(false);
                self.block_repeat_bc(0xB8);
            }
            0xB1 => {
                self.cpi_cpd(true);
                if self.regs.bc() != 0 && self.regs.f & ZF == 0 {
                    self.regs.pc = self.regs.pc.wrapping_sub(2);
                    self.regs.wz = self.regs.pc.wrapping_add(1);
                    self.charge_ex(0xB1);
                }
            }
            0xB9 => {
                self.cpi_cpd(false);
                if self.regs.bc() != 0 && self.regs.f & ZF == 0 {
                    self.regs.pc = self.regs.pc.wrapping_sub(2);
                    self.regs.wz = self.regs.pc.wrapping_add(1);
                    self.charge_ex(0xB9);
                }
            }
            0xB2 => {
                self.ini_ind(true);
                self.block_repeat_b(0xB2);
            }
            0xBA => {
                self.ini_ind(false);
                self.block_repeat_b(0xBA);
            }
            0xB3 => {
                self.outi_outd(true);
                self.block_repeat_b(0xB3);
            }
            0xBB => {
                self.outi_outd(false);
                self.block_repeat_b(0xBB);
            }

            // Everything else is a two-byte NOP
            _ => self.log_illegal(0xED, op),
        }
    }

    // =========================================================================
    // DD/FD-prefixed instructions
    // =========================================================================

    /// Prefix chain entry: charges the prefix cost and bumps R once per
    /// prefix byte; the last prefix selects the index register.
    fn exec_index(&mut self, index: Index) {
        let mut index = index;
        loop {
            self.r_inc();
            let op = self.rop();
            self.charge(CC_XY[usize::from(op)]);
            match op {
                0xDD => index = Index::Ix,
                0xFD => index = Index::Iy,
                _ => {
                    self.exec_xy(index, op);
                    return;
                }
            }
        }
    }

    fn exec_xy(&mut self, index: Index, op: u8) {
        match op {
            // ADD idx,rr (29 is ADD idx,idx)
            0x09 => {
                let res = self.add_16(self.idx_get(index), self.regs.bc());
                self.idx_set(index, res);
            }
            0x19 => {
                let res = self.add_16(self.idx_get(index), self.regs.de());
                self.idx_set(index, res);
            }
            0x29 => {
                let v = self.idx_get(index);
                let res = self.add_16(v, v);
                self.idx_set(index, res);
            }
            0x39 => {
                let res = self.add_16(self.idx_get(index), self.regs.sp);
                self.idx_set(index, res);
            }

            // LD idx,nn / LD (nn),idx / LD idx,(nn) / INC/DEC idx
            0x21 => {
                let value = self.arg_16();
                self.idx_set(index, value);
            }
            0x22 => {
                let ea = self.arg_16();
                self.wm_16(ea, self.idx_get(index));
                self.regs.wz = ea.wrapping_add(1);
            }
            0x2A => {
                let ea = self.arg_16();
                let value = self.rm_16(ea);
                self.idx_set(index, value);
                self.regs.wz = ea.wrapping_add(1);
            }
            0x23 => {
                let value = self.idx_get(index).wrapping_add(1);
                self.idx_set(index, value);
            }
            0x2B => {
                let value = self.idx_get(index).wrapping_sub(1);
                self.idx_set(index, value);
            }

            // INC/DEC/LD idxH and idxL
            0x24 | 0x25 | 0x26 | 0x2C | 0x2D | 0x2E => {
                let high = op & 0x08 == 0;
                let word = self.idx_get(index);
                let byte = if high { (word >> 8) as u8 } else { word as u8 };
                let res = match op & 7 {
                    4 => self.inc_8(byte),
                    5 => self.dec_8(byte),
                    _ => self.arg(),
                };
                let word = if high {
                    (word & 0x00FF) | (u16::from(res) << 8)
                } else {
                    (word & 0xFF00) | u16::from(res)
                };
                self.idx_set(index, word);
            }

            // INC/DEC/LD (idx+d)
            0x34 => {
                let ea = self.idx_ea(index);
                let res = self.inc_8(self.rm(ea));
                self.wm(ea, res);
            }
            0x35 => {
                let ea = self.idx_ea(index);
                let res = self.dec_8(self.rm(ea));
                self.wm(ea, res);
            }
            0x36 => {
                let ea = self.idx_ea(index);
                let value = self.arg();
                self.wm(ea, value);
            }

            // LD matrix with idxH/idxL substitution; forms touching
            // (idx+d) pair with the *unprefixed* H and L
            0x40..=0x7F if op != 0x76 => {
                let dst = (op >> 3) & 7;
                let src = op & 7;
                if src == 6 {
                    let ea = self.idx_ea(index);
                    let value = self.rm(ea);
                    self.set_r8(dst, value);
                } else if dst == 6 {
                    let ea = self.idx_ea(index);
                    let value = self.get_r8(src);
                    self.wm(ea, value);
                } else {
                    let value = self.get_xy_r8(index, src);
                    self.set_xy_r8(index, dst, value);
                }
            }

            // ALU matrix with idxH/idxL/(idx+d)
            0x80..=0xBF => {
                let src = op & 7;
                let value = if src == 6 {
                    let ea = self.idx_ea(index);
                    self.rm(ea)
                } else {
                    self.get_xy_r8(index, src)
                };
                self.alu_a((op >> 3) & 7, value);
            }

            // POP/PUSH/EX (SP)/JP/LD SP
            0xE1 => {
                let value = self.pop_16();
                self.idx_set(index, value);
            }
            0xE5 => self.push_16(self.idx_get(index)),
            0xE3 => {
                let tmp = self.ex_sp_16(self.idx_get(index));
                self.idx_set(index, tmp);
            }
            0xE9 => self.regs.pc = self.idx_get(index),
            0xF9 => self.regs.sp = self.idx_get(index),

            // DD CB d xx: displacement precedes the final opcode
            0xCB => {
                self.idx_ea(index);
                let next = self.arg();
                self.charge(CC_XYCB[usize::from(next)]);
                self.exec_xycb(next);
            }

            // The prefix does not affect anything else: execute the
            // unprefixed form (prefix cost and R bump already paid)
            _ => {
                self.log_illegal(if index == Index::Ix { 0xDD } else { 0xFD }, op);
                self.exec_unprefixed(op);
            }
        }
    }

    /// 8-bit register with H/L replaced by the index halves.
    fn get_xy_r8(&self, index: Index, i: u8) -> u8 {
        match i {
            4 => (self.idx_get(index) >> 8) as u8,
            5 => self.idx_get(index) as u8,
            _ => self.get_r8(i),
        }
    }

    fn set_xy_r8(&mut self, index: Index, i: u8, value: u8) {
        match i {
            4 => {
                let word = (self.idx_get(index) & 0x00FF) | (u16::from(value) << 8);
                self.idx_set(index, word);
            }
            5 => {
                let word = (self.idx_get(index) & 0xFF00) | u16::from(value);
                self.idx_set(index, word);
            }
            _ => self.set_r8(i, value),
        }
    }

    // =========================================================================
    // DD/FD CB instructions (operate on the precomputed EA; results also
    // land in a register for the undocumented non-(HL) encodings)
    // =========================================================================

    fn exec_xycb(&mut self, op: u8) {
        let reg = op & 7;
        let bit = (op >> 3) & 7;
        let ea = self.ea;

        match op >> 6 {
            0 => {
                let value = self.rm(ea);
                let res = self.cb_transform(bit, value);
                self.wm(ea, res);
                if reg != 6 {
                    self.set_r8(reg, res);
                }
            }
            1 => {
                let value = self.rm(ea);
                self.regs.f = (self.regs.f & CF)
                    | HF
                    | (tables().sz_bit[usize::from(value & (1 << bit))] & !(YF | XF))
                    | ((ea >> 8) as u8 & (YF | XF));
            }
            2 => {
                let res = self.rm(ea) & !(1 << bit);
                self.wm(ea, res);
                if reg != 6 {
                    self.set_r8(reg, res);
                }
            }
            _ => {
                let res = self.rm(ea) | (1 << bit);
                self.wm(ea, res);
                if reg != 6 {
                    self.set_r8(reg, res);
                }
            }
        }
    }
}
