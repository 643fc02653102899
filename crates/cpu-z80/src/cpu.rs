//! The Z80 processor: state, fetch helpers, run loop, interrupts.

mod execute;

use std::fmt;
use std::rc::Rc;

use emu_core::{Observable, Processor, Value};

use crate::flags::{tables, CF, HF, NF, PF, SF, XF, YF, ZF};
use crate::memmap::{ReadHandler, WriteHandler, Z80Memory};
use crate::registers::Registers;
use crate::tables::{CC_EX, CC_OP, Z80_MUL};

/// Serializable processor context. The page tables are reconstructed by
/// the host from the memory topology at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Context {
    pub regs: Registers,
    pub cycles: u32,
    pub cycle_end: u32,
    pub after_ei: bool,
    pub irq_line: bool,
    pub nmi_line: bool,
}

/// Zilog Z80 CPU.
pub struct Z80 {
    pub regs: Registers,
    /// Banked address space (mutate only between `run` calls).
    pub mem: Z80Memory,

    /// Current master-cycle count.
    pub(crate) cycles: u32,
    /// Deadline for the current execution slice.
    pub(crate) cycle_end: u32,

    /// Interrupts are masked for one instruction after EI.
    pub(crate) after_ei: bool,
    /// Maskable interrupt request line.
    pub(crate) irq_line: bool,
    /// Non-maskable interrupt line (edge-triggered).
    pub(crate) nmi_line: bool,

    /// Effective address scratch for the indexed CB forms.
    pub(crate) ea: u16,

    port_in: ReadHandler,
    port_out: WriteHandler,
    irq_callback: Box<dyn FnMut() -> u32>,

    #[cfg(debug_assertions)]
    illegal_trace_count: u32,
}

impl Z80 {
    /// Power-on state: registers cleared, Z flag set.
    #[must_use]
    pub fn new() -> Self {
        // Build the flag tables on first construction
        let _ = tables();
        let regs = Registers {
            f: ZF,
            ..Registers::default()
        };
        Self {
            regs,
            mem: Z80Memory::new(),
            cycles: 0,
            cycle_end: 0,
            after_ei: false,
            irq_line: false,
            nmi_line: false,
            ea: 0,
            port_in: Rc::new(|_| 0xFF),
            port_out: Rc::new(|_, _| {}),
            irq_callback: Box::new(|| 0xFF),
            #[cfg(debug_assertions)]
            illegal_trace_count: 0,
        }
    }

    // === Host configuration ===

    /// Install the I/O port read handler.
    pub fn set_port_in(&mut self, handler: ReadHandler) {
        self.port_in = handler;
    }

    /// Install the I/O port write handler.
    pub fn set_port_out(&mut self, handler: WriteHandler) {
        self.port_out = handler;
    }

    /// Install the interrupt-acknowledge callback. It supplies the bus
    /// value sampled during the acknowledge cycle: an opcode-form value in
    /// IM0 (`CALL`/`JP`/`RST` shapes), the vector low byte in IM2.
    pub fn set_irq_callback(&mut self, callback: impl FnMut() -> u32 + 'static) {
        self.irq_callback = Box::new(callback);
    }

    /// Drive the maskable interrupt line level.
    pub fn set_irq_line(&mut self, asserted: bool) {
        self.irq_line = asserted;
    }

    /// Drive the NMI line. A rising edge is taken immediately: HALT is
    /// left, IFF1 cleared (IFF2 preserved), PC pushed, and execution
    /// resumes at 0x0066.
    pub fn set_nmi_line(&mut self, asserted: bool) {
        if asserted && !self.nmi_line {
            self.leave_halt();
            self.regs.iff1 = false;
            self.push_16(self.regs.pc);
            self.regs.pc = 0x0066;
            self.regs.wz = self.regs.pc;
            self.cycles += 11 * Z80_MUL;
        }
        self.nmi_line = asserted;
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

    /// True while PC sits on a HALT opcode.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.regs.halted
    }

    // === Context save/load ===

    /// Capture the processor context (page tables excluded).
    #[must_use]
    pub fn save_context(&self) -> Context {
        Context {
            regs: self.regs,
            cycles: self.cycles,
            cycle_end: self.cycle_end,
            after_ei: self.after_ei,
            irq_line: self.irq_line,
            nmi_line: self.nmi_line,
        }
    }

    /// Restore a previously captured context.
    pub fn restore_context(&mut self, ctx: &Context) {
        self.regs = ctx.regs;
        self.cycles = ctx.cycles;
        self.cycle_end = ctx.cycle_end;
        self.after_ei = ctx.after_ei;
        self.irq_line = ctx.irq_line;
        self.nmi_line = ctx.nmi_line;
    }

    // === Bus access ===

    #[inline]
    pub(crate) fn rm(&self, addr: u16) -> u8 {
        self.mem.read(addr)
    }

    #[inline]
    pub(crate) fn wm(&self, addr: u16, value: u8) {
        self.mem.write(addr, value);
    }

    pub(crate) fn rm_16(&self, addr: u16) -> u16 {
        u16::from(self.rm(addr)) | (u16::from(self.rm(addr.wrapping_add(1))) << 8)
    }

    pub(crate) fn wm_16(&self, addr: u16, value: u16) {
        self.wm(addr, value as u8);
        self.wm(addr.wrapping_add(1), (value >> 8) as u8);
    }

    pub(crate) fn port_read(&self, port: u16) -> u8 {
        (self.port_in)(port)
    }

    pub(crate) fn port_write(&self, port: u16, value: u8) {
        (self.port_out)(port, value);
    }

    /// Fetch an opcode-position byte (R has already counted it).
    pub(crate) fn rop(&mut self) -> u8 {
        let pc = self.regs.pc;
        self.regs.pc = pc.wrapping_add(1);
        self.rm(pc)
    }

    /// Fetch an argument byte (no R increment).
    pub(crate) fn arg(&mut self) -> u8 {
        let pc = self.regs.pc;
        self.regs.pc = pc.wrapping_add(1);
        self.rm(pc)
    }

    /// Fetch a 16-bit argument, low byte first.
    pub(crate) fn arg_16(&mut self) -> u16 {
        let lo = u16::from(self.arg());
        let hi = u16::from(self.arg());
        lo | (hi << 8)
    }

    pub(crate) fn push_16(&mut self, value: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(2);
        self.wm_16(self.regs.sp, value);
    }

    pub(crate) fn pop_16(&mut self) -> u16 {
        let value = self.rm_16(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(2);
        value
    }

    /// Bump the refresh counter: one per opcode fetch and prefix byte.
    pub(crate) fn r_inc(&mut self) {
        self.regs.r = self.regs.r.wrapping_add(1);
    }

    /// Charge a raw T-state count, scaled to master cycles.
    pub(crate) fn charge(&mut self, tstates: u8) {
        self.cycles += u32::from(tstates) * Z80_MUL;
    }

    /// Extra cycles for taken transfers and block-repeat passes.
    pub(crate) fn charge_ex(&mut self, opcode: u8) {
        self.charge(CC_EX[usize::from(opcode)]);
    }

    pub(crate) fn enter_halt(&mut self) {
        self.regs.pc = self.regs.pc.wrapping_sub(1);
        self.regs.halted = true;
    }

    pub(crate) fn leave_halt(&mut self) {
        if self.regs.halted {
            self.regs.halted = false;
            self.regs.pc = self.regs.pc.wrapping_add(1);
        }
    }

    /// Log an undefined ED opcode in debug builds (bounded); it executes
    /// as a two-byte NOP.
    pub(crate) fn log_illegal(&mut self, prefix: u8, opcode: u8) {
        #[cfg(debug_assertions)]
        {
            if self.illegal_trace_count < 128 {
                eprintln!(
                    "  Z80 ILLEGAL: ${prefix:02X} ${opcode:02X} pc=${:04X}",
                    self.regs.pc.wrapping_sub(2)
                );
                self.illegal_trace_count += 1;
            }
        }
        #[cfg(not(debug_assertions))]
        {
            let _ = (prefix, opcode);
        }
    }

    // === Run loop ===

    /// Reset: PC/I/R/IM/IFFs cleared, HALT released. Other registers keep
    /// their values, as on the real part.
    pub fn reset(&mut self) {
        self.regs.pc = 0;
        self.regs.i = 0;
        self.regs.set_r(0);
        self.regs.im = 0;
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        self.regs.halted = false;
        self.after_ei = false;
        self.regs.wz = self.regs.pc;
    }

    /// Execute until the cycle counter reaches `deadline`.
    ///
    /// IRQs are sampled before each instruction; the sample after an EI is
    /// suppressed so the interrupted return address can be banked first.
    pub fn run(&mut self, deadline: u32) {
        self.cycle_end = deadline;
        while self.cycles < deadline {
            if self.irq_line && self.regs.iff1 && !self.after_ei {
                self.take_interrupt();
                if self.cycles >= deadline {
                    return;
                }
            }
            self.after_ei = false;
            self.r_inc();
            let opcode = self.rop();
            self.charge(CC_OP[usize::from(opcode)]);
            self.exec_unprefixed(opcode);
        }
    }

    /// Accept a maskable interrupt.
    fn take_interrupt(&mut self) {
        self.leave_halt();
        self.regs.iff1 = false;
        self.regs.iff2 = false;

        match self.regs.im {
            1 => {
                // RST 38h plus acknowledge latency
                self.push_16(self.regs.pc);
                self.regs.pc = 0x0038;
                self.charge(CC_OP[0xFF]);
                self.charge_ex(0xFF);
            }
            2 => {
                let byte = (self.irq_callback)() & 0xFF;
                let vector = (u16::from(self.regs.i) << 8) | byte as u16;
                self.push_16(self.regs.pc);
                self.regs.pc = self.rm_16(vector);
                self.charge(CC_OP[0xCD]);
                self.charge_ex(0xFF);
            }
            _ => {
                // IM0: the device drives an opcode onto the bus. CALL and
                // JP carry a 16-bit target; anything else is taken as RST.
                let bus = (self.irq_callback)();
                match bus & 0x00FF_0000 {
                    0x00CD_0000 => {
                        self.push_16(self.regs.pc);
                        self.regs.pc = (bus & 0xFFFF) as u16;
                        self.charge(CC_OP[0xCD]);
                    }
                    0x00C3_0000 => {
                        self.regs.pc = (bus & 0xFFFF) as u16;
                        self.charge(CC_OP[0xC3]);
                    }
                    _ => {
                        self.push_16(self.regs.pc);
                        self.regs.pc = (bus & 0x38) as u16;
                        self.charge(CC_OP[0xFF]);
                    }
                }
                self.charge_ex(0xFF);
            }
        }
        self.regs.wz = self.regs.pc;
    }

    // === Shared ALU helpers (flag tables) ===

    pub(crate) fn add_a(&mut self, value: u8) {
        let a = self.regs.a;
        let res = a.wrapping_add(value);
        self.regs.f = tables().add[usize::from(a) << 8 | usize::from(res)];
        self.regs.a = res;
    }

    pub(crate) fn adc_a(&mut self, value: u8) {
        let a = self.regs.a;
        let c = self.regs.f & CF;
        let res = a.wrapping_add(value).wrapping_add(c);
        self.regs.f =
            tables().add[usize::from(c) << 16 | usize::from(a) << 8 | usize::from(res)];
        self.regs.a = res;
    }

    pub(crate) fn sub_a(&mut self, value: u8) {
        let a = self.regs.a;
        let res = a.wrapping_sub(value);
        self.regs.f = tables().sub[usize::from(a) << 8 | usize::from(res)];
        self.regs.a = res;
    }

    pub(crate) fn sbc_a(&mut self, value: u8) {
        let a = self.regs.a;
        let c = self.regs.f & CF;
        let res = a.wrapping_sub(value).wrapping_sub(c);
        self.regs.f =
            tables().sub[usize::from(c) << 16 | usize::from(a) << 8 | usize::from(res)];
        self.regs.a = res;
    }

    pub(crate) fn and_a(&mut self, value: u8) {
        self.regs.a &= value;
        self.regs.f = tables().szp[usize::from(self.regs.a)] | HF;
    }

    pub(crate) fn or_a(&mut self, value: u8) {
        self.regs.a |= value;
        self.regs.f = tables().szp[usize::from(self.regs.a)];
    }

    pub(crate) fn xor_a(&mut self, value: u8) {
        self.regs.a ^= value;
        self.regs.f = tables().szp[usize::from(self.regs.a)];
    }

    /// CP takes the undocumented X/Y bits from the operand, not the result.
    pub(crate) fn cp_a(&mut self, value: u8) {
        let a = self.regs.a;
        let res = a.wrapping_sub(value);
        let f = tables().sub[usize::from(a) << 8 | usize::from(res)];
        self.regs.f = (f & !(YF | XF)) | (value & (YF | XF));
    }

    pub(crate) fn inc_8(&mut self, value: u8) -> u8 {
        let res = value.wrapping_add(1);
        self.regs.f = (self.regs.f & CF) | tables().szhv_inc[usize::from(res)];
        res
    }

    pub(crate) fn dec_8(&mut self, value: u8) -> u8 {
        let res = value.wrapping_sub(1);
        self.regs.f = (self.regs.f & CF) | tables().szhv_dec[usize::from(res)];
        res
    }

    /// ADD rr,rr: H from bit 11, C from bit 15, X/Y from the high byte.
    pub(crate) fn add_16(&mut self, dst: u16, src: u16) -> u16 {
        let res = u32::from(dst) + u32::from(src);
        self.regs.wz = dst.wrapping_add(1);
        self.regs.f = (self.regs.f & (SF | ZF | PF))
            | ((((u32::from(dst) ^ res ^ u32::from(src)) >> 8) & u32::from(HF)) as u8)
            | (((res >> 16) & u32::from(CF)) as u8)
            | (((res >> 8) as u8) & (YF | XF));
        res as u16
    }

    pub(crate) fn adc_16(&mut self, src: u16) {
        let hl = self.regs.hl();
        let c = u32::from(self.regs.f & CF);
        let res = u32::from(hl) + u32::from(src) + c;
        self.regs.wz = hl.wrapping_add(1);
        let mut f = (((u32::from(hl) ^ res ^ u32::from(src)) >> 8) as u8) & HF;
        f |= ((res >> 16) as u8) & CF;
        f |= ((res >> 8) as u8) & (SF | YF | XF);
        if res & 0xFFFF == 0 {
            f |= ZF;
        }
        f |= ((((u32::from(src) ^ u32::from(hl) ^ 0x8000) & (u32::from(src) ^ res)) >> 13) as u8)
            & crate::flags::VF;
        self.regs.f = f;
        self.regs.set_hl(res as u16);
    }

    pub(crate) fn sbc_16(&mut self, src: u16) {
        let hl = self.regs.hl();
        let c = u32::from(self.regs.f & CF);
        let res = u32::from(hl).wrapping_sub(u32::from(src)).wrapping_sub(c);
        self.regs.wz = hl.wrapping_add(1);
        let mut f = ((((u32::from(hl) ^ res ^ u32::from(src)) >> 8) as u8) & HF) | NF;
        f |= ((res >> 16) as u8) & CF;
        f |= ((res >> 8) as u8) & (SF | YF | XF);
        if res & 0xFFFF == 0 {
            f |= ZF;
        }
        f |= ((((u32::from(src) ^ u32::from(hl)) & (u32::from(hl) ^ res)) >> 13) as u8)
            & crate::flags::VF;
        self.regs.f = f;
        self.regs.set_hl(res as u16);
    }
}

impl Default for Z80 {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Z80 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Z80")
            .field("regs", &self.regs)
            .field("cycles", &self.cycles)
            .field("cycle_end", &self.cycle_end)
            .field("after_ei", &self.after_ei)
            .field("irq_line", &self.irq_line)
            .finish_non_exhaustive()
    }
}

impl Processor for Z80 {
    fn reset(&mut self) {
        Z80::reset(self);
    }

    fn run(&mut self, deadline: u32) {
        Z80::run(self, deadline);
    }

    fn cycles(&self) -> u32 {
        self.cycles
    }

    fn rebase_cycles(&mut self, frame_cycles: u32) {
        self.cycles = self.cycles.saturating_sub(frame_cycles);
    }
}

// === Register peek/poke by name ===

const Z80_QUERY_PATHS: &[&str] = &[
    "a", "f", "b", "c", "d", "e", "h", "l",
    "af", "bc", "de", "hl",
    "af'", "bc'", "de'", "hl'",
    "ix", "iy", "sp", "pc", "wz",
    "i", "r",
    "im", "iff1", "iff2",
    "flags.s", "flags.z", "flags.h", "flags.p", "flags.n", "flags.c",
    "halted", "cycles",
];

impl Observable for Z80 {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "a" => Some(self.regs.a.into()),
            "f" => Some(self.regs.f.into()),
            "b" => Some(self.regs.b.into()),
            "c" => Some(self.regs.c.into()),
            "d" => Some(self.regs.d.into()),
            "e" => Some(self.regs.e.into()),
            "h" => Some(self.regs.h.into()),
            "l" => Some(self.regs.l.into()),
            "af" => Some(self.regs.af().into()),
            "bc" => Some(self.regs.bc().into()),
            "de" => Some(self.regs.de().into()),
            "hl" => Some(self.regs.hl().into()),
            "af'" => Some((u16::from(self.regs.a_alt) << 8 | u16::from(self.regs.f_alt)).into()),
            "bc'" => Some((u16::from(self.regs.b_alt) << 8 | u16::from(self.regs.c_alt)).into()),
            "de'" => Some((u16::from(self.regs.d_alt) << 8 | u16::from(self.regs.e_alt)).into()),
            "hl'" => Some((u16::from(self.regs.h_alt) << 8 | u16::from(self.regs.l_alt)).into()),
            "ix" => Some(self.regs.ix.into()),
            "iy" => Some(self.regs.iy.into()),
            "sp" => Some(self.regs.sp.into()),
            "pc" => Some(self.regs.pc.into()),
            "wz" => Some(self.regs.wz.into()),
            "i" => Some(self.regs.i.into()),
            "r" => Some(self.regs.r_value().into()),
            "im" => Some(self.regs.im.into()),
            "iff1" => Some(self.regs.iff1.into()),
            "iff2" => Some(self.regs.iff2.into()),
            "flags.s" => Some((self.regs.f & SF != 0).into()),
            "flags.z" => Some((self.regs.f & ZF != 0).into()),
            "flags.h" => Some((self.regs.f & HF != 0).into()),
            "flags.p" => Some((self.regs.f & PF != 0).into()),
            "flags.n" => Some((self.regs.f & NF != 0).into()),
            "flags.c" => Some((self.regs.f & CF != 0).into()),
            "halted" => Some(self.regs.halted.into()),
            "cycles" => Some(self.cycles.into()),
            _ => None,
        }
    }

    fn poke(&mut self, path: &str, value: u32) -> bool {
        match path {
            "a" => self.regs.a = value as u8,
            "f" => self.regs.f = value as u8,
            "b" => self.regs.b = value as u8,
            "c" => self.regs.c = value as u8,
            "d" => self.regs.d = value as u8,
            "e" => self.regs.e = value as u8,
            "h" => self.regs.h = value as u8,
            "l" => self.regs.l = value as u8,
            "af" => self.regs.set_af(value as u16),
            "bc" => self.regs.set_bc(value as u16),
            "de" => self.regs.set_de(value as u16),
            "hl" => self.regs.set_hl(value as u16),
            "ix" => self.regs.ix = value as u16,
            "iy" => self.regs.iy = value as u16,
            "sp" => self.regs.sp = value as u16,
            "pc" => self.regs.pc = value as u16,
            "i" => self.regs.i = value as u8,
            "r" => self.regs.set_r(value as u8),
            "im" => self.regs.im = (value as u8).min(2),
            "iff1" => self.regs.iff1 = value != 0,
            "iff2" => self.regs.iff2 = value != 0,
            _ => return false,
        }
        true
    }

    fn query_paths(&self) -> &'static [&'static str] {
        Z80_QUERY_PATHS
    }
}
