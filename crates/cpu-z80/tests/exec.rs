//! Integration tests for the Z80 core: block transfers, interrupt modes,
//! the EI shadow, refresh counting, and prefix chains.

use std::cell::RefCell;
use std::rc::Rc;

use cpu_z80::memmap::BankBuf;
use cpu_z80::tables::Z80_MUL;
use cpu_z80::{Z80, PF, ZF};

/// CPU with 64KB of flat RAM; returns the buffer for inspection.
fn cpu_with_ram() -> (Z80, BankBuf) {
    let mut cpu = Z80::new();
    let ram: BankBuf = Rc::new(RefCell::new(vec![0u8; 0x1_0000]));
    cpu.mem.map_read_ram(0, 64, &ram, 0);
    cpu.mem.map_write_ram(0, 64, &ram, 0);
    (cpu, ram)
}

fn load(ram: &BankBuf, addr: u16, bytes: &[u8]) {
    let mut mem = ram.borrow_mut();
    for (i, byte) in bytes.iter().enumerate() {
        mem[usize::from(addr) + i] = *byte;
    }
}

#[test]
fn ldir_copies_a_rising_ramp() {
    let (mut cpu, ram) = cpu_with_ram();
    load(
        &ram,
        0,
        &[
            0x21, 0x00, 0x80, // LD HL,$8000
            0x11, 0x00, 0x90, // LD DE,$9000
            0x01, 0x10, 0x00, // LD BC,$0010
            0xED, 0xB0, //       LDIR
            0x76, //             HALT
        ],
    );
    for i in 0..16u8 {
        ram.borrow_mut()[0x8000 + usize::from(i)] = i;
    }

    cpu.run(16 * 21 * Z80_MUL + 2000 * Z80_MUL);

    for i in 0..16u8 {
        assert_eq!(ram.borrow()[0x9000 + usize::from(i)], i);
    }
    assert_eq!(cpu.regs.hl(), 0x8010);
    assert_eq!(cpu.regs.de(), 0x9010);
    assert_eq!(cpu.regs.bc(), 0);
    assert_eq!(cpu.regs.f & PF, 0, "P/V clears when BC reaches zero");
    assert!(cpu.is_halted());
}

#[test]
fn ldir_charges_the_repeat_penalty() {
    let (mut cpu, ram) = cpu_with_ram();
    load(&ram, 0, &[0xED, 0xB0]); // LDIR with BC preloaded
    cpu.regs.set_hl(0x8000);
    cpu.regs.set_de(0x9000);
    cpu.regs.set_bc(3);

    // Two repeating passes at 21 T each, final pass at 16 T
    cpu.run(1);
    let one_pass = cpu.cycles();
    assert_eq!(one_pass, 21 * Z80_MUL);
    cpu.run(cpu.cycles() + 1);
    cpu.run(cpu.cycles() + 1);
    assert_eq!(cpu.cycles(), (21 + 21 + 16) * Z80_MUL);
    assert_eq!(cpu.regs.bc(), 0);
}

#[test]
fn im2_vector_dispatch() {
    let (mut cpu, ram) = cpu_with_ram();
    load(&ram, 0, &[0xFB, 0x76]); // EI; HALT
    load(&ram, 0x4008, &[0x34, 0x12]); // vector target $1234
    load(&ram, 0x1234, &[0x76]); // handler: HALT
    cpu.regs.i = 0x40;
    cpu.regs.im = 2;
    cpu.regs.sp = 0x8000;
    cpu.set_irq_callback(|| 0x08);

    cpu.run(20 * Z80_MUL);
    assert!(cpu.is_halted(), "parked on HALT");

    cpu.set_irq_line(true);
    cpu.run(cpu.cycles() + 40 * Z80_MUL);

    assert_eq!(cpu.regs.sp, 0x8000 - 2);
    // Return address is the HALT opcode + 1 (HALT re-arms by rewinding)
    assert_eq!(
        u16::from(ram.borrow()[0x7FFE]) | (u16::from(ram.borrow()[0x7FFF]) << 8),
        0x0002
    );
    assert!(!cpu.regs.iff1);
    assert!(!cpu.regs.iff2);
    // PC went through [$4008]
    assert!(cpu.regs.pc == 0x1234 || cpu.regs.pc == 0x1235);
}

#[test]
fn im1_takes_rst_38() {
    let (mut cpu, ram) = cpu_with_ram();
    load(&ram, 0, &[0xFB, 0x76]); // EI; HALT
    load(&ram, 0x38, &[0x76]);
    cpu.regs.im = 1;
    cpu.regs.sp = 0x8000;

    cpu.run(20 * Z80_MUL);
    cpu.set_irq_line(true);
    cpu.run(cpu.cycles() + 40 * Z80_MUL);

    assert!(cpu.regs.pc == 0x38 || cpu.regs.pc == 0x39);
    assert_eq!(cpu.regs.sp, 0x7FFE);
}

#[test]
fn ei_shadows_exactly_one_instruction() {
    let (mut cpu, ram) = cpu_with_ram();
    load(&ram, 0, &[0xFB, 0x3C, 0x3C, 0x3C]); // EI; INC A; INC A; INC A
    load(&ram, 0x38, &[0x76]); // IM1 handler: HALT
    cpu.regs.im = 1;
    cpu.regs.sp = 0x8000;
    cpu.set_irq_line(true);

    cpu.run(200 * Z80_MUL);

    assert_eq!(cpu.regs.a, 1, "one instruction retired after EI");
    assert_eq!(
        u16::from(ram.borrow()[0x7FFE]) | (u16::from(ram.borrow()[0x7FFF]) << 8),
        0x0002,
        "interrupt accepted between the first and second INC"
    );
}

#[test]
fn nmi_is_edge_triggered_to_0066() {
    let (mut cpu, ram) = cpu_with_ram();
    load(&ram, 0, &[0x76]); // HALT
    load(&ram, 0x66, &[0x76]);
    cpu.regs.sp = 0x8000;
    cpu.regs.iff1 = true;
    cpu.regs.iff2 = true;

    cpu.run(10 * Z80_MUL);
    let before = cpu.cycles();
    cpu.set_nmi_line(true);

    assert_eq!(cpu.regs.pc, 0x66);
    assert!(!cpu.regs.iff1, "IFF1 cleared");
    assert!(cpu.regs.iff2, "IFF2 preserved");
    assert_eq!(cpu.cycles() - before, 11 * Z80_MUL);

    // A held line produces no second edge
    cpu.set_nmi_line(true);
    assert_eq!(cpu.cycles() - before, 11 * Z80_MUL);
}

#[test]
fn refresh_counts_opcode_and_prefix_bytes() {
    let (mut cpu, ram) = cpu_with_ram();
    load(
        &ram,
        0,
        &[
            0x00, //                   NOP                 R+1
            0xDD, 0x21, 0x00, 0x10, // LD IX,$1000         R+2
            0xDD, 0xFD, 0x21, 0x00, 0x20, // DD FD chain   R+3
            0xFD, 0xCB, 0x02, 0xC6, // SET 0,(IY+2)        R+2
            0x76, //                   HALT                R+1
        ],
    );

    cpu.run(2000 * Z80_MUL);

    assert!(cpu.is_halted());
    assert_eq!(cpu.regs.r & 0x7F, 9);
    assert_eq!(cpu.regs.ix, 0x1000);
    assert_eq!(cpu.regs.iy, 0x2000, "last prefix of the chain wins");
    assert_eq!(ram.borrow()[0x2002], 0x01, "SET 0,(IY+2) landed");
}

#[test]
fn software_writes_to_r_keep_bit_7() {
    let (mut cpu, ram) = cpu_with_ram();
    load(
        &ram,
        0,
        &[
            0x3E, 0x85, // LD A,$85
            0xED, 0x4F, // LD R,A
            0x00, 0x00, 0x00, // NOP x3
            0xED, 0x5F, // LD A,R
            0x76, // HALT
        ],
    );

    cpu.run(2000 * Z80_MUL);

    // R was $85; 3 NOPs + ED + 5F = 5 fetches later the low bits read
    // $8A with bit 7 held
    assert!(cpu.is_halted());
    assert_eq!(cpu.regs.a, 0x8A);
}

#[test]
fn ld_a_i_copies_iff2_into_parity() {
    let (mut cpu, ram) = cpu_with_ram();
    load(&ram, 0, &[0xED, 0x57, 0x76]); // LD A,I; HALT
    cpu.regs.iff2 = true;
    cpu.regs.i = 0x00;

    cpu.run(2000 * Z80_MUL);

    assert_ne!(cpu.regs.f & PF, 0, "P/V mirrors IFF2");
    assert_ne!(cpu.regs.f & ZF, 0, "I was zero");
}

#[test]
fn exx_and_ex_af_swap_banks() {
    let (mut cpu, ram) = cpu_with_ram();
    load(&ram, 0, &[0x08, 0xD9, 0x76]); // EX AF,AF'; EXX; HALT
    cpu.regs.a = 0x11;
    cpu.regs.a_alt = 0x22;
    cpu.regs.set_bc(0x3344);
    cpu.regs.b_alt = 0x55;
    cpu.regs.c_alt = 0x66;

    cpu.run(2000 * Z80_MUL);

    assert_eq!(cpu.regs.a, 0x22);
    assert_eq!(cpu.regs.a_alt, 0x11);
    assert_eq!(cpu.regs.bc(), 0x5566);
}

#[test]
fn halt_rewinds_pc_and_burns_cycles() {
    let (mut cpu, ram) = cpu_with_ram();
    load(&ram, 0, &[0x00, 0x76]); // NOP; HALT

    cpu.run(100 * Z80_MUL);

    assert!(cpu.is_halted());
    assert_eq!(cpu.regs.pc, 1, "PC rewound onto the HALT opcode");
    assert_eq!(cpu.cycles(), 100 * Z80_MUL, "reached the deadline");
}

#[test]
fn undefined_ed_opcodes_are_two_byte_nops() {
    let (mut cpu, ram) = cpu_with_ram();
    load(&ram, 0, &[0xED, 0x00, 0x76]); // undefined; HALT

    cpu.run(2000 * Z80_MUL);

    assert!(cpu.is_halted());
    assert_eq!(cpu.regs.pc, 2, "both bytes consumed");
}

#[test]
fn daa_adjusts_bcd_addition() {
    let (mut cpu, ram) = cpu_with_ram();
    load(
        &ram,
        0,
        &[
            0x3E, 0x19, // LD A,$19
            0xC6, 0x28, // ADD A,$28
            0x27, //       DAA
            0x76, //       HALT
        ],
    );

    cpu.run(2000 * Z80_MUL);

    assert_eq!(cpu.regs.a, 0x47);
}

#[test]
fn context_round_trips() {
    let (mut cpu, ram) = cpu_with_ram();
    load(&ram, 0, &[0x3E, 0x42, 0x76]); // LD A,$42; HALT
    cpu.run(50 * Z80_MUL);

    let ctx = cpu.save_context();
    let mut fresh = Z80::new();
    fresh.restore_context(&ctx);

    assert_eq!(fresh.save_context(), ctx);
    assert_eq!(fresh.regs.a, 0x42);
    assert!(fresh.regs.halted);
}

#[test]
fn cpir_stops_on_match() {
    let (mut cpu, ram) = cpu_with_ram();
    load(&ram, 0, &[0xED, 0xB1, 0x76]); // CPIR; HALT
    load(&ram, 0x8000, &[0x10, 0x20, 0x30, 0x40]);
    cpu.regs.a = 0x30;
    cpu.regs.set_hl(0x8000);
    cpu.regs.set_bc(0x0010);

    cpu.run(4000 * Z80_MUL);

    assert!(cpu.is_halted());
    assert_eq!(cpu.regs.hl(), 0x8003, "stopped past the match");
    assert_eq!(cpu.regs.bc(), 0x000D);
    assert_ne!(cpu.regs.f & ZF, 0, "match found");
}
