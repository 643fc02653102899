//! Integration tests for the 68000 core: the reset/boot sequence, flag
//! behavior, exceptions, and the interrupt-latency path.

use std::cell::RefCell;
use std::rc::Rc;

use cpu_68000::memmap::IoHandlers;
use cpu_68000::timing::MUL;
use cpu_68000::{page_buf, Cpu68000, STOP_LEVEL_HALT};

/// CPU with direct RAM covering the low `pages` 64KB pages.
fn cpu_with_ram(pages: u8) -> Cpu68000 {
    let mut cpu = Cpu68000::new();
    for page in 0..pages {
        cpu.map_mut().install_direct(page, page_buf());
    }
    cpu
}

fn load_words(cpu: &Cpu68000, addr: u32, words: &[u16]) {
    for (i, word) in words.iter().enumerate() {
        cpu.map().write_16(addr + 2 * i as u32, u32::from(*word));
    }
}

#[test]
fn reset_loads_sp_and_pc_from_vectors() {
    let cpu = &mut cpu_with_ram(1);
    cpu.map().write_32(0, 0x0000_1000);
    cpu.map().write_32(4, 0x0000_0400);

    cpu.reset();

    assert_eq!(cpu.regs.active_sp(), 0x0000_1000);
    assert_eq!(cpu.regs.pc, 0x0000_0400);
    assert_eq!(cpu.regs.interrupt_mask(), 7);
    assert!(cpu.regs.is_supervisor());
    assert_eq!(cpu.cycles(), 40 * MUL, "reset exception cost");
}

#[test]
fn addq_long_overflow_sets_n_and_v() {
    let cpu = &mut cpu_with_ram(1);
    cpu.regs.pc = 0x400;
    cpu.regs.d[0] = 0x7FFF_FFFF;
    load_words(cpu, 0x400, &[0x5280]); // ADDQ.L #1,D0

    let before = cpu.cycles();
    cpu.run(before + 1);

    assert_eq!(cpu.regs.d[0], 0x8000_0000);
    let sr = cpu.get_sr();
    assert_ne!(sr & 0x08, 0, "N set");
    assert_ne!(sr & 0x02, 0, "V set");
    assert_eq!(sr & 0x04, 0, "Z clear");
    assert_eq!(sr & 0x01, 0, "C clear");
    assert_eq!(sr & 0x10, 0, "X clear");
    assert_eq!(cpu.cycles() - before, 8 * MUL, "ADDQ.L to register is 8 clocks");
}

#[test]
fn divu_by_zero_takes_vector_5() {
    let cpu = &mut cpu_with_ram(1);
    cpu.regs.pc = 0x400;
    cpu.regs.ssp = 0x2000;
    cpu.regs.d[1] = 0x1234_5678;
    cpu.regs.set_a(0, 0x1000);
    cpu.map().write_16(0x1000, 0);
    cpu.map().write_32(0x14, 0x0000_3000); // zero-divide vector
    load_words(cpu, 0x400, &[0x82D0]); // DIVU (A0),D1
    load_words(cpu, 0x3000, &[0x60FE]); // handler: BRA.s *

    cpu.run(cpu.cycles() + 1);

    assert_eq!(cpu.regs.pc, 0x3000);
    assert_eq!(cpu.regs.active_sp(), 0x2000 - 6, "3-word frame pushed");
    assert_eq!(cpu.map().read_32(0x2000 - 4), 0x0000_0402, "return PC");
    assert_eq!(cpu.regs.d[1], 0x1234_5678, "destination untouched");
}

#[test]
fn halted_cpu_fast_forwards_to_deadline() {
    let cpu = &mut cpu_with_ram(1);
    cpu.pulse_halt();
    cpu.run(12345);
    assert_eq!(cpu.cycles(), 12345);
    assert_eq!(cpu.stopped(), STOP_LEVEL_HALT);

    // Nothing retired: PC never moved
    assert_eq!(cpu.regs.pc, 0);
}

#[test]
fn sr_round_trip_masks_undefined_bits() {
    let cpu = &mut cpu_with_ram(1);
    cpu.set_sr(0xFFFF);
    assert_eq!(cpu.get_sr(), 0xA71F);
    cpu.set_sr(0x1234);
    assert_eq!(cpu.get_sr(), 0x1234 & 0xA71F);
}

#[test]
fn move_roundtrip_through_memory() {
    let cpu = &mut cpu_with_ram(1);
    cpu.regs.pc = 0x400;
    load_words(
        cpu,
        0x400,
        &[
            0x223C, 0xDEAD, 0xBEEF, // MOVE.L #$DEADBEEF,D1
            0x21C1, 0x0100, //         MOVE.L D1,($100).W
            0x3010, //                 MOVE.W (A0),D0
            0x60FE, //                 BRA.s *
        ],
    );
    cpu.regs.set_a(0, 0x100);

    cpu.run(cpu.cycles() + 60 * MUL);

    assert_eq!(cpu.regs.d[1], 0xDEAD_BEEF);
    assert_eq!(cpu.map().read_32(0x100), 0xDEAD_BEEF);
    assert_eq!(cpu.regs.d[0] & 0xFFFF, 0xDEAD);
    assert_ne!(cpu.get_sr() & 0x08, 0, "last MOVE.W saw a negative word");
}

#[test]
fn run_is_cycle_monotonic_and_reaches_deadline() {
    let cpu = &mut cpu_with_ram(1);
    cpu.regs.pc = 0x400;
    // A loop of NOPs followed by BRA back
    load_words(cpu, 0x400, &[0x4E71, 0x4E71, 0x4E71, 0x60F8]);

    let mut last = cpu.cycles();
    for slice in 1..=20 {
        let deadline = slice * 200;
        cpu.run(deadline);
        assert!(cpu.cycles() >= last);
        assert!(cpu.cycles() >= deadline.min(last + 4 * MUL));
        last = cpu.cycles();
    }
}

#[test]
fn interrupt_is_autovectored_and_masks_rise() {
    let cpu = &mut cpu_with_ram(1);
    cpu.regs.pc = 0x400;
    cpu.regs.ssp = 0x2000;
    cpu.set_sr(0x2000); // supervisor, mask 0
    cpu.map().write_32(0x70, 0x0000_2000); // level 4 autovector
    load_words(cpu, 0x400, &[0x4E71, 0x4E71]); // NOP; NOP
    load_words(cpu, 0x2000, &[0x60FE]); // handler: BRA.s *

    cpu.set_irq(4);
    cpu.run(cpu.cycles() + 100 * MUL);

    assert_eq!(cpu.regs.pc, 0x2000);
    assert_eq!(cpu.regs.interrupt_mask(), 4, "mask raised to serviced level");
    assert_eq!(cpu.map().read_32(0x2000 - 4), 0x400, "pre-NOP PC stacked");
    assert_eq!(cpu.irq_line().level(), 0, "default acknowledge cleared the line");
}

#[test]
fn level_7_is_blocked_by_mask_7() {
    let cpu = &mut cpu_with_ram(1);
    cpu.regs.pc = 0x400;
    cpu.regs.ssp = 0x2000;
    // Reset state keeps mask 7
    load_words(cpu, 0x400, &[0x4E71, 0x60FC]);

    cpu.set_irq(7);
    cpu.run(cpu.cycles() + 50 * MUL);

    assert_ne!(cpu.regs.pc, 0x7C, "no exception path entered");
    assert_eq!(cpu.regs.interrupt_mask(), 7);
}

#[test]
fn irq_delay_retires_exactly_one_more_instruction() {
    let cpu = &mut cpu_with_ram(1);
    cpu.regs.pc = 0x400;
    cpu.regs.ssp = 0x3000;
    cpu.set_sr(0x2000);
    cpu.map().write_32(0x70, 0x0000_2000);
    load_words(cpu, 0x2000, &[0x60FE]);
    load_words(
        cpu,
        0x400,
        &[
            0x3280, // MOVE.W D0,(A1) — the control-port write
            0x4E71, // NOP — the one latency instruction
            0x4E71, // NOP — must not run before the exception
        ],
    );
    cpu.regs.set_a(1, 0x00A0_0000);

    let line = cpu.irq_line();
    cpu.map_mut().install_indirect(
        0xA0,
        IoHandlers {
            read8: Rc::new(|_| 0xFF),
            read16: Rc::new(|_| 0xFFFF),
            write8: Rc::new(|_, _| {}),
            write16: Rc::new(move |_, _| line.set_irq_delay(4)),
        },
    );

    cpu.run(cpu.cycles() + 200 * MUL);

    assert_eq!(cpu.regs.pc, 0x2000, "exception taken");
    assert_eq!(
        cpu.map().read_32(0x3000 - 4),
        0x404,
        "return PC is after exactly one further instruction"
    );
}

#[test]
fn irq_delay_skips_the_latency_pass_for_move_long() {
    let cpu = &mut cpu_with_ram(1);
    cpu.regs.pc = 0x400;
    cpu.regs.ssp = 0x3000;
    cpu.set_sr(0x2000);
    cpu.map().write_32(0x70, 0x0000_2000);
    load_words(cpu, 0x2000, &[0x60FE]);
    load_words(cpu, 0x400, &[0x2280, 0x4E71]); // MOVE.L D0,(A1); NOP
    cpu.regs.set_a(1, 0x00A0_0000);

    let line = cpu.irq_line();
    cpu.map_mut().install_indirect(
        0xA0,
        IoHandlers {
            read8: Rc::new(|_| 0xFF),
            read16: Rc::new(|_| 0xFFFF),
            write8: Rc::new(|_, _| {}),
            write16: Rc::new(move |_, _| line.set_irq_delay(4)),
        },
    );

    cpu.run(cpu.cycles() + 200 * MUL);

    assert_eq!(cpu.regs.pc, 0x2000);
    assert_eq!(
        cpu.map().read_32(0x3000 - 4),
        0x402,
        "no latency instruction after a MOVE.L"
    );
}

#[test]
fn odd_word_read_takes_the_address_error_vector() {
    let cpu = &mut cpu_with_ram(1);
    cpu.regs.pc = 0x400;
    cpu.regs.ssp = 0x3000;
    cpu.map().write_32(0x0C, 0x0000_4000); // address error vector
    load_words(cpu, 0x4000, &[0x60FE]);
    load_words(cpu, 0x400, &[0x3010]); // MOVE.W (A0),D0
    cpu.regs.set_a(0, 0x1001);

    let before = cpu.cycles();
    cpu.run(before + 1);

    assert_eq!(cpu.regs.pc, 0x4000);
    let sp = cpu.regs.active_sp();
    assert_eq!(sp, 0x3000 - 14, "group-0 frame is 14 bytes");
    // Access info: read, instruction, supervisor data
    assert_eq!(cpu.map().read_16(sp), 0x15);
    assert_eq!(cpu.map().read_32(sp + 2), 0x1001, "fault address");
    assert_eq!(cpu.map().read_16(sp + 6), 0x3010, "IR");
    assert_eq!(cpu.map().read_32(sp + 10), 0x402, "PC");
    assert_eq!(
        cpu.cycles() - before,
        50 * MUL,
        "instruction cycles replaced by the exception cost"
    );
}

#[test]
fn address_error_with_odd_ssp_is_a_double_fault() {
    let cpu = &mut cpu_with_ram(1);
    cpu.regs.pc = 0x400;
    cpu.regs.ssp = 0x3001; // frame pushes will fault
    load_words(cpu, 0x400, &[0x3010]); // MOVE.W (A0),D0
    cpu.regs.set_a(0, 0x1001);

    cpu.run(5000);

    assert!(cpu.is_halted());
    assert_eq!(cpu.cycles(), 5000, "halted CPU pegs to the deadline");
}

#[test]
fn stop_waits_for_an_interrupt_above_the_mask() {
    let cpu = &mut cpu_with_ram(1);
    cpu.regs.pc = 0x400;
    cpu.regs.ssp = 0x2000;
    cpu.map().write_32(0x68, 0x0000_2000); // level 2 autovector
    load_words(cpu, 0x400, &[0x4E72, 0x2000, 0x4E71]); // STOP #$2000
    load_words(cpu, 0x2000, &[0x60FE]);

    cpu.run(1000);
    assert_eq!(cpu.cycles(), 1000, "stopped CPU pegs to the deadline");
    assert_ne!(cpu.stopped(), 0);
    assert_eq!(cpu.regs.pc, 0x404);

    cpu.set_irq(2);
    cpu.run(3000);
    assert_eq!(cpu.regs.pc, 0x2000, "interrupt wakes the stopped CPU");
    assert_eq!(cpu.stopped(), 0);
}

#[test]
fn trace_fires_after_each_instruction() {
    let cpu = &mut cpu_with_ram(1);
    cpu.regs.pc = 0x400;
    cpu.regs.ssp = 0x2000;
    cpu.set_sr(0xA000); // supervisor + trace
    cpu.map().write_32(0x24, 0x0000_2000); // trace vector
    load_words(cpu, 0x400, &[0x4E71]); // NOP
    load_words(cpu, 0x2000, &[0x60FE]);

    cpu.run(cpu.cycles() + 1);

    assert_eq!(cpu.regs.pc, 0x2000);
    assert_eq!(cpu.map().read_32(0x2000 - 4), 0x402, "PC after the traced NOP");
    assert_eq!(cpu.get_sr() & 0x8000, 0, "trace cleared in the handler");
}

#[test]
fn context_round_trips() {
    let cpu = &mut cpu_with_ram(1);
    cpu.regs.pc = 0x400;
    cpu.regs.d = [1, 2, 3, 4, 5, 6, 7, 8];
    cpu.regs.ssp = 0x2000;
    cpu.set_irq(3);
    cpu.set_cycles(777);

    let ctx = cpu.save_context();
    let fresh = &mut cpu_with_ram(1);
    fresh.restore_context(&ctx);

    assert_eq!(fresh.save_context(), ctx);
    assert_eq!(fresh.regs.d[7], 8);
    assert_eq!(fresh.cycles(), 777);
    assert_eq!(fresh.irq_line().level(), 3);
}

#[test]
fn tas_honors_the_writeback_arbiter() {
    let cpu = &mut cpu_with_ram(1);
    cpu.regs.pc = 0x400;
    load_words(cpu, 0x400, &[0x4AD0, 0x4AD0]); // TAS (A0); TAS (A0)
    cpu.regs.set_a(0, 0x1000);
    cpu.map().write_8(0x1000, 0x01);

    let denied = Rc::new(RefCell::new(false));
    let flag = denied.clone();
    cpu.set_tas_instr_callback(move || !*flag.borrow());

    cpu.run(cpu.cycles() + 1);
    assert_eq!(cpu.map().read_8(0x1000), 0x81, "writeback permitted");

    *denied.borrow_mut() = true;
    cpu.map().write_8(0x1000, 0x01);
    cpu.run(cpu.cycles() + 1);
    assert_eq!(cpu.map().read_8(0x1000), 0x01, "writeback denied");
}
