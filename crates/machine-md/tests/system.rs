//! Machine-level tests: boot, the Z80 bus gate, MAIN/SUB shared RAM, and
//! save states.

use machine_md::{Config, Model, Region, System, MCYCLES_PER_LINE};

/// Build a minimal cartridge: vectors plus a program at 0x200.
fn cartridge(program: &[u16]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x1000];
    // Initial SSP = 0x00FF8000 (work RAM), initial PC = 0x00000200
    rom[..8].copy_from_slice(&[0x00, 0xFF, 0x80, 0x00, 0x00, 0x00, 0x02, 0x00]);
    for (i, word) in program.iter().enumerate() {
        rom[0x200 + 2 * i] = (word >> 8) as u8;
        rom[0x200 + 2 * i + 1] = *word as u8;
    }
    rom
}

#[test]
fn boot_runs_the_reset_vector_program() {
    let mut system = System::new(Config::default());
    system.load_cartridge(&cartridge(&[
        0x33FC, 0xCAFE, 0x00FF, 0x0000, // MOVE.W #$CAFE,$FF0000.L
        0x60FE, //                         BRA.s *
    ]));
    system.reset();

    system.run_line();

    assert_eq!(system.main.regs.active_sp(), 0x00FF_8000);
    assert_eq!(system.work_ram().borrow()[0], 0xCA);
    assert_eq!(system.work_ram().borrow()[1], 0xFE);
    // Whole instructions may overshoot the deadline by one opcode
    assert!(system.main.cycles() >= MCYCLES_PER_LINE);
    assert!(system.main.cycles() < MCYCLES_PER_LINE + 20 * 7);
}

#[test]
fn z80_runs_after_reset_release() {
    let mut system = System::new(Config::default());
    system.load_cartridge(&cartridge(&[
        0x33FC, 0x0100, 0x00A1, 0x1200, // MOVE.W #$0100,$A11200.L (release Z80 reset)
        0x60FE, //                         BRA.s *
    ]));
    // Z80 program: LD A,$42; LD ($1F00),A; HALT
    {
        let mut zram = system.z80_ram().borrow_mut();
        zram[0] = 0x3E;
        zram[1] = 0x42;
        zram[2] = 0x32;
        zram[3] = 0x00;
        zram[4] = 0x1F;
        zram[5] = 0x76;
    }
    system.reset();

    // Line 1: MAIN releases the reset line; line 2: the Z80 runs
    system.run_line();
    system.run_line();

    assert!(system.z80.is_halted());
    assert_eq!(system.z80_ram().borrow()[0x1F00], 0x42);
    assert_eq!(system.z80.cycles(), 2 * MCYCLES_PER_LINE);
}

#[test]
fn main_reaches_sound_ram_only_while_holding_the_bus() {
    let mut system = System::new(Config::default());
    system.load_cartridge(&cartridge(&[
        0x33FC, 0x0100, 0x00A1, 0x1100, // MOVE.W #$0100,$A11100.L (request bus)
        0x13FC, 0x0077, 0x00A0, 0x0123, // MOVE.B #$77,$A00123.L
        0x60FE, //                         BRA.s *
    ]));
    system.reset();

    system.run_line();

    assert_eq!(system.z80_ram().borrow()[0x0123], 0x77);
}

#[test]
fn sound_ram_writes_are_dropped_without_the_bus() {
    let mut system = System::new(Config::default());
    system.load_cartridge(&cartridge(&[
        0x13FC, 0x0077, 0x00A0, 0x0123, // MOVE.B #$77,$A00123.L (no BUSREQ)
        0x60FE, //                         BRA.s *
    ]));
    system.reset();

    system.run_line();

    assert_eq!(system.z80_ram().borrow()[0x0123], 0x00);
}

#[test]
fn sub_cpu_shares_word_ram_with_main() {
    let mut system = System::new(Config {
        region: Region::Ntsc,
        model: Model::CdAttached,
    });
    system.load_cartridge(&cartridge(&[
        0x33FC, 0xBEEF, 0x0020, 0x0000, // MOVE.W #$BEEF,$200000.L
        0x60FE, //                         BRA.s *
    ]));
    system.reset();
    system.run_line();

    let sub = system.sub.as_ref().expect("CD stack has a SUB CPU");
    assert_eq!(sub.map().read_16(0x08_0000), 0xBEEF, "shared word RAM");
}

#[test]
fn frame_rebases_cycle_counters() {
    let mut system = System::new(Config::default());
    system.load_cartridge(&cartridge(&[0x60FE])); // BRA.s *
    system.reset();
    let reset_cost = system.main.cycles();

    system.run_frame();

    let frame = Region::Ntsc.lines_per_frame() * MCYCLES_PER_LINE;
    assert!(system.main.cycles() < frame, "counter rebased");
    assert_eq!(system.line(), 0);
    // The reset exception cost survives the rebase as a small remainder
    assert!(system.main.cycles() <= reset_cost);
}

#[cfg(feature = "native")]
#[test]
fn save_state_round_trips() {
    let mut system = System::new(Config::default());
    system.load_cartridge(&cartridge(&[
        0x33FC, 0xCAFE, 0x00FF, 0x0000, // MOVE.W #$CAFE,$FF0000.L
        0x60FE,
    ]));
    system.reset();
    system.run_line();

    let state = system.save_state();

    let mut restored = System::new(Config::default());
    restored.load_cartridge(&cartridge(&[
        0x33FC, 0xCAFE, 0x00FF, 0x0000,
        0x60FE,
    ]));
    restored.load_state(&state).expect("state parses");

    assert_eq!(restored.main.regs.pc, system.main.regs.pc);
    assert_eq!(restored.main.cycles(), system.main.cycles());
    assert_eq!(restored.work_ram().borrow()[0], 0xCA);

    // The restored machine keeps running identically
    restored.run_line();
    system.run_line();
    assert_eq!(restored.main.regs.pc, system.main.regs.pc);
    assert_eq!(restored.main.cycles(), system.main.cycles());
}
