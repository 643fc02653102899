//! Data-driven tests against SingleStepTests/z80 JSON vectors.
//!
//! Drop the `v1/*.json` files under `tests/data/z80/` and remove the
//! ignore attribute to run. Cycle totals are not compared: the vectors
//! model per-M-cycle bus activity while this core charges whole-opcode
//! T-state totals.

use std::cell::RefCell;
use std::rc::Rc;

use cpu_z80::memmap::BankBuf;
use cpu_z80::Z80;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TestState {
    pc: u16,
    sp: u16,
    a: u8,
    b: u8,
    c: u8,
    d: u8,
    e: u8,
    f: u8,
    h: u8,
    l: u8,
    i: u8,
    r: u8,
    ix: u16,
    iy: u16,
    af_: u16,
    bc_: u16,
    de_: u16,
    hl_: u16,
    wz: u16,
    iff1: u8,
    iff2: u8,
    im: u8,
    ram: Vec<(u16, u8)>,
}

#[derive(Debug, Deserialize)]
struct TestCase {
    name: String,
    initial: TestState,
    #[serde(rename = "final")]
    final_state: TestState,
}

fn cpu_with_ram() -> (Z80, BankBuf) {
    let mut cpu = Z80::new();
    let ram: BankBuf = Rc::new(RefCell::new(vec![0u8; 0x1_0000]));
    cpu.mem.map_read_ram(0, 64, &ram, 0);
    cpu.mem.map_write_ram(0, 64, &ram, 0);
    (cpu, ram)
}

fn apply(cpu: &mut Z80, ram: &BankBuf, state: &TestState) {
    cpu.regs.pc = state.pc;
    cpu.regs.sp = state.sp;
    cpu.regs.a = state.a;
    cpu.regs.f = state.f;
    cpu.regs.b = state.b;
    cpu.regs.c = state.c;
    cpu.regs.d = state.d;
    cpu.regs.e = state.e;
    cpu.regs.h = state.h;
    cpu.regs.l = state.l;
    cpu.regs.i = state.i;
    cpu.regs.set_r(state.r);
    cpu.regs.ix = state.ix;
    cpu.regs.iy = state.iy;
    cpu.regs.a_alt = (state.af_ >> 8) as u8;
    cpu.regs.f_alt = state.af_ as u8;
    cpu.regs.b_alt = (state.bc_ >> 8) as u8;
    cpu.regs.c_alt = state.bc_ as u8;
    cpu.regs.d_alt = (state.de_ >> 8) as u8;
    cpu.regs.e_alt = state.de_ as u8;
    cpu.regs.h_alt = (state.hl_ >> 8) as u8;
    cpu.regs.l_alt = state.hl_ as u8;
    cpu.regs.wz = state.wz;
    cpu.regs.iff1 = state.iff1 != 0;
    cpu.regs.iff2 = state.iff2 != 0;
    cpu.regs.im = state.im;
    for &(addr, value) in &state.ram {
        ram.borrow_mut()[usize::from(addr)] = value;
    }
}

fn check(cpu: &Z80, ram: &BankBuf, expected: &TestState, name: &str) -> Result<(), String> {
    let got = (
        cpu.regs.pc,
        cpu.regs.sp,
        cpu.regs.af(),
        cpu.regs.bc(),
        cpu.regs.de(),
        cpu.regs.hl(),
        cpu.regs.ix,
        cpu.regs.iy,
    );
    let want = (
        expected.pc,
        expected.sp,
        (u16::from(expected.a) << 8) | u16::from(expected.f),
        (u16::from(expected.b) << 8) | u16::from(expected.c),
        (u16::from(expected.d) << 8) | u16::from(expected.e),
        (u16::from(expected.h) << 8) | u16::from(expected.l),
        expected.ix,
        expected.iy,
    );
    if got != want {
        return Err(format!("{name}: registers {got:04X?} != {want:04X?}"));
    }
    if cpu.regs.r_value() != expected.r {
        return Err(format!("{name}: R {:02X} != {:02X}", cpu.regs.r_value(), expected.r));
    }
    for &(addr, value) in &expected.ram {
        let got = ram.borrow()[usize::from(addr)];
        if got != value {
            return Err(format!("{name}: ram[{addr:04X}] {got:02X} != {value:02X}"));
        }
    }
    Ok(())
}

#[test]
#[ignore]
fn single_step_vectors() {
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/z80");
    let entries = std::fs::read_dir(dir).expect("tests/data/z80 present");

    let mut total_passed = 0;
    let mut total_failed = 0;
    for entry in entries {
        let path = entry.expect("readable dir entry").path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let content = std::fs::read_to_string(&path).expect("readable test file");
        let cases: Vec<TestCase> = serde_json::from_str(&content).expect("valid test JSON");
        for case in &cases {
            let (mut cpu, ram) = cpu_with_ram();
            apply(&mut cpu, &ram, &case.initial);
            cpu.run(cpu.cycles() + 1);
            match check(&cpu, &ram, &case.final_state, &case.name) {
                Ok(()) => total_passed += 1,
                Err(message) => {
                    if total_failed < 10 {
                        eprintln!("{message}");
                    }
                    total_failed += 1;
                }
            }
        }
    }
    assert!(total_passed > 0, "no test vectors found under tests/data/z80/");
    assert_eq!(total_failed, 0);
}
