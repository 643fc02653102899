//! Data-driven tests against SingleStepTests/680x0 JSON vectors.
//!
//! Drop the decompressed `v1/*.json` files under `tests/data/m68000/` and
//! remove the ignore attribute to run. The vectors assume a two-word
//! prefetch queue: their PC points past both prefetched words, so the
//! harness rewinds PC by four and materialises the prefetch words in RAM.
//! Per-instruction cycle totals are not compared (the vectors count bus
//! phases, this core charges documented instruction totals).

use cpu_68000::{page_buf, Cpu68000};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TestState {
    d0: u32,
    d1: u32,
    d2: u32,
    d3: u32,
    d4: u32,
    d5: u32,
    d6: u32,
    d7: u32,
    a0: u32,
    a1: u32,
    a2: u32,
    a3: u32,
    a4: u32,
    a5: u32,
    a6: u32,
    usp: u32,
    ssp: u32,
    sr: u16,
    pc: u32,
    prefetch: [u32; 2],
    ram: Vec<(u32, u8)>,
}

#[derive(Debug, Deserialize)]
struct TestCase {
    name: String,
    initial: TestState,
    #[serde(rename = "final")]
    final_state: TestState,
}

fn full_ram_cpu() -> Cpu68000 {
    let mut cpu = Cpu68000::new();
    for page in 0..=0xFF {
        cpu.map_mut().install_direct(page, page_buf());
    }
    cpu
}

fn apply(cpu: &mut Cpu68000, state: &TestState) {
    let d = [
        state.d0, state.d1, state.d2, state.d3, state.d4, state.d5, state.d6, state.d7,
    ];
    let a = [
        state.a0, state.a1, state.a2, state.a3, state.a4, state.a5, state.a6,
    ];
    cpu.regs.d = d;
    cpu.regs.a = a;
    cpu.regs.usp = state.usp;
    cpu.regs.ssp = state.ssp;
    cpu.regs.sr = state.sr & 0xA71F;
    // PC in the vectors points past the prefetch queue
    cpu.regs.pc = state.pc.wrapping_sub(4);
    for &(addr, value) in &state.ram {
        cpu.map().write_8(addr, u32::from(value));
    }
    cpu.map().write_16(cpu.regs.pc, state.prefetch[0]);
    cpu.map()
        .write_16(cpu.regs.pc.wrapping_add(2), state.prefetch[1]);
}

fn check(cpu: &Cpu68000, expected: &TestState, name: &str) -> Result<(), String> {
    let d = [
        expected.d0, expected.d1, expected.d2, expected.d3, expected.d4, expected.d5,
        expected.d6, expected.d7,
    ];
    if cpu.regs.d != d {
        return Err(format!("{name}: D registers {:08X?} != {:08X?}", cpu.regs.d, d));
    }
    let a = [
        expected.a0, expected.a1, expected.a2, expected.a3, expected.a4, expected.a5,
        expected.a6,
    ];
    if cpu.regs.a != a {
        return Err(format!("{name}: A registers differ"));
    }
    if cpu.get_sr() != expected.sr & 0xA71F {
        return Err(format!(
            "{name}: SR {:04X} != {:04X}",
            cpu.get_sr(),
            expected.sr & 0xA71F
        ));
    }
    if cpu.regs.pc != expected.pc.wrapping_sub(4) {
        return Err(format!(
            "{name}: PC {:08X} != {:08X}",
            cpu.regs.pc,
            expected.pc.wrapping_sub(4)
        ));
    }
    for &(addr, value) in &expected.ram {
        let got = cpu.map().read_8(addr);
        if got != u32::from(value) {
            return Err(format!("{name}: ram[{addr:06X}] {got:02X} != {value:02X}"));
        }
    }
    Ok(())
}

fn run_file(path: &std::path::Path) -> (usize, usize, Vec<String>) {
    let content = std::fs::read_to_string(path).expect("readable test file");
    let cases: Vec<TestCase> = serde_json::from_str(&content).expect("valid test JSON");

    let mut passed = 0;
    let mut failed = 0;
    let mut failures = Vec::new();
    for case in &cases {
        let mut cpu = full_ram_cpu();
        apply(&mut cpu, &case.initial);
        let start = cpu.cycles();
        cpu.run(start + 1);
        match check(&cpu, &case.final_state, &case.name) {
            Ok(()) => passed += 1,
            Err(message) => {
                failed += 1;
                if failures.len() < 10 {
                    failures.push(message);
                }
            }
        }
    }
    (passed, failed, failures)
}

#[test]
#[ignore]
fn single_step_vectors() {
    let pattern = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/m68000/*.json");
    let mut total_passed = 0;
    let mut total_failed = 0;
    for entry in glob::glob(pattern).expect("valid glob") {
        let path = entry.expect("readable dir entry");
        let (passed, failed, failures) = run_file(&path);
        total_passed += passed;
        total_failed += failed;
        for failure in failures {
            eprintln!("{failure}");
        }
        eprintln!("{}: {passed} passed, {failed} failed", path.display());
    }
    assert!(total_passed > 0, "no test vectors found under tests/data/m68000/");
    assert_eq!(total_failed, 0);
}
