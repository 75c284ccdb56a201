//! Data-driven per-opcode tests in the `SingleStepTests` JSON format.
//!
//! Each file holds test cases for one opcode: an initial CPU/RAM state,
//! the expected final state, and the bus activity (whose length is the
//! instruction's cycle count). Place the `6502/v1` JSON files under
//! `tests/data/single-step/` to run.

use emu_core::{Bus, Cpu, SimpleBus};
use mos_6502::Mos6502;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize)]
struct TestCase {
    name: String,
    initial: CpuState,
    #[serde(rename = "final")]
    final_state: CpuState,
    cycles: Vec<(u16, u8, String)>,
}

#[derive(Deserialize)]
struct CpuState {
    pc: u16,
    s: u8,
    a: u8,
    x: u8,
    y: u8,
    p: u8,
    ram: Vec<(u16, u8)>,
}

fn run_case(case: &TestCase) {
    let mut bus = SimpleBus::new();
    for &(addr, value) in &case.initial.ram {
        bus.write(addr, value);
    }

    let mut cpu = Mos6502::new();
    cpu.set_pc(case.initial.pc);
    cpu.set_sp(case.initial.s);
    cpu.set_a(case.initial.a);
    cpu.set_x(case.initial.x);
    cpu.set_y(case.initial.y);
    cpu.set_status(case.initial.p);

    let cycles = cpu.step(&mut bus);

    assert_eq!(Cpu::<SimpleBus>::pc(&cpu), case.final_state.pc, "{}: pc", case.name);
    assert_eq!(cpu.sp(), case.final_state.s, "{}: sp", case.name);
    assert_eq!(cpu.a(), case.final_state.a, "{}: a", case.name);
    assert_eq!(cpu.x(), case.final_state.x, "{}: x", case.name);
    assert_eq!(cpu.y(), case.final_state.y, "{}: y", case.name);
    assert_eq!(cpu.status(), case.final_state.p, "{}: p", case.name);
    for &(addr, value) in &case.final_state.ram {
        assert_eq!(bus.peek(addr), value, "{}: ram[{addr:04X}]", case.name);
    }
    assert_eq!(cycles as usize, case.cycles.len(), "{}: cycles", case.name);
}

#[test]
#[ignore]
fn single_step_all_opcodes() {
    let dir = Path::new("tests/data/single-step");
    let mut files: Vec<_> = fs::read_dir(dir)
        .expect("tests/data/single-step not found - download the 6502/v1 SingleStepTests JSON")
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    for file in files {
        let text = fs::read_to_string(&file).expect("readable test file");
        let cases: Vec<TestCase> = serde_json::from_str(&text).expect("valid test JSON");
        for case in &cases {
            run_case(case);
        }
    }
}
