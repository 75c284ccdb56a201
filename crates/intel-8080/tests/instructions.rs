//! Unit tests for individual 8080 instructions.

use emu_core::{Cpu, SimpleBus};
use intel_8080::Intel8080;
use intel_8080::flags::{AC, CY, PF, SF, ZF};

fn cpu_with(program: &[u8]) -> (Intel8080, SimpleBus) {
    let mut bus = SimpleBus::new();
    bus.load(0x0100, program);
    let mut cpu = Intel8080::new();
    cpu.set_pc(0x0100);
    (cpu, bus)
}

#[test]
fn mvi_and_mov() {
    // MVI B, $12; MOV A, B
    let (mut cpu, mut bus) = cpu_with(&[0x06, 0x12, 0x78]);
    assert_eq!(cpu.step(&mut bus), 7);
    assert_eq!(cpu.b(), 0x12);
    assert_eq!(cpu.step(&mut bus), 5);
    assert_eq!(cpu.a(), 0x12);
}

#[test]
fn mov_through_memory_costs_seven() {
    // LXI H, $2000; MVI M, $AA; MOV A, M
    let (mut cpu, mut bus) = cpu_with(&[0x21, 0x00, 0x20, 0x36, 0xAA, 0x7E]);
    cpu.step(&mut bus);
    assert_eq!(cpu.step(&mut bus), 10);
    assert_eq!(bus.peek(0x2000), 0xAA);
    assert_eq!(cpu.step(&mut bus), 7);
    assert_eq!(cpu.a(), 0xAA);
}

#[test]
fn add_sets_all_flags() {
    // ADD B with A=$2E, B=$6C: result $9A, AC and P set.
    let (mut cpu, mut bus) = cpu_with(&[0x80]);
    cpu.set_a(0x2E);
    cpu.set_bc(0x6C00);
    cpu.step(&mut bus);
    assert_eq!(cpu.a(), 0x9A);
    let f = cpu.f();
    assert_ne!(f & SF, 0);
    assert_eq!(f & ZF, 0);
    assert_ne!(f & AC, 0);
    assert_eq!(f & CY, 0);
}

#[test]
fn sub_aux_carry_uses_internal_addition() {
    // SUB B with A=$10, B=$01: borrow out of the low nibble, so the
    // 8080 clears AC (the Z80 would set H here).
    let (mut cpu, mut bus) = cpu_with(&[0x90]);
    cpu.set_a(0x10);
    cpu.set_bc(0x0100);
    cpu.step(&mut bus);
    assert_eq!(cpu.a(), 0x0F);
    assert_eq!(cpu.f() & AC, 0);
    assert_eq!(cpu.f() & CY, 0);

    // SUB B with A=$10, B=$10: no nibble borrow, AC reads set.
    let (mut cpu, mut bus) = cpu_with(&[0x90]);
    cpu.set_a(0x10);
    cpu.set_bc(0x1000);
    cpu.step(&mut bus);
    assert_eq!(cpu.a(), 0x00);
    assert_ne!(cpu.f() & AC, 0);
    assert_ne!(cpu.f() & ZF, 0);
}

#[test]
fn sub_borrow_sets_carry() {
    let (mut cpu, mut bus) = cpu_with(&[0x90]); // SUB B
    cpu.set_a(0x00);
    cpu.set_bc(0x0100);
    cpu.step(&mut bus);
    assert_eq!(cpu.a(), 0xFF);
    assert_ne!(cpu.f() & CY, 0);
}

#[test]
fn ana_aux_carry_from_operand_bit3() {
    // ANA B: AC = bit 3 of (A | B).
    let (mut cpu, mut bus) = cpu_with(&[0xA0]);
    cpu.set_a(0xF0);
    cpu.set_bc(0x0800);
    cpu.step(&mut bus);
    assert_ne!(cpu.f() & AC, 0);
    assert_eq!(cpu.a(), 0x00);
    assert_ne!(cpu.f() & ZF, 0);

    let (mut cpu, mut bus) = cpu_with(&[0xA0]);
    cpu.set_a(0xF0);
    cpu.set_bc(0x0700);
    cpu.step(&mut bus);
    assert_eq!(cpu.f() & AC, 0);
}

#[test]
fn daa_adjusts_bcd_sum() {
    // 15 + 27 = 42 BCD: ADI $27 then DAA.
    let (mut cpu, mut bus) = cpu_with(&[0xC6, 0x27, 0x27]);
    cpu.set_a(0x15);
    cpu.step(&mut bus);
    assert_eq!(cpu.a(), 0x3C);
    cpu.step(&mut bus);
    assert_eq!(cpu.a(), 0x42);
    assert_eq!(cpu.f() & CY, 0);
}

#[test]
fn daa_carries_out_of_99() {
    // 99 + 01: DAA leaves 00 with carry.
    let (mut cpu, mut bus) = cpu_with(&[0xC6, 0x01, 0x27]);
    cpu.set_a(0x99);
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    assert_eq!(cpu.a(), 0x00);
    assert_ne!(cpu.f() & CY, 0);
    assert_ne!(cpu.f() & ZF, 0);
}

#[test]
fn inr_dcr_preserve_carry() {
    // STC; INR B; DCR B
    let (mut cpu, mut bus) = cpu_with(&[0x37, 0x04, 0x05]);
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    assert_ne!(cpu.f() & CY, 0, "INR must not touch CY");
    cpu.step(&mut bus);
    assert_ne!(cpu.f() & CY, 0, "DCR must not touch CY");
    assert_ne!(cpu.f() & ZF, 0);
}

#[test]
fn rotate_instructions_only_touch_carry() {
    // RLC with A=$81: A becomes $03, CY set.
    let (mut cpu, mut bus) = cpu_with(&[0x07]);
    cpu.set_a(0x81);
    cpu.step(&mut bus);
    assert_eq!(cpu.a(), 0x03);
    assert_ne!(cpu.f() & CY, 0);

    // RAR with A=$01, CY set: A becomes $80, CY set again.
    let (mut cpu, mut bus) = cpu_with(&[0x37, 0x1F]);
    cpu.set_a(0x01);
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    assert_eq!(cpu.a(), 0x80);
    assert_ne!(cpu.f() & CY, 0);
}

#[test]
fn dad_sets_only_carry() {
    // LXI H, $F000; LXI B, $2000; DAD B
    let (mut cpu, mut bus) = cpu_with(&[0x21, 0x00, 0xF0, 0x01, 0x00, 0x20, 0x09]);
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    assert_eq!(cpu.step(&mut bus), 10);
    assert_eq!(cpu.hl(), 0x1000);
    assert_ne!(cpu.f() & CY, 0);
}

#[test]
fn conditional_call_and_return_timing() {
    // CNZ taken costs 17, not taken 11.
    let (mut cpu, mut bus) = cpu_with(&[0xC4, 0x00, 0x20]);
    cpu.set_sp(0xFF00);
    assert_eq!(cpu.step(&mut bus), 17);
    assert_eq!(Cpu::<SimpleBus>::pc(&cpu), 0x2000);

    let (mut cpu, mut bus) = cpu_with(&[0xAF, 0xC4, 0x00, 0x20]); // XRA A sets Z
    cpu.set_sp(0xFF00);
    cpu.step(&mut bus);
    assert_eq!(cpu.step(&mut bus), 11);
    assert_eq!(Cpu::<SimpleBus>::pc(&cpu), 0x0104);

    // RZ taken costs 11, not taken 5.
    let (mut cpu, mut bus) = cpu_with(&[0xAF, 0xC8]);
    cpu.set_sp(0xFF00);
    bus.load(0xFF00, &[0x34, 0x12]);
    cpu.step(&mut bus);
    assert_eq!(cpu.step(&mut bus), 11);
    assert_eq!(Cpu::<SimpleBus>::pc(&cpu), 0x1234);

    let (mut cpu, mut bus) = cpu_with(&[0x3E, 0x01, 0xC8]); // MVI A,1 clears nothing
    cpu.set_sp(0xFF00);
    cpu.step(&mut bus);
    // Z is clear after reset; RZ falls through.
    assert_eq!(cpu.step(&mut bus), 5);
}

#[test]
fn push_pop_psw_masks_flag_byte() {
    // PUSH PSW; POP PSW with everything set: bits 3/5 come back 0,
    // bit 1 comes back 1.
    let (mut cpu, mut bus) = cpu_with(&[0xF5, 0xF1]);
    cpu.set_sp(0xFF00);
    cpu.set_a(0x12);
    cpu.set_f(0xFF);
    cpu.step(&mut bus);
    let pushed_f = bus.peek(0xFEFE);
    assert_eq!(pushed_f & 0x2A, 0x02, "pushed F has 1/0/0 in bits 1/3/5");
    cpu.set_f(0x00);
    cpu.step(&mut bus);
    assert_eq!(cpu.f() & 0x2A, 0x02);
    assert_eq!(cpu.af() >> 8, 0x12);
}

#[test]
fn xthl_swaps_stack_top() {
    let (mut cpu, mut bus) = cpu_with(&[0xE3]);
    cpu.set_sp(0x8000);
    cpu.set_hl(0x1234);
    bus.load(0x8000, &[0x78, 0x56]);
    assert_eq!(cpu.step(&mut bus), 18);
    assert_eq!(cpu.hl(), 0x5678);
    assert_eq!(bus.peek(0x8000), 0x34);
    assert_eq!(bus.peek(0x8001), 0x12);
}

#[test]
fn hlt_latches_until_interrupt() {
    let (mut cpu, mut bus) = cpu_with(&[0xFB, 0x76]); // EI; HLT
    cpu.set_sp(0xFF00);
    cpu.step(&mut bus);
    assert_eq!(cpu.step(&mut bus), 7);
    assert!(Cpu::<SimpleBus>::is_halted(&cpu));
    let pc = Cpu::<SimpleBus>::pc(&cpu);
    assert_eq!(cpu.step(&mut bus), 4, "halted step idles for 4 states");
    assert_eq!(Cpu::<SimpleBus>::pc(&cpu), pc);

    assert!(cpu.irq(&mut bus, 2));
    assert!(!Cpu::<SimpleBus>::is_halted(&cpu));
    assert_eq!(Cpu::<SimpleBus>::pc(&cpu), 0x0010);
    assert!(!cpu.interrupts_enabled(), "acceptance clears INTE");
    // The pushed return address is the instruction after HLT.
    assert_eq!(bus.peek(0xFEFE), 0x02);
    assert_eq!(bus.peek(0xFEFF), 0x01);
}

#[test]
fn irq_refused_while_disabled() {
    let (mut cpu, mut bus) = cpu_with(&[0x00]);
    assert!(!cpu.irq(&mut bus, 3));
    assert_eq!(Cpu::<SimpleBus>::pc(&cpu), 0x0100);
}

#[test]
fn undocumented_aliases() {
    // $CB decodes as JMP.
    let (mut cpu, mut bus) = cpu_with(&[0xCB, 0x00, 0x30]);
    assert_eq!(cpu.step(&mut bus), 10);
    assert_eq!(Cpu::<SimpleBus>::pc(&cpu), 0x3000);

    // $D9 decodes as RET.
    let (mut cpu, mut bus) = cpu_with(&[0xD9]);
    cpu.set_sp(0xFF00);
    bus.load(0xFF00, &[0x00, 0x40]);
    cpu.step(&mut bus);
    assert_eq!(Cpu::<SimpleBus>::pc(&cpu), 0x4000);

    // $ED decodes as CALL.
    let (mut cpu, mut bus) = cpu_with(&[0xED, 0x00, 0x50]);
    cpu.set_sp(0xFF00);
    assert_eq!(cpu.step(&mut bus), 17);
    assert_eq!(Cpu::<SimpleBus>::pc(&cpu), 0x5000);

    // $08 is a NOP.
    let (mut cpu, mut bus) = cpu_with(&[0x08]);
    assert_eq!(cpu.step(&mut bus), 4);
    assert_eq!(Cpu::<SimpleBus>::pc(&cpu), 0x0101);
}

#[test]
fn rst_vectors() {
    let (mut cpu, mut bus) = cpu_with(&[0xEF]); // RST 5
    cpu.set_sp(0xFF00);
    assert_eq!(cpu.step(&mut bus), 11);
    assert_eq!(Cpu::<SimpleBus>::pc(&cpu), 0x0028);
}

#[test]
fn parity_flag() {
    // MVI does not touch flags; ORA A refreshes them from A.
    let (mut cpu, mut bus) = cpu_with(&[0x3E, 0x03, 0xB7]); // MVI A,$03; ORA A
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    assert_ne!(cpu.f() & PF, 0, "two bits set is even parity");

    let (mut cpu, mut bus) = cpu_with(&[0x3E, 0x07, 0xB7]);
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    assert_eq!(cpu.f() & PF, 0, "three bits set is odd parity");
}

#[test]
fn reset_returns_to_power_on_state() {
    let (mut cpu, mut bus) = cpu_with(&[0x3E, 0x55, 0xFB]);
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    cpu.reset(&mut bus);
    assert_eq!(Cpu::<SimpleBus>::pc(&cpu), 0);
    assert_eq!(cpu.a(), 0);
    assert_eq!(cpu.f(), 0x02);
    assert!(!cpu.interrupts_enabled());
}
