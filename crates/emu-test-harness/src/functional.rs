//! Full-image 6502 functional-test harness.
//!
//! Klaus Dormann style tests load as a complete 64 KiB image and
//! signal completion by branching to themselves. The harness watches
//! for a program counter that fails to advance and compares the trap
//! address against the expected success location.

use emu_core::{Cpu, SimpleBus};
use mos_6502::Mos6502;
use serde::Serialize;

use crate::Termination;

/// Result of one functional-test run.
#[derive(Debug, Serialize)]
pub struct FunctionalResult {
    pub termination: Termination,
    /// Where the program trapped, when it did.
    pub trap_address: Option<u16>,
    /// True when the trap is the success address.
    pub passed: bool,
    pub instructions: u64,
    pub cycles: u64,
}

/// Runs a 64 KiB self-trapping test image on the 6502.
pub struct FunctionalTest {
    entry: u16,
    success_address: u16,
    max_cycles: u64,
    max_instructions: u64,
}

impl FunctionalTest {
    /// Limits default to what the full functional test needs with
    /// headroom: 200M cycles / 100M instructions.
    #[must_use]
    pub fn new(entry: u16, success_address: u16) -> Self {
        Self {
            entry,
            success_address,
            max_cycles: 200_000_000,
            max_instructions: 100_000_000,
        }
    }

    #[must_use]
    pub fn with_limits(mut self, max_cycles: u64, max_instructions: u64) -> Self {
        self.max_cycles = max_cycles;
        self.max_instructions = max_instructions;
        self
    }

    /// Load `image` at $0000 and run until a self-jump trap or a
    /// ceiling. The image carries its own vectors.
    #[must_use]
    pub fn run(&self, image: &[u8]) -> FunctionalResult {
        let mut bus = SimpleBus::new();
        bus.load(0x0000, image);

        let mut cpu = Mos6502::new();
        cpu.set_pc(self.entry);

        let mut instructions: u64 = 0;

        loop {
            let before = Cpu::<SimpleBus>::pc(&cpu);
            cpu.step(&mut bus);
            instructions += 1;

            if Cpu::<SimpleBus>::pc(&cpu) == before {
                // Jump-to-self: the test is telling us something.
                return FunctionalResult {
                    termination: Termination::Complete,
                    trap_address: Some(before),
                    passed: before == self.success_address,
                    instructions,
                    cycles: Cpu::<SimpleBus>::cycles(&cpu),
                };
            }

            if instructions >= self.max_instructions {
                return FunctionalResult {
                    termination: Termination::InstructionLimit,
                    trap_address: None,
                    passed: false,
                    instructions,
                    cycles: Cpu::<SimpleBus>::cycles(&cpu),
                };
            }
            if Cpu::<SimpleBus>::cycles(&cpu) >= self.max_cycles {
                return FunctionalResult {
                    termination: Termination::CycleLimit,
                    trap_address: None,
                    passed: false,
                    instructions,
                    cycles: Cpu::<SimpleBus>::cycles(&cpu),
                };
            }
        }
    }
}
