//! Minimal CP/M environment for `.COM` instruction exercisers.
//!
//! Memory layout:
//! - $0000: HALT - the warm-boot trap; a program RETurning to zero is
//!   done
//! - $0005: RET - the BDOS entry; calls are intercepted before it runs
//! - $0006: top-of-TPA word; exercisers read it to place their stack
//! - $0100: the program image
//!
//! Only BDOS functions 2 (console output, character in E) and 9 (print
//! $-terminated string at DE) are implemented; that is all the
//! exercisers use.

use emu_core::{Bus, Cpu, SimpleBus};
use intel_8080::Intel8080;
use serde::Serialize;
use zilog_z80::Z80;

use crate::Termination;
use crate::transcript::{TestGroup, parse_transcript};

/// Warm-boot entry: a return to zero terminates the run.
const WARM_BOOT: u16 = 0x0000;

/// BDOS call gate.
const BDOS_ENTRY: u16 = 0x0005;

/// `.COM` load address (start of the TPA).
const TPA_START: u16 = 0x0100;

/// Value for the top-of-TPA word at $0006.
const TPA_TOP: u16 = 0xFE00;

/// A CPU the CP/M harness can drive: either the 8080 or the Z80.
///
/// The harness needs the BDOS argument registers and control of PC and
/// SP; both cores expose these as inherent accessors.
pub trait CpmCpu: Cpu<SimpleBus> {
    /// The BDOS function number (register C).
    fn bdos_function(&self) -> u8;
    /// The console-output argument (register E).
    fn console_char(&self) -> u8;
    /// The string pointer (register pair DE).
    fn string_pointer(&self) -> u16;
    fn set_pc(&mut self, value: u16);
    fn set_sp(&mut self, value: u16);
}

impl CpmCpu for Intel8080 {
    fn bdos_function(&self) -> u8 {
        self.c()
    }

    fn console_char(&self) -> u8 {
        self.e()
    }

    fn string_pointer(&self) -> u16 {
        self.de()
    }

    fn set_pc(&mut self, value: u16) {
        Intel8080::set_pc(self, value);
    }

    fn set_sp(&mut self, value: u16) {
        Intel8080::set_sp(self, value);
    }
}

impl CpmCpu for Z80 {
    fn bdos_function(&self) -> u8 {
        self.c()
    }

    fn console_char(&self) -> u8 {
        self.e()
    }

    fn string_pointer(&self) -> u16 {
        self.de()
    }

    fn set_pc(&mut self, value: u16) {
        Z80::set_pc(self, value);
    }

    fn set_sp(&mut self, value: u16) {
        Z80::set_sp(self, value);
    }
}

/// Result of one harness run.
#[derive(Debug, Serialize)]
pub struct HarnessResult {
    pub termination: Termination,
    /// Everything the program printed through the BDOS.
    pub output: String,
    /// Per-group verdicts parsed from the transcript.
    pub groups: Vec<TestGroup>,
    pub passed: usize,
    pub failed: usize,
    pub instructions: u64,
    pub cycles: u64,
}

/// Drives a `.COM` exerciser to completion or to a resource ceiling.
pub struct CpmHarness {
    max_cycles: u64,
    max_instructions: u64,
    on_char: Option<Box<dyn FnMut(u8)>>,
}

impl CpmHarness {
    /// Defaults sized for the big exercisers: ZEXALL runs tens of
    /// billions of cycles.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_cycles: 200_000_000_000,
            max_instructions: 20_000_000_000,
            on_char: None,
        }
    }

    #[must_use]
    pub fn with_limits(mut self, max_cycles: u64, max_instructions: u64) -> Self {
        self.max_cycles = max_cycles;
        self.max_instructions = max_instructions;
        self
    }

    /// Install a per-character callback for live console echo.
    #[must_use]
    pub fn with_console_callback(mut self, callback: impl FnMut(u8) + 'static) -> Self {
        self.on_char = Some(Box::new(callback));
        self
    }

    /// Load `com_image` and run `cpu` until warm boot or a ceiling.
    pub fn run<C: CpmCpu>(&mut self, cpu: &mut C, com_image: &[u8]) -> HarnessResult {
        let mut bus = SimpleBus::new();
        bus.load(TPA_START, com_image);
        bus.write(WARM_BOOT, 0x76); // HALT
        bus.write(BDOS_ENTRY, 0xC9); // RET
        bus.load(0x0006, &TPA_TOP.to_le_bytes());

        // Seed the stack so a top-level RET lands on the warm-boot trap.
        cpu.set_sp(0xFFFC);
        bus.load(0xFFFC, &WARM_BOOT.to_le_bytes());
        cpu.set_pc(TPA_START);

        let mut output = String::new();
        let mut instructions: u64 = 0;
        let cycles_start = cpu.cycles();

        let termination = loop {
            let pc = cpu.pc();

            if pc == WARM_BOOT || cpu.is_halted() {
                break Termination::Complete;
            }

            if pc == BDOS_ENTRY {
                self.bdos_call(cpu, &mut bus, &mut output);
                // The RET stub at $0005 then returns to the caller.
            }

            cpu.step(&mut bus);
            instructions += 1;

            if instructions >= self.max_instructions {
                break Termination::InstructionLimit;
            }
            if cpu.cycles() - cycles_start >= self.max_cycles {
                break Termination::CycleLimit;
            }
        };

        let groups = parse_transcript(&output);
        let passed = groups.iter().filter(|g| g.passed).count();
        let failed = groups.len() - passed;
        HarnessResult {
            termination,
            output,
            groups,
            passed,
            failed,
            instructions,
            cycles: cpu.cycles() - cycles_start,
        }
    }

    fn bdos_call<C: CpmCpu>(&mut self, cpu: &C, bus: &mut SimpleBus, output: &mut String) {
        match cpu.bdos_function() {
            2 => {
                let ch = cpu.console_char() & 0x7F;
                self.emit(output, ch);
            }
            9 => {
                // Unlike function 2, string bytes pass through intact:
                // programs set bit 7 for terminal attribute tricks.
                let mut addr = cpu.string_pointer();
                loop {
                    let ch = bus.read(addr);
                    if ch == b'$' {
                        break;
                    }
                    self.emit(output, ch);
                    addr = addr.wrapping_add(1);
                }
            }
            _ => {} // the exercisers use nothing else
        }
    }

    fn emit(&mut self, output: &mut String, ch: u8) {
        output.push(ch as char);
        if let Some(callback) = &mut self.on_char {
            callback(ch);
        }
    }
}

impl Default for CpmHarness {
    fn default() -> Self {
        Self::new()
    }
}
