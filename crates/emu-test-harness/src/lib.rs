//! Deterministic test harnesses for the CPU cores.
//!
//! [`cpm`] presents a minimal CP/M to `.COM` exercisers (ZEXDOC,
//! ZEXALL, 8080EX1) on either the 8080 or the Z80, intercepting the
//! two BDOS console calls and parsing the transcript into pass/fail
//! groups. [`functional`] drives full-image 6502 tests that signal
//! completion with a jump-to-self trap.

pub mod cpm;
pub mod functional;
pub mod transcript;

pub use cpm::{CpmCpu, CpmHarness, HarnessResult};
pub use functional::{FunctionalResult, FunctionalTest};
pub use transcript::{TestGroup, parse_transcript};

use serde::Serialize;

/// Why a harness run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The program reached its completion signal (warm boot or success
    /// trap).
    Complete,
    /// The cycle ceiling was hit.
    CycleLimit,
    /// The instruction ceiling was hit.
    InstructionLimit,
}
