//! CP/M exerciser runner for ZEXDOC/ZEXALL/8080EX1 `.COM` images.
//!
//! Usage:
//!   cargo run -p emu-test-harness --bin zex --release -- <image.com> [--8080]
//!
//! Output is echoed live; a group summary and JSON report follow.

use std::env;
use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Instant;

use emu_test_harness::{CpmHarness, HarnessResult, Termination};
use intel_8080::Intel8080;
use zilog_z80::Z80;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("usage: zex <image.com> [--8080]");
        return ExitCode::FAILURE;
    };
    let use_8080 = args.iter().any(|a| a == "--8080");

    let image = match std::fs::read(path) {
        Ok(data) => data,
        Err(err) => {
            eprintln!("failed to read {path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    println!("Running {path} ({} bytes) on the {}", image.len(), if use_8080 { "8080" } else { "Z80" });
    let started = Instant::now();

    let mut harness = CpmHarness::new().with_console_callback(|ch| {
        print!("{}", ch as char);
        let _ = io::stdout().flush();
    });

    let result = if use_8080 {
        harness.run(&mut Intel8080::new(), &image)
    } else {
        harness.run(&mut Z80::new(), &image)
    };

    println!();
    report(&result, started);

    if result.termination == Termination::Complete && result.failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn report(result: &HarnessResult, started: Instant) {
    let elapsed = started.elapsed();
    println!(
        "{:?} after {} instructions / {} cycles in {elapsed:.2?}",
        result.termination, result.instructions, result.cycles
    );
    println!(
        "groups: {} passed, {} failed",
        result.passed, result.failed
    );
    for group in result.groups.iter().filter(|g| !g.passed) {
        println!("  FAIL {}", group.line);
    }
    match serde_json::to_string(&result) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("report serialization failed: {err}"),
    }
}
