//! Klaus Dormann 6502 functional-test runner.
//!
//! Usage:
//!   cargo run -p emu-test-harness --bin dormann --release -- <image> [success-addr-hex]
//!
//! The image is the functional test assembled at $0000, as a raw 64 KiB
//! binary or any text format the loader understands (Intel HEX, hex
//! dump). The standard build enters at $0400 and traps at $3469 on
//! success.

use std::env;
use std::process::ExitCode;
use std::time::Instant;

use emu_test_harness::{FunctionalTest, Termination};
use format_loader::{Format, LoadOptions};

const ENTRY: u16 = 0x0400;
const SUCCESS_TRAP: u16 = 0x3469;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("usage: dormann <image.bin> [success-addr-hex]");
        return ExitCode::FAILURE;
    };
    let success_address = match args.get(2) {
        Some(text) => match u16::from_str_radix(text.trim_start_matches('$'), 16) {
            Ok(addr) => addr,
            Err(err) => {
                eprintln!("bad success address {text}: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => SUCCESS_TRAP,
    };

    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(err) => {
            eprintln!("failed to read {path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    // The test assembles at $0000, so a raw blob loads there verbatim;
    // text formats carry their own addresses.
    let options = LoadOptions {
        load_address: Some(0x0000),
        ..Default::default()
    };
    let program = match format_loader::parse(&data, &options) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("failed to decode {path}: {err}");
            return ExitCode::FAILURE;
        }
    };
    if program.format == Format::BasicListing {
        eprintln!("{path} decodes as a BASIC listing, not a test image");
        return ExitCode::FAILURE;
    }
    let mut image = vec![0u8; 0x10000];
    for region in &program.regions {
        let start = region.start as usize;
        let end = (start + region.bytes.len()).min(image.len());
        image[start..end].copy_from_slice(&region.bytes[..end - start]);
    }

    println!("Running {path} ({} bytes), success trap ${success_address:04X}", program.size_bytes);
    let started = Instant::now();
    let result = FunctionalTest::new(ENTRY, success_address).run(&image);
    let elapsed = started.elapsed();

    match result.termination {
        Termination::Complete => {
            if result.passed {
                println!(
                    "PASS: trapped at ${:04X} after {} instructions ({} cycles) in {elapsed:.2?}",
                    success_address, result.instructions, result.cycles
                );
                ExitCode::SUCCESS
            } else {
                println!(
                    "FAIL: trapped at ${:04X} after {} instructions",
                    result.trap_address.unwrap_or(0),
                    result.instructions
                );
                ExitCode::FAILURE
            }
        }
        other => {
            println!("FAIL: {other:?} after {} instructions", result.instructions);
            ExitCode::FAILURE
        }
    }
}
