//! Core traits and types for 8-bit machine emulation.
//!
//! A CPU core executes instructions against a [`Bus`] (memory) and, for
//! port-I/O machines, an [`IoBus`]. The CPU borrows the bus for the
//! duration of each `step()`; between steps the host is free to mutate
//! memory, inject interrupts, or observe CPU state.

mod bus;
mod cpu;
mod io_bus;

pub use bus::{BankedBus, Bus, SimpleBus};
pub use cpu::Cpu;
pub use io_bus::IoBus;
