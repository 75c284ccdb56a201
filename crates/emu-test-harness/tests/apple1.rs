//! Apple-1 Woz Monitor boot scenario.
//!
//! Builds the minimal Apple-1 memory map around [`BankedBus`]: RAM,
//! the monitor ROM at $FF00, and the PIA at $D010-$D013. On reset the
//! monitor clears the screen and prints its backslash prompt, then
//! polls the keyboard at $FF29.
//!
//! Needs `tests/data/wozmon.bin` (256 bytes); run with `--ignored`.

use emu_core::{BankedBus, Bus, Cpu};
use mos_6502::Mos6502;

/// Keyboard data register.
const KBD: u16 = 0xD010;
/// Keyboard control register - bit 7 is the key-ready strobe.
const KBD_CR: u16 = 0xD011;
/// Display data register - bit 7 reads as 0 when ready.
const DSP: u16 = 0xD012;
/// Display control register.
const DSP_CR: u16 = 0xD013;

/// RAM + ROM + PIA, with a display capture buffer.
struct Apple1Bus {
    memory: BankedBus,
    displayed: Vec<u8>,
}

impl Apple1Bus {
    fn new(monitor_rom: &[u8]) -> Self {
        let mut memory = BankedBus::new();
        memory.map_rom(0xFF00, monitor_rom);
        Self {
            memory,
            displayed: Vec::new(),
        }
    }
}

impl Bus for Apple1Bus {
    fn read(&mut self, address: u16) -> u8 {
        match address {
            KBD => 0x80,    // no key, high bit always set
            KBD_CR => 0x00, // no key ready
            DSP => 0x00,    // display always ready
            DSP_CR => 0x00,
            _ => self.memory.read(address),
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        if address == DSP {
            self.displayed.push(value & 0x7F);
        } else {
            self.memory.write(address, value);
        }
    }
}

#[test]
#[ignore]
fn woz_monitor_prints_the_backslash_prompt() {
    let rom = std::fs::read("tests/data/wozmon.bin")
        .expect("tests/data/wozmon.bin not found (256-byte Woz Monitor image)");
    assert_eq!(rom.len(), 256);

    let mut bus = Apple1Bus::new(&rom);
    let mut cpu = Mos6502::new();
    cpu.reset(&mut bus);

    // Step until the monitor settles into its keyboard poll loop.
    let mut in_poll_loop = false;
    for _ in 0..100_000 {
        cpu.step(&mut bus);
        if Cpu::<Apple1Bus>::pc(&cpu) == 0xFF29 {
            in_poll_loop = true;
            break;
        }
    }
    assert!(in_poll_loop, "monitor never reached the keyboard poll");

    // The prompt is a backslash followed by a carriage return.
    assert!(
        bus.displayed.windows(2).any(|w| w == [0x5C, 0x0D]),
        "display capture {:02X?} lacks the \\ prompt",
        bus.displayed
    );
}
