//! Operand fetch, stack access, and addressing-mode resolution.
//!
//! Read-flavored resolution reports page crossings so the caller can add
//! the one-cycle penalty; write-flavored resolution does not, because the
//! base cycle counts for stores and read-modify-write instructions
//! already include the unconditional extra access.

use emu_core::Bus;

use crate::Mos6502;
use crate::opcodes::Mode;

impl Mos6502 {
    /// Fetch the next byte at PC and increment PC.
    pub(crate) fn fetch(&mut self, bus: &mut impl Bus) -> u8 {
        let value = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    /// Fetch a little-endian word at PC.
    pub(crate) fn fetch_word(&mut self, bus: &mut impl Bus) -> u16 {
        let low = self.fetch(bus);
        let high = self.fetch(bus);
        u16::from_le_bytes([low, high])
    }

    /// Read a little-endian word from memory.
    pub(crate) fn read_word(&mut self, bus: &mut impl Bus, addr: u16) -> u16 {
        let low = bus.read(addr);
        let high = bus.read(addr.wrapping_add(1));
        u16::from_le_bytes([low, high])
    }

    /// Read a word honoring the JMP indirect page-boundary bug: if the
    /// pointer sits at $xxFF, the high byte is fetched from $xx00 of the
    /// same page rather than the next.
    pub(crate) fn read_word_page_bug(&mut self, bus: &mut impl Bus, addr: u16) -> u16 {
        let low = bus.read(addr);
        let high_addr = (addr & 0xFF00) | (addr.wrapping_add(1) & 0x00FF);
        let high = bus.read(high_addr);
        u16::from_le_bytes([low, high])
    }

    /// Push a byte onto the page-one stack.
    pub fn push(&mut self, bus: &mut impl Bus, value: u8) {
        bus.write(0x0100 | u16::from(self.sp), value);
        self.sp = self.sp.wrapping_sub(1);
    }

    /// Pull a byte from the page-one stack.
    pub fn pull(&mut self, bus: &mut impl Bus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read(0x0100 | u16::from(self.sp))
    }

    /// Push a word, high byte first.
    pub fn push_word(&mut self, bus: &mut impl Bus, value: u16) {
        self.push(bus, (value >> 8) as u8);
        self.push(bus, value as u8);
    }

    /// Pull a word, low byte first.
    pub fn pull_word(&mut self, bus: &mut impl Bus) -> u16 {
        let low = self.pull(bus);
        let high = self.pull(bus);
        u16::from_le_bytes([low, high])
    }

    /// Resolve a read-flavored operand address. Returns the address and
    /// the page-cross penalty (0 or 1 cycles).
    pub(crate) fn read_addr(&mut self, bus: &mut impl Bus, mode: Mode) -> (u16, u32) {
        match mode {
            Mode::ZeroPage => (u16::from(self.fetch(bus)), 0),
            Mode::ZeroPageX => {
                let base = self.fetch(bus);
                (u16::from(base.wrapping_add(self.x)), 0)
            }
            Mode::ZeroPageY => {
                let base = self.fetch(bus);
                (u16::from(base.wrapping_add(self.y)), 0)
            }
            Mode::Absolute => (self.fetch_word(bus), 0),
            Mode::AbsoluteX => {
                let base = self.fetch_word(bus);
                let addr = base.wrapping_add(u16::from(self.x));
                (addr, page_cross(base, addr))
            }
            Mode::AbsoluteY => {
                let base = self.fetch_word(bus);
                let addr = base.wrapping_add(u16::from(self.y));
                (addr, page_cross(base, addr))
            }
            Mode::IndexedIndirectX => {
                let ptr = self.fetch(bus).wrapping_add(self.x);
                (self.read_zp_word(bus, ptr), 0)
            }
            Mode::IndirectIndexedY => {
                let ptr = self.fetch(bus);
                let base = self.read_zp_word(bus, ptr);
                let addr = base.wrapping_add(u16::from(self.y));
                (addr, page_cross(base, addr))
            }
            _ => unreachable!("no memory operand for {mode:?}"),
        }
    }

    /// Resolve a write-flavored operand address. The extra access for
    /// indexed stores is part of the base cycle count, so no penalty is
    /// reported.
    pub(crate) fn write_addr(&mut self, bus: &mut impl Bus, mode: Mode) -> u16 {
        let (addr, _) = self.read_addr(bus, mode);
        addr
    }

    /// Read a pointer from the zero page, wrapping within it.
    fn read_zp_word(&mut self, bus: &mut impl Bus, ptr: u8) -> u16 {
        let low = bus.read(u16::from(ptr));
        let high = bus.read(u16::from(ptr.wrapping_add(1)));
        u16::from_le_bytes([low, high])
    }

    /// Fetch the branch displacement and conditionally take the branch.
    /// Returns the extra cycles: 1 for taken, 2 for taken across a page.
    pub(crate) fn branch_if(&mut self, bus: &mut impl Bus, condition: bool) -> u32 {
        let offset = self.fetch(bus) as i8;
        if !condition {
            return 0;
        }
        let target = self.pc.wrapping_add(offset as u16);
        let crossed = page_cross(self.pc, target);
        self.pc = target;
        1 + crossed
    }
}

fn page_cross(a: u16, b: u16) -> u32 {
    u32::from(a & 0xFF00 != b & 0xFF00)
}
