//! Instruction execution for the Z80.
//!
//! `execute()` runs a short prefix loop: DD/FD bytes accumulate (last
//! one wins, 4 cycles each) before the final opcode dispatches through
//! the matching table. R advances on every M1 fetch, prefix bytes
//! included; the displacement and sub-opcode of DD CB sequences are
//! plain reads and do not touch R.

use emu_core::{Bus, IoBus};

use crate::Z80;
use crate::alu;
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, sz53, sz53p};

impl Z80 {
    /// Fetch an opcode byte: advances R, then PC.
    fn fetch_opcode(&mut self, bus: &mut impl Bus) -> u8 {
        self.regs.refresh();
        self.fetch(bus)
    }

    /// Fetch an operand byte at PC.
    fn fetch(&mut self, bus: &mut impl Bus) -> u8 {
        let value = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    fn fetch_word(&mut self, bus: &mut impl Bus) -> u16 {
        let low = self.fetch(bus);
        let high = self.fetch(bus);
        u16::from_le_bytes([low, high])
    }

    pub(crate) fn read_word(&mut self, bus: &mut impl Bus, addr: u16) -> u16 {
        let low = bus.read(addr);
        let high = bus.read(addr.wrapping_add(1));
        u16::from_le_bytes([low, high])
    }

    fn write_word(&mut self, bus: &mut impl Bus, addr: u16, value: u16) {
        bus.write(addr, value as u8);
        bus.write(addr.wrapping_add(1), (value >> 8) as u8);
    }

    pub(crate) fn push_word(&mut self, bus: &mut impl Bus, value: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(2);
        self.write_word(bus, self.regs.sp, value);
    }

    fn pop_word(&mut self, bus: &mut impl Bus) -> u16 {
        let value = self.read_word(bus, self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(2);
        value
    }

    /// Register by octal index: B C D E H L (HL) A.
    fn get_reg(&mut self, bus: &mut impl Bus, index: u8) -> u8 {
        match index {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => self.regs.h,
            5 => self.regs.l,
            6 => bus.read(self.regs.hl()),
            _ => self.regs.a,
        }
    }

    fn set_reg(&mut self, bus: &mut impl Bus, index: u8, value: u8) {
        match index {
            0 => self.regs.b = value,
            1 => self.regs.c = value,
            2 => self.regs.d = value,
            3 => self.regs.e = value,
            4 => self.regs.h = value,
            5 => self.regs.l = value,
            6 => bus.write(self.regs.hl(), value),
            _ => self.regs.a = value,
        }
    }

    /// Register pair by index: BC DE HL SP.
    fn get_pair(&self, index: u8) -> u16 {
        match index {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.regs.hl(),
            _ => self.regs.sp,
        }
    }

    fn set_pair(&mut self, index: u8, value: u16) {
        match index {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.regs.set_hl(value),
            _ => self.regs.sp = value,
        }
    }

    /// Condition by index: NZ Z NC C PO PE P M.
    fn condition(&self, index: u8) -> bool {
        let f = self.regs.f;
        match index {
            0 => f & ZF == 0,
            1 => f & ZF != 0,
            2 => f & CF == 0,
            3 => f & CF != 0,
            4 => f & PF == 0,
            5 => f & PF != 0,
            6 => f & SF == 0,
            _ => f & SF != 0,
        }
    }

    /// ALU operation against A by octal index:
    /// ADD ADC SUB SBC AND XOR OR CP.
    fn alu_a(&mut self, index: u8, value: u8) {
        let a = self.regs.a;
        let carry = self.regs.f & CF != 0;
        let result = match index {
            0 => alu::add8(a, value, false),
            1 => alu::add8(a, value, carry),
            2 => alu::sub8(a, value, false),
            3 => alu::sub8(a, value, carry),
            4 => alu::and8(a, value),
            5 => alu::xor8(a, value),
            6 => alu::or8(a, value),
            _ => alu::cp8(a, value),
        };
        if index != 7 {
            self.regs.a = result.value;
        }
        self.regs.f = result.flags;
    }

    /// CB-group rotate/shift by octal index:
    /// RLC RRC RL RR SLA SRA SLL SRL.
    fn rotate_op(&mut self, index: u8, value: u8) -> u8 {
        let carry = self.regs.f & CF != 0;
        let result = match index {
            0 => alu::rlc8(value),
            1 => alu::rrc8(value),
            2 => alu::rl8(value, carry),
            3 => alu::rr8(value, carry),
            4 => alu::sla8(value),
            5 => alu::sra8(value),
            6 => alu::sll8(value),
            _ => alu::srl8(value),
        };
        self.regs.f = result.flags;
        result.value
    }

    /// BIT test flags: Z/PV from the tested bit, S only for bit 7,
    /// X/Y from the examined value, H set, N clear, C preserved.
    fn bit_flags(&mut self, bit: u8, value: u8) {
        let mut f = (self.regs.f & CF) | HF | (value & (XF | YF));
        if value & (1 << bit) == 0 {
            f |= ZF | PF;
        } else if bit == 7 {
            f |= SF;
        }
        self.regs.f = f;
    }

    fn index_addr(&mut self, bus: &mut impl Bus, iy: bool) -> u16 {
        let d = self.fetch(bus) as i8;
        let base = if iy { self.regs.iy } else { self.regs.ix };
        base.wrapping_add(d as u16)
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    pub(crate) fn execute(&mut self, bus: &mut impl IoBus) -> u32 {
        let mut prefix_cycles = 0;
        let mut index = None;
        let op = loop {
            let op = self.fetch_opcode(bus);
            match op {
                0xDD => {
                    index = Some(false);
                    prefix_cycles += 4;
                }
                0xFD => {
                    index = Some(true);
                    prefix_cycles += 4;
                }
                _ => break op,
            }
        };

        prefix_cycles
            + match (op, index) {
                (0xCB, None) => self.execute_cb(bus),
                (0xCB, Some(iy)) => self.execute_index_cb(bus, iy),
                (0xED, _) => self.execute_ed(bus),
                (_, None) => self.execute_main(bus, op),
                (_, Some(iy)) => self.execute_index(bus, op, iy),
            }
    }

    // =========================================================================
    // Base table
    // =========================================================================

    fn execute_main(&mut self, bus: &mut impl IoBus, op: u8) -> u32 {
        match op {
            // NOP
            0x00 => 4,

            // LD rr, nn
            0x01 | 0x11 | 0x21 | 0x31 => {
                let value = self.fetch_word(bus);
                self.set_pair((op >> 4) & 3, value);
                10
            }

            // LD (BC)/(DE), A and back
            0x02 => {
                bus.write(self.regs.bc(), self.regs.a);
                7
            }
            0x12 => {
                bus.write(self.regs.de(), self.regs.a);
                7
            }
            0x0A => {
                self.regs.a = bus.read(self.regs.bc());
                7
            }
            0x1A => {
                self.regs.a = bus.read(self.regs.de());
                7
            }

            // INC rr / DEC rr - no flags
            0x03 | 0x13 | 0x23 | 0x33 => {
                let rp = (op >> 4) & 3;
                self.set_pair(rp, self.get_pair(rp).wrapping_add(1));
                6
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                let rp = (op >> 4) & 3;
                self.set_pair(rp, self.get_pair(rp).wrapping_sub(1));
                6
            }

            // INC r / DEC r - carry preserved
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                let r = (op >> 3) & 7;
                let result = alu::inc8(self.get_reg(bus, r));
                self.set_reg(bus, r, result.value);
                self.regs.f = (self.regs.f & CF) | result.flags;
                if r == 6 { 11 } else { 4 }
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                let r = (op >> 3) & 7;
                let result = alu::dec8(self.get_reg(bus, r));
                self.set_reg(bus, r, result.value);
                self.regs.f = (self.regs.f & CF) | result.flags;
                if r == 6 { 11 } else { 4 }
            }

            // LD r, n
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                let r = (op >> 3) & 7;
                let value = self.fetch(bus);
                self.set_reg(bus, r, value);
                if r == 6 { 10 } else { 7 }
            }

            // Accumulator rotates - S/Z/PV preserved
            0x07 => {
                // RLCA
                let carry = self.regs.a >> 7;
                self.regs.a = self.regs.a.rotate_left(1);
                self.regs.f =
                    (self.regs.f & (SF | ZF | PF)) | (self.regs.a & (YF | XF)) | carry;
                4
            }
            0x0F => {
                // RRCA
                let carry = self.regs.a & 1;
                self.regs.a = self.regs.a.rotate_right(1);
                self.regs.f =
                    (self.regs.f & (SF | ZF | PF)) | (self.regs.a & (YF | XF)) | carry;
                4
            }
            0x17 => {
                // RLA
                let old_carry = self.regs.f & CF;
                let carry = self.regs.a >> 7;
                self.regs.a = (self.regs.a << 1) | old_carry;
                self.regs.f =
                    (self.regs.f & (SF | ZF | PF)) | (self.regs.a & (YF | XF)) | carry;
                4
            }
            0x1F => {
                // RRA
                let old_carry = self.regs.f & CF;
                let carry = self.regs.a & 1;
                self.regs.a = (self.regs.a >> 1) | (old_carry << 7);
                self.regs.f =
                    (self.regs.f & (SF | ZF | PF)) | (self.regs.a & (YF | XF)) | carry;
                4
            }

            // EX AF, AF'
            0x08 => {
                self.regs.exchange_af();
                4
            }

            // ADD HL, rr - S/Z/PV preserved
            0x09 | 0x19 | 0x29 | 0x39 => {
                let (value, flags) = alu::add16(self.regs.hl(), self.get_pair((op >> 4) & 3));
                self.regs.set_hl(value);
                self.regs.f = (self.regs.f & (SF | ZF | PF)) | flags;
                11
            }

            // DJNZ d
            0x10 => {
                let d = self.fetch(bus) as i8;
                self.regs.b = self.regs.b.wrapping_sub(1);
                if self.regs.b != 0 {
                    self.regs.pc = self.regs.pc.wrapping_add(d as u16);
                    13
                } else {
                    8
                }
            }

            // JR d
            0x18 => {
                let d = self.fetch(bus) as i8;
                self.regs.pc = self.regs.pc.wrapping_add(d as u16);
                12
            }

            // JR cc, d (NZ Z NC C)
            0x20 | 0x28 | 0x30 | 0x38 => {
                let d = self.fetch(bus) as i8;
                if self.condition((op >> 3) & 3) {
                    self.regs.pc = self.regs.pc.wrapping_add(d as u16);
                    12
                } else {
                    7
                }
            }

            // LD (nn),HL / LD HL,(nn) / LD (nn),A / LD A,(nn)
            0x22 => {
                let addr = self.fetch_word(bus);
                self.write_word(bus, addr, self.regs.hl());
                16
            }
            0x2A => {
                let addr = self.fetch_word(bus);
                let value = self.read_word(bus, addr);
                self.regs.set_hl(value);
                16
            }
            0x32 => {
                let addr = self.fetch_word(bus);
                bus.write(addr, self.regs.a);
                13
            }
            0x3A => {
                let addr = self.fetch_word(bus);
                self.regs.a = bus.read(addr);
                13
            }

            // DAA / CPL / SCF / CCF
            0x27 => {
                let result = alu::daa(self.regs.a, self.regs.f);
                self.regs.a = result.value;
                self.regs.f = result.flags;
                4
            }
            0x2F => {
                self.regs.a = !self.regs.a;
                self.regs.f = (self.regs.f & (SF | ZF | PF | CF))
                    | HF
                    | NF
                    | (self.regs.a & (YF | XF));
                4
            }
            0x37 => {
                self.regs.f =
                    (self.regs.f & (SF | ZF | PF)) | CF | (self.regs.a & (YF | XF));
                4
            }
            0x3F => {
                let old_carry = self.regs.f & CF;
                let mut f = (self.regs.f & (SF | ZF | PF)) | (self.regs.a & (YF | XF));
                if old_carry != 0 {
                    f |= HF;
                } else {
                    f |= CF;
                }
                self.regs.f = f;
                4
            }

            // HALT - the LD (HL),(HL) slot. PC stays on the HALT.
            0x76 => {
                self.regs.pc = self.regs.pc.wrapping_sub(1);
                self.halted = true;
                4
            }

            // LD r, r'
            0x40..=0x7F => {
                let dst = (op >> 3) & 7;
                let src = op & 7;
                let value = self.get_reg(bus, src);
                self.set_reg(bus, dst, value);
                if dst == 6 || src == 6 { 7 } else { 4 }
            }

            // ALU A, r
            0x80..=0xBF => {
                let src = op & 7;
                let value = self.get_reg(bus, src);
                self.alu_a((op >> 3) & 7, value);
                if src == 6 { 7 } else { 4 }
            }

            // RET cc
            0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => {
                if self.condition((op >> 3) & 7) {
                    self.regs.pc = self.pop_word(bus);
                    11
                } else {
                    5
                }
            }

            // POP rr / POP AF
            0xC1 | 0xD1 | 0xE1 => {
                let value = self.pop_word(bus);
                self.set_pair((op >> 4) & 3, value);
                10
            }
            0xF1 => {
                let value = self.pop_word(bus);
                self.regs.set_af(value);
                10
            }

            // JP cc, nn / JP nn
            0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => {
                let target = self.fetch_word(bus);
                if self.condition((op >> 3) & 7) {
                    self.regs.pc = target;
                }
                10
            }
            0xC3 => {
                self.regs.pc = self.fetch_word(bus);
                10
            }

            // CALL cc, nn / CALL nn
            0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => {
                let target = self.fetch_word(bus);
                if self.condition((op >> 3) & 7) {
                    self.push_word(bus, self.regs.pc);
                    self.regs.pc = target;
                    17
                } else {
                    10
                }
            }
            0xCD => {
                let target = self.fetch_word(bus);
                self.push_word(bus, self.regs.pc);
                self.regs.pc = target;
                17
            }

            // PUSH rr / PUSH AF
            0xC5 | 0xD5 | 0xE5 => {
                let value = self.get_pair((op >> 4) & 3);
                self.push_word(bus, value);
                11
            }
            0xF5 => {
                self.push_word(bus, self.regs.af());
                11
            }

            // ALU A, n
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let value = self.fetch(bus);
                self.alu_a((op >> 3) & 7, value);
                7
            }

            // RST n
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                self.push_word(bus, self.regs.pc);
                self.regs.pc = u16::from(op & 0x38);
                11
            }

            // RET
            0xC9 => {
                self.regs.pc = self.pop_word(bus);
                10
            }

            // EXX
            0xD9 => {
                self.regs.exchange_main();
                4
            }

            // OUT (n),A / IN A,(n) - A rides the high port byte
            0xD3 => {
                let port = u16::from(self.regs.a) << 8 | u16::from(self.fetch(bus));
                bus.write_io(port, self.regs.a);
                11
            }
            0xDB => {
                let port = u16::from(self.regs.a) << 8 | u16::from(self.fetch(bus));
                self.regs.a = bus.read_io(port);
                11
            }

            // EX (SP),HL / JP (HL) / EX DE,HL / LD SP,HL
            0xE3 => {
                let value = self.read_word(bus, self.regs.sp);
                self.write_word(bus, self.regs.sp, self.regs.hl());
                self.regs.set_hl(value);
                19
            }
            0xE9 => {
                self.regs.pc = self.regs.hl();
                4
            }
            0xEB => {
                let de = self.regs.de();
                self.regs.set_de(self.regs.hl());
                self.regs.set_hl(de);
                4
            }
            0xF9 => {
                self.regs.sp = self.regs.hl();
                6
            }

            // DI / EI
            0xF3 => {
                self.regs.iff1 = false;
                self.regs.iff2 = false;
                4
            }
            0xFB => {
                self.ei_pending = true;
                4
            }

            // Prefixes are consumed before dispatch
            0xCB | 0xDD | 0xED | 0xFD => unreachable!("prefix byte reached base table"),
        }
    }

    // =========================================================================
    // CB prefix: rotates, shifts, BIT/RES/SET
    // =========================================================================

    fn execute_cb(&mut self, bus: &mut impl IoBus) -> u32 {
        let op = self.fetch_opcode(bus);
        let z = op & 7;
        let y = (op >> 3) & 7;

        match op >> 6 {
            0 => {
                let value = self.get_reg(bus, z);
                let result = self.rotate_op(y, value);
                self.set_reg(bus, z, result);
                if z == 6 { 15 } else { 8 }
            }
            1 => {
                let value = self.get_reg(bus, z);
                self.bit_flags(y, value);
                if z == 6 { 12 } else { 8 }
            }
            2 => {
                let value = self.get_reg(bus, z) & !(1 << y);
                self.set_reg(bus, z, value);
                if z == 6 { 15 } else { 8 }
            }
            _ => {
                let value = self.get_reg(bus, z) | (1 << y);
                self.set_reg(bus, z, value);
                if z == 6 { 15 } else { 8 }
            }
        }
    }

    // =========================================================================
    // ED prefix: extended instructions and block operations
    // =========================================================================

    fn execute_ed(&mut self, bus: &mut impl IoBus) -> u32 {
        let op = self.fetch_opcode(bus);
        match op {
            // IN r,(C) - flags from the value, ED 70 discards it
            0x40 | 0x48 | 0x50 | 0x58 | 0x60 | 0x68 | 0x70 | 0x78 => {
                let value = bus.read_io(self.regs.bc());
                let r = (op >> 3) & 7;
                if r != 6 {
                    self.set_reg(bus, r, value);
                }
                self.regs.f = (self.regs.f & CF) | sz53p(value);
                12
            }

            // OUT (C),r - ED 71 outputs zero
            0x41 | 0x49 | 0x51 | 0x59 | 0x61 | 0x69 | 0x71 | 0x79 => {
                let r = (op >> 3) & 7;
                let value = if r == 6 { 0 } else { self.get_reg(bus, r) };
                bus.write_io(self.regs.bc(), value);
                12
            }

            // SBC HL,rr / ADC HL,rr
            0x42 | 0x52 | 0x62 | 0x72 => {
                let rp = (op >> 4) & 3;
                let (value, flags) =
                    alu::sbc16(self.regs.hl(), self.get_pair(rp), self.regs.f & CF != 0);
                self.regs.set_hl(value);
                self.regs.f = flags;
                15
            }
            0x4A | 0x5A | 0x6A | 0x7A => {
                let rp = (op >> 4) & 3;
                let (value, flags) =
                    alu::adc16(self.regs.hl(), self.get_pair(rp), self.regs.f & CF != 0);
                self.regs.set_hl(value);
                self.regs.f = flags;
                15
            }

            // LD (nn),rr / LD rr,(nn)
            0x43 | 0x53 | 0x63 | 0x73 => {
                let addr = self.fetch_word(bus);
                let value = self.get_pair((op >> 4) & 3);
                self.write_word(bus, addr, value);
                20
            }
            0x4B | 0x5B | 0x6B | 0x7B => {
                let addr = self.fetch_word(bus);
                let value = self.read_word(bus, addr);
                self.set_pair((op >> 4) & 3, value);
                20
            }

            // NEG, in all its mirror slots
            0x44 | 0x4C | 0x54 | 0x5C | 0x64 | 0x6C | 0x74 | 0x7C => {
                let result = alu::sub8(0, self.regs.a, false);
                self.regs.a = result.value;
                self.regs.f = result.flags;
                8
            }

            // RETN / RETI - both restore IFF1 from IFF2
            0x45 | 0x4D | 0x55 | 0x5D | 0x65 | 0x6D | 0x75 | 0x7D => {
                self.regs.iff1 = self.regs.iff2;
                self.regs.pc = self.pop_word(bus);
                14
            }

            // IM 0/1/2 with the undocumented mirrors
            0x46 | 0x4E | 0x66 | 0x6E => {
                self.regs.im = 0;
                8
            }
            0x56 | 0x76 => {
                self.regs.im = 1;
                8
            }
            0x5E | 0x7E => {
                self.regs.im = 2;
                8
            }

            // LD I,A / LD R,A / LD A,I / LD A,R
            0x47 => {
                self.regs.i = self.regs.a;
                9
            }
            0x4F => {
                self.regs.r = self.regs.a;
                9
            }
            0x57 => {
                self.regs.a = self.regs.i;
                self.regs.f = (self.regs.f & CF)
                    | sz53(self.regs.a)
                    | if self.regs.iff2 { PF } else { 0 };
                9
            }
            0x5F => {
                self.regs.a = self.regs.r;
                self.regs.f = (self.regs.f & CF)
                    | sz53(self.regs.a)
                    | if self.regs.iff2 { PF } else { 0 };
                9
            }

            // RRD / RLD - BCD digit rotation through (HL)
            0x67 => {
                let m = bus.read(self.regs.hl());
                let a = self.regs.a;
                bus.write(self.regs.hl(), (a << 4) | (m >> 4));
                self.regs.a = (a & 0xF0) | (m & 0x0F);
                self.regs.f = (self.regs.f & CF) | sz53p(self.regs.a);
                18
            }
            0x6F => {
                let m = bus.read(self.regs.hl());
                let a = self.regs.a;
                bus.write(self.regs.hl(), (m << 4) | (a & 0x0F));
                self.regs.a = (a & 0xF0) | (m >> 4);
                self.regs.f = (self.regs.f & CF) | sz53p(self.regs.a);
                18
            }

            // Block transfers
            0xA0 => {
                self.block_ld(bus, 1);
                16
            }
            0xA8 => {
                self.block_ld(bus, -1);
                16
            }
            0xB0 => {
                self.block_ld(bus, 1);
                self.block_repeat(self.regs.bc() != 0)
            }
            0xB8 => {
                self.block_ld(bus, -1);
                self.block_repeat(self.regs.bc() != 0)
            }

            // Block compares
            0xA1 => {
                self.block_cp(bus, 1);
                16
            }
            0xA9 => {
                self.block_cp(bus, -1);
                16
            }
            0xB1 => {
                self.block_cp(bus, 1);
                self.block_repeat(self.regs.bc() != 0 && self.regs.f & ZF == 0)
            }
            0xB9 => {
                self.block_cp(bus, -1);
                self.block_repeat(self.regs.bc() != 0 && self.regs.f & ZF == 0)
            }

            // Block port input
            0xA2 => {
                self.block_in(bus, 1);
                16
            }
            0xAA => {
                self.block_in(bus, -1);
                16
            }
            0xB2 => {
                self.block_in(bus, 1);
                self.block_repeat(self.regs.b != 0)
            }
            0xBA => {
                self.block_in(bus, -1);
                self.block_repeat(self.regs.b != 0)
            }

            // Block port output
            0xA3 => {
                self.block_out(bus, 1);
                16
            }
            0xAB => {
                self.block_out(bus, -1);
                16
            }
            0xB3 => {
                self.block_out(bus, 1);
                self.block_repeat(self.regs.b != 0)
            }
            0xBB => {
                self.block_out(bus, -1);
                self.block_repeat(self.regs.b != 0)
            }

            // Every other ED slot is a two-byte NOP
            _ => 8,
        }
    }

    /// Shared repeat-form tail: rewind PC over the prefix pair so the
    /// instruction re-enters on the next step, costing the looping
    /// count; the final iteration costs the terminal count.
    fn block_repeat(&mut self, again: bool) -> u32 {
        if again {
            self.regs.pc = self.regs.pc.wrapping_sub(2);
            21
        } else {
            16
        }
    }

    /// One LDI/LDD iteration.
    fn block_ld(&mut self, bus: &mut impl Bus, dir: i16) {
        let hl = self.regs.hl();
        let de = self.regs.de();
        let byte = bus.read(hl);
        bus.write(de, byte);
        self.regs.set_hl(hl.wrapping_add(dir as u16));
        self.regs.set_de(de.wrapping_add(dir as u16));
        let bc = self.regs.bc().wrapping_sub(1);
        self.regs.set_bc(bc);

        // X/Y come from (transferred byte + A): bit 3 and bit 1.
        let n = byte.wrapping_add(self.regs.a);
        let mut f = self.regs.f & (SF | ZF | CF);
        if bc != 0 {
            f |= PF;
        }
        f |= n & XF;
        if n & 0x02 != 0 {
            f |= YF;
        }
        self.regs.f = f;
    }

    /// One CPI/CPD iteration.
    fn block_cp(&mut self, bus: &mut impl Bus, dir: i16) {
        let hl = self.regs.hl();
        let value = bus.read(hl);
        let a = self.regs.a;
        let result = a.wrapping_sub(value);
        self.regs.set_hl(hl.wrapping_add(dir as u16));
        let bc = self.regs.bc().wrapping_sub(1);
        self.regs.set_bc(bc);

        let half = (a ^ value ^ result) & 0x10 != 0;
        let mut f = (self.regs.f & CF) | NF;
        if result == 0 {
            f |= ZF;
        }
        if result & 0x80 != 0 {
            f |= SF;
        }
        if half {
            f |= HF;
        }
        if bc != 0 {
            f |= PF;
        }
        // X/Y from (difference - H): bit 3 and bit 1.
        let n = result.wrapping_sub(u8::from(half));
        f |= n & XF;
        if n & 0x02 != 0 {
            f |= YF;
        }
        self.regs.f = f;
    }

    /// One INI/IND iteration.
    fn block_in(&mut self, bus: &mut impl IoBus, dir: i16) {
        let value = bus.read_io(self.regs.bc());
        bus.write(self.regs.hl(), value);
        self.regs.set_hl(self.regs.hl().wrapping_add(dir as u16));
        self.regs.b = self.regs.b.wrapping_sub(1);
        self.regs.f = (self.regs.f & CF) | NF | sz53(self.regs.b);
    }

    /// One OUTI/OUTD iteration. B decrements before the port address
    /// forms.
    fn block_out(&mut self, bus: &mut impl IoBus, dir: i16) {
        let value = bus.read(self.regs.hl());
        self.regs.b = self.regs.b.wrapping_sub(1);
        bus.write_io(self.regs.bc(), value);
        self.regs.set_hl(self.regs.hl().wrapping_add(dir as u16));
        self.regs.f = (self.regs.f & CF) | NF | sz53(self.regs.b);
    }

    // =========================================================================
    // DD/FD prefix: HL becomes IX/IY, (HL) becomes (IX+d)/(IY+d)
    // =========================================================================

    fn get_index(&self, iy: bool) -> u16 {
        if iy { self.regs.iy } else { self.regs.ix }
    }

    fn set_index(&mut self, iy: bool, value: u16) {
        if iy {
            self.regs.iy = value;
        } else {
            self.regs.ix = value;
        }
    }

    /// Cycle counts here exclude the 4-cycle prefix fetch, which the
    /// dispatch loop adds.
    fn execute_index(&mut self, bus: &mut impl IoBus, op: u8, iy: bool) -> u32 {
        match op {
            // LD IX, nn
            0x21 => {
                let value = self.fetch_word(bus);
                self.set_index(iy, value);
                10
            }

            // LD (nn),IX / LD IX,(nn)
            0x22 => {
                let addr = self.fetch_word(bus);
                self.write_word(bus, addr, self.get_index(iy));
                16
            }
            0x2A => {
                let addr = self.fetch_word(bus);
                let value = self.read_word(bus, addr);
                self.set_index(iy, value);
                16
            }

            // INC IX / DEC IX
            0x23 => {
                self.set_index(iy, self.get_index(iy).wrapping_add(1));
                6
            }
            0x2B => {
                self.set_index(iy, self.get_index(iy).wrapping_sub(1));
                6
            }

            // ADD IX, rr - rr index 2 is IX itself
            0x09 | 0x19 | 0x29 | 0x39 => {
                let rp = (op >> 4) & 3;
                let operand = if rp == 2 {
                    self.get_index(iy)
                } else {
                    self.get_pair(rp)
                };
                let (value, flags) = alu::add16(self.get_index(iy), operand);
                self.set_index(iy, value);
                self.regs.f = (self.regs.f & (SF | ZF | PF)) | flags;
                11
            }

            // INC (IX+d) / DEC (IX+d)
            0x34 => {
                let addr = self.index_addr(bus, iy);
                let result = alu::inc8(bus.read(addr));
                bus.write(addr, result.value);
                self.regs.f = (self.regs.f & CF) | result.flags;
                19
            }
            0x35 => {
                let addr = self.index_addr(bus, iy);
                let result = alu::dec8(bus.read(addr));
                bus.write(addr, result.value);
                self.regs.f = (self.regs.f & CF) | result.flags;
                19
            }

            // LD (IX+d), n
            0x36 => {
                let addr = self.index_addr(bus, iy);
                let value = self.fetch(bus);
                bus.write(addr, value);
                15
            }

            // LD r, (IX+d)
            0x46 | 0x4E | 0x56 | 0x5E | 0x66 | 0x6E | 0x7E => {
                let addr = self.index_addr(bus, iy);
                let value = bus.read(addr);
                self.set_reg(bus, (op >> 3) & 7, value);
                15
            }

            // LD (IX+d), r
            0x70..=0x75 | 0x77 => {
                let addr = self.index_addr(bus, iy);
                let value = self.get_reg(bus, op & 7);
                bus.write(addr, value);
                15
            }

            // ALU A, (IX+d)
            0x86 | 0x8E | 0x96 | 0x9E | 0xA6 | 0xAE | 0xB6 | 0xBE => {
                let addr = self.index_addr(bus, iy);
                let value = bus.read(addr);
                self.alu_a((op >> 3) & 7, value);
                15
            }

            // POP IX / PUSH IX / EX (SP),IX / JP (IX) / LD SP,IX
            0xE1 => {
                let value = self.pop_word(bus);
                self.set_index(iy, value);
                10
            }
            0xE5 => {
                self.push_word(bus, self.get_index(iy));
                11
            }
            0xE3 => {
                let value = self.read_word(bus, self.regs.sp);
                self.write_word(bus, self.regs.sp, self.get_index(iy));
                self.set_index(iy, value);
                19
            }
            0xE9 => {
                self.regs.pc = self.get_index(iy);
                4
            }
            0xF9 => {
                self.regs.sp = self.get_index(iy);
                6
            }

            // Anything else ignores the prefix
            _ => self.execute_main(bus, op),
        }
    }

    /// DD CB d op / FD CB d op: the displacement comes before the
    /// sub-opcode, the operand is always memory, and the non-BIT forms
    /// also copy the result into the register named by bits 2-0.
    /// Cycle counts exclude the 4-cycle DD/FD fetch.
    fn execute_index_cb(&mut self, bus: &mut impl IoBus, iy: bool) -> u32 {
        let addr = self.index_addr(bus, iy);
        let op = self.fetch(bus);
        let z = op & 7;
        let y = (op >> 3) & 7;
        let value = bus.read(addr);

        match op >> 6 {
            1 => {
                self.bit_flags(y, value);
                16
            }
            x => {
                let result = match x {
                    0 => self.rotate_op(y, value),
                    2 => value & !(1 << y),
                    _ => value | (1 << y),
                };
                bus.write(addr, result);
                if z != 6 {
                    // Undocumented result-to-register copy.
                    self.set_reg(bus, z, result);
                }
                19
            }
        }
    }
}
