//! Instruction execution for the 8080.
//!
//! Decode works on the opcode's octal fields: bits 7-6 select the group,
//! bits 5-3 a register/condition, bits 2-0 a second register. Register
//! index 6 means memory addressed by HL.

use emu_core::{Bus, IoBus};

use crate::Intel8080;
use crate::flags::{AC, CY, PF, SF, SZP, ZF};

impl Intel8080 {
    pub(crate) fn fetch(&mut self, bus: &mut impl Bus) -> u8 {
        let value = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    fn fetch_word(&mut self, bus: &mut impl Bus) -> u16 {
        let low = self.fetch(bus);
        let high = self.fetch(bus);
        u16::from_le_bytes([low, high])
    }

    fn read_word(&mut self, bus: &mut impl Bus, addr: u16) -> u16 {
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
        let f = self.regs.f();
        match index {
            0 => f & ZF == 0,
            1 => f & ZF != 0,
            2 => f & CY == 0,
            3 => f & CY != 0,
            4 => f & PF == 0,
            5 => f & PF != 0,
            6 => f & SF == 0,
            _ => f & SF != 0,
        }
    }

    // =========================================================================
    // ALU
    // =========================================================================

    /// Add to A with optional carry; all flags from the addition.
    fn add(&mut self, value: u8, carry_in: bool) {
        let a = self.regs.a;
        let sum = u16::from(a) + u16::from(value) + u16::from(carry_in);
        let result = sum as u8;
        let mut f = SZP[result as usize];
        if (a ^ value ^ result) & 0x10 != 0 {
            f |= AC;
        }
        if sum > 0xFF {
            f |= CY;
        }
        self.regs.set_f(f);
        self.regs.a = result;
    }

    /// Subtract from A with optional borrow.
    ///
    /// The 8080 subtracts by adding the complement, so AC reflects that
    /// internal addition; only the carry is inverted to read as borrow.
    /// This is where the 8080 differs from the Z80's H flag.
    fn sub(&mut self, value: u8, borrow_in: bool) {
        self.add(!value, !borrow_in);
        self.regs.set_f(self.regs.f() ^ CY);
    }

    /// Compare: subtract without storing the result.
    fn cmp(&mut self, value: u8) {
        let a = self.regs.a;
        self.sub(value, false);
        self.regs.a = a;
    }

    /// AND into A. The 8080 sets AC from bit 3 of the OR of the
    /// operands; carry clears.
    fn and(&mut self, value: u8) {
        let a = self.regs.a;
        let result = a & value;
        let mut f = SZP[result as usize];
        if (a | value) & 0x08 != 0 {
            f |= AC;
        }
        self.regs.set_f(f);
        self.regs.a = result;
    }

    fn xor(&mut self, value: u8) {
        let result = self.regs.a ^ value;
        self.regs.set_f(SZP[result as usize]);
        self.regs.a = result;
    }

    fn or(&mut self, value: u8) {
        let result = self.regs.a | value;
        self.regs.set_f(SZP[result as usize]);
        self.regs.a = result;
    }

    /// ALU operation by octal index against a value.
    fn alu(&mut self, index: u8, value: u8) {
        let carry = self.regs.f() & CY != 0;
        match index {
            0 => self.add(value, false),
            1 => self.add(value, carry),
            2 => self.sub(value, false),
            3 => self.sub(value, carry),
            4 => self.and(value),
            5 => self.xor(value),
            6 => self.or(value),
            _ => self.cmp(value),
        }
    }

    /// Increment preserves CY; AC is the nibble carry.
    fn inr(&mut self, value: u8) -> u8 {
        let result = value.wrapping_add(1);
        let mut f = (self.regs.f() & CY) | SZP[result as usize];
        if result & 0x0F == 0 {
            f |= AC;
        }
        self.regs.set_f(f);
        result
    }

    /// Decrement preserves CY; AC is set when no borrow leaves the low
    /// nibble (internal-addition convention).
    fn dcr(&mut self, value: u8) -> u8 {
        let result = value.wrapping_sub(1);
        let mut f = (self.regs.f() & CY) | SZP[result as usize];
        if result & 0x0F != 0x0F {
            f |= AC;
        }
        self.regs.set_f(f);
        result
    }

    /// Decimal adjust after BCD arithmetic.
    fn daa(&mut self) {
        let f = self.regs.f();
        let lo = self.regs.a & 0x0F;
        let hi = self.regs.a >> 4;

        let mut correction = 0;
        let mut carry_out = f & CY != 0;
        if f & AC != 0 || lo > 9 {
            correction += 0x06;
        }
        if carry_out || hi > 9 || (hi == 9 && lo > 9) {
            correction += 0x60;
            carry_out = true;
        }
        self.add(correction, false);
        let mut new_f = self.regs.f() & !CY;
        if carry_out {
            new_f |= CY;
        }
        self.regs.set_f(new_f);
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    pub(crate) fn execute(&mut self, bus: &mut impl IoBus, op: u8) -> u32 {
        match op {
            // NOP, plus the seven unused x=0 slots that decode the same
            0x00 | 0x08 | 0x10 | 0x18 | 0x20 | 0x28 | 0x30 | 0x38 => 4,

            // LXI rp, d16
            0x01 | 0x11 | 0x21 | 0x31 => {
                let value = self.fetch_word(bus);
                self.set_pair((op >> 4) & 3, value);
                10
            }

            // STAX B / STAX D
            0x02 => {
                bus.write(self.regs.bc(), self.regs.a);
                7
            }
            0x12 => {
                bus.write(self.regs.de(), self.regs.a);
                7
            }

            // LDAX B / LDAX D
            0x0A => {
                self.regs.a = bus.read(self.regs.bc());
                7
            }
            0x1A => {
                self.regs.a = bus.read(self.regs.de());
                7
            }

            // SHLD / LHLD / STA / LDA
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

            // INX rp / DCX rp - no flags
            0x03 | 0x13 | 0x23 | 0x33 => {
                let rp = (op >> 4) & 3;
                self.set_pair(rp, self.get_pair(rp).wrapping_add(1));
                5
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                let rp = (op >> 4) & 3;
                self.set_pair(rp, self.get_pair(rp).wrapping_sub(1));
                5
            }

            // INR r / DCR r
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                let r = (op >> 3) & 7;
                let value = self.get_reg(bus, r);
                let result = self.inr(value);
                self.set_reg(bus, r, result);
                if r == 6 { 10 } else { 5 }
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                let r = (op >> 3) & 7;
                let value = self.get_reg(bus, r);
                let result = self.dcr(value);
                self.set_reg(bus, r, result);
                if r == 6 { 10 } else { 5 }
            }

            // MVI r, d8
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                let r = (op >> 3) & 7;
                let value = self.fetch(bus);
                self.set_reg(bus, r, value);
                if r == 6 { 10 } else { 7 }
            }

            // Rotates - only CY changes
            0x07 => {
                // RLC
                let carry = self.regs.a >> 7;
                self.regs.a = self.regs.a.rotate_left(1);
                self.set_cy(carry != 0);
                4
            }
            0x0F => {
                // RRC
                let carry = self.regs.a & 1;
                self.regs.a = self.regs.a.rotate_right(1);
                self.set_cy(carry != 0);
                4
            }
            0x17 => {
                // RAL
                let old_carry = u8::from(self.regs.f() & CY != 0);
                let carry = self.regs.a >> 7;
                self.regs.a = (self.regs.a << 1) | old_carry;
                self.set_cy(carry != 0);
                4
            }
            0x1F => {
                // RAR
                let old_carry = u8::from(self.regs.f() & CY != 0);
                let carry = self.regs.a & 1;
                self.regs.a = (self.regs.a >> 1) | (old_carry << 7);
                self.set_cy(carry != 0);
                4
            }

            // DAD rp - 16-bit add into HL, only CY
            0x09 | 0x19 | 0x29 | 0x39 => {
                let rp = (op >> 4) & 3;
                let sum = u32::from(self.regs.hl()) + u32::from(self.get_pair(rp));
                self.regs.set_hl(sum as u16);
                self.set_cy(sum > 0xFFFF);
                10
            }

            // DAA / CMA / STC / CMC
            0x27 => {
                self.daa();
                4
            }
            0x2F => {
                self.regs.a = !self.regs.a;
                4
            }
            0x37 => {
                self.set_cy(true);
                4
            }
            0x3F => {
                self.regs.set_f(self.regs.f() ^ CY);
                4
            }

            // HLT - the MOV M,M slot
            0x76 => {
                self.halted = true;
                7
            }

            // MOV r, r'
            0x40..=0x7F => {
                let dst = (op >> 3) & 7;
                let src = op & 7;
                let value = self.get_reg(bus, src);
                self.set_reg(bus, dst, value);
                if dst == 6 || src == 6 { 7 } else { 5 }
            }

            // ALU A, r
            0x80..=0xBF => {
                let src = op & 7;
                let value = self.get_reg(bus, src);
                self.alu((op >> 3) & 7, value);
                if src == 6 { 7 } else { 4 }
            }

            // Rcc - conditional return, 6 extra states when taken
            0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => {
                if self.condition((op >> 3) & 7) {
                    self.regs.pc = self.pop_word(bus);
                    11
                } else {
                    5
                }
            }

            // POP rp / POP PSW
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

            // Jcc - always 10 states
            0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => {
                let target = self.fetch_word(bus);
                if self.condition((op >> 3) & 7) {
                    self.regs.pc = target;
                }
                10
            }

            // JMP, plus the $CB alias
            0xC3 | 0xCB => {
                self.regs.pc = self.fetch_word(bus);
                10
            }

            // Ccc - conditional call, 6 extra states when taken
            0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => {
                let target = self.fetch_word(bus);
                if self.condition((op >> 3) & 7) {
                    self.push_word(bus, self.regs.pc);
                    self.regs.pc = target;
                    17
                } else {
                    11
                }
            }

            // PUSH rp / PUSH PSW
            0xC5 | 0xD5 | 0xE5 => {
                let value = self.get_pair((op >> 4) & 3);
                self.push_word(bus, value);
                11
            }
            0xF5 => {
                self.push_word(bus, self.regs.af());
                11
            }

            // ALU A, d8
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let value = self.fetch(bus);
                self.alu((op >> 3) & 7, value);
                7
            }

            // RST n
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                self.push_word(bus, self.regs.pc);
                self.regs.pc = u16::from(op & 0x38);
                11
            }

            // RET, plus the $D9 alias
            0xC9 | 0xD9 => {
                self.regs.pc = self.pop_word(bus);
                10
            }

            // CALL, plus the $DD/$ED/$FD aliases
            0xCD | 0xDD | 0xED | 0xFD => {
                let target = self.fetch_word(bus);
                self.push_word(bus, self.regs.pc);
                self.regs.pc = target;
                17
            }

            // OUT d8 / IN d8 - 8-bit port, zero-extended
            0xD3 => {
                let port = self.fetch(bus);
                bus.write_io(u16::from(port), self.regs.a);
                10
            }
            0xDB => {
                let port = self.fetch(bus);
                self.regs.a = bus.read_io(u16::from(port));
                10
            }

            // XTHL - exchange HL with the stack top
            0xE3 => {
                let value = self.read_word(bus, self.regs.sp);
                self.write_word(bus, self.regs.sp, self.regs.hl());
                self.regs.set_hl(value);
                18
            }

            // PCHL / SPHL / XCHG
            0xE9 => {
                self.regs.pc = self.regs.hl();
                5
            }
            0xF9 => {
                self.regs.sp = self.regs.hl();
                5
            }
            0xEB => {
                let de = self.regs.de();
                self.regs.set_de(self.regs.hl());
                self.regs.set_hl(de);
                4
            }

            // DI / EI
            0xF3 => {
                self.interrupts_enabled = false;
                4
            }
            0xFB => {
                self.interrupts_enabled = true;
                4
            }
        }
    }

    fn set_cy(&mut self, carry: bool) {
        let f = self.regs.f();
        self.regs
            .set_f(if carry { f | CY } else { f & !CY });
    }
}
