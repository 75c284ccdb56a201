//! The 6502 instruction descriptor table.
//!
//! A dense 256-entry map from opcode to (mnemonic, addressing mode, base
//! cycle count). Page-cross and branch-taken penalties are applied on top
//! of the base count during execution. Slots with no documented
//! instruction are `Jam` entries: executing one halts the CPU until
//! reset.

/// The 13 addressing modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Relative,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndexedIndirectX,
    IndirectIndexedY,
}

/// Documented instruction mnemonics, plus `Jam` for empty slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs,
    Clc, Cld, Cli, Clv, Cmp, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx,
    Iny, Jmp, Jsr, Lda, Ldx, Ldy, Lsr, Nop, Ora, Pha, Php, Pla, Plp,
    Rol, Ror, Rti, Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty, Tax, Tay,
    Tsx, Txa, Txs, Tya, Jam,
}

/// One descriptor table entry.
#[derive(Debug, Clone, Copy)]
pub struct OpcodeInfo {
    pub mnemonic: Mnemonic,
    pub mode: Mode,
    pub cycles: u8,
}

const fn op(mnemonic: Mnemonic, mode: Mode, cycles: u8) -> OpcodeInfo {
    OpcodeInfo {
        mnemonic,
        mode,
        cycles,
    }
}

/// The full 256-entry table.
pub static OPCODES: [OpcodeInfo; 256] = build_table();

/// Look up the descriptor for an opcode.
#[must_use]
pub fn opcode_info(opcode: u8) -> OpcodeInfo {
    OPCODES[opcode as usize]
}

#[allow(clippy::too_many_lines)]
const fn build_table() -> [OpcodeInfo; 256] {
    use Mnemonic::*;
    use Mode::*;

    let mut t = [op(Jam, Implied, 2); 256];

    // Row $0x
    t[0x00] = op(Brk, Implied, 7);
    t[0x01] = op(Ora, IndexedIndirectX, 6);
    t[0x05] = op(Ora, ZeroPage, 3);
    t[0x06] = op(Asl, ZeroPage, 5);
    t[0x08] = op(Php, Implied, 3);
    t[0x09] = op(Ora, Immediate, 2);
    t[0x0A] = op(Asl, Accumulator, 2);
    t[0x0D] = op(Ora, Absolute, 4);
    t[0x0E] = op(Asl, Absolute, 6);

    // Row $1x
    t[0x10] = op(Bpl, Relative, 2);
    t[0x11] = op(Ora, IndirectIndexedY, 5);
    t[0x15] = op(Ora, ZeroPageX, 4);
    t[0x16] = op(Asl, ZeroPageX, 6);
    t[0x18] = op(Clc, Implied, 2);
    t[0x19] = op(Ora, AbsoluteY, 4);
    t[0x1D] = op(Ora, AbsoluteX, 4);
    t[0x1E] = op(Asl, AbsoluteX, 7);

    // Row $2x
    t[0x20] = op(Jsr, Absolute, 6);
    t[0x21] = op(And, IndexedIndirectX, 6);
    t[0x24] = op(Bit, ZeroPage, 3);
    t[0x25] = op(And, ZeroPage, 3);
    t[0x26] = op(Rol, ZeroPage, 5);
    t[0x28] = op(Plp, Implied, 4);
    t[0x29] = op(And, Immediate, 2);
    t[0x2A] = op(Rol, Accumulator, 2);
    t[0x2C] = op(Bit, Absolute, 4);
    t[0x2D] = op(And, Absolute, 4);
    t[0x2E] = op(Rol, Absolute, 6);

    // Row $3x
    t[0x30] = op(Bmi, Relative, 2);
    t[0x31] = op(And, IndirectIndexedY, 5);
    t[0x35] = op(And, ZeroPageX, 4);
    t[0x36] = op(Rol, ZeroPageX, 6);
    t[0x38] = op(Sec, Implied, 2);
    t[0x39] = op(And, AbsoluteY, 4);
    t[0x3D] = op(And, AbsoluteX, 4);
    t[0x3E] = op(Rol, AbsoluteX, 7);

    // Row $4x
    t[0x40] = op(Rti, Implied, 6);
    t[0x41] = op(Eor, IndexedIndirectX, 6);
    t[0x45] = op(Eor, ZeroPage, 3);
    t[0x46] = op(Lsr, ZeroPage, 5);
    t[0x48] = op(Pha, Implied, 3);
    t[0x49] = op(Eor, Immediate, 2);
    t[0x4A] = op(Lsr, Accumulator, 2);
    t[0x4C] = op(Jmp, Absolute, 3);
    t[0x4D] = op(Eor, Absolute, 4);
    t[0x4E] = op(Lsr, Absolute, 6);

    // Row $5x
    t[0x50] = op(Bvc, Relative, 2);
    t[0x51] = op(Eor, IndirectIndexedY, 5);
    t[0x55] = op(Eor, ZeroPageX, 4);
    t[0x56] = op(Lsr, ZeroPageX, 6);
    t[0x58] = op(Cli, Implied, 2);
    t[0x59] = op(Eor, AbsoluteY, 4);
    t[0x5D] = op(Eor, AbsoluteX, 4);
    t[0x5E] = op(Lsr, AbsoluteX, 7);

    // Row $6x
    t[0x60] = op(Rts, Implied, 6);
    t[0x61] = op(Adc, IndexedIndirectX, 6);
    t[0x65] = op(Adc, ZeroPage, 3);
    t[0x66] = op(Ror, ZeroPage, 5);
    t[0x68] = op(Pla, Implied, 4);
    t[0x69] = op(Adc, Immediate, 2);
    t[0x6A] = op(Ror, Accumulator, 2);
    t[0x6C] = op(Jmp, Indirect, 5);
    t[0x6D] = op(Adc, Absolute, 4);
    t[0x6E] = op(Ror, Absolute, 6);

    // Row $7x
    t[0x70] = op(Bvs, Relative, 2);
    t[0x71] = op(Adc, IndirectIndexedY, 5);
    t[0x75] = op(Adc, ZeroPageX, 4);
    t[0x76] = op(Ror, ZeroPageX, 6);
    t[0x78] = op(Sei, Implied, 2);
    t[0x79] = op(Adc, AbsoluteY, 4);
    t[0x7D] = op(Adc, AbsoluteX, 4);
    t[0x7E] = op(Ror, AbsoluteX, 7);

    // Row $8x
    t[0x81] = op(Sta, IndexedIndirectX, 6);
    t[0x84] = op(Sty, ZeroPage, 3);
    t[0x85] = op(Sta, ZeroPage, 3);
    t[0x86] = op(Stx, ZeroPage, 3);
    t[0x88] = op(Dey, Implied, 2);
    t[0x8A] = op(Txa, Implied, 2);
    t[0x8C] = op(Sty, Absolute, 4);
    t[0x8D] = op(Sta, Absolute, 4);
    t[0x8E] = op(Stx, Absolute, 4);

    // Row $9x
    t[0x90] = op(Bcc, Relative, 2);
    t[0x91] = op(Sta, IndirectIndexedY, 6);
    t[0x94] = op(Sty, ZeroPageX, 4);
    t[0x95] = op(Sta, ZeroPageX, 4);
    t[0x96] = op(Stx, ZeroPageY, 4);
    t[0x98] = op(Tya, Implied, 2);
    t[0x99] = op(Sta, AbsoluteY, 5);
    t[0x9A] = op(Txs, Implied, 2);
    t[0x9D] = op(Sta, AbsoluteX, 5);

    // Row $Ax
    t[0xA0] = op(Ldy, Immediate, 2);
    t[0xA1] = op(Lda, IndexedIndirectX, 6);
    t[0xA2] = op(Ldx, Immediate, 2);
    t[0xA4] = op(Ldy, ZeroPage, 3);
    t[0xA5] = op(Lda, ZeroPage, 3);
    t[0xA6] = op(Ldx, ZeroPage, 3);
    t[0xA8] = op(Tay, Implied, 2);
    t[0xA9] = op(Lda, Immediate, 2);
    t[0xAA] = op(Tax, Implied, 2);
    t[0xAC] = op(Ldy, Absolute, 4);
    t[0xAD] = op(Lda, Absolute, 4);
    t[0xAE] = op(Ldx, Absolute, 4);

    // Row $Bx
    t[0xB0] = op(Bcs, Relative, 2);
    t[0xB1] = op(Lda, IndirectIndexedY, 5);
    t[0xB4] = op(Ldy, ZeroPageX, 4);
    t[0xB5] = op(Lda, ZeroPageX, 4);
    t[0xB6] = op(Ldx, ZeroPageY, 4);
    t[0xB8] = op(Clv, Implied, 2);
    t[0xB9] = op(Lda, AbsoluteY, 4);
    t[0xBA] = op(Tsx, Implied, 2);
    t[0xBC] = op(Ldy, AbsoluteX, 4);
    t[0xBD] = op(Lda, AbsoluteX, 4);
    t[0xBE] = op(Ldx, AbsoluteY, 4);

    // Row $Cx
    t[0xC0] = op(Cpy, Immediate, 2);
    t[0xC1] = op(Cmp, IndexedIndirectX, 6);
    t[0xC4] = op(Cpy, ZeroPage, 3);
    t[0xC5] = op(Cmp, ZeroPage, 3);
    t[0xC6] = op(Dec, ZeroPage, 5);
    t[0xC8] = op(Iny, Implied, 2);
    t[0xC9] = op(Cmp, Immediate, 2);
    t[0xCA] = op(Dex, Implied, 2);
    t[0xCC] = op(Cpy, Absolute, 4);
    t[0xCD] = op(Cmp, Absolute, 4);
    t[0xCE] = op(Dec, Absolute, 6);

    // Row $Dx
    t[0xD0] = op(Bne, Relative, 2);
    t[0xD1] = op(Cmp, IndirectIndexedY, 5);
    t[0xD5] = op(Cmp, ZeroPageX, 4);
    t[0xD6] = op(Dec, ZeroPageX, 6);
    t[0xD8] = op(Cld, Implied, 2);
    t[0xD9] = op(Cmp, AbsoluteY, 4);
    t[0xDD] = op(Cmp, AbsoluteX, 4);
    t[0xDE] = op(Dec, AbsoluteX, 7);

    // Row $Ex
    t[0xE0] = op(Cpx, Immediate, 2);
    t[0xE1] = op(Sbc, IndexedIndirectX, 6);
    t[0xE4] = op(Cpx, ZeroPage, 3);
    t[0xE5] = op(Sbc, ZeroPage, 3);
    t[0xE6] = op(Inc, ZeroPage, 5);
    t[0xE8] = op(Inx, Implied, 2);
    t[0xE9] = op(Sbc, Immediate, 2);
    t[0xEA] = op(Nop, Implied, 2);
    t[0xEC] = op(Cpx, Absolute, 4);
    t[0xED] = op(Sbc, Absolute, 4);
    t[0xEE] = op(Inc, Absolute, 6);

    // Row $Fx
    t[0xF0] = op(Beq, Relative, 2);
    t[0xF1] = op(Sbc, IndirectIndexedY, 5);
    t[0xF5] = op(Sbc, ZeroPageX, 4);
    t[0xF6] = op(Inc, ZeroPageX, 6);
    t[0xF8] = op(Sed, Implied, 2);
    t[0xF9] = op(Sbc, AbsoluteY, 4);
    t[0xFD] = op(Sbc, AbsoluteX, 4);
    t[0xFE] = op(Inc, AbsoluteX, 7);

    t
}
