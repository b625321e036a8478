//! Instruction decoder for the E20.
//!
//! Every instruction is one 16-bit word. The top three bits select the
//! opcode; the remaining thirteen bits are split into fields whose layout
//! depends on the opcode:
//!
//! ```text
//!  15  13 12  10 9    7 6    4 3    0
//! +------+------+------+------+------+
//! | 000  | regA | regB | dst  | func |   add sub or and slt jr
//! +------+------+------+------+------+
//! | op   | regA | regB |    imm7     |   addi lw sw jeq slti
//! +------+------+------+-------------+
//! | op   |           imm13           |   j jal
//! +------+---------------------------+
//! ```

use serde::{Serialize, Deserialize};

/// Opcode values (bits 15:13).
#[derive(Debug, Clone, Copy)]
struct Opcode;

impl Opcode {
    const REG: u8 = 0b000;
    const ADDI: u8 = 0b001;
    const J: u8 = 0b010;
    const JAL: u8 = 0b011;
    const LW: u8 = 0b100;
    const SW: u8 = 0b101;
    const JEQ: u8 = 0b110;
    const SLTI: u8 = 0b111;
}

/// Function codes of the register-register group (bits 3:0).
#[derive(Debug, Clone, Copy)]
struct Func;

impl Func {
    const ADD: u8 = 0b0000;
    const SUB: u8 = 0b0001;
    const OR: u8 = 0b0010;
    const AND: u8 = 0b0011;
    const SLT: u8 = 0b0100;
    const JR: u8 = 0b1000;
}

/// Bit-field accessors, one per field of the instruction formats.
pub mod field {
    /// Bits 15:13.
    #[inline]
    pub const fn opcode(word: u16) -> u8 {
        ((word >> 13) & 0b111) as u8
    }

    /// Bits 12:10. First source register, or the address base of `lw`/`sw`.
    #[inline]
    pub const fn reg_a(word: u16) -> u8 {
        ((word >> 10) & 0b111) as u8
    }

    /// Bits 9:7. Second source register, or the destination of an
    /// immediate-format instruction.
    #[inline]
    pub const fn reg_b(word: u16) -> u8 {
        ((word >> 7) & 0b111) as u8
    }

    /// Bits 6:4. Destination of a register-register instruction.
    #[inline]
    pub const fn reg_c(word: u16) -> u8 {
        ((word >> 4) & 0b111) as u8
    }

    /// Bits 3:0.
    #[inline]
    pub const fn func(word: u16) -> u8 {
        (word & 0b1111) as u8
    }

    /// Bits 6:0, raw (not sign-extended).
    #[inline]
    pub const fn imm7(word: u16) -> u16 {
        word & 0b111_1111
    }

    /// Bits 12:0.
    #[inline]
    pub const fn imm13(word: u16) -> u16 {
        word & 0x1FFF
    }
}

/// Sign-extend a 7-bit two's-complement immediate.
///
/// Values 0..=63 are returned unchanged; 64..=127 map to -64..=-1.
#[inline]
pub const fn sign_extend7(imm: u16) -> i16 {
    let imm = (imm & 0b111_1111) as i16;
    if imm & 0b100_0000 != 0 {
        imm - 128
    } else {
        imm
    }
}

/// Decoded E20 instruction.
///
/// Register fields hold indices 0-7. Seven-bit immediates are stored
/// already sign-extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Register-register ====================

    /// `dst := a + b`
    Add { dst: u8, a: u8, b: u8 },

    /// `dst := a - b`
    Sub { dst: u8, a: u8, b: u8 },

    /// `dst := a | b`
    Or { dst: u8, a: u8, b: u8 },

    /// `dst := a & b`
    And { dst: u8, a: u8, b: u8 },

    /// `dst := 1 if a < b (unsigned) else 0`
    Slt { dst: u8, a: u8, b: u8 },

    /// `pc := src`
    Jr { src: u8 },

    /// A register-register word with an unassigned function code.
    /// Executes as a no-op.
    Reserved { dst: u8, a: u8, b: u8, func: u8 },

    // ==================== Immediate ====================

    /// `dst := src + imm`
    Addi { dst: u8, src: u8, imm: i16 },

    /// `dst := 1 if src < (imm as u16) else 0`
    Slti { dst: u8, src: u8, imm: i16 },

    /// `dst := mem[base + imm]`
    Lw { dst: u8, base: u8, imm: i16 },

    /// `mem[base + imm] := src`
    Sw { src: u8, base: u8, imm: i16 },

    // ==================== Control Flow ====================

    /// `pc := pc + 1 + imm` when `a == b`
    Jeq { a: u8, b: u8, imm: i16 },

    /// `pc := target`; a jump to its own address halts.
    J { target: u16 },

    /// `$7 := pc + 1; pc := target`
    Jal { target: u16 },
}

/// Decode a 16-bit instruction word.
///
/// Every word decodes: the three opcode bits cover all eight classes, and
/// unassigned function codes become [`Instruction::Reserved`].
pub fn decode(word: u16) -> Instruction {
    use field::*;

    let a = reg_a(word);
    let b = reg_b(word);
    let imm = sign_extend7(imm7(word));

    match opcode(word) {
        Opcode::REG => {
            let dst = reg_c(word);
            match func(word) {
                Func::ADD => Instruction::Add { dst, a, b },
                Func::SUB => Instruction::Sub { dst, a, b },
                Func::OR => Instruction::Or { dst, a, b },
                Func::AND => Instruction::And { dst, a, b },
                Func::SLT => Instruction::Slt { dst, a, b },
                Func::JR => Instruction::Jr { src: a },
                func => Instruction::Reserved { dst, a, b, func },
            }
        }
        Opcode::ADDI => Instruction::Addi { dst: b, src: a, imm },
        Opcode::J => Instruction::J { target: imm13(word) },
        Opcode::JAL => Instruction::Jal { target: imm13(word) },
        Opcode::LW => Instruction::Lw { dst: b, base: a, imm },
        Opcode::SW => Instruction::Sw { src: b, base: a, imm },
        Opcode::JEQ => Instruction::Jeq { a, b, imm },
        _ => Instruction::Slti { dst: b, src: a, imm },
    }
}

/// Encode an instruction back to a 16-bit word.
///
/// Out-of-range fields are truncated to their width.
pub fn encode(instr: &Instruction) -> u16 {
    fn reg3(op: u8, a: u8, b: u8, c: u8, func: u8) -> u16 {
        (u16::from(op) << 13)
            | (u16::from(a & 0b111) << 10)
            | (u16::from(b & 0b111) << 7)
            | (u16::from(c & 0b111) << 4)
            | u16::from(func & 0b1111)
    }

    fn imm7(op: u8, a: u8, b: u8, imm: i16) -> u16 {
        (u16::from(op) << 13)
            | (u16::from(a & 0b111) << 10)
            | (u16::from(b & 0b111) << 7)
            | field::imm7(imm as u16)
    }

    fn imm13(op: u8, target: u16) -> u16 {
        (u16::from(op) << 13) | field::imm13(target)
    }

    match *instr {
        Instruction::Add { dst, a, b } => reg3(Opcode::REG, a, b, dst, Func::ADD),
        Instruction::Sub { dst, a, b } => reg3(Opcode::REG, a, b, dst, Func::SUB),
        Instruction::Or { dst, a, b } => reg3(Opcode::REG, a, b, dst, Func::OR),
        Instruction::And { dst, a, b } => reg3(Opcode::REG, a, b, dst, Func::AND),
        Instruction::Slt { dst, a, b } => reg3(Opcode::REG, a, b, dst, Func::SLT),
        Instruction::Jr { src } => reg3(Opcode::REG, src, 0, 0, Func::JR),
        Instruction::Reserved { dst, a, b, func } => reg3(Opcode::REG, a, b, dst, func),
        Instruction::Addi { dst, src, imm } => imm7(Opcode::ADDI, src, dst, imm),
        Instruction::Slti { dst, src, imm } => imm7(Opcode::SLTI, src, dst, imm),
        Instruction::Lw { dst, base, imm } => imm7(Opcode::LW, base, dst, imm),
        Instruction::Sw { src, base, imm } => imm7(Opcode::SW, base, src, imm),
        Instruction::Jeq { a, b, imm } => imm7(Opcode::JEQ, a, b, imm),
        Instruction::J { target } => imm13(Opcode::J, target),
        Instruction::Jal { target } => imm13(Opcode::JAL, target),
    }
}
