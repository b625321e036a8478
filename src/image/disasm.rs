//! Disassembler for E20 programs.
//!
//! Converts machine words back to E20 assembly syntax.

use crate::cpu::decode::{decode, Instruction};

/// Disassemble a single word fetched from `addr`.
///
/// The address matters only for `j`: a jump to its own address is shown
/// as `halt`.
pub fn disassemble_word(word: u16, addr: u16) -> String {
    format_instruction(&decode(word), addr)
}

/// Disassemble a slice of words loaded from address 0.
pub fn disassemble(words: &[u16]) -> String {
    let mut output = String::new();

    for (addr, word) in words.iter().enumerate() {
        let line = disassemble_word(*word, addr as u16);
        output.push_str(&format!("{:04}: {:04x}  {}\n", addr, word, line));
    }

    output
}

/// Format a decoded instruction as assembly text.
pub fn format_instruction(instr: &Instruction, addr: u16) -> String {
    match *instr {
        Instruction::Add { dst, a, b } => format!("add ${},${},${}", dst, a, b),
        Instruction::Sub { dst, a, b } => format!("sub ${},${},${}", dst, a, b),
        Instruction::Or { dst, a, b } => format!("or ${},${},${}", dst, a, b),
        Instruction::And { dst, a, b } => format!("and ${},${},${}", dst, a, b),
        Instruction::Slt { dst, a, b } => format!("slt ${},${},${}", dst, a, b),
        Instruction::Jr { src } => format!("jr ${}", src),
        Instruction::Reserved { .. } => {
            format!(".fill {}", crate::cpu::decode::encode(instr))
        }

        Instruction::Addi { dst, src, imm } => format!("addi ${},${},{}", dst, src, imm),
        Instruction::Slti { dst, src, imm } => format!("slti ${},${},{}", dst, src, imm),
        Instruction::Lw { dst, base, imm } => format!("lw ${},{}(${})", dst, imm, base),
        Instruction::Sw { src, base, imm } => format!("sw ${},{}(${})", src, imm, base),

        Instruction::Jeq { a, b, imm } => format!("jeq ${},${},{}", a, b, imm),
        Instruction::J { target } if target == addr => "halt".to_string(),
        Instruction::J { target } => format!("j {}", target),
        Instruction::Jal { target } => format!("jal {}", target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::encode;

    fn dis(instr: Instruction, addr: u16) -> String {
        disassemble_word(encode(&instr), addr)
    }

    #[test]
    fn test_disassemble_register_group() {
        assert_eq!(dis(Instruction::Add { dst: 3, a: 1, b: 2 }, 0), "add $3,$1,$2");
        assert_eq!(dis(Instruction::Slt { dst: 1, a: 2, b: 3 }, 0), "slt $1,$2,$3");
        assert_eq!(dis(Instruction::Jr { src: 7 }, 0), "jr $7");
    }

    #[test]
    fn test_disassemble_immediates() {
        assert_eq!(dis(Instruction::Addi { dst: 1, src: 0, imm: 5 }, 0), "addi $1,$0,5");
        assert_eq!(dis(Instruction::Lw { dst: 2, base: 3, imm: -1 }, 0), "lw $2,-1($3)");
        assert_eq!(dis(Instruction::Sw { src: 2, base: 3, imm: 4 }, 0), "sw $2,4($3)");
        assert_eq!(dis(Instruction::Jeq { a: 1, b: 2, imm: -3 }, 0), "jeq $1,$2,-3");
    }

    #[test]
    fn test_disassemble_halt() {
        assert_eq!(dis(Instruction::J { target: 3 }, 3), "halt");
        assert_eq!(dis(Instruction::J { target: 3 }, 4), "j 3");
    }

    #[test]
    fn test_disassemble_reserved_as_fill() {
        assert_eq!(disassemble_word(0b0000_0000_0000_0101, 0), ".fill 5");
    }

    #[test]
    fn test_disassemble_listing() {
        let listing = disassemble(&[encode(&Instruction::J { target: 0 })]);
        assert_eq!(listing, "0000: 4000  halt\n");
    }
}
