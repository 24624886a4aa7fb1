//! Instruction set of the demonstration core.
//!
//! Every instruction occupies one 4-byte slot; branch targets are slot
//! indices resolved by the assembler.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of one instruction slot in bytes.
pub const INSTRUCTION_BYTES: u64 = 4;

/// A decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Control ====================

    /// No operation.
    Nop,

    /// Stop the core.
    Halt,

    /// Unconditional jump to slot `target`.
    Jump { target: usize },

    /// Jump to slot `target` if `xs != 0`.
    Bnez { rs: u8, target: usize },

    // ==================== Integer ====================

    /// xd := imm
    Li { rd: u8, imm: i64 },

    /// xd := xs + imm
    Addi { rd: u8, rs: u8, imm: i64 },

    /// xd := [xa]
    Load { rd: u8, ra: u8 },

    /// [xa] := xs
    Store { rs: u8, ra: u8 },

    // ==================== Host input ====================

    /// xd := int read from the operator, sign-extended
    ReadInt { rd: u8 },

    /// fd := float read from the operator, NaN-boxed
    ReadFloat { fd: u8 },

    /// fd := double read from the operator
    ReadDouble { fd: u8 },

    /// xd := Unicode code point of a char read from the operator, zero-extended.
    ///
    /// Not truncated to a byte: non-ASCII input such as `λ` reads as 0x3bb.
    ReadChar { rd: u8 },

    /// Copy a string from the operator to [xa..], NUL-terminated; xd := length
    ReadString { rd: u8, ra: u8 },

    // ==================== Atomics ====================

    /// xd := [xa], reserving xa
    LoadReserved { rd: u8, ra: u8 },

    /// [xa] := xs if xa is still reserved; xd := 0 on success, 1 on failure
    StoreConditional { rd: u8, rs: u8, ra: u8 },

    // ==================== Output ====================

    /// Print xs as a signed integer.
    Print { rs: u8 },

    /// Print fs as a float or double.
    PrintFloat { fs: u8 },

    /// Print the NUL-terminated string at [xa].
    PrintString { ra: u8 },
}

impl Instruction {
    /// Mnemonic as written in program text.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Nop => "nop",
            Instruction::Halt => "halt",
            Instruction::Jump { .. } => "j",
            Instruction::Bnez { .. } => "bnez",
            Instruction::Li { .. } => "li",
            Instruction::Addi { .. } => "addi",
            Instruction::Load { .. } => "ld",
            Instruction::Store { .. } => "st",
            Instruction::ReadInt { .. } => "readi",
            Instruction::ReadFloat { .. } => "readf",
            Instruction::ReadDouble { .. } => "readd",
            Instruction::ReadChar { .. } => "readc",
            Instruction::ReadString { .. } => "reads",
            Instruction::LoadReserved { .. } => "lr",
            Instruction::StoreConditional { .. } => "sc",
            Instruction::Print { .. } => "print",
            Instruction::PrintFloat { .. } => "printf",
            Instruction::PrintString { .. } => "prints",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.mnemonic();
        match *self {
            Instruction::Nop | Instruction::Halt => write!(f, "{m}"),
            Instruction::Jump { target } => write!(f, "{m} {:#x}", target as u64 * INSTRUCTION_BYTES),
            Instruction::Bnez { rs, target } => {
                write!(f, "{m} x{rs}, {:#x}", target as u64 * INSTRUCTION_BYTES)
            }
            Instruction::Li { rd, imm } => write!(f, "{m} x{rd}, {imm}"),
            Instruction::Addi { rd, rs, imm } => write!(f, "{m} x{rd}, x{rs}, {imm}"),
            Instruction::Load { rd, ra } | Instruction::LoadReserved { rd, ra } => {
                write!(f, "{m} x{rd}, (x{ra})")
            }
            Instruction::Store { rs, ra } => write!(f, "{m} x{rs}, (x{ra})"),
            Instruction::ReadInt { rd } | Instruction::ReadChar { rd } => write!(f, "{m} x{rd}"),
            Instruction::ReadFloat { fd } | Instruction::ReadDouble { fd } => write!(f, "{m} f{fd}"),
            Instruction::ReadString { rd, ra } => write!(f, "{m} x{rd}, (x{ra})"),
            Instruction::StoreConditional { rd, rs, ra } => write!(f, "{m} x{rd}, x{rs}, (x{ra})"),
            Instruction::Print { rs } => write!(f, "{m} x{rs}"),
            Instruction::PrintFloat { fs } => write!(f, "{m} f{fs}"),
            Instruction::PrintString { ra } => write!(f, "{m} (x{ra})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Instruction::Li { rd: 5, imm: -3 }.to_string(), "li x5, -3");
        assert_eq!(Instruction::Bnez { rs: 1, target: 2 }.to_string(), "bnez x1, 0x8");
        assert_eq!(
            Instruction::StoreConditional { rd: 3, rs: 4, ra: 10 }.to_string(),
            "sc x3, x4, (x10)"
        );
        assert_eq!(Instruction::ReadDouble { fd: 2 }.to_string(), "readd f2");
    }
}
