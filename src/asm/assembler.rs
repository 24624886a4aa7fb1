//! Two-pass assembler for demonstration programs.
//!
//! Syntax:
//! ```text
//! ; Comment
//!         li x10, 0x100     ; immediate, decimal or hex
//! retry:                    ; label
//!         lr x5, (x10)
//!         addi x5, x5, 1
//!         sc x6, x5, (x10)
//!         bnez x6, retry    ; branch to label
//!         halt
//! ```

use crate::cpu::Instruction;
use crate::cpu::registers::REGISTER_COUNT;
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to a list of instructions.
pub fn assemble(source: &str) -> Result<Vec<Instruction>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// Parse an integer literal: decimal or `0x` hex, optionally negative.
///
/// Hex literals may use all 64 bits; they are reinterpreted as signed.
pub fn parse_number(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let digits = digits.replace('_', "");
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u64>().ok()?,
    };
    let value = magnitude as i64;
    Some(if negative { value.wrapping_neg() } else { value })
}

/// Parse a code address: decimal or `0x` hex, never negative.
pub fn parse_address(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.starts_with('-') {
        return None;
    }
    parse_number(text).map(|value| value as u64)
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> instruction index).
    symbols: HashMap<String, usize>,
    /// Pending branch targets: (output_index, label, source_line).
    pending: Vec<(usize, String, usize)>,
    /// Output instructions.
    output: Vec<Instruction>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            pending: Vec::new(),
            output: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<Instruction>, AssemblerError> {
        // Pass 1: collect labels and generate code
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: resolve forward references
        self.resolve_references()?;

        Ok(std::mem::take(&mut self.output))
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove comments
        let line = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let mut line = line.trim();

        if let Some((label, rest)) = line.split_once(':') {
            let label = label.trim();
            if !is_identifier(label) {
                return Err(syntax(line_num, format!("bad label name `{label}`")));
            }
            if self.symbols.insert(label.to_string(), self.output.len()).is_some() {
                return Err(AssemblerError::DuplicateLabel {
                    line: line_num,
                    label: label.to_string(),
                });
            }
            line = rest.trim();
        }

        if line.is_empty() {
            return Ok(());
        }

        let instr = self.parse_instruction(line, line_num)?;
        self.output.push(instr);
        Ok(())
    }

    fn parse_instruction(&mut self, line: &str, line_num: usize) -> Result<Instruction, AssemblerError> {
        let (mnemonic, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let mnemonic = mnemonic.to_lowercase();
        let operands: Vec<&str> = rest
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        let ops = Operands {
            items: &operands,
            mnemonic: &mnemonic,
            line: line_num,
        };

        let instr = match mnemonic.as_str() {
            // Control
            "nop" => {
                ops.expect(0)?;
                Instruction::Nop
            }
            "halt" | "hlt" => {
                ops.expect(0)?;
                Instruction::Halt
            }
            "j" | "jmp" => {
                ops.expect(1)?;
                self.branch_to(ops.items[0], line_num);
                Instruction::Jump { target: 0 }
            }
            "bnez" => {
                ops.expect(2)?;
                let rs = ops.int_reg(0)?;
                self.branch_to(ops.items[1], line_num);
                Instruction::Bnez { rs, target: 0 }
            }

            // Integer
            "li" => {
                ops.expect(2)?;
                Instruction::Li { rd: ops.int_reg(0)?, imm: ops.imm(1)? }
            }
            "addi" => {
                ops.expect(3)?;
                Instruction::Addi {
                    rd: ops.int_reg(0)?,
                    rs: ops.int_reg(1)?,
                    imm: ops.imm(2)?,
                }
            }
            "ld" => {
                ops.expect(2)?;
                Instruction::Load { rd: ops.int_reg(0)?, ra: ops.mem(1)? }
            }
            "st" => {
                ops.expect(2)?;
                Instruction::Store { rs: ops.int_reg(0)?, ra: ops.mem(1)? }
            }

            // Host input
            "readi" => {
                ops.expect(1)?;
                Instruction::ReadInt { rd: ops.int_reg(0)? }
            }
            "readf" => {
                ops.expect(1)?;
                Instruction::ReadFloat { fd: ops.float_reg(0)? }
            }
            "readd" => {
                ops.expect(1)?;
                Instruction::ReadDouble { fd: ops.float_reg(0)? }
            }
            "readc" => {
                ops.expect(1)?;
                Instruction::ReadChar { rd: ops.int_reg(0)? }
            }
            "reads" => {
                ops.expect(2)?;
                Instruction::ReadString { rd: ops.int_reg(0)?, ra: ops.mem(1)? }
            }

            // Atomics
            "lr" => {
                ops.expect(2)?;
                Instruction::LoadReserved { rd: ops.int_reg(0)?, ra: ops.mem(1)? }
            }
            "sc" => {
                ops.expect(3)?;
                Instruction::StoreConditional {
                    rd: ops.int_reg(0)?,
                    rs: ops.int_reg(1)?,
                    ra: ops.mem(2)?,
                }
            }

            // Output
            "print" => {
                ops.expect(1)?;
                Instruction::Print { rs: ops.int_reg(0)? }
            }
            "printf" => {
                ops.expect(1)?;
                Instruction::PrintFloat { fs: ops.float_reg(0)? }
            }
            "prints" => {
                ops.expect(1)?;
                Instruction::PrintString { ra: ops.mem(0)? }
            }

            _ => {
                return Err(AssemblerError::UnknownMnemonic {
                    line: line_num,
                    mnemonic: mnemonic.clone(),
                })
            }
        };

        Ok(instr)
    }

    /// Record a branch target for the instruction about to be emitted.
    fn branch_to(&mut self, label: &str, line_num: usize) {
        self.pending.push((self.output.len(), label.to_string(), line_num));
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for (out_idx, label, line_num) in &self.pending {
            let addr = *self
                .symbols
                .get(label)
                .ok_or_else(|| AssemblerError::UndefinedLabel {
                    line: *line_num,
                    label: label.clone(),
                })?;

            if let Some(Instruction::Jump { target } | Instruction::Bnez { target, .. }) =
                self.output.get_mut(*out_idx)
            {
                *target = addr;
            }
        }
        Ok(())
    }
}

/// Operand list of one source line.
struct Operands<'a> {
    items: &'a [&'a str],
    mnemonic: &'a str,
    line: usize,
}

impl Operands<'_> {
    fn expect(&self, count: usize) -> Result<(), AssemblerError> {
        if self.items.len() != count {
            return Err(syntax(
                self.line,
                format!(
                    "{} takes {count} operand(s), got {}",
                    self.mnemonic,
                    self.items.len()
                ),
            ));
        }
        Ok(())
    }

    fn int_reg(&self, index: usize) -> Result<u8, AssemblerError> {
        self.register(self.items[index], 'x')
    }

    fn float_reg(&self, index: usize) -> Result<u8, AssemblerError> {
        self.register(self.items[index], 'f')
    }

    /// A memory operand: `(xN)`.
    fn mem(&self, index: usize) -> Result<u8, AssemblerError> {
        let text = self.items[index];
        let inner = text
            .strip_prefix('(')
            .and_then(|t| t.strip_suffix(')'))
            .ok_or_else(|| syntax(self.line, format!("expected (xN), got `{text}`")))?;
        self.register(inner.trim(), 'x')
    }

    fn imm(&self, index: usize) -> Result<i64, AssemblerError> {
        let text = self.items[index];
        parse_number(text).ok_or_else(|| syntax(self.line, format!("invalid immediate `{text}`")))
    }

    fn register(&self, text: &str, file: char) -> Result<u8, AssemblerError> {
        text.strip_prefix(file)
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|&n| usize::from(n) < REGISTER_COUNT)
            .ok_or_else(|| syntax(self.line, format!("expected {file} register, got `{text}`")))
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn syntax(line: usize, message: String) -> AssemblerError {
    AssemblerError::SyntaxError { line, message }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("label defined twice on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            ; Simple test program
            readi x5
            print x5     ; echo it
            HALT
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(
            result,
            vec![
                Instruction::ReadInt { rd: 5 },
                Instruction::Print { rs: 5 },
                Instruction::Halt,
            ]
        );
    }

    #[test]
    fn test_assemble_with_labels() {
        let source = r#"
        start:
            j end
            nop
        end: halt
            bnez x1, start
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result[0], Instruction::Jump { target: 2 });
        assert_eq!(result[2], Instruction::Halt);
        assert_eq!(result[3], Instruction::Bnez { rs: 1, target: 0 });
    }

    #[test]
    fn test_assemble_operands() {
        let result = assemble("sc x3, x4, (x10)\naddi x1, x2, -0x10\nreads x5, ( x6 )").unwrap();
        assert_eq!(result[0], Instruction::StoreConditional { rd: 3, rs: 4, ra: 10 });
        assert_eq!(result[1], Instruction::Addi { rd: 1, rs: 2, imm: -16 });
        assert_eq!(result[2], Instruction::ReadString { rd: 5, ra: 6 });
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            assemble("nop\nfrob x1"),
            Err(AssemblerError::UnknownMnemonic { line: 2, .. })
        ));
        assert!(matches!(
            assemble("j nowhere"),
            Err(AssemblerError::UndefinedLabel { line: 1, .. })
        ));
        assert!(matches!(
            assemble("a:\na:"),
            Err(AssemblerError::DuplicateLabel { line: 2, .. })
        ));
        assert!(matches!(
            assemble("li x32, 1"),
            Err(AssemblerError::SyntaxError { line: 1, .. })
        ));
        assert!(matches!(
            assemble("readf x1"),
            Err(AssemblerError::SyntaxError { .. })
        ));
        assert!(matches!(
            assemble("lr x1, x2"),
            Err(AssemblerError::SyntaxError { .. })
        ));
        assert!(matches!(
            assemble("halt x1"),
            Err(AssemblerError::SyntaxError { .. })
        ));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("42"), Some(42));
        assert_eq!(parse_number(" -7 "), Some(-7));
        assert_eq!(parse_number("0x1_0000"), Some(0x10000));
        assert_eq!(parse_number("0XfF"), Some(255));
        assert_eq!(parse_number("0xFFFFFFFFFFFFFFFF"), Some(-1));
        assert_eq!(parse_number("-0x10"), Some(-16));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("loop"), None);
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("16"), Some(16));
        assert_eq!(parse_address(" 0x10 "), Some(0x10));
        assert_eq!(parse_address("0xFFFFFFFFFFFFFFFF"), Some(u64::MAX));
        assert_eq!(parse_address("-4"), None);
        assert_eq!(parse_address("-0x10"), None);
        assert_eq!(parse_address("end"), None);
    }
}
