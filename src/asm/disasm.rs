//! Program listings.

use crate::cpu::instruction::{Instruction, INSTRUCTION_BYTES};

/// Format one line of a listing.
pub fn listing_line(index: usize, instr: &Instruction) -> String {
    format!("{:#010x}: {}", index as u64 * INSTRUCTION_BYTES, instr)
}

/// Render a whole program, one instruction per line with its address.
pub fn listing(program: &[Instruction]) -> String {
    let mut output = String::new();
    for (index, instr) in program.iter().enumerate() {
        output.push_str(&listing_line(index, instr));
        output.push('\n');
    }
    output
}
