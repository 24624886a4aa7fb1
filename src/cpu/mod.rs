//! A small register machine used to drive the host link end to end.
//!
//! - 32 integer registers (x0 hard-wired zero) and 32 float registers
//! - sparse byte-addressed memory
//! - host reads, LR/SC and program output as instructions

pub mod execute;
pub mod instruction;
pub mod memory;
pub mod registers;

pub use execute::{Cpu, CpuError, CpuState};
pub use instruction::Instruction;
pub use memory::{Memory, MemoryError};
pub use registers::Registers;
