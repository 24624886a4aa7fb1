//! Loader for demonstration programs.
//!
//! This module provides:
//! - A two-pass assembler (text → instructions)
//! - Listings (instructions → readable text)

pub mod assembler;
pub mod disasm;

pub use assembler::{assemble, parse_address, parse_number, AssemblerError};
pub use disasm::{listing, listing_line};
