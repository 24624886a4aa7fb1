//! Sparse byte-addressed memory for the demonstration core.
//!
//! Unwritten bytes read as zero. Multi-byte accesses are little-endian.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Largest access width, in bytes.
pub const MAX_ACCESS: usize = 8;

/// Sparse memory image.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Memory {
    bytes: BTreeMap<u64, u8>,
}

impl Memory {
    /// Create an empty memory.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_byte(&self, addr: u64) -> u8 {
        self.bytes.get(&addr).copied().unwrap_or(0)
    }

    pub fn write_byte(&mut self, addr: u64, value: u8) {
        if value == 0 {
            self.bytes.remove(&addr);
        } else {
            self.bytes.insert(addr, value);
        }
    }

    /// Read a little-endian value of `width` bytes.
    pub fn read(&self, addr: u64, width: usize) -> Result<u64, MemoryError> {
        check_width(width)?;
        let mut value = 0u64;
        for i in (0..width as u64).rev() {
            value = (value << 8) | u64::from(self.read_byte(addr.wrapping_add(i)));
        }
        Ok(value)
    }

    /// Write the low `width` bytes of `value`, little-endian.
    pub fn write(&mut self, addr: u64, width: usize, value: u64) -> Result<(), MemoryError> {
        check_width(width)?;
        for i in 0..width as u64 {
            self.write_byte(addr.wrapping_add(i), (value >> (8 * i)) as u8);
        }
        Ok(())
    }

    /// Read a NUL-terminated string starting at `addr`.
    pub fn read_cstr(&self, addr: u64) -> String {
        let bytes: Vec<u8> = (0..)
            .map(|i| self.read_byte(addr.wrapping_add(i)))
            .take_while(|&b| b != 0)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory")
            .field("non_zero_bytes", &self.bytes.len())
            .finish()
    }
}

fn check_width(width: usize) -> Result<(), MemoryError> {
    if width == 0 || width > MAX_ACCESS || !width.is_power_of_two() {
        return Err(MemoryError::BadWidth(width));
    }
    Ok(())
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("unsupported access width of {0} bytes")]
    BadWidth(usize),
}
