//! Register file of the demonstration core.
//!
//! - x0..x31: integer registers, x0 hard-wired to zero
//! - f0..f31: floating-point registers, raw bits (singles NaN-boxed)
//! - pc: byte address of the next instruction

use crate::sync::Xlen;
use serde::{Deserialize, Serialize};

/// Number of registers in each file.
pub const REGISTER_COUNT: usize = 32;

/// Upper half written over a single-precision value held in a 64-bit
/// float register.
pub const NAN_BOX: u64 = 0xFFFF_FFFF_0000_0000;

/// The register file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Registers {
    x: [u64; REGISTER_COUNT],
    f: [u64; REGISTER_COUNT],
    /// Program counter.
    pub pc: u64,
    xlen: Xlen,
}

impl Registers {
    /// Create a zeroed register file.
    pub fn new(xlen: Xlen) -> Self {
        Self {
            x: [0; REGISTER_COUNT],
            f: [0; REGISTER_COUNT],
            pc: 0,
            xlen,
        }
    }

    pub fn x(&self, index: u8) -> u64 {
        self.x[usize::from(index) % REGISTER_COUNT]
    }

    /// Write an integer register, truncated to XLEN. Writes to x0 are dropped.
    pub fn set_x(&mut self, index: u8, value: u64) {
        let index = usize::from(index) % REGISTER_COUNT;
        if index != 0 {
            self.x[index] = value & self.xlen.address_mask();
        }
    }

    pub fn f(&self, index: u8) -> u64 {
        self.f[usize::from(index) % REGISTER_COUNT]
    }

    pub fn set_f(&mut self, index: u8, bits: u64) {
        self.f[usize::from(index) % REGISTER_COUNT] = bits;
    }

    /// Integer register as a signed value at XLEN.
    pub fn x_signed(&self, index: u8) -> i64 {
        let value = self.x(index);
        match self.xlen {
            Xlen::Rv32 => value as u32 as i32 as i64,
            Xlen::Rv64 => value as i64,
        }
    }

    pub fn xlen(&self) -> Xlen {
        self.xlen
    }

    /// Trace line for an integer register write.
    pub fn describe_x(&self, index: u8) -> String {
        match self.xlen {
            Xlen::Rv32 => format!("x{index} <- 0x{:08X}", self.x(index)),
            Xlen::Rv64 => format!("x{index} <- 0x{:016X}", self.x(index)),
        }
    }

    /// Trace line for a float register write, high word first.
    pub fn describe_f(&self, index: u8) -> String {
        let bits = self.f(index);
        format!("f{index} <- 0x{:08X}{:08X}", bits >> 32, bits as u32)
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new(Xlen::Rv32)
    }
}
