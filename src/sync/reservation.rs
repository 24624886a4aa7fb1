//! Load-reserved / store-conditional reservation monitor.
//!
//! Holds the single outstanding reservation. Matching and cancelling are
//! separate calls: whether a failed store-conditional also drops the
//! reservation is up to the instruction semantics calling in.

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Address width the monitor compares at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Xlen {
    /// 32-bit machine: only the low 32 bits of an address take part.
    Rv32,
    /// 64-bit machine: full-width comparison.
    Rv64,
}

impl Xlen {
    /// Build from a register width in bits.
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            32 => Some(Xlen::Rv32),
            64 => Some(Xlen::Rv64),
            _ => None,
        }
    }

    /// Register width in bits.
    pub fn bits(self) -> u32 {
        match self {
            Xlen::Rv32 => 32,
            Xlen::Rv64 => 64,
        }
    }

    /// Mask applied to both sides of a reservation comparison.
    pub fn address_mask(self) -> u64 {
        match self {
            Xlen::Rv32 => 0x0000_0000_FFFF_FFFF,
            Xlen::Rv64 => u64::MAX,
        }
    }
}

/// The single exclusive-access reservation.
#[derive(Debug, Clone)]
pub struct ReservationMonitor {
    xlen: Xlen,
    address: Option<u64>,
}

impl ReservationMonitor {
    /// Create an empty monitor for the given address width.
    pub fn new(xlen: Xlen) -> Self {
        Self { xlen, address: None }
    }

    /// Reserve `addr`, replacing any previous reservation.
    pub fn load_reserve(&mut self, addr: u64) {
        self.address = Some(addr);
        trace!("reservation <- {addr:#018x}");
    }

    /// True iff a reservation is held and its masked address equals `addr`'s.
    ///
    /// Never mutates the monitor.
    pub fn match_reserve(&self, addr: u64) -> bool {
        let mask = self.xlen.address_mask();
        let ok = matches!(self.address, Some(held) if held & mask == addr & mask);
        trace!(
            "reservation({}): {:#018x}, key={addr:#018x}: {}",
            if self.address.is_some() { 'v' } else { 'i' },
            self.address.unwrap_or(0),
            if ok { "ok" } else { "fail" }
        );
        ok
    }

    /// Drop the reservation, if any.
    pub fn cancel_reserve(&mut self) {
        trace!("reservation <- none");
        self.address = None;
    }

    /// Whether a store-conditional may be speculated. Always permitted.
    pub fn speculate_conditional(&self) -> bool {
        true
    }

    /// The currently reserved address.
    pub fn reserved(&self) -> Option<u64> {
        self.address
    }

    /// Address width this monitor compares at.
    pub fn xlen(&self) -> Xlen {
        self.xlen
    }
}
