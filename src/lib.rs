//! # rv-hostlink
//!
//! Operator synchronization layer for an instruction-set emulator.
//!
//! The emulator thread consults an [`ExecutionController`] at every
//! instruction boundary, asks a [`HostInputChannel`] for typed operator input,
//! and keeps LR/SC reservations in a [`ReservationMonitor`]. The operator side
//! holds an [`Operator`] and shares nothing with the emulator but atomics.
//! Waiting is always done by polling through a [`HostBridge`], so the same
//! core runs against a second thread, a blocking console, or a terminal UI
//! that it drives itself.
//!
//! A small register machine ([`cpu`], [`asm`]) exercises the layer end to end.

pub mod asm;
pub mod bridge;
pub mod config;
pub mod cpu;
pub mod error;
pub mod sync;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types
pub use asm::{assemble, listing, AssemblerError};
pub use bridge::{Breakpoints, ConsoleBridge, Disposition, HostBridge, SleepBridge, Wait};
pub use config::{ConfigError, HostConfig};
pub use cpu::{Cpu, CpuError, CpuState, Instruction};
pub use error::HostError;
pub use sync::{
    DeliveryOutcome, ExecutionController, HostInputChannel, HostLink, Mode, Operator,
    ReservationMonitor, ResumeKind, ValueKind, Xlen,
};

#[cfg(feature = "tui")]
pub use tui::TuiBridge;
