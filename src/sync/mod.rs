//! Synchronization layer between the emulator thread and its operator.
//!
//! This module implements the three pieces an instruction core calls into:
//! - `ExecutionController`: consulted at every instruction boundary
//! - `HostInputChannel`: typed reads that park until the operator delivers
//! - `ReservationMonitor`: LR/SC reservation, always synchronous
//!
//! The emulator side and the [`Operator`] share nothing but atomics.

pub mod control;
pub mod input;
pub mod operator;
pub mod reservation;
mod slot;

pub use control::{ExecutionController, Mode};
pub use input::{HostInputChannel, HostValue};
pub use operator::Operator;
pub use reservation::{ReservationMonitor, Xlen};
pub use slot::{DeliveryOutcome, ResumeKind, SlotState, ValueKind};

use crate::bridge::Disposition;

/// Everything an instruction core needs on the emulator side.
#[derive(Debug)]
pub struct HostLink {
    pub control: ExecutionController,
    pub input: HostInputChannel,
    pub reservation: ReservationMonitor,
}

impl HostLink {
    /// Create the emulator side together with its operator endpoint.
    pub fn new(xlen: Xlen, disposition: Disposition) -> (Self, Operator) {
        let operator = Operator::new(disposition);
        let link = Self {
            control: ExecutionController::attach(&operator),
            input: HostInputChannel::attach(&operator),
            reservation: ReservationMonitor::new(xlen),
        };
        (link, operator)
    }
}
