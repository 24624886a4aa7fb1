//! The operator's endpoint.
//!
//! An [`Operator`] is the only way into the shared slots from outside the
//! emulator thread. It is cheap to clone and can be handed to another thread,
//! an event loop, or a bridge implementation that acts as operator itself.

use std::sync::Arc;

use tracing::info;

use crate::bridge::Disposition;
use crate::sync::slot::{DeliveryOutcome, ResumeKind, Shared, SlotState, ValueKind};

/// Cloneable handle used to feed values and control signals to the emulator.
#[derive(Clone)]
pub struct Operator {
    pub(crate) shared: Arc<Shared>,
}

impl Operator {
    /// Create a fresh endpoint with every slot idle.
    pub fn new(disposition: Disposition) -> Self {
        Self {
            shared: Arc::new(Shared::new(disposition)),
        }
    }

    /// Deliver an integer to an outstanding `int` request.
    pub fn deliver_int(&self, value: i32) -> DeliveryOutcome {
        self.shared.deliver(ValueKind::Int, u64::from(value as u32))
    }

    /// Deliver a single-precision float.
    pub fn deliver_float(&self, value: f32) -> DeliveryOutcome {
        self.shared.deliver(ValueKind::Float, u64::from(value.to_bits()))
    }

    /// Deliver a double. Both halves of a split read come from this one value.
    pub fn deliver_double(&self, value: f64) -> DeliveryOutcome {
        self.shared.deliver(ValueKind::Double, value.to_bits())
    }

    /// Deliver a character.
    pub fn deliver_char(&self, value: char) -> DeliveryOutcome {
        self.shared.deliver(ValueKind::Char, u64::from(u32::from(value)))
    }

    /// Hand a fresh string buffer to the emulator.
    pub fn deliver_string(&self, value: impl Into<String>) -> DeliveryOutcome {
        self.shared.deliver_text(value.into())
    }

    /// Signal a suspended controller to go on.
    ///
    /// `ResumeKind::Cancel` also raises the cancellation flag, so it is seen
    /// by input waits as well as by the controller.
    pub fn resume(&self, kind: ResumeKind) {
        if kind == ResumeKind::Cancel {
            self.cancel();
        }
        self.shared.post_resume(kind);
    }

    /// Whether a resume signal is posted and not yet consumed.
    pub fn resume_pending(&self) -> bool {
        self.shared.resume_pending()
    }

    /// Tear the session down. Cannot be undone.
    pub fn cancel(&self) {
        if !self.shared.cancel_requested() {
            info!("operator requested cancellation");
        }
        self.shared.request_cancel();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel_requested()
    }

    /// Choose between free running and stopping at every boundary.
    pub fn set_disposition(&self, disposition: Disposition) {
        self.shared.set_disposition(disposition);
    }

    /// The currently chosen disposition.
    pub fn disposition(&self) -> Disposition {
        self.shared.disposition()
    }

    /// The datatype the emulator is blocked on, if any.
    pub fn awaiting(&self) -> Option<ValueKind> {
        self.shared.awaiting()
    }

    pub fn slot_state(&self, kind: ValueKind) -> SlotState {
        self.shared.slot_state(kind)
    }
}

impl Default for Operator {
    fn default() -> Self {
        Self::new(Disposition::Run)
    }
}

impl std::fmt::Debug for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operator")
            .field("disposition", &self.disposition())
            .field("awaiting", &self.awaiting())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Operator>();
    }

    #[test]
    fn test_cancel_resume_raises_flag() {
        let op = Operator::new(Disposition::Step);
        assert!(!op.is_cancelled());
        op.resume(ResumeKind::Cancel);
        assert!(op.is_cancelled());
    }

    #[test]
    fn test_clones_share_state() {
        let op = Operator::default();
        let other = op.clone();
        other.set_disposition(Disposition::Step);
        assert_eq!(op.disposition(), Disposition::Step);
        other.cancel();
        assert!(op.is_cancelled());
    }

    #[test]
    fn test_delivery_without_request_is_discarded() {
        let op = Operator::default();
        assert_eq!(op.deliver_int(5), DeliveryOutcome::Discarded);
        assert_eq!(op.deliver_double(1.5), DeliveryOutcome::Discarded);
        assert_eq!(op.slot_state(ValueKind::Int), SlotState::Idle);
    }
}
