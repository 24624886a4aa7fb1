//! Lock-free mailboxes shared between the emulator thread and the operator.
//!
//! Every field has exactly one writer per phase. A value slot walks
//! `Idle -> AwaitingValue` (emulator), `AwaitingValue -> Writing -> Delivered`
//! (operator), `Delivered -> Idle` (emulator). The operator only touches the
//! payload after winning the `AwaitingValue -> Writing` exchange, and the
//! emulator only reads it after observing `Delivered`, so the payload is never
//! accessed by both sides at once.
//!
//! Cancellation moves a slot back to `Idle` by compare-exchange only, never by
//! a plain store, so it cannot overwrite a delivery that is in flight.

#[cfg(all(feature = "loom", test))]
use loom::sync::atomic::{AtomicBool, AtomicU64, AtomicU8};
#[cfg(not(all(feature = "loom", test)))]
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8};

use std::sync::atomic::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bridge::Disposition;

/// Datatypes the operator can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Int,
    Float,
    Double,
    Char,
    String,
}

impl ValueKind {
    /// All kinds, in slot order.
    pub const ALL: [ValueKind; 5] = [
        ValueKind::Int,
        ValueKind::Float,
        ValueKind::Double,
        ValueKind::Char,
        ValueKind::String,
    ];

    fn index(self) -> usize {
        match self {
            ValueKind::Int => 0,
            ValueKind::Float => 1,
            ValueKind::Double => 2,
            ValueKind::Char => 3,
            ValueKind::String => 4,
        }
    }

    /// Short lowercase name, used in prompts.
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
            ValueKind::Char => "char",
            ValueKind::String => "string",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Externally visible state of one request slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotState {
    Idle,
    AwaitingValue,
    Delivered,
}

/// Result of an operator delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The value is now waiting for the emulator.
    Accepted,
    /// No request was outstanding for this slot; the value was dropped.
    Discarded,
}

/// Operator's resume signal, consumed once per suspension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResumeKind {
    Continue,
    SingleStep,
    Cancel,
}

const IDLE: u8 = 0;
const AWAITING: u8 = 1;
const WRITING: u8 = 2;
const DELIVERED: u8 = 3;

const NO_RESUME: u8 = 0;

fn encode_resume(kind: ResumeKind) -> u8 {
    match kind {
        ResumeKind::Continue => 1,
        ResumeKind::SingleStep => 2,
        ResumeKind::Cancel => 3,
    }
}

fn decode_resume(raw: u8) -> Option<ResumeKind> {
    match raw {
        1 => Some(ResumeKind::Continue),
        2 => Some(ResumeKind::SingleStep),
        3 => Some(ResumeKind::Cancel),
        _ => None,
    }
}

fn encode_disposition(disposition: Disposition) -> u8 {
    match disposition {
        Disposition::Run => 0,
        Disposition::Step => 1,
        Disposition::HaltRequested => 2,
    }
}

fn decode_disposition(raw: u8) -> Disposition {
    match raw {
        1 => Disposition::Step,
        2 => Disposition::HaltRequested,
        _ => Disposition::Run,
    }
}

struct Slot {
    state: AtomicU8,
    bits: AtomicU64,
}

impl Slot {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(IDLE),
            bits: AtomicU64::new(0),
        }
    }
}

/// State shared by [`crate::sync::Operator`] and the emulator-side components.
pub(crate) struct Shared {
    slots: [Slot; 5],
    /// Payload of the string slot. Filled only while the slot is `Writing`.
    text: ArcSwapOption<String>,
    pending_resume: AtomicU8,
    disposition: AtomicU8,
    cancel: AtomicBool,
}

impl Shared {
    pub(crate) fn new(disposition: Disposition) -> Self {
        Self {
            slots: [Slot::new(), Slot::new(), Slot::new(), Slot::new(), Slot::new()],
            text: ArcSwapOption::empty(),
            pending_resume: AtomicU8::new(NO_RESUME),
            disposition: AtomicU8::new(encode_disposition(disposition)),
            cancel: AtomicBool::new(false),
        }
    }

    fn slot(&self, kind: ValueKind) -> &Slot {
        &self.slots[kind.index()]
    }

    pub(crate) fn slot_state(&self, kind: ValueKind) -> SlotState {
        match self.slot(kind).state.load(Ordering::Acquire) {
            IDLE => SlotState::Idle,
            DELIVERED => SlotState::Delivered,
            _ => SlotState::AwaitingValue,
        }
    }

    /// The kind currently waiting for the operator, if any.
    pub(crate) fn awaiting(&self) -> Option<ValueKind> {
        ValueKind::ALL
            .into_iter()
            .find(|&kind| self.slot(kind).state.load(Ordering::Acquire) == AWAITING)
    }

    // ==================== Emulator side ====================

    pub(crate) fn open(&self, kind: ValueKind) {
        self.slot(kind).state.store(AWAITING, Ordering::Release);
        debug!(%kind, "slot idle -> awaiting value");
    }

    /// Take a delivered value and return the slot to idle.
    pub(crate) fn take(&self, kind: ValueKind) -> Option<u64> {
        let slot = self.slot(kind);
        if slot.state.load(Ordering::Acquire) != DELIVERED {
            return None;
        }
        let bits = slot.bits.load(Ordering::Acquire);
        slot.state.store(IDLE, Ordering::Release);
        debug!(%kind, "slot delivered -> idle");
        Some(bits)
    }

    pub(crate) fn take_text(&self) -> Option<String> {
        let slot = self.slot(ValueKind::String);
        if slot.state.load(Ordering::Acquire) != DELIVERED {
            return None;
        }
        let text = self.text.swap(None);
        slot.state.store(IDLE, Ordering::Release);
        debug!(kind = %ValueKind::String, "slot delivered -> idle");
        Some(
            text.map(|text| Arc::try_unwrap(text).unwrap_or_else(|shared| (*shared).clone()))
                .unwrap_or_default(),
        )
    }

    /// Force a slot back to idle, dropping anything delivered into it.
    ///
    /// A delivery that already won the slot is waited out and then dropped,
    /// so the slot never ends up `Delivered` with no request behind it.
    pub(crate) fn reset(&self, kind: ValueKind) {
        let state = &self.slot(kind).state;
        loop {
            match state.load(Ordering::Acquire) {
                IDLE => break,
                WRITING => spin_wait(),
                current => {
                    if state
                        .compare_exchange(current, IDLE, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        debug!(%kind, "slot reset to idle");
                        break;
                    }
                }
            }
        }
        if kind == ValueKind::String {
            self.text.store(None);
        }
    }

    pub(crate) fn take_resume(&self) -> Option<ResumeKind> {
        decode_resume(self.pending_resume.swap(NO_RESUME, Ordering::AcqRel))
    }

    pub(crate) fn resume_pending(&self) -> bool {
        self.pending_resume.load(Ordering::Acquire) != NO_RESUME
    }

    // ==================== Operator side ====================

    fn begin_write(&self, kind: ValueKind) -> bool {
        let won = self
            .slot(kind)
            .state
            .compare_exchange(AWAITING, WRITING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !won {
            warn!(%kind, "operator delivered a {kind} with no request outstanding; discarded");
        }
        won
    }

    pub(crate) fn deliver(&self, kind: ValueKind, bits: u64) -> DeliveryOutcome {
        if !self.begin_write(kind) {
            return DeliveryOutcome::Discarded;
        }
        let slot = self.slot(kind);
        slot.bits.store(bits, Ordering::Release);
        slot.state.store(DELIVERED, Ordering::Release);
        debug!(%kind, "slot awaiting value -> delivered");
        DeliveryOutcome::Accepted
    }

    pub(crate) fn deliver_text(&self, value: String) -> DeliveryOutcome {
        if !self.begin_write(ValueKind::String) {
            return DeliveryOutcome::Discarded;
        }
        self.text.store(Some(Arc::new(value)));
        self.slot(ValueKind::String)
            .state
            .store(DELIVERED, Ordering::Release);
        debug!(kind = %ValueKind::String, "slot awaiting value -> delivered");
        DeliveryOutcome::Accepted
    }

    pub(crate) fn post_resume(&self, kind: ResumeKind) {
        self.pending_resume
            .store(encode_resume(kind), Ordering::Release);
    }

    pub(crate) fn set_disposition(&self, disposition: Disposition) {
        self.disposition
            .store(encode_disposition(disposition), Ordering::Release);
    }

    pub(crate) fn disposition(&self) -> Disposition {
        decode_disposition(self.disposition.load(Ordering::Acquire))
    }

    pub(crate) fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub(crate) fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }
}

#[cfg(all(test, feature = "loom"))]
#[inline]
fn spin_wait() {
    loom::thread::yield_now();
}

#[cfg(not(all(test, feature = "loom")))]
#[inline]
fn spin_wait() {
    std::hint::spin_loop();
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    #[test]
    fn test_slot_lifecycle() {
        let shared = Shared::new(Disposition::Run);
        assert_eq!(shared.slot_state(ValueKind::Int), SlotState::Idle);

        shared.open(ValueKind::Int);
        assert_eq!(shared.slot_state(ValueKind::Int), SlotState::AwaitingValue);
        assert_eq!(shared.awaiting(), Some(ValueKind::Int));
        assert_eq!(shared.take(ValueKind::Int), None);

        assert_eq!(shared.deliver(ValueKind::Int, 7), DeliveryOutcome::Accepted);
        assert_eq!(shared.slot_state(ValueKind::Int), SlotState::Delivered);
        assert_eq!(shared.awaiting(), None);

        assert_eq!(shared.take(ValueKind::Int), Some(7));
        assert_eq!(shared.slot_state(ValueKind::Int), SlotState::Idle);
    }

    #[test]
    fn test_delivery_to_idle_slot_is_discarded() {
        let shared = Shared::new(Disposition::Run);
        assert_eq!(shared.deliver(ValueKind::Float, 1), DeliveryOutcome::Discarded);
        assert_eq!(shared.slot_state(ValueKind::Float), SlotState::Idle);
        assert_eq!(
            shared.deliver_text("late".into()),
            DeliveryOutcome::Discarded
        );
    }

    #[test]
    fn test_second_delivery_does_not_overwrite() {
        let shared = Shared::new(Disposition::Run);
        shared.open(ValueKind::Char);
        assert_eq!(shared.deliver(ValueKind::Char, 'a' as u64), DeliveryOutcome::Accepted);
        assert_eq!(shared.deliver(ValueKind::Char, 'b' as u64), DeliveryOutcome::Discarded);
        assert_eq!(shared.take(ValueKind::Char), Some('a' as u64));
    }

    #[test]
    fn test_text_payload_moves_once() {
        let shared = Shared::new(Disposition::Run);
        shared.open(ValueKind::String);
        shared.deliver_text("hello".into());
        assert_eq!(shared.take_text().as_deref(), Some("hello"));
        assert_eq!(shared.take_text(), None);
    }

    #[test]
    fn test_reset_drops_pending_text() {
        let shared = Shared::new(Disposition::Run);
        shared.open(ValueKind::String);
        shared.deliver_text("never read".into());
        shared.reset(ValueKind::String);
        assert_eq!(shared.slot_state(ValueKind::String), SlotState::Idle);
        assert_eq!(shared.take_text(), None);
    }

    #[test]
    fn test_reset_after_delivery_leaves_slot_idle() {
        let shared = Shared::new(Disposition::Run);
        shared.open(ValueKind::Int);
        assert_eq!(shared.deliver(ValueKind::Int, 9), DeliveryOutcome::Accepted);
        shared.reset(ValueKind::Int);
        assert_eq!(shared.slot_state(ValueKind::Int), SlotState::Idle);
        assert_eq!(shared.take(ValueKind::Int), None);
        assert_eq!(shared.deliver(ValueKind::Int, 10), DeliveryOutcome::Discarded);
    }

    #[test]
    fn test_reset_races_delivery_from_another_thread() {
        for round in 0..200 {
            let shared = std::sync::Arc::new(Shared::new(Disposition::Run));
            shared.open(ValueKind::Double);
            let operator = std::sync::Arc::clone(&shared);
            let handle = std::thread::spawn(move || operator.deliver(ValueKind::Double, round));
            shared.reset(ValueKind::Double);
            handle.join().unwrap();
            assert_eq!(
                shared.slot_state(ValueKind::Double),
                SlotState::Idle,
                "round {round}"
            );
        }
    }

    #[test]
    fn test_resume_consumed_once() {
        let shared = Shared::new(Disposition::Step);
        assert_eq!(shared.take_resume(), None);
        shared.post_resume(ResumeKind::SingleStep);
        assert_eq!(shared.take_resume(), Some(ResumeKind::SingleStep));
        assert_eq!(shared.take_resume(), None);
    }

    #[test]
    fn test_disposition_roundtrip() {
        let shared = Shared::new(Disposition::Step);
        assert_eq!(shared.disposition(), Disposition::Step);
        shared.set_disposition(Disposition::HaltRequested);
        assert_eq!(shared.disposition(), Disposition::HaltRequested);
    }
}

#[cfg(all(test, feature = "loom"))]
mod loom_tests {
    use super::*;

    use loom::sync::Arc;
    use loom::thread;

    #[test]
    fn deliver_races_take() {
        loom::model(|| {
            let shared = Arc::new(Shared::new(Disposition::Run));
            shared.open(ValueKind::Int);

            let operator = Arc::clone(&shared);
            let handle = thread::spawn(move || operator.deliver(ValueKind::Int, 42));

            let early = shared.take(ValueKind::Int);
            assert_eq!(handle.join().unwrap(), DeliveryOutcome::Accepted);

            match early {
                Some(bits) => {
                    assert_eq!(bits, 42);
                    assert_eq!(shared.slot_state(ValueKind::Int), SlotState::Idle);
                }
                None => assert_eq!(shared.take(ValueKind::Int), Some(42)),
            }
        });
    }

    #[test]
    fn deliver_races_reset() {
        loom::model(|| {
            let shared = Arc::new(Shared::new(Disposition::Run));
            shared.open(ValueKind::Char);

            let operator = Arc::clone(&shared);
            let handle = thread::spawn(move || operator.deliver(ValueKind::Char, 'x' as u64));

            shared.reset(ValueKind::Char);
            handle.join().unwrap();

            assert_eq!(shared.slot_state(ValueKind::Char), SlotState::Idle);
            assert_eq!(shared.take(ValueKind::Char), None);
        });
    }

    #[test]
    fn resume_taken_at_most_once() {
        loom::model(|| {
            let shared = Arc::new(Shared::new(Disposition::Step));

            let operator = Arc::clone(&shared);
            let handle = thread::spawn(move || operator.post_resume(ResumeKind::Continue));

            let first = shared.take_resume();
            handle.join().unwrap();
            let second = shared.take_resume();

            assert_eq!(
                [first, second].iter().filter(|r| r.is_some()).count(),
                1
            );
        });
    }
}
