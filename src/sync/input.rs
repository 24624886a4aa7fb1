//! Typed blocking reads from the operator.
//!
//! An input instruction calls [`HostInputChannel::request`] (or one of the
//! string / split-double variants); the call parks the emulator in a polling
//! loop until the operator delivers through [`Operator`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::bridge::{Disposition, HostBridge, Wait};
use crate::error::HostError;
use crate::sync::operator::Operator;
use crate::sync::slot::{Shared, SlotState, ValueKind};

/// A scalar that travels through a slot as raw bits.
pub trait HostValue: Sized {
    const KIND: ValueKind;

    fn from_bits(bits: u64) -> Self;
}

impl HostValue for i32 {
    const KIND: ValueKind = ValueKind::Int;

    fn from_bits(bits: u64) -> Self {
        bits as u32 as i32
    }
}

impl HostValue for f32 {
    const KIND: ValueKind = ValueKind::Float;

    fn from_bits(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }
}

impl HostValue for f64 {
    const KIND: ValueKind = ValueKind::Double;

    fn from_bits(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}

impl HostValue for char {
    const KIND: ValueKind = ValueKind::Char;

    fn from_bits(bits: u64) -> Self {
        char::from_u32(bits as u32).unwrap_or(char::REPLACEMENT_CHARACTER)
    }
}

/// Emulator-side end of the input slots.
pub struct HostInputChannel {
    shared: Arc<Shared>,
    outstanding: Option<ValueKind>,
    /// The one live string buffer.
    text: Option<String>,
    /// Bits of the last double, kept for the high-half read.
    double_snapshot: u64,
}

impl HostInputChannel {
    /// Attach a channel to an operator endpoint.
    pub fn attach(operator: &Operator) -> Self {
        Self {
            shared: Arc::clone(&operator.shared),
            outstanding: None,
            text: None,
            double_snapshot: 0,
        }
    }

    /// Ask the operator for a `T` and wait until it arrives.
    pub fn request<T, B>(&mut self, bridge: &mut B) -> Result<T, HostError>
    where
        T: HostValue,
        B: HostBridge + ?Sized,
    {
        self.issue(T::KIND)?;
        self.complete(bridge)
    }

    /// Open the slot for `kind` without waiting.
    ///
    /// Fails if another request is still outstanding; that request is left
    /// exactly as it was.
    pub fn issue(&mut self, kind: ValueKind) -> Result<(), HostError> {
        if self.shared.cancel_requested() {
            return Err(HostError::Cancelled);
        }
        if let Some(outstanding) = self.outstanding {
            warn!(%outstanding, requested = %kind, "input request while another is outstanding");
            return Err(HostError::RequestOutstanding {
                outstanding,
                requested: kind,
            });
        }
        self.shared.open(kind);
        self.outstanding = Some(kind);
        Ok(())
    }

    /// Wait for the delivery answering an issued `T` request.
    pub fn complete<T, B>(&mut self, bridge: &mut B) -> Result<T, HostError>
    where
        T: HostValue,
        B: HostBridge + ?Sized,
    {
        self.wait(bridge, T::KIND)?;
        let bits = self.take_bits(T::KIND)?;
        Ok(T::from_bits(bits))
    }

    /// Non-blocking check for the delivery answering an issued `T` request.
    pub fn try_take<T: HostValue>(&mut self) -> Option<T> {
        if self.outstanding != Some(T::KIND) {
            return None;
        }
        let bits = self.shared.take(T::KIND)?;
        self.outstanding = None;
        Some(T::from_bits(bits))
    }

    /// Ask for a string. The returned text stays readable until the next
    /// string request replaces it.
    pub fn request_string<B: HostBridge + ?Sized>(&mut self, bridge: &mut B) -> Result<&str, HostError> {
        self.issue(ValueKind::String)?;
        self.wait(bridge, ValueKind::String)?;
        let text = self
            .shared
            .take_text()
            .ok_or(HostError::NotRequested(ValueKind::String))?;
        self.outstanding = None;
        debug!(len = text.len(), "string delivered");
        Ok(self.text.insert(text).as_str())
    }

    /// Ask for a double and return its low 32 bits.
    ///
    /// The whole value is snapshotted; [`read_double_high`](Self::read_double_high)
    /// returns the other half of the same delivery.
    pub fn request_double_low<B: HostBridge + ?Sized>(&mut self, bridge: &mut B) -> Result<u32, HostError> {
        self.issue(ValueKind::Double)?;
        self.wait(bridge, ValueKind::Double)?;
        self.double_snapshot = self.take_bits(ValueKind::Double)?;
        Ok(self.double_snapshot as u32)
    }

    /// High 32 bits of the double read by the last
    /// [`request_double_low`](Self::request_double_low). Never waits.
    pub fn read_double_high(&self) -> u32 {
        (self.double_snapshot >> 32) as u32
    }

    /// Byte `index` of the live string buffer, 0 past its end.
    pub fn string_byte(&self, index: usize) -> u8 {
        self.text
            .as_deref()
            .and_then(|s| s.as_bytes().get(index).copied())
            .unwrap_or(0)
    }

    /// The live string buffer, if a string was ever read.
    pub fn live_string(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// The request currently waiting for the operator.
    pub fn outstanding(&self) -> Option<ValueKind> {
        self.outstanding
    }

    fn wait<B: HostBridge + ?Sized>(&mut self, bridge: &mut B, kind: ValueKind) -> Result<(), HostError> {
        if self.outstanding != Some(kind) {
            return Err(HostError::NotRequested(kind));
        }
        debug!(%kind, "waiting for operator input");
        loop {
            if self.shared.cancel_requested() {
                return Err(self.abandon(kind));
            }
            if bridge.poll_disposition() == Disposition::HaltRequested {
                self.shared.request_cancel();
                return Err(self.abandon(kind));
            }
            if self.shared.slot_state(kind) == SlotState::Delivered {
                return Ok(());
            }
            bridge.sleep_slice(Wait::Value(kind));
        }
    }

    /// Drop the outstanding request after a cancellation.
    fn abandon(&mut self, kind: ValueKind) -> HostError {
        info!(%kind, "input wait cancelled");
        self.shared.reset(kind);
        self.outstanding = None;
        HostError::Cancelled
    }

    fn take_bits(&mut self, kind: ValueKind) -> Result<u64, HostError> {
        let bits = self.shared.take(kind).ok_or(HostError::NotRequested(kind))?;
        self.outstanding = None;
        Ok(bits)
    }
}

impl std::fmt::Debug for HostInputChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostInputChannel")
            .field("outstanding", &self.outstanding)
            .field("live_string", &self.text)
            .finish()
    }
}
