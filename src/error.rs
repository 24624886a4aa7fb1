//! Errors raised by the synchronization layer.

use thiserror::Error;

use crate::sync::ValueKind;

/// Failures of a host input request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HostError {
    /// The operator tore the session down. Not resumable.
    #[error("emulation cancelled by the operator")]
    Cancelled,

    #[error("{requested} input requested while a {outstanding} request is outstanding")]
    RequestOutstanding {
        outstanding: ValueKind,
        requested: ValueKind,
    },

    #[error("no {0} request is outstanding")]
    NotRequested(ValueKind),
}
