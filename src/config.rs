//! Run configuration, loadable from a JSON file.
//!
//! ```json
//! {
//!   "xlen": 64,
//!   "poll_quantum_ms": 50,
//!   "start_in_step": true,
//!   "breakpoints": [8, 16],
//!   "max_cycles": 100000
//! }
//! ```
//!
//! Every field is optional; command-line flags override file values.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bridge::{Breakpoints, Disposition};
use crate::sync::Xlen;

/// Settings for one emulation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Register width in bits, 32 or 64.
    pub xlen: u32,
    /// Length of one polling slice of the cooperative loop.
    pub poll_quantum_ms: u64,
    /// Stop before the second instruction and wait for the operator.
    pub start_in_step: bool,
    /// Addresses armed as breakpoints at start.
    pub breakpoints: Vec<u64>,
    /// Give up after this many instructions.
    pub max_cycles: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            xlen: 32,
            poll_quantum_ms: 100,
            start_in_step: false,
            breakpoints: Vec::new(),
            max_cycles: 10_000,
        }
    }
}

impl HostConfig {
    /// Read and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Parse and validate JSON configuration text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.register_width()?;
        if self.poll_quantum_ms == 0 {
            return Err(ConfigError::ZeroQuantum);
        }
        Ok(())
    }

    /// Register width as an [`Xlen`].
    pub fn register_width(&self) -> Result<Xlen, ConfigError> {
        Xlen::from_bits(self.xlen).ok_or(ConfigError::InvalidXlen(self.xlen))
    }

    pub fn poll_quantum(&self) -> Duration {
        Duration::from_millis(self.poll_quantum_ms)
    }

    /// Disposition the session starts in.
    pub fn disposition(&self) -> Disposition {
        if self.start_in_step {
            Disposition::Step
        } else {
            Disposition::Run
        }
    }

    pub fn armed_breakpoints(&self) -> Breakpoints {
        self.breakpoints.iter().copied().collect()
    }
}

/// Errors that can occur while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("xlen must be 32 or 64, got {0}")]
    InvalidXlen(u32),

    #[error("poll_quantum_ms must be at least 1")]
    ZeroQuantum,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HostConfig::from_json("{}").unwrap();
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.register_width().unwrap(), Xlen::Rv32);
        assert_eq!(config.poll_quantum(), Duration::from_millis(100));
        assert_eq!(config.disposition(), Disposition::Run);
    }

    #[test]
    fn test_full_file() {
        let config = HostConfig::from_json(
            r#"{"xlen": 64, "poll_quantum_ms": 5, "start_in_step": true,
                "breakpoints": [16, 8], "max_cycles": 7}"#,
        )
        .unwrap();
        assert_eq!(config.register_width().unwrap(), Xlen::Rv64);
        assert_eq!(config.disposition(), Disposition::Step);
        assert_eq!(config.armed_breakpoints().iter().collect::<Vec<_>>(), vec![8, 16]);
        assert_eq!(config.max_cycles, 7);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            HostConfig::from_json(r#"{"xlen": 16}"#),
            Err(ConfigError::InvalidXlen(16))
        ));
        assert!(matches!(
            HostConfig::from_json(r#"{"poll_quantum_ms": 0}"#),
            Err(ConfigError::ZeroQuantum)
        ));
        assert!(matches!(
            HostConfig::from_json(r#"{"xlen": 32, "colour": "red"}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            HostConfig::load("/nonexistent/hostlink.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
