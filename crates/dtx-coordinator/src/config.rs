//! Coordinator configuration.

use crate::domain::{DEFAULT_PHASE_TIMEOUT_MS, DEFAULT_TX_TIMEOUT_MS};
use std::env;
use std::time::Duration;

/// Coordinator configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Transaction deadline used when the caller does not pass one.
    pub default_tx_timeout: Duration,
    /// Upper bound on each participant call within a phase.
    /// Independent of the transaction deadline.
    pub phase_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_tx_timeout: Duration::from_millis(DEFAULT_TX_TIMEOUT_MS),
            phase_timeout: Duration::from_millis(DEFAULT_PHASE_TIMEOUT_MS),
        }
    }
}

impl CoordinatorConfig {
    /// Create config for testing.
    pub fn for_testing() -> Self {
        Self {
            default_tx_timeout: Duration::from_secs(2),
            phase_timeout: Duration::from_millis(500),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DTX_TX_TIMEOUT_MS`: Default transaction timeout (default: 30000)
    /// - `DTX_PHASE_TIMEOUT_MS`: Per-phase participant timeout (default: 10000)
    ///
    /// Missing or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let millis = |name: &str, default: u64| {
            env::var(name)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(Duration::from_millis(default))
        };

        Self {
            default_tx_timeout: millis("DTX_TX_TIMEOUT_MS", DEFAULT_TX_TIMEOUT_MS),
            phase_timeout: millis("DTX_PHASE_TIMEOUT_MS", DEFAULT_PHASE_TIMEOUT_MS),
        }
    }

    /// Override the phase timeout.
    pub fn with_phase_timeout(mut self, phase_timeout: Duration) -> Self {
        self.phase_timeout = phase_timeout;
        self
    }

    /// Override the default transaction timeout.
    pub fn with_tx_timeout(mut self, tx_timeout: Duration) -> Self {
        self.default_tx_timeout = tx_timeout;
        self
    }
}
