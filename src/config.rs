//! Engine configuration

use std::time::Duration;

/// Lifecycle engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deadline for a single ledger confirmation wait
    pub confirmation_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let confirmation_timeout = std::env::var("CONFIRMATION_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Self::default().confirmation_timeout);

        Self {
            confirmation_timeout,
        }
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }
}
