//! Harness error types.

use thiserror::Error;

/// Errors raised while preparing a probe run (before any exchange starts).
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Configuration loading or validation error.
    #[error("config error: {reason}")]
    ConfigError {
        reason: String,
    },

    /// The log file could not be prepared.
    #[error("log setup failed for {path}: {reason}")]
    LogSetup {
        path: String,
        reason: String,
    },

    /// A `--scenario` filter named nothing in the scenario list.
    #[error("unknown scenario: '{label}'")]
    UnknownScenario {
        label: String,
    },
}
