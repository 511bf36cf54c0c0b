//! Probe error types.
//!
//! Every failure after a process has been spawned carries the output captured
//! up to that point so the caller can show it. Printing and exit codes are the
//! caller's responsibility.

use thiserror::Error;

use super::types::{CapturedOutput, ExchangeResult};

/// Errors that can occur while building a request or running an exchange.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The caller asked for an envelope that cannot be built.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        reason: String,
    },

    /// The server process could not be started. No process exists.
    #[error("failed to spawn '{command}': {reason}")]
    SpawnFailed {
        command: String,
        reason: String,
    },

    /// Stdin closed or broke before the whole envelope was delivered.
    #[error("failed to deliver request to '{command}': {reason}")]
    WriteFailed {
        command: String,
        reason: String,
        output: CapturedOutput,
    },

    /// An I/O failure while draining stdout, stderr, or collecting the exit status.
    #[error("failed to read {stream} of '{command}': {reason}")]
    ReadFailed {
        command: String,
        stream: &'static str,
        reason: String,
        output: CapturedOutput,
    },

    /// The exchange exceeded its deadline; the process was killed and reaped.
    #[error("exchange with '{command}' timed out after {timeout_ms}ms")]
    Timeout {
        command: String,
        timeout_ms: u64,
        pid: Option<u32>,
        output: CapturedOutput,
    },

    /// The caller cancelled the exchange; the process was killed and reaped.
    #[error("exchange with '{command}' was cancelled")]
    Cancelled {
        command: String,
        pid: Option<u32>,
        output: CapturedOutput,
    },

    /// The process ran to completion but did not exit successfully.
    #[error("'{command}' exited abnormally ({})", .result.exit)]
    ProcessExitedAbnormally {
        command: String,
        result: ExchangeResult,
    },

    /// The reply text did not contain a usable envelope for the request.
    #[error("unusable reply for request '{id}': {reason}")]
    MalformedReply {
        id: String,
        reason: String,
    },

    /// The server answered with a JSON-RPC error payload.
    #[error("server error [{code}]: {message}")]
    ServerError {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },
}

impl ProbeError {
    /// Output captured before the failure, if a process got far enough to emit any.
    pub fn partial_output(&self) -> Option<&CapturedOutput> {
        match self {
            ProbeError::WriteFailed { output, .. }
            | ProbeError::ReadFailed { output, .. }
            | ProbeError::Timeout { output, .. }
            | ProbeError::Cancelled { output, .. } => Some(output),
            ProbeError::ProcessExitedAbnormally { result, .. } => Some(&result.output),
            _ => None,
        }
    }

    /// Whether this failure happened at the transport level (process and pipes)
    /// rather than inside the protocol.
    pub fn is_transport_error(&self) -> bool {
        !matches!(
            self,
            ProbeError::InvalidRequest { .. }
                | ProbeError::MalformedReply { .. }
                | ProbeError::ServerError { .. }
        )
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::types::ExitState;

    #[test]
    fn test_partial_output_on_timeout() {
        let err = ProbeError::Timeout {
            command: "sleep".into(),
            timeout_ms: 50,
            pid: Some(42),
            output: CapturedOutput {
                stdout: "half a line".into(),
                stderr: String::new(),
            },
        };
        assert_eq!(err.partial_output().map(|o| o.stdout.as_str()), Some("half a line"));
        assert!(err.is_transport_error());
        assert_eq!(err.to_string(), "exchange with 'sleep' timed out after 50ms");
    }

    #[test]
    fn test_abnormal_exit_display_includes_status() {
        let err = ProbeError::ProcessExitedAbnormally {
            command: "server".into(),
            result: ExchangeResult {
                output: CapturedOutput {
                    stdout: String::new(),
                    stderr: "boom".into(),
                },
                exit: ExitState {
                    code: Some(3),
                    signal: None,
                },
                pid: None,
                elapsed_ms: 1,
            },
        };
        assert_eq!(err.to_string(), "'server' exited abnormally (exit code 3)");
        assert_eq!(err.partial_output().map(|o| o.stderr.as_str()), Some("boom"));
    }

    #[test]
    fn test_protocol_errors_are_not_transport_errors() {
        let err = ProbeError::ServerError {
            code: -32601,
            message: "Method not found".into(),
            data: None,
        };
        assert!(!err.is_transport_error());
        assert!(err.partial_output().is_none());
    }
}
