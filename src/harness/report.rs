//! Scenario reports and their text / JSON rendering.

use std::fmt::Write as _;

use serde::Serialize;

use crate::probe::{CapturedOutput, ExchangeResult, ProbeError};

/// Width of the banner rule around each scenario heading.
const BANNER_WIDTH: usize = 50;

/// What the captured stdout said, read as a reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReplyStatus {
    /// `tools/list` answered with these tool names.
    Tools { names: Vec<String> },
    /// Any other successful result payload.
    Result { value: serde_json::Value },
    /// The server answered with an error payload.
    RemoteError { code: i32, message: String },
    /// No usable reply envelope was found.
    Missing { reason: String },
}

impl ReplyStatus {
    pub fn kind(&self) -> &'static str {
        match self {
            ReplyStatus::Tools { .. } => "tools",
            ReplyStatus::Result { .. } => "result",
            ReplyStatus::RemoteError { .. } => "remote_error",
            ReplyStatus::Missing { .. } => "missing",
        }
    }
}

/// How a scenario ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    /// The exchange ran to a successful exit.
    Completed {
        result: ExchangeResult,
        reply: ReplyStatus,
    },
    /// The exchange failed; `output` holds whatever was captured first.
    Failed {
        error: String,
        output: CapturedOutput,
    },
    /// The request could not be built, so nothing was spawned.
    NotSent { error: String },
}

/// Report for one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub label: String,
    pub id: Option<String>,
    pub method: Option<String>,
    /// Wire text of the request, without the trailing newline.
    pub request: Option<String>,
    #[serde(flatten)]
    pub outcome: ScenarioOutcome,
}

impl ScenarioReport {
    pub(crate) fn not_sent(label: &str, error: ProbeError) -> Self {
        Self {
            label: label.to_string(),
            id: None,
            method: None,
            request: None,
            outcome: ScenarioOutcome::NotSent {
                error: error.to_string(),
            },
        }
    }

    /// Transport-level success. A remote error reply still counts as passed:
    /// the server was reached and answered.
    pub fn passed(&self) -> bool {
        matches!(self.outcome, ScenarioOutcome::Completed { .. })
    }

    /// Render in the human-readable layout.
    pub fn render_text(&self) -> String {
        let rule = "=".repeat(BANNER_WIDTH);
        let mut out = String::new();
        let _ = writeln!(out, "{rule}\n{}\n{rule}", self.label);

        if let Some(request) = &self.request {
            let _ = writeln!(out, "Sending: {request}");
        }

        match &self.outcome {
            ScenarioOutcome::Completed { result, reply } => {
                write_streams(&mut out, &result.output);
                let _ = writeln!(out, "Exit: {} in {}ms", result.exit, result.elapsed_ms);
                let _ = writeln!(out, "Reply: {}", describe_reply(reply));
                let _ = writeln!(out, "PASS {} completed", self.label);
            }
            ScenarioOutcome::Failed { error, output } => {
                write_streams(&mut out, output);
                let _ = writeln!(out, "FAIL {} failed: {error}", self.label);
            }
            ScenarioOutcome::NotSent { error } => {
                let _ = writeln!(out, "FAIL {} not sent: {error}", self.label);
            }
        }

        out
    }
}

fn write_streams(out: &mut String, output: &CapturedOutput) {
    let _ = writeln!(out, "Response: {}", output.stdout.trim_end());
    if !output.stderr.is_empty() {
        let _ = writeln!(out, "Stderr: {}", output.stderr.trim_end());
    }
}

fn describe_reply(reply: &ReplyStatus) -> String {
    match reply {
        ReplyStatus::Tools { names } if names.is_empty() => "no tools advertised".to_string(),
        ReplyStatus::Tools { names } => format!("{} tools: {}", names.len(), names.join(", ")),
        ReplyStatus::Result { .. } => "result received".to_string(),
        ReplyStatus::RemoteError { code, message } => format!("server error [{code}]: {message}"),
        ReplyStatus::Missing { reason } => format!("no reply ({reason})"),
    }
}

/// One-line tally for the end of a run.
pub fn render_summary(reports: &[ScenarioReport]) -> String {
    let passed = reports.iter().filter(|r| r.passed()).count();
    format!("{passed}/{} scenarios completed", reports.len())
}

/// Render all reports as a JSON array.
pub fn render_json(reports: &[ScenarioReport]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(reports)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ExitState;

    fn completed(reply: ReplyStatus) -> ScenarioReport {
        ScenarioReport {
            label: "Available Tools".into(),
            id: Some("test-1".into()),
            method: Some("tools/list".into()),
            request: Some("{\"jsonrpc\":\"2.0\"}".into()),
            outcome: ScenarioOutcome::Completed {
                result: ExchangeResult {
                    output: CapturedOutput {
                        stdout: "{}\n".into(),
                        stderr: "warming up\n".into(),
                    },
                    exit: ExitState {
                        code: Some(0),
                        signal: None,
                    },
                    pid: Some(10),
                    elapsed_ms: 12,
                },
                reply,
            },
        }
    }

    #[test]
    fn test_render_text_completed() {
        let report = completed(ReplyStatus::Tools {
            names: vec!["a".into(), "b".into()],
        });
        let text = report.render_text();
        assert!(text.starts_with(&"=".repeat(BANNER_WIDTH)));
        assert!(text.contains("Sending: {\"jsonrpc\":\"2.0\"}"));
        assert!(text.contains("Stderr: warming up"));
        assert!(text.contains("Reply: 2 tools: a, b"));
        assert!(text.contains("PASS Available Tools completed"));
    }

    #[test]
    fn test_render_text_omits_empty_stderr() {
        let report = ScenarioReport {
            label: "Files".into(),
            id: Some("test-2".into()),
            method: Some("tools/call".into()),
            request: None,
            outcome: ScenarioOutcome::Failed {
                error: "exchange with 'x' timed out after 5ms".into(),
                output: CapturedOutput::default(),
            },
        };
        let text = report.render_text();
        assert!(!text.contains("Stderr:"));
        assert!(text.contains("FAIL Files failed"));
        assert!(!report.passed());
    }

    #[test]
    fn test_render_summary() {
        let mut reports = vec![completed(ReplyStatus::Missing {
            reason: "none".into(),
        })];
        reports.push(ScenarioReport::not_sent(
            "bad",
            ProbeError::InvalidRequest {
                reason: "method name is empty".into(),
            },
        ));
        assert_eq!(render_summary(&reports), "1/2 scenarios completed");
    }

    #[test]
    fn test_render_json_shape() {
        let report = completed(ReplyStatus::RemoteError {
            code: -32601,
            message: "Unknown tool".into(),
        });
        let json: serde_json::Value =
            serde_json::from_str(&render_json(&[report]).unwrap()).unwrap();
        assert_eq!(json[0]["outcome"], "completed");
        assert_eq!(json[0]["result"]["stdout"], "{}\n");
        assert_eq!(json[0]["result"]["exit"]["code"], 0);
        assert_eq!(json[0]["reply"]["status"], "remote_error");
    }
}
