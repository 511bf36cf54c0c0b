//! Probe harness. Runs a list of scenarios against a server, one fresh
//! process per scenario, and collects reports.
//!
//! The harness is the caller layer: it is where captured output is read as a
//! reply and where transport failures and protocol failures are told apart.

pub mod config;
pub mod errors;
pub mod report;
pub mod scenarios;

use std::sync::Arc;

use crate::probe::{reply, CounterIds, EnvelopeBuilder, ExchangeRunner, ProbeError, ProcessSpec};

// Re-exports for convenience
pub use config::ProbeConfig;
pub use errors::HarnessError;
pub use report::{ReplyStatus, ScenarioOutcome, ScenarioReport};
pub use scenarios::{Scenario, ScenarioCall};

/// Runs scenarios sequentially. Each scenario owns its own process.
#[derive(Debug, Clone)]
pub struct Harness {
    builder: EnvelopeBuilder,
    runner: ExchangeRunner,
    server: ProcessSpec,
}

impl Harness {
    pub fn new(builder: EnvelopeBuilder, runner: ExchangeRunner, server: ProcessSpec) -> Self {
        Self {
            builder,
            runner,
            server,
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        let builder = EnvelopeBuilder::new(Arc::new(CounterIds::new(&config.id_prefix)));
        let runner = match config.timeout() {
            Some(timeout) => ExchangeRunner::with_timeout(timeout),
            None => ExchangeRunner::new(),
        };
        Self::new(builder, runner, config.server.clone())
    }

    pub fn server(&self) -> &ProcessSpec {
        &self.server
    }

    /// Run every scenario in order. A failing scenario does not stop the run.
    pub async fn run_all(&self, scenarios: &[Scenario]) -> Vec<ScenarioReport> {
        let mut reports = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            reports.push(self.run_scenario(scenario).await);
        }
        reports
    }

    /// Build, send, and interpret one scenario.
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioReport {
        let request = match scenario.build_request(&self.builder) {
            Ok(request) => request,
            Err(e) => return ScenarioReport::not_sent(&scenario.label, e),
        };

        let id = request.id.clone();
        let method = request.method.clone();
        let wire = request.to_wire().map(|w| w.trim_end().to_string()).unwrap_or_default();

        tracing::info!(scenario = %scenario.label, id = %id, method = %method, "running scenario");

        let outcome = match self.runner.run(request, &self.server).await {
            Ok(result) => {
                let reply = interpret_reply(result.stdout(), &id, &method);
                tracing::info!(
                    scenario = %scenario.label,
                    id = %id,
                    elapsed_ms = result.elapsed_ms,
                    reply = reply.kind(),
                    "scenario completed"
                );
                ScenarioOutcome::Completed { result, reply }
            }
            Err(e) => {
                tracing::warn!(scenario = %scenario.label, id = %id, error = %e, "scenario failed");
                ScenarioOutcome::Failed {
                    error: e.to_string(),
                    output: e.partial_output().cloned().unwrap_or_default(),
                }
            }
        };

        ScenarioReport {
            label: scenario.label.clone(),
            id: Some(id),
            method: Some(method),
            request: Some(wire),
            outcome,
        }
    }
}

/// Read captured stdout as the reply to request `id`.
fn interpret_reply(stdout: &str, id: &str, method: &str) -> ReplyStatus {
    let response = match reply::find_reply(stdout, id) {
        Ok(response) => response,
        Err(e) => {
            return ReplyStatus::Missing {
                reason: e.to_string(),
            }
        }
    };

    if response.result.is_none() && response.error.is_none() {
        return ReplyStatus::Missing {
            reason: format!("envelope '{id}' has neither result nor error"),
        };
    }

    match reply::extract_result(response) {
        Ok(result) if method == crate::probe::types::METHOD_TOOLS_LIST => {
            match reply::decode_tool_list(result.clone(), id) {
                Ok(list) => ReplyStatus::Tools {
                    names: list.tools.into_iter().map(|t| t.name).collect(),
                },
                Err(_) => ReplyStatus::Result { value: result },
            }
        }
        Ok(value) => ReplyStatus::Result { value },
        Err(ProbeError::ServerError { code, message, .. }) => {
            ReplyStatus::RemoteError { code, message }
        }
        Err(e) => ReplyStatus::Missing {
            reason: e.to_string(),
        },
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
