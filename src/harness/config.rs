//! Probe configuration loading.
//!
//! Reads `mcp-probe.yaml` and resolves environment variables. When no file is
//! found the built-in defaults target `swift run XcodeAutomationServer` with
//! the four stock scenarios.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::errors::HarnessError;
use super::scenarios::{default_scenarios, Scenario};
use crate::probe::ProcessSpec;

/// File name searched for when no explicit path is given.
pub const CONFIG_FILE_NAME: &str = "mcp-probe.yaml";

/// Env var pointing at a config file.
pub const CONFIG_ENV_VAR: &str = "MCP_PROBE_CONFIG";

/// Default per-exchange timeout. `swift run` may compile before serving.
const DEFAULT_TIMEOUT_MS: u64 = 120_000;

// ─── Public Types ────────────────────────────────────────────────────────────

/// Top-level probe configuration (mirrors `mcp-probe.yaml`).
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Server process launched once per scenario.
    #[serde(default = "default_server")]
    pub server: ProcessSpec,
    /// Per-exchange timeout in milliseconds. `0` waits forever.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Prefix for request identifiers.
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,
    /// Scenarios to run, in order. Absent means the stock four.
    #[serde(default = "default_scenarios")]
    pub scenarios: Vec<Scenario>,
}

fn default_server() -> ProcessSpec {
    ProcessSpec::new("swift").with_args(["run", "XcodeAutomationServer"])
}
fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}
fn default_id_prefix() -> String {
    crate::probe::envelope::DEFAULT_ID_PREFIX.to_string()
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            timeout_ms: default_timeout_ms(),
            id_prefix: default_id_prefix(),
            scenarios: default_scenarios(),
        }
    }
}

impl ProbeConfig {
    /// The exchange timeout, or `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Keep only the scenarios whose labels are listed (case-insensitive),
    /// in the order of `labels`.
    pub fn select_scenarios(&mut self, labels: &[String]) -> Result<(), HarnessError> {
        if labels.is_empty() {
            return Ok(());
        }

        let mut selected = Vec::with_capacity(labels.len());
        for label in labels {
            let scenario = self
                .scenarios
                .iter()
                .find(|s| s.label.eq_ignore_ascii_case(label))
                .ok_or_else(|| HarnessError::UnknownScenario {
                    label: label.clone(),
                })?;
            selected.push(scenario.clone());
        }
        self.scenarios = selected;
        Ok(())
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Locate the config file.
///
/// Resolution order: `explicit`, then `MCP_PROBE_CONFIG`, then
/// `mcp-probe.yaml` walking upward from `start`. `Ok(None)` means run with
/// defaults.
pub fn find_config_path(
    explicit: Option<&Path>,
    start: &Path,
) -> Result<Option<PathBuf>, HarnessError> {
    // 1. Explicit path must exist
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(HarnessError::ConfigError {
            reason: format!("config file {} does not exist", path.display()),
        });
    }

    // 2. Check env var
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(expand_tilde(&path));
        if candidate.is_file() {
            return Ok(Some(candidate));
        }
        tracing::warn!(path = %candidate.display(), "{} set but file missing", CONFIG_ENV_VAR);
    }

    // 3. Walk upward from `start`
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Ok(Some(candidate));
        }
        if !dir.pop() {
            break;
        }
    }

    Ok(None)
}

/// Load and parse a probe configuration file.
///
/// Performs environment-variable interpolation on `${VAR_NAME}` and
/// `${VAR_NAME:-default}`. A relative `cwd` is resolved against the file's
/// directory.
pub fn load_config(path: &Path) -> Result<ProbeConfig, HarnessError> {
    let raw = std::fs::read_to_string(path).map_err(|e| HarnessError::ConfigError {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;

    let mut config = parse_config(&raw)?;

    if let Some(base) = path.parent() {
        resolve_cwd(&mut config.server, base);
    }

    Ok(config)
}

/// Parse config text (after interpolation).
pub fn parse_config(raw: &str) -> Result<ProbeConfig, HarnessError> {
    let interpolated = interpolate_env_vars(raw);

    let mut config: ProbeConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| HarnessError::ConfigError {
            reason: format!("failed to parse config: {e}"),
        })?;

    if config.server.command.trim().is_empty() {
        return Err(HarnessError::ConfigError {
            reason: "server.command is empty".into(),
        });
    }
    if config.scenarios.is_empty() {
        return Err(HarnessError::ConfigError {
            reason: "scenarios list is empty".into(),
        });
    }

    config.server.command = expand_tilde(&config.server.command);
    if let Some(cwd) = &config.server.cwd {
        config.server.cwd = Some(PathBuf::from(expand_tilde(&cwd.to_string_lossy())));
    }

    Ok(config)
}

fn resolve_cwd(server: &mut ProcessSpec, base: &Path) {
    if let Some(cwd) = &server.cwd {
        if cwd.is_relative() {
            server.cwd = Some(base.join(cwd));
        }
    }
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((name, default)) => std::env::var(name).unwrap_or_else(|_| expand_tilde(default)),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::scenarios::ScenarioCall;

    #[test]
    fn test_defaults_match_stock_run() {
        let config = ProbeConfig::default();
        assert_eq!(config.server.command, "swift");
        assert_eq!(config.server.args, vec!["run", "XcodeAutomationServer"]);
        assert_eq!(config.scenarios.len(), 4);
        assert_eq!(config.timeout(), Some(Duration::from_millis(DEFAULT_TIMEOUT_MS)));
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let config = parse_config("timeout_ms: 0\n").unwrap();
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
            server:
              command: ./bin/server
              args: ["--stdio"]
              env:
                LOG_LEVEL: debug
            timeout_ms: 5000
            id_prefix: "diag-"
            scenarios:
              - label: Tools
                kind: list_tools
              - label: Ping
                kind: raw
                method: ping
              - label: Files
                kind: call_tool
                tool: file_operations
                arguments:
                  operation: list
                  path: "."
        "#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.server.env.get("LOG_LEVEL").map(String::as_str), Some("debug"));
        assert_eq!(config.id_prefix, "diag-");
        assert_eq!(config.scenarios.len(), 3);
        assert!(matches!(config.scenarios[0].call, ScenarioCall::ListTools));
        match &config.scenarios[2].call {
            ScenarioCall::CallTool { tool, arguments } => {
                assert_eq!(tool, "file_operations");
                assert_eq!(arguments["path"], ".");
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[test]
    fn test_empty_command_rejected() {
        let err = parse_config("server:\n  command: \"\"\n").unwrap_err();
        assert!(matches!(err, HarnessError::ConfigError { .. }));
    }

    #[test]
    fn test_empty_scenarios_rejected() {
        assert!(parse_config("scenarios: []\n").is_err());
    }

    #[test]
    fn test_interpolate_env_vars_with_default() {
        std::env::remove_var("__MCP_PROBE_TEST_UNSET__");
        let result = interpolate_env_vars("${__MCP_PROBE_TEST_UNSET__:-/fallback/path}");
        assert_eq!(result, "/fallback/path");
    }

    #[test]
    fn test_interpolate_env_vars_with_value() {
        std::env::set_var("__MCP_PROBE_TEST_SERVER__", "/opt/server");
        let config = parse_config("server:\n  command: ${__MCP_PROBE_TEST_SERVER__}\n").unwrap();
        assert_eq!(config.server.command, "/opt/server");
        std::env::remove_var("__MCP_PROBE_TEST_SERVER__");
    }

    #[test]
    fn test_interpolate_no_vars() {
        let input = "plain text with no variables";
        assert_eq!(interpolate_env_vars(input), input);
    }

    #[test]
    fn test_expand_tilde() {
        let result = expand_tilde("~/Projects");
        assert!(!result.starts_with('~'), "tilde should be expanded");
        assert!(result.ends_with("/Projects"));
    }

    #[test]
    fn test_load_resolves_relative_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "server:\n  command: cat\n  cwd: server-dir\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.server.cwd, Some(dir.path().join("server-dir")));
    }

    #[test]
    fn test_find_config_walks_upward() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "timeout_ms: 1\n").unwrap();

        let found = find_config_path(None, &nested).unwrap();
        assert_eq!(found, Some(dir.path().join(CONFIG_FILE_NAME)));
    }

    #[test]
    fn test_find_config_explicit_missing() {
        let err = find_config_path(Some(Path::new("/no/such/mcp-probe.yaml")), Path::new("/"));
        assert!(err.is_err());
    }

    #[test]
    fn test_select_scenarios_by_label() {
        let mut config = ProbeConfig::default();
        config
            .select_scenarios(&["file operations".to_string(), "Available Tools".to_string()])
            .unwrap();
        let labels: Vec<&str> = config.scenarios.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["File Operations", "Available Tools"]);
    }

    #[test]
    fn test_select_unknown_scenario() {
        let mut config = ProbeConfig::default();
        let err = config.select_scenarios(&["nope".to_string()]).unwrap_err();
        assert!(matches!(err, HarnessError::UnknownScenario { .. }));
    }
}
