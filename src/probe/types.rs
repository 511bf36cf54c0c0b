//! Shared types for the probe.
//!
//! JSON-RPC 2.0 envelopes, the process description for one exchange, and the
//! raw result an exchange hands back.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::ProbeError;

/// Argument mapping carried in `params` and in tool-call `arguments`.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Protocol version marker sent in every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Method name for enumerating the server's tools.
pub const METHOD_TOOLS_LIST: &str = "tools/list";

/// Method name for invoking one tool.
pub const METHOD_TOOLS_CALL: &str = "tools/call";

// ─── JSON-RPC 2.0 ───────────────────────────────────────────────────────────

/// JSON-RPC 2.0 request message.
///
/// Built by [`super::envelope::EnvelopeBuilder`]; handed to exactly one exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: String,
    pub method: String,
    pub params: Params,
}

impl JsonRpcRequest {
    /// Render the envelope as one line of wire text, including the trailing `\n`.
    pub fn to_wire(&self) -> Result<String, ProbeError> {
        let mut line = serde_json::to_string(self).map_err(|e| ProbeError::InvalidRequest {
            reason: format!("failed to serialize request '{}': {e}", self.id),
        })?;
        line.push('\n');
        Ok(line)
    }
}

/// Parameters of a `tools/call` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    #[serde(default)]
    pub arguments: Params,
}

impl ToolInvocation {
    /// Create an invocation with no arguments.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            arguments: Params::new(),
        }
    }

    /// Add one argument, replacing any earlier value under the same key.
    pub fn arg(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.arguments.insert(key.to_string(), value.into());
        self
    }

    /// Render as the `params` mapping of a `tools/call` envelope.
    pub fn into_params(self) -> Params {
        let mut params = Params::new();
        params.insert("name".into(), serde_json::Value::String(self.name));
        params.insert("arguments".into(), serde_json::Value::Object(self.arguments));
        params
    }
}

/// JSON-RPC 2.0 response message (success or error).
///
/// `id` stays a raw value: servers may echo it as a string, a number, or
/// `null` when they could not parse the request at all. A missing `jsonrpc`
/// marker is tolerated so sloppy servers still get their reply matched.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    pub id: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

// ─── MCP Protocol Types ──────────────────────────────────────────────────────

/// Tool definition as returned by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// `tools/list` result payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolListResult {
    #[serde(default)]
    pub tools: Vec<McpToolDefinition>,
}

// ─── Process Spec ────────────────────────────────────────────────────────────

/// How to launch the server process for one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl ProcessSpec {
    /// Create a spec for `command` with no arguments.
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
        }
    }

    /// Replace the argument list.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the working directory of the child.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Check what can be checked before spawning.
    ///
    /// A command given as a path must exist. A bare name is left to the
    /// platform's `PATH` lookup at spawn time.
    pub fn validate(&self) -> Result<(), ProbeError> {
        if self.command.trim().is_empty() {
            return Err(self.spawn_error("command is empty"));
        }

        let command = Path::new(&self.command);
        let is_path = command.is_absolute() || command.components().count() > 1;
        if is_path {
            let resolved = match &self.cwd {
                Some(dir) if command.is_relative() => dir.join(command),
                _ => command.to_path_buf(),
            };
            if !resolved.is_file() {
                return Err(self.spawn_error(&format!(
                    "executable not found at {}",
                    resolved.display()
                )));
            }
        }

        if let Some(dir) = &self.cwd {
            if !dir.is_dir() {
                return Err(self.spawn_error(&format!(
                    "working directory {} does not exist",
                    dir.display()
                )));
            }
        }

        Ok(())
    }

    pub(crate) fn spawn_error(&self, reason: &str) -> ProbeError {
        ProbeError::SpawnFailed {
            command: self.command.clone(),
            reason: reason.to_string(),
        }
    }
}

// ─── Exchange Result ─────────────────────────────────────────────────────────

/// Text captured from the child's stdout and stderr.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    /// Decode raw stream bytes; invalid UTF-8 is replaced, not rejected.
    pub fn from_bytes(stdout: &[u8], stderr: &[u8]) -> Self {
        Self {
            stdout: String::from_utf8_lossy(stdout).into_owned(),
            stderr: String::from_utf8_lossy(stderr).into_owned(),
        }
    }
}

/// How the child process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExitState {
    /// Exit code, when the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal on Unix.
    pub signal: Option<i32>,
}

impl ExitState {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitState {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ExitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "killed by signal {signal}"),
            (None, None) => write!(f, "unknown exit status"),
        }
    }
}

/// Everything one exchange produced.
///
/// The core imposes no schema on `output`; reading it as a reply envelope is
/// the caller's job (see [`super::reply`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeResult {
    #[serde(flatten)]
    pub output: CapturedOutput,
    pub exit: ExitState,
    pub pid: Option<u32>,
    pub elapsed_ms: u64,
}

impl ExchangeResult {
    pub fn stdout(&self) -> &str {
        &self.output.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.output.stderr
    }
}

// ─── Standard JSON-RPC Error Codes ───────────────────────────────────────────

/// Well-known JSON-RPC error codes.
pub mod error_codes {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid Request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist or is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let req = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION,
            id: "t1".into(),
            method: "ping".into(),
            params: Params::new(),
        };
        let wire = req.to_wire().unwrap();
        assert_eq!(
            wire,
            "{\"jsonrpc\":\"2.0\",\"id\":\"t1\",\"method\":\"ping\",\"params\":{}}\n"
        );
    }

    #[test]
    fn test_tool_invocation_params_shape() {
        let params = ToolInvocation::new("file_operations")
            .arg("operation", "list")
            .arg("path", ".")
            .into_params();
        let value = serde_json::Value::Object(params);
        assert_eq!(value["name"], "file_operations");
        assert_eq!(value["arguments"]["operation"], "list");
        assert_eq!(value["arguments"]["path"], ".");
    }

    #[test]
    fn test_tool_invocation_nested_arguments() {
        let invocation = ToolInvocation::new("visual_documentation")
            .arg("options", serde_json::json!({"depth": 2, "formats": ["svg"]}));
        assert_eq!(invocation.arguments["options"]["formats"][0], "svg");
    }

    #[test]
    fn test_response_with_string_id() {
        let json = r#"{"jsonrpc": "2.0", "id": "test-1", "result": {"tools": []}}"#;
        let resp: JsonRpcResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.id, "test-1");
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_tool_list_accepts_camel_case_schema() {
        let json = r#"{"tools": [{"name": "simulator_control", "inputSchema": {"type": "object"}}]}"#;
        let list: ToolListResult = serde_json::from_str(json).unwrap();
        assert_eq!(list.tools.len(), 1);
        assert_eq!(list.tools[0].input_schema["type"], "object");
        assert!(list.tools[0].description.is_empty());
    }

    #[test]
    fn test_validate_rejects_missing_path() {
        let spec = ProcessSpec::new("/definitely/not/here/server");
        let err = spec.validate().unwrap_err();
        assert!(matches!(err, ProbeError::SpawnFailed { .. }));
    }

    #[test]
    fn test_validate_rejects_missing_cwd() {
        let spec = ProcessSpec::new("cat").with_cwd("/definitely/not/a/dir");
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_validate_leaves_bare_names_to_spawn() {
        let spec = ProcessSpec::new("some-command-on-path");
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_command() {
        assert!(ProcessSpec::new("  ").validate().is_err());
    }

    #[test]
    fn test_exit_state_display() {
        let ok = ExitState { code: Some(0), signal: None };
        let killed = ExitState { code: None, signal: Some(9) };
        assert!(ok.success());
        assert!(!killed.success());
        assert_eq!(killed.to_string(), "killed by signal 9");
    }

    #[test]
    fn test_process_spec_from_yaml() {
        let yaml = r#"
            command: swift
            args: [run, XcodeAutomationServer]
        "#;
        let spec: ProcessSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.args, vec!["run", "XcodeAutomationServer"]);
        assert!(spec.env.is_empty());
        assert!(spec.cwd.is_none());
    }
}
