//! Scenario definitions: which calls a probe run makes.

use serde::{Deserialize, Serialize};

use crate::probe::{EnvelopeBuilder, JsonRpcRequest, Params, ProbeError, ToolInvocation};

/// One labelled call against the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub label: String,
    #[serde(flatten)]
    pub call: ScenarioCall,
}

/// The request a scenario sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioCall {
    /// `tools/list`.
    ListTools,
    /// `tools/call` for `tool` with `arguments`.
    CallTool {
        tool: String,
        #[serde(default)]
        arguments: Params,
    },
    /// Any other method.
    Raw {
        method: String,
        #[serde(default)]
        params: Option<Params>,
    },
}

impl Scenario {
    pub fn list_tools(label: &str) -> Self {
        Self {
            label: label.to_string(),
            call: ScenarioCall::ListTools,
        }
    }

    pub fn call_tool(label: &str, invocation: ToolInvocation) -> Self {
        Self {
            label: label.to_string(),
            call: ScenarioCall::CallTool {
                tool: invocation.name,
                arguments: invocation.arguments,
            },
        }
    }

    /// Build this scenario's envelope.
    pub fn build_request(&self, builder: &EnvelopeBuilder) -> Result<JsonRpcRequest, ProbeError> {
        match &self.call {
            ScenarioCall::ListTools => builder.list_tools(),
            ScenarioCall::CallTool { tool, arguments } => builder.call_tool(ToolInvocation {
                name: tool.clone(),
                arguments: arguments.clone(),
            }),
            ScenarioCall::Raw { method, params } => builder.build(method, params.clone()),
        }
    }
}

/// The stock run: list tools, then exercise three tools.
pub fn default_scenarios() -> Vec<Scenario> {
    vec![
        Scenario::list_tools("Available Tools"),
        Scenario::call_tool(
            "Visual Documentation",
            ToolInvocation::new("visual_documentation")
                .arg("action", "generate")
                .arg("projectPath", ".")
                .arg("outputPath", "Documentation/Generated"),
        ),
        Scenario::call_tool(
            "Simulator Control",
            ToolInvocation::new("simulator_control").arg("action", "list"),
        ),
        Scenario::call_tool(
            "File Operations",
            ToolInvocation::new("file_operations")
                .arg("operation", "list")
                .arg("path", "."),
        ),
    ]
}

// ─── Tests ───────────────────────────────────────────────────────────────────
