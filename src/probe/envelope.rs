//! Envelope construction.
//!
//! Turns a method name and optional arguments into a [`JsonRpcRequest`] with a
//! fresh identifier. Identifiers come from an injectable [`IdSource`] so tests
//! get deterministic values and nothing depends on clock resolution.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::errors::ProbeError;
use super::types::{
    JsonRpcRequest, Params, ToolInvocation, JSONRPC_VERSION, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
};

/// Default prefix for generated request identifiers.
pub const DEFAULT_ID_PREFIX: &str = "test-";

// ─── Identifier Sources ──────────────────────────────────────────────────────

/// Produces request identifiers. Each call must return a value not returned
/// before by the same source.
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> String;
}

/// Monotonic counter: `test-1`, `test-2`, …
#[derive(Debug)]
pub struct CounterIds {
    prefix: String,
    next: AtomicU64,
}

impl CounterIds {
    pub fn new(prefix: &str) -> Self {
        Self::starting_at(prefix, 1)
    }

    /// Start the sequence at `first` instead of 1.
    pub fn starting_at(prefix: &str, first: u64) -> Self {
        Self {
            prefix: prefix.to_string(),
            next: AtomicU64::new(first),
        }
    }
}

impl IdSource for CounterIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{n}", self.prefix)
    }
}

/// Wall-clock milliseconds plus a sequence number: `test-1729260000123-1`.
///
/// The sequence keeps two ids minted in the same millisecond apart.
#[derive(Debug)]
pub struct ClockIds {
    prefix: String,
    seq: AtomicU64,
}

impl ClockIds {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            seq: AtomicU64::new(1),
        }
    }
}

impl IdSource for ClockIds {
    fn next_id(&self) -> String {
        let millis = chrono::Utc::now().timestamp_millis();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("{}{millis}-{seq}", self.prefix)
    }
}

/// Random v4 UUIDs, for when ids must not collide across runs either.
#[derive(Debug, Default)]
pub struct UuidIds;

impl IdSource for UuidIds {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

// ─── Builder ─────────────────────────────────────────────────────────────────

/// Builds request envelopes. Cheap to clone; clones share one id source.
#[derive(Clone)]
pub struct EnvelopeBuilder {
    ids: Arc<dyn IdSource>,
}

impl EnvelopeBuilder {
    pub fn new(ids: Arc<dyn IdSource>) -> Self {
        Self { ids }
    }

    /// Build a request for `method`. Absent `params` become `{}`.
    pub fn build(&self, method: &str, params: Option<Params>) -> Result<JsonRpcRequest, ProbeError> {
        if method.trim().is_empty() {
            return Err(ProbeError::InvalidRequest {
                reason: "method name is empty".into(),
            });
        }

        Ok(JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION,
            id: self.ids.next_id(),
            method: method.to_string(),
            params: params.unwrap_or_default(),
        })
    }

    /// `tools/list` with no arguments.
    pub fn list_tools(&self) -> Result<JsonRpcRequest, ProbeError> {
        self.build(METHOD_TOOLS_LIST, None)
    }

    /// `tools/call` for one tool.
    ///
    /// The tool name is not checked against anything the server advertised; an
    /// unknown name comes back as an error in the reply.
    pub fn call_tool(&self, invocation: ToolInvocation) -> Result<JsonRpcRequest, ProbeError> {
        self.build(METHOD_TOOLS_CALL, Some(invocation.into_params()))
    }
}

impl Default for EnvelopeBuilder {
    fn default() -> Self {
        Self::new(Arc::new(CounterIds::new(DEFAULT_ID_PREFIX)))
    }
}

impl std::fmt::Debug for EnvelopeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeBuilder").finish_non_exhaustive()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
