//! Probe: one-shot JSON-RPC exchanges with a stdio server.
//!
//! This module handles:
//! - Building request envelopes with fresh identifiers
//! - Spawning a server process per request and capturing its output
//! - Interpreting the captured output as a reply (separate from transport)
//!
//! Nothing here prints or decides exit codes; the binary does that.

pub mod envelope;
pub mod errors;
pub mod exchange;
pub mod reply;
pub mod types;

// Re-exports for convenience
pub use envelope::{ClockIds, CounterIds, EnvelopeBuilder, IdSource, UuidIds};
pub use errors::ProbeError;
pub use exchange::ExchangeRunner;
pub use types::{
    CapturedOutput, ExchangeResult, ExitState, JsonRpcRequest, JsonRpcResponse, Params,
    ProcessSpec, ToolInvocation,
};
