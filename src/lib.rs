//! mcp-probe checks from outside that a stdio JSON-RPC server answers.
//!
//! [`probe`] is the exchange core: build an envelope, run it against a fresh
//! server process, hand back the raw output. [`harness`] is the caller on top:
//! it runs scenarios, reads replies, and builds reports.

pub mod harness;
pub mod logging;
pub mod probe;
