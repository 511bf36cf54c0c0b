//! Reply interpretation, kept apart from the exchange core.
//!
//! An exchange succeeding only means the process ran and its output was
//! captured. Whether the server actually answered the request is decided here:
//! find the line whose `id` matches, then split it into result or error.

use super::errors::ProbeError;
use super::types::{ExchangeResult, JsonRpcResponse, ToolListResult};

/// Find the reply to request `id` in captured stdout.
///
/// Servers often print log lines on stdout too, so blank lines, non-JSON
/// lines, and replies for other ids are skipped.
pub fn find_reply(stdout: &str, id: &str) -> Result<JsonRpcResponse, ProbeError> {
    let mut seen_envelopes = 0usize;

    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<JsonRpcResponse>(trimmed) {
            Ok(resp) if resp.id.as_str() == Some(id) => return Ok(resp),
            Ok(_) => seen_envelopes += 1,
            Err(_) => continue,
        }
    }

    let reason = if seen_envelopes == 0 {
        "no JSON-RPC reply in output".to_string()
    } else {
        format!("{seen_envelopes} reply envelope(s) found, none with a matching id")
    };

    Err(ProbeError::MalformedReply {
        id: id.to_string(),
        reason,
    })
}

/// Convenience over [`find_reply`] for a whole exchange result.
pub fn reply_for(result: &ExchangeResult, id: &str) -> Result<JsonRpcResponse, ProbeError> {
    find_reply(result.stdout(), id)
}

/// Extract the result from a JSON-RPC response, converting errors to `ProbeError`.
pub fn extract_result(response: JsonRpcResponse) -> Result<serde_json::Value, ProbeError> {
    if let Some(err) = response.error {
        return Err(ProbeError::ServerError {
            code: err.code,
            message: err.message,
            data: err.data,
        });
    }

    response.result.ok_or(ProbeError::ServerError {
        code: super::types::error_codes::INTERNAL_ERROR,
        message: "response missing both result and error".into(),
        data: None,
    })
}

/// Decode a `tools/list` result payload.
pub fn decode_tool_list(result: serde_json::Value, id: &str) -> Result<ToolListResult, ProbeError> {
    serde_json::from_value(result).map_err(|e| ProbeError::MalformedReply {
        id: id.to_string(),
        reason: format!("failed to parse tools/list result: {e}"),
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
