//! JSON-RPC 2.0 messages used by the probe

use super::ProbeError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Request id of `eth_blockNumber`
pub const BLOCK_NUMBER_ID: u64 = 1;
/// Request id of `eth_getBlockByNumber`
pub const BLOCK_BY_NUMBER_ID: u64 = 2;

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: Value,
    pub id: u64,
}

impl JsonRpcRequest {
    pub fn block_number() -> Self {
        Self {
            jsonrpc: "2.0",
            method: "eth_blockNumber",
            params: json!([]),
            id: BLOCK_NUMBER_ID,
        }
    }

    /// Header-only lookup (`false`: no full transactions)
    pub fn block_by_number(block_number: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method: "eth_getBlockByNumber",
            params: json!([format!("0x{:x}", block_number), false]),
            id: BLOCK_BY_NUMBER_ID,
        }
    }

    pub fn to_text(&self) -> String {
        // Serializing a struct of strings and JSON values cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcErrorObject {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcErrorObject>,
}

impl JsonRpcResponse {
    pub fn parse(endpoint: &str, text: &str) -> Result<Self, ProbeError> {
        serde_json::from_str(text).map_err(|e| ProbeError::malformed(endpoint, e.to_string()))
    }

    /// Numeric id, if the server echoed one
    pub fn id(&self) -> Option<u64> {
        self.id.as_ref().and_then(Value::as_u64)
    }

    /// The `result` value, or the `error` object as a protocol error
    pub fn into_result(self, endpoint: &str) -> Result<Value, ProbeError> {
        if let Some(error) = self.error {
            return Err(ProbeError::Protocol {
                endpoint: endpoint.to_string(),
                code: error.code,
                message: error.message,
            });
        }
        self.result
            .ok_or_else(|| ProbeError::malformed(endpoint, "response has neither result nor error"))
    }
}

/// Parse a `0x`-prefixed hex quantity
pub fn parse_hex_u64(value: &str) -> Option<u64> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))?;
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

/// Block number from an `eth_blockNumber` result
pub fn parse_block_number(endpoint: &str, result: &Value) -> Result<u64, ProbeError> {
    result
        .as_str()
        .and_then(parse_hex_u64)
        .ok_or_else(|| ProbeError::malformed(endpoint, format!("invalid block number: {}", result)))
}

/// Unix timestamp from an `eth_getBlockByNumber` result
pub fn parse_block_timestamp(endpoint: &str, result: &Value) -> Result<u64, ProbeError> {
    result
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(parse_hex_u64)
        .ok_or_else(|| ProbeError::malformed(endpoint, "block has no valid timestamp"))
}

/// Seconds since `timestamp`, saturating at zero for blocks from the future
pub fn block_age_secs(timestamp: u64) -> u64 {
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    now.saturating_sub(timestamp)
}
