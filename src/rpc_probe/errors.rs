use std::time::Duration;
use thiserror::Error;

/// Why an endpoint probe failed
///
/// Every variant is caught at the probe boundary and folded into a failed
/// `RpcServerStatus`; callers of the prober never see these values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// Transport-level failure (DNS, refused connection, TLS, broken socket)
    #[error("Connection failed: {message} (endpoint: {endpoint})")]
    Connect { endpoint: String, message: String },

    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// The server answered with a JSON-RPC error or a non-success HTTP status
    #[error("RPC error: {message} (endpoint: {endpoint}, code: {code:?})")]
    Protocol {
        endpoint: String,
        code: Option<i64>,
        message: String,
    },

    #[error("Malformed response: {message} (endpoint: {endpoint})")]
    MalformedResponse { endpoint: String, message: String },

    /// WebSocket closed with a code other than 1000 before the probe settled
    #[error("Connection closed with code {code}: {reason} (endpoint: {endpoint})")]
    AbnormalClose {
        endpoint: String,
        code: u16,
        reason: String,
    },
}

impl ProbeError {
    pub fn connect(endpoint: &str, message: impl Into<String>) -> Self {
        Self::Connect {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    pub fn timeout(endpoint: &str, timeout: Duration) -> Self {
        Self::Timeout {
            endpoint: endpoint.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn malformed(endpoint: &str, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    /// Classify a reqwest failure
    pub fn from_reqwest(endpoint: &str, timeout: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(endpoint, timeout)
        } else if err.is_decode() {
            Self::malformed(endpoint, err.to_string())
        } else {
            Self::connect(endpoint, err.to_string())
        }
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Timeout { .. } => "timeout",
            Self::Protocol { .. } => "protocol",
            Self::MalformedResponse { .. } => "malformed",
            Self::AbnormalClose { .. } => "abnormal_close",
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            Self::Connect { endpoint, .. }
            | Self::Timeout { endpoint, .. }
            | Self::Protocol { endpoint, .. }
            | Self::MalformedResponse { endpoint, .. }
            | Self::AbnormalClose { endpoint, .. } => endpoint,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
