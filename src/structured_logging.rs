//! Structured logging for probe runs

use crate::guid::Guid;
use crate::rpc_probe::ProbeError;
use crate::types::RpcServerStatus;

/// Structured logger for probe events
///
/// Every line carries the run's context id so concurrent runs (e.g. `watch`
/// ticks) can be told apart.
#[derive(Debug, Clone)]
pub struct ProbeLogger {
    context_id: Guid,
}

impl ProbeLogger {
    pub fn new(context_id: Guid) -> Self {
        Self { context_id }
    }

    pub fn context_id(&self) -> &Guid {
        &self.context_id
    }

    pub fn log_probe_started(&self, url: &str, transport: &str) {
        tracing::debug!(
            context_id = %self.context_id,
            url = %url,
            transport = %transport,
            "Probe started"
        );
    }

    pub fn log_probe_alive(&self, status: &RpcServerStatus) {
        tracing::info!(
            context_id = %self.context_id,
            url = %status.url,
            latency_ms = ?status.latency_ms,
            last_block = ?status.last_block,
            block_age_secs = ?status.block_age_secs,
            "Endpoint alive"
        );
    }

    pub fn log_probe_failure(&self, error: &ProbeError, elapsed_ms: u64) {
        tracing::warn!(
            context_id = %self.context_id,
            url = %error.endpoint(),
            kind = %error.kind(),
            error = %error,
            elapsed_ms = %elapsed_ms,
            "Endpoint probe failed"
        );
    }

    pub fn log_block_lookup_failed(&self, url: &str, error: &ProbeError) {
        tracing::debug!(
            context_id = %self.context_id,
            url = %url,
            error = %error,
            "Block timestamp lookup failed"
        );
    }

    pub fn log_run_summary(&self, total: usize, alive: usize) {
        tracing::info!(
            context_id = %self.context_id,
            total = %total,
            alive = %alive,
            failed = %total.saturating_sub(alive),
            "Probe run finished"
        );
    }
}

impl Default for ProbeLogger {
    fn default() -> Self {
        Self::new(Guid::new())
    }
}
