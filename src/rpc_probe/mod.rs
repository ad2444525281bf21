//! RPC endpoint liveness probe
//!
//! `Prober::probe` takes one `RpcServerStatus`, runs a single JSON-RPC exchange
//! against its URL and hands the status back filled in. The transport is picked
//! from the URL scheme:
//!
//! - `ws://` / `wss://`: `websocket::WsDriver`
//! - anything else: `http::HttpDriver`
//!
//! A probe never fails past its boundary. Every `ProbeError` is logged, counted
//! in metrics and folded into the failed-status shape.

mod errors;
pub mod http;
pub mod jsonrpc;
pub mod orchestrator;
pub mod websocket;

pub use errors::ProbeError;
pub use orchestrator::servers_for_network;

use crate::config::ProbeConfig;
use crate::metrics::metrics;
use crate::structured_logging::ProbeLogger;
use crate::types::RpcServerStatus;
use async_trait::async_trait;
use std::time::Instant;
use tokio::sync::broadcast;

/// Capacity of the status update channel
const UPDATE_CAPACITY: usize = 256;

/// Result of a successful probe exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Milliseconds from probe start to confirmed block number
    pub latency_ms: u64,
    pub block_number: u64,
    /// `None` when the timestamp lookup failed
    pub block_age_secs: Option<u64>,
}

/// One transport able to ask an endpoint for its latest block
#[async_trait]
pub trait ProbeDriver: Send + Sync {
    /// Transport label for logs
    fn transport(&self) -> &'static str;

    /// Run the exchange; `started` is the probe start used for latency
    async fn probe(
        &self,
        url: &str,
        started: Instant,
        logger: &ProbeLogger,
    ) -> Result<ProbeOutcome, ProbeError>;
}

/// Endpoint prober
///
/// Cheap to clone: clones share the HTTP connection pool and the update channel.
#[derive(Clone)]
pub struct Prober {
    http: http::HttpDriver,
    ws: websocket::WsDriver,
    updates: broadcast::Sender<RpcServerStatus>,
    logger: ProbeLogger,
}

impl std::fmt::Debug for Prober {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prober")
            .field("http", &self.http)
            .field("ws", &self.ws)
            .field("context_id", self.logger.context_id())
            .finish()
    }
}

impl Prober {
    pub fn new(config: &ProbeConfig) -> reqwest::Result<Self> {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Ok(Self {
            http: http::HttpDriver::new(config)?,
            ws: websocket::WsDriver::new(config),
            updates,
            logger: ProbeLogger::default(),
        })
    }

    /// Use `logger` (and its context id) for this prober's log lines
    pub fn with_logger(mut self, logger: ProbeLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn logger(&self) -> &ProbeLogger {
        &self.logger
    }

    /// Status updates: one when a probe starts (`checking`) and one when it settles
    pub fn subscribe(&self) -> broadcast::Receiver<RpcServerStatus> {
        self.updates.subscribe()
    }

    /// Probe one endpoint; always returns the settled status
    pub async fn probe(&self, mut status: RpcServerStatus) -> RpcServerStatus {
        let started = Instant::now();
        status.checking = true;
        self.publish(&status);

        let m = metrics();
        m.probes_total.inc();
        m.probes_in_flight.inc();

        let driver: &dyn ProbeDriver = if status.is_websocket() {
            &self.ws
        } else {
            &self.http
        };
        self.logger.log_probe_started(&status.url, driver.transport());

        match driver.probe(&status.url, started, &self.logger).await {
            Ok(outcome) => {
                status.mark_alive(outcome.latency_ms, outcome.block_number, outcome.block_age_secs);
                m.probes_alive.inc();
                m.probe_latency.observe(outcome.latency_ms as f64 / 1000.0);
                self.logger.log_probe_alive(&status);
            }
            Err(e) => {
                status.mark_failed();
                m.record_failure(e.kind());
                self.logger
                    .log_probe_failure(&e, started.elapsed().as_millis() as u64);
            }
        }

        m.probes_in_flight.dec();
        status.checking = false;
        self.publish(&status);
        status
    }

    fn publish(&self, status: &RpcServerStatus) {
        // No subscribers is fine
        let _ = self.updates.send(status.clone());
    }
}
