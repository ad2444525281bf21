//! Concurrent probing of many endpoints

use super::Prober;
use crate::metrics::metrics;
use crate::types::{NetworkRecord, RpcServerStatus};
use futures::future::join_all;
use tokio::task::JoinError;
use tracing::warn;

/// Fresh statuses for every RPC URL of a network, in list order
pub fn servers_for_network(network: &NetworkRecord) -> Vec<RpcServerStatus> {
    network.rpc_urls.iter().map(RpcServerStatus::new).collect()
}

impl Prober {
    /// Probe every server concurrently and return the results in input order
    ///
    /// One task per server, no concurrency cap. A task that panics yields a failed
    /// status for its URL; the others are unaffected.
    pub async fn probe_all(&self, servers: Vec<RpcServerStatus>) -> Vec<RpcServerStatus> {
        let (urls, tasks): (Vec<String>, Vec<_>) = servers
            .into_iter()
            .map(|server| {
                let prober = self.clone();
                let url = server.url.clone();
                (url, tokio::spawn(async move { prober.probe(server).await }))
            })
            .unzip();

        let statuses: Vec<RpcServerStatus> = urls
            .into_iter()
            .zip(join_all(tasks).await)
            .map(|(url, joined)| fold_joined(url, joined))
            .collect();

        let alive = statuses.iter().filter(|s| s.is_alive).count();
        self.logger().log_run_summary(statuses.len(), alive);
        statuses
    }

    /// Probe every RPC URL of `network`
    pub async fn probe_network(&self, network: &NetworkRecord) -> Vec<RpcServerStatus> {
        self.probe_all(servers_for_network(network)).await
    }
}

fn fold_joined(url: String, joined: Result<RpcServerStatus, JoinError>) -> RpcServerStatus {
    match joined {
        Ok(status) => status,
        Err(e) => {
            warn!(url = %url, error = %e, "Probe task did not complete");
            metrics().record_failure("task");
            let mut status = RpcServerStatus::new(url);
            status.mark_failed();
            status
        }
    }
}
