//! HTTP JSON-RPC driver

use super::jsonrpc::{self, JsonRpcRequest, JsonRpcResponse};
use super::{ProbeDriver, ProbeError, ProbeOutcome};
use crate::config::ProbeConfig;
use crate::structured_logging::ProbeLogger;
use async_trait::async_trait;
use serde_json::Value;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct HttpDriver {
    client: reqwest::Client,
    timeout: Duration,
    block_timeout: Duration,
}

impl HttpDriver {
    pub fn new(config: &ProbeConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("chainwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            timeout: config.http_timeout(),
            block_timeout: config.block_timeout(),
        })
    }

    /// POST one request; the deadline covers connect, send and body read
    async fn call(
        &self,
        url: &str,
        request: &JsonRpcRequest,
        timeout: Duration,
    ) -> Result<Value, ProbeError> {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| ProbeError::from_reqwest(url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Protocol {
                endpoint: url.to_string(),
                code: Some(i64::from(status.as_u16())),
                message: format!("HTTP status {}", status),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProbeError::from_reqwest(url, timeout, e))?;
        JsonRpcResponse::parse(url, &body)?.into_result(url)
    }
}

#[async_trait]
impl ProbeDriver for HttpDriver {
    fn transport(&self) -> &'static str {
        "http"
    }

    async fn probe(
        &self,
        url: &str,
        started: Instant,
        logger: &ProbeLogger,
    ) -> Result<ProbeOutcome, ProbeError> {
        let result = self
            .call(url, &JsonRpcRequest::block_number(), self.timeout)
            .await?;
        let block_number = jsonrpc::parse_block_number(url, &result)?;
        let latency_ms = started.elapsed().as_millis() as u64;

        // Best effort: a failed lookup only leaves the block age unknown
        let block_age_secs = match self
            .call(url, &JsonRpcRequest::block_by_number(block_number), self.block_timeout)
            .await
            .and_then(|block| jsonrpc::parse_block_timestamp(url, &block))
        {
            Ok(timestamp) => Some(jsonrpc::block_age_secs(timestamp)),
            Err(e) => {
                logger.log_block_lookup_failed(url, &e);
                None
            }
        };

        Ok(ProbeOutcome {
            latency_ms,
            block_number,
            block_age_secs,
        })
    }
}
