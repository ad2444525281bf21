//! WebSocket JSON-RPC driver
//!
//! The exchange is modelled as a small state machine fed with socket events:
//!
//! ```text
//! Connecting --opened--> AwaitingBlockNumber --id 1--> AwaitingBlockTimestamp --id 2--> Settled
//!      \                        |                              |
//!       +------ timer / error / close (any state) ------------+----------------> Settled
//! ```
//!
//! `Settled` ignores every later event, so a late frame or a timer firing after
//! completion cannot settle the probe twice. The async driver closes the socket on
//! every path that reaches `Settled`.

use super::jsonrpc::{self, JsonRpcRequest, JsonRpcResponse, BLOCK_BY_NUMBER_ID, BLOCK_NUMBER_ID};
use super::{ProbeDriver, ProbeError, ProbeOutcome};
use crate::config::ProbeConfig;
use crate::structured_logging::ProbeLogger;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::{Duration, Instant};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};

/// Close code of a normal closure
pub const NORMAL_CLOSURE: u16 = 1000;
/// Reported when the peer closes without a status code
const NO_STATUS_RECEIVED: u16 = 1005;
/// Reported when the connection drops without a close frame
const ABNORMAL_CLOSURE: u16 = 1006;

/// Upper bound on the closing handshake after settlement
const CLOSE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsProbeState {
    Connecting,
    AwaitingBlockNumber,
    AwaitingBlockTimestamp,
    Settled,
}

/// Input to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsEvent {
    Opened,
    Text(String),
    Closed { code: u16, reason: String },
    TransportError(String),
    TimedOut,
}

/// What the driver must do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsAction {
    Send(String),
    /// Close the socket and return this result
    Settle(Result<ProbeOutcome, ProbeError>),
    Ignore,
}

/// Per-probe WebSocket state machine
#[derive(Debug)]
pub struct WsProbeMachine {
    url: String,
    started: Instant,
    timeout: Duration,
    state: WsProbeState,
    block_number: Option<u64>,
    latency_ms: Option<u64>,
}

impl WsProbeMachine {
    pub fn new(url: impl Into<String>, started: Instant, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            started,
            timeout,
            state: WsProbeState::Connecting,
            block_number: None,
            latency_ms: None,
        }
    }

    pub fn state(&self) -> WsProbeState {
        self.state
    }

    pub fn handle(&mut self, event: WsEvent) -> WsAction {
        use WsProbeState::*;

        match (self.state, event) {
            (Settled, event) => {
                trace!(url = %self.url, ?event, "Ignoring event after settlement");
                WsAction::Ignore
            }
            (_, WsEvent::TimedOut) => self.fail(ProbeError::timeout(&self.url, self.timeout)),
            (_, WsEvent::TransportError(message)) => self.fail(ProbeError::connect(&self.url, message)),
            (AwaitingBlockTimestamp, WsEvent::Closed { code: NORMAL_CLOSURE, .. }) => {
                // The block number is confirmed; only the age is missing
                self.succeed(None)
            }
            (_, WsEvent::Closed { code: NORMAL_CLOSURE, .. }) => {
                self.fail(ProbeError::connect(&self.url, "closed before answering eth_blockNumber"))
            }
            (_, WsEvent::Closed { code, reason }) => self.fail(ProbeError::AbnormalClose {
                endpoint: self.url.clone(),
                code,
                reason,
            }),
            (Connecting, WsEvent::Opened) => {
                self.state = AwaitingBlockNumber;
                WsAction::Send(JsonRpcRequest::block_number().to_text())
            }
            (AwaitingBlockNumber, WsEvent::Text(text)) => self.on_block_number(&text),
            (AwaitingBlockTimestamp, WsEvent::Text(text)) => self.on_block(&text),
            (state, event) => {
                debug!(url = %self.url, ?state, ?event, "Unexpected WebSocket event");
                WsAction::Ignore
            }
        }
    }

    fn on_block_number(&mut self, text: &str) -> WsAction {
        let response = match JsonRpcResponse::parse(&self.url, text) {
            Ok(response) => response,
            Err(e) => return self.fail(e),
        };
        if response.id() != Some(BLOCK_NUMBER_ID) {
            // Subscription pushes or replies to someone else
            return WsAction::Ignore;
        }

        let block_number = match response
            .into_result(&self.url)
            .and_then(|result| jsonrpc::parse_block_number(&self.url, &result))
        {
            Ok(block_number) => block_number,
            Err(e) => return self.fail(e),
        };

        self.latency_ms = Some(self.started.elapsed().as_millis() as u64);
        self.block_number = Some(block_number);
        self.state = WsProbeState::AwaitingBlockTimestamp;
        WsAction::Send(JsonRpcRequest::block_by_number(block_number).to_text())
    }

    fn on_block(&mut self, text: &str) -> WsAction {
        let response = match JsonRpcResponse::parse(&self.url, text) {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %self.url, error = %e, "Unreadable block response");
                return self.succeed(None);
            }
        };
        if response.id() != Some(BLOCK_BY_NUMBER_ID) {
            return WsAction::Ignore;
        }

        let age = response
            .into_result(&self.url)
            .and_then(|block| jsonrpc::parse_block_timestamp(&self.url, &block))
            .map(jsonrpc::block_age_secs);
        match age {
            Ok(age) => self.succeed(Some(age)),
            Err(e) => {
                debug!(url = %self.url, error = %e, "Block timestamp lookup failed");
                self.succeed(None)
            }
        }
    }

    fn succeed(&mut self, block_age_secs: Option<u64>) -> WsAction {
        self.state = WsProbeState::Settled;
        match (self.latency_ms, self.block_number) {
            (Some(latency_ms), Some(block_number)) => WsAction::Settle(Ok(ProbeOutcome {
                latency_ms,
                block_number,
                block_age_secs,
            })),
            _ => WsAction::Settle(Err(ProbeError::malformed(&self.url, "no block number"))),
        }
    }

    fn fail(&mut self, error: ProbeError) -> WsAction {
        self.state = WsProbeState::Settled;
        WsAction::Settle(Err(error))
    }
}

#[derive(Debug, Clone)]
pub struct WsDriver {
    timeout: Duration,
}

impl WsDriver {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            timeout: config.ws_timeout(),
        }
    }
}

#[async_trait]
impl ProbeDriver for WsDriver {
    fn transport(&self) -> &'static str {
        "websocket"
    }

    async fn probe(
        &self,
        url: &str,
        started: Instant,
        _logger: &ProbeLogger,
    ) -> Result<ProbeOutcome, ProbeError> {
        let mut machine = WsProbeMachine::new(url, started, self.timeout);
        let deadline = tokio::time::Instant::from_std(started) + self.timeout;
        let timer = tokio::time::sleep_until(deadline);
        tokio::pin!(timer);

        let connected = tokio::select! {
            result = tokio_tungstenite::connect_async(url) => result,
            _ = &mut timer => {
                return settled(machine.handle(WsEvent::TimedOut));
            }
        };
        let mut socket = match connected {
            Ok((socket, _response)) => socket,
            Err(e) => return settled(machine.handle(WsEvent::TransportError(e.to_string()))),
        };

        let mut action = machine.handle(WsEvent::Opened);
        loop {
            match action {
                WsAction::Send(text) => {
                    if let Err(e) = socket.send(Message::Text(text)).await {
                        action = machine.handle(WsEvent::TransportError(e.to_string()));
                        continue;
                    }
                }
                WsAction::Settle(result) => {
                    let close = socket.close(Some(CloseFrame {
                        code: NORMAL_CLOSURE.into(),
                        reason: "".into(),
                    }));
                    if let Err(e) = tokio::time::timeout(CLOSE_GRACE, close).await {
                        debug!(url = %url, error = %e, "Closing handshake did not finish");
                    }
                    return result;
                }
                WsAction::Ignore => {}
            }

            let event = tokio::select! {
                _ = &mut timer => Some(WsEvent::TimedOut),
                frame = socket.next() => frame_event(frame),
            };
            action = match event {
                Some(event) => machine.handle(event),
                None => WsAction::Ignore,
            };
        }
    }
}

fn settled(action: WsAction) -> Result<ProbeOutcome, ProbeError> {
    match action {
        WsAction::Settle(result) => result,
        // The first timer or error event always settles
        other => Err(ProbeError::connect("", format!("unexpected action {:?}", other))),
    }
}

/// Map a socket frame to a machine event; `None` for control frames
fn frame_event(
    frame: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
) -> Option<WsEvent> {
    match frame {
        Some(Ok(Message::Text(text))) => Some(WsEvent::Text(text)),
        Some(Ok(Message::Binary(bytes))) => {
            Some(WsEvent::Text(String::from_utf8_lossy(&bytes).into_owned()))
        }
        Some(Ok(Message::Close(frame))) => Some(match frame {
            Some(frame) => WsEvent::Closed {
                code: frame.code.into(),
                reason: frame.reason.into_owned(),
            },
            None => WsEvent::Closed {
                code: NO_STATUS_RECEIVED,
                reason: String::new(),
            },
        }),
        Some(Ok(_)) => None,
        Some(Err(e)) => Some(WsEvent::TransportError(e.to_string())),
        None => Some(WsEvent::Closed {
            code: ABNORMAL_CLOSURE,
            reason: "connection dropped".to_string(),
        }),
    }
}
