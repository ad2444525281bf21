//! Test Utilities Module
//!
//! Fixtures for registry tests and local JSON-RPC endpoints (silent HTTP
//! listeners, refused ports, scripted WebSocket servers) for probe tests.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use crate::guid::Guid;
use crate::registry::NetworkRegistry;
use crate::store::MemoryStore;
use crate::types::{Currency, NetworkDraft, NetworkRecord};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// A normalized record with a fresh id, chain id 1 and no currency symbol
pub fn sample_record(name: &str, rpc_urls: &[&str]) -> NetworkRecord {
    NetworkRecord {
        id: Guid::new(),
        name: name.to_string(),
        chain_id: 1,
        currency: Currency::default(),
        explorer_url: None,
        rpc_urls: rpc_urls.iter().map(|u| u.to_string()).collect(),
        selected_rpc_url: None,
        tokens: Vec::new(),
        nfts: Vec::new(),
        testnet: false,
    }
}

pub fn draft(name: &str, rpc_urls: &[&str]) -> NetworkDraft {
    NetworkDraft::new(name, 1).with_rpc_urls(rpc_urls.iter().copied())
}

/// Empty registry over an in-memory store
pub fn open_memory_registry() -> (NetworkRegistry, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let registry = match NetworkRegistry::open(store.clone()) {
        Ok(registry) => registry,
        Err(e) => panic!("memory registry failed to open: {}", e),
    };
    (registry, store)
}

/// `eth_blockNumber` reply (id 1)
pub fn block_number_body(block_number: u64) -> String {
    json!({"jsonrpc": "2.0", "id": 1, "result": format!("0x{:x}", block_number)}).to_string()
}

/// `eth_getBlockByNumber` reply (id 2) carrying `timestamp`
pub fn block_body(timestamp: u64) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": 2,
        "result": {"number": "0x1", "hash": "0xabc", "timestamp": format!("0x{:x}", timestamp)}
    })
    .to_string()
}

pub fn rpc_error_body(id: u64, code: i64, message: &str) -> String {
    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}}).to_string()
}

/// URL of a local port with nothing listening on it
pub async fn refused_url(scheme: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("{}://127.0.0.1:{}", scheme, port)
}

/// HTTP endpoint that accepts connections and never answers
pub async fn silent_http_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                while let Ok(n) = socket.read(&mut buf).await {
                    if n == 0 {
                        break;
                    }
                }
            });
        }
    });
    format!("http://{}", addr)
}

/// Behavior of a scripted WebSocket endpoint
#[derive(Debug, Clone, Copy)]
pub enum WsScript {
    /// Answer id 1 with `block_number`, id 2 with `timestamp` (an RPC error when `None`)
    Answer {
        block_number: u64,
        timestamp: Option<u64>,
    },
    /// Read requests, never answer
    Silent,
    /// Close with this code after the first request
    CloseWith(u16),
}

/// Handle to a single-connection WebSocket server
pub struct WsTestServer {
    pub url: String,
    closed_rx: oneshot::Receiver<bool>,
}

impl WsTestServer {
    /// True once the client sent a close frame
    pub async fn closed_by_client(self) -> bool {
        matches!(
            tokio::time::timeout(Duration::from_secs(3), self.closed_rx).await,
            Ok(Ok(true))
        )
    }
}

pub async fn spawn_ws_server(script: WsScript) -> WsTestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = oneshot::channel();

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
            return;
        };

        let mut closed_by_client = false;
        while let Some(Ok(message)) = ws.next().await {
            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => {
                    closed_by_client = true;
                    break;
                }
                _ => continue,
            };
            let id = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("id").and_then(Value::as_u64));

            match (script, id) {
                (WsScript::Answer { block_number, .. }, Some(1)) => {
                    let _ = ws.send(Message::Text(block_number_body(block_number))).await;
                }
                (WsScript::Answer { timestamp: Some(ts), .. }, Some(2)) => {
                    let _ = ws.send(Message::Text(block_body(ts))).await;
                }
                (WsScript::Answer { timestamp: None, .. }, Some(2)) => {
                    let body = rpc_error_body(2, -32000, "header not found");
                    let _ = ws.send(Message::Text(body)).await;
                }
                (WsScript::CloseWith(code), _) => {
                    let _ = ws
                        .close(Some(CloseFrame {
                            code: code.into(),
                            reason: "internal error".into(),
                        }))
                        .await;
                }
                _ => {}
            }
        }
        let _ = closed_tx.send(closed_by_client);
    });

    WsTestServer {
        url: format!("ws://{}", addr),
        closed_rx,
    }
}
