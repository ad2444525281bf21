//! Shared helpers for integration tests

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

/// URL of a local port with nothing listening on it
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

/// Mock endpoint answering `eth_blockNumber` and, when `timestamp` is set,
/// `eth_getBlockByNumber`; the block lookup fails with HTTP 500 otherwise
pub async fn mock_node(block_number: u64, timestamp: Option<u64>) -> mockito::ServerGuard {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/")
        .match_body(mockito::Matcher::PartialJson(json!({"method": "eth_blockNumber"})))
        .with_body(
            json!({"jsonrpc": "2.0", "id": 1, "result": format!("0x{:x}", block_number)})
                .to_string(),
        )
        .expect_at_least(1)
        .create_async()
        .await;

    let block = server
        .mock("POST", "/")
        .match_body(mockito::Matcher::PartialJson(json!({"method": "eth_getBlockByNumber"})));
    match timestamp {
        Some(ts) => {
            block
                .with_body(
                    json!({"jsonrpc": "2.0", "id": 2, "result": {"timestamp": format!("0x{:x}", ts)}})
                        .to_string(),
                )
                .create_async()
                .await;
        }
        None => {
            block.with_status(500).create_async().await;
        }
    }
    server
}

pub fn now_secs() -> u64 {
    chrono::Utc::now().timestamp() as u64
}

/// HTTP endpoint that accepts connections and never answers
pub async fn hanging_node() -> String {
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

/// WebSocket endpoint answering `eth_blockNumber` and `eth_getBlockByNumber`
pub async fn ws_node(block_number: u64, timestamp: u64) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
            return;
        };
        while let Some(Ok(Message::Text(text))) = ws.next().await {
            let id = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("id").and_then(Value::as_u64));
            let reply = match id {
                Some(1) => json!({"jsonrpc": "2.0", "id": 1, "result": format!("0x{:x}", block_number)}),
                Some(2) => json!({"jsonrpc": "2.0", "id": 2, "result": {"timestamp": format!("0x{:x}", timestamp)}}),
                _ => continue,
            };
            if ws.send(Message::Text(reply.to_string())).await.is_err() {
                break;
            }
        }
    });
    format!("ws://{}", addr)
}
