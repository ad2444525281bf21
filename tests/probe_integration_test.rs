mod common;

use chainwatch::config::ProbeConfig;
use chainwatch::{Prober, RpcServerStatus};
use common::{hanging_node, mock_node, now_secs, refused_url, ws_node};
use std::time::{Duration, Instant};

fn prober() -> Prober {
    Prober::new(&ProbeConfig::default()).unwrap()
}

#[tokio::test]
async fn test_unreachable_endpoints_do_not_affect_others() {
    let now = now_secs();
    let mut nodes = Vec::new();
    for block in [100, 200, 300] {
        nodes.push(mock_node(block, Some(now)).await);
    }

    // N = 5 endpoints, K = 2 unreachable
    let urls = vec![
        nodes[0].url(),
        refused_url().await,
        nodes[1].url(),
        refused_url().await,
        nodes[2].url(),
    ];
    let servers = urls.iter().map(RpcServerStatus::new).collect();
    let statuses = prober().probe_all(servers).await;

    assert_eq!(statuses.len(), 5);
    assert_eq!(statuses.iter().filter(|s| !s.is_alive).count(), 2);
    assert_eq!(statuses.iter().filter(|s| s.is_alive).count(), 3);
    assert_eq!(
        statuses.iter().map(|s| s.last_block).collect::<Vec<_>>(),
        vec![Some(100), None, Some(200), None, Some(300)]
    );
    for status in statuses.iter().filter(|s| !s.is_alive) {
        assert_eq!(status.latency_ms, None);
        assert_eq!(status.block_age_secs, None);
    }
}

#[tokio::test]
async fn test_slow_and_mixed_transport_endpoints_are_isolated() {
    let now = now_secs();
    let first = mock_node(100, Some(now)).await;
    let last = mock_node(300, Some(now)).await;
    let hanging = hanging_node().await;
    let ws = ws_node(200, now).await;

    let config = ProbeConfig {
        http_timeout_ms: 500,
        block_timeout_ms: 250,
        ws_timeout_ms: 2_000,
    };
    let prober = Prober::new(&config).unwrap();

    let urls = vec![first.url(), hanging.clone(), ws.clone(), last.url()];
    let servers = urls.iter().map(RpcServerStatus::new).collect();
    let started = Instant::now();
    let statuses = prober.probe_all(servers).await;

    // The hanging endpoint holds the round only until its own deadline
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(
        statuses.iter().map(|s| s.url.as_str()).collect::<Vec<_>>(),
        urls.iter().map(String::as_str).collect::<Vec<_>>()
    );
    assert_eq!(
        statuses.iter().map(|s| s.last_block).collect::<Vec<_>>(),
        vec![Some(100), None, Some(200), Some(300)]
    );
    assert_eq!(statuses[1], RpcServerStatus::new(hanging));
    for status in [&statuses[0], &statuses[2], &statuses[3]] {
        assert!(status.is_alive);
        assert!(status.latency_ms.is_some());
        assert!(status.block_age_secs.is_some());
    }
    assert!(statuses.iter().all(|s| !s.checking));
}

#[tokio::test]
async fn test_partial_success_keeps_block_number() {
    let node = mock_node(0x1b4, None).await;

    let status = prober().probe(RpcServerStatus::new(node.url())).await;
    assert!(status.is_alive);
    assert!(!status.checking);
    assert_eq!(status.last_block, Some(436));
    assert!(status.latency_ms.is_some());
    assert_eq!(status.block_age_secs, None);
}

#[tokio::test]
async fn test_http_error_yields_failed_shape() {
    let mut server = mockito::Server::new_async().await;
    server.mock("POST", "/").with_status(500).create_async().await;

    let status = prober().probe(RpcServerStatus::new(server.url())).await;
    let mut expected = RpcServerStatus::new(server.url());
    expected.is_alive = false;
    assert_eq!(status, expected);
}
