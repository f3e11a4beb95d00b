//! Tunnel proxy lifecycle against in-memory transports.

use std::time::Duration;

use boot2k8s::application::services::tunnel::{ProxyState, TunnelConfig, TunnelProxy};
use boot2k8s::domain::TunnelError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::helpers::{EchoConnector, RefusingConnector, UnreachableConnector, credentials};

const GRACE: Duration = Duration::from_secs(2);

fn ephemeral() -> TunnelConfig {
    TunnelConfig::new("127.0.0.1:0", "localhost:8080").expect("config")
}

async fn round_trip(stream: &mut TcpStream, payload: &[u8]) -> Vec<u8> {
    stream.write_all(payload).await.expect("write");
    let mut buf = vec![0u8; payload.len()];
    stream.read_exact(&mut buf).await.expect("read");
    buf
}

/// A port nothing listens on right now.
async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    listener.local_addr().expect("addr").port()
}

#[tokio::test]
async fn forwards_bytes_then_releases_the_port() {
    let connector = EchoConnector::default();
    let mut tunnel = TunnelProxy::new(ephemeral())
        .start(&connector, &credentials(), CancellationToken::new())
        .await
        .expect("start");
    assert_eq!(tunnel.state(), ProxyState::Running);

    let addr = tunnel.local_addr();
    let mut client = TcpStream::connect(addr).await.expect("connect");
    assert_eq!(round_trip(&mut client, b"PING").await, b"PING");

    tunnel.shutdown();
    assert!(tunnel.wait_closed(GRACE).await);
    assert_eq!(tunnel.state(), ProxyState::Closed);
    assert_eq!(connector.stats.closes(), 1);
    assert!(TcpStream::connect(addr).await.is_err(), "listener still accepting");
}

#[tokio::test]
async fn unreachable_transport_never_binds_the_local_port() {
    let port = free_port().await;
    let config = TunnelConfig::new(&format!("127.0.0.1:{port}"), "localhost:8080").expect("config");

    let err = TunnelProxy::new(config)
        .start(&UnreachableConnector, &credentials(), CancellationToken::new())
        .await
        .err()
        .expect("start must fail");

    assert!(matches!(err, TunnelError::Transport { .. }), "got: {err:?}");
    assert!(err.to_string().contains("127.0.0.1:1"));
    TcpListener::bind(("127.0.0.1", port))
        .await
        .expect("port left free");
}

#[tokio::test]
async fn bind_failure_closes_the_transport() {
    let occupied = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = occupied.local_addr().expect("addr");
    let config = TunnelConfig::new(&addr.to_string(), "localhost:8080").expect("config");
    let connector = EchoConnector::default();

    let err = TunnelProxy::new(config)
        .start(&connector, &credentials(), CancellationToken::new())
        .await
        .err()
        .expect("start must fail");

    assert!(matches!(err, TunnelError::Bind { .. }), "got: {err:?}");
    assert!(err.is_fatal());
    assert_eq!(connector.stats.closes(), 1);
}

#[tokio::test]
async fn concurrent_shutdowns_close_once() {
    let connector = EchoConnector::default();
    let mut tunnel = TunnelProxy::new(ephemeral())
        .start(&connector, &credentials(), CancellationToken::new())
        .await
        .expect("start");

    let handle = tunnel.shutdown_handle();
    let mut callers = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let handle = handle.clone();
        callers.spawn(async move { handle.shutdown() });
    }
    while callers.join_next().await.is_some() {}

    assert!(handle.is_requested());
    assert!(tunnel.wait_closed(GRACE).await);
    tunnel.shutdown();
    assert_eq!(connector.stats.closes(), 1);
}

#[tokio::test]
async fn cancelled_token_closes_right_after_start() {
    let connector = EchoConnector::default();
    let token = CancellationToken::new();
    token.cancel();

    let mut tunnel = TunnelProxy::new(ephemeral())
        .start(&connector, &credentials(), token)
        .await
        .expect("start");

    assert!(tunnel.wait_closed(GRACE).await);
    assert_eq!(connector.stats.closes(), 1);
    assert!(tunnel.next_error().await.is_none());
}

#[tokio::test]
async fn subscribers_see_the_final_state() {
    let connector = EchoConnector::default();
    let proxy = TunnelProxy::new(ephemeral());
    let mut states = proxy.subscribe();
    assert_eq!(*states.borrow_and_update(), ProxyState::Starting);

    let mut tunnel = proxy
        .start(&connector, &credentials(), CancellationToken::new())
        .await
        .expect("start");
    tunnel.shutdown();
    assert!(tunnel.wait_closed(GRACE).await);

    let last = *states.borrow_and_update();
    assert_eq!(last, ProxyState::Closed);
}

#[tokio::test]
async fn channel_failures_do_not_stop_the_proxy() {
    let connector = RefusingConnector::default();
    let mut tunnel = TunnelProxy::new(ephemeral())
        .start(&connector, &credentials(), CancellationToken::new())
        .await
        .expect("start");

    for _ in 0..2 {
        let mut client = TcpStream::connect(tunnel.local_addr()).await.expect("connect");
        let err = tunnel.next_error().await.expect("error reported");
        assert!(matches!(err, TunnelError::OpenChannel { .. }), "got: {err:?}");
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("docker ps"));

        let mut buf = [0u8; 1];
        let read = client.read(&mut buf).await.unwrap_or(0);
        assert_eq!(read, 0, "session must be dropped");
    }

    assert_eq!(tunnel.state(), ProxyState::Running);
    assert_eq!(connector.stats.channels(), 2);
    tunnel.shutdown();
    assert!(tunnel.wait_closed(GRACE).await);
}

#[tokio::test]
async fn sessions_drain_after_shutdown_by_default() {
    let connector = EchoConnector::default();
    let mut tunnel = TunnelProxy::new(ephemeral())
        .start(&connector, &credentials(), CancellationToken::new())
        .await
        .expect("start");

    let mut client = TcpStream::connect(tunnel.local_addr()).await.expect("connect");
    assert_eq!(round_trip(&mut client, b"first").await, b"first");

    tunnel.shutdown();
    assert!(tunnel.wait_closed(GRACE).await);
    assert_eq!(round_trip(&mut client, b"second").await, b"second");
}

#[tokio::test]
async fn abort_mode_ends_sessions_on_shutdown() {
    let mut config = ephemeral();
    config.abort_sessions_on_shutdown = true;
    let connector = EchoConnector::default();
    let mut tunnel = TunnelProxy::new(config)
        .start(&connector, &credentials(), CancellationToken::new())
        .await
        .expect("start");

    let mut client = TcpStream::connect(tunnel.local_addr()).await.expect("connect");
    assert_eq!(round_trip(&mut client, b"first").await, b"first");

    tunnel.shutdown();
    assert!(tunnel.wait_closed(GRACE).await);

    let mut buf = [0u8; 8];
    let read = tokio::time::timeout(GRACE, client.read(&mut buf))
        .await
        .expect("session ended")
        .unwrap_or(0);
    assert_eq!(read, 0);
}

#[tokio::test]
async fn parent_token_stops_the_proxy() {
    let parent = CancellationToken::new();
    let connector = EchoConnector::default();
    let mut tunnel = TunnelProxy::new(ephemeral())
        .start(&connector, &credentials(), parent.child_token())
        .await
        .expect("start");

    parent.cancel();
    assert!(tunnel.wait_closed(GRACE).await);
    assert_eq!(connector.stats.closes(), 1);
}
