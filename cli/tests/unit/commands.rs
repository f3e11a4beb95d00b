//! Command handlers driven with test doubles instead of Docker and SSH.

use std::process::ExitCode;
use std::time::Duration;

use boot2k8s::app::AppContext;
use boot2k8s::application::services::tunnel::TunnelConfig;
use boot2k8s::commands::forward::run_tunnel;
use boot2k8s::commands::list::list;
use boot2k8s::domain::AppConfig;
use boot2k8s::output::OutputContext;
use tokio_util::sync::CancellationToken;

use crate::helpers::{EchoConnector, StubDocker, UnreachableConnector, container, credentials};

fn app() -> AppContext {
    AppContext {
        output: OutputContext::new(true, true),
        config: AppConfig::default(),
        non_interactive: true,
    }
}

fn ephemeral() -> TunnelConfig {
    TunnelConfig::new("127.0.0.1:0", "localhost:8080").expect("config")
}

fn is_success(code: ExitCode) -> bool {
    format!("{code:?}") == format!("{:?}", ExitCode::SUCCESS)
}

#[tokio::test]
async fn list_succeeds_with_and_without_containers() {
    let empty = StubDocker::default();
    assert!(is_success(list(&app(), &empty).await.expect("list")));

    let populated = StubDocker {
        others: vec![container("o1", "k8s_dns")],
        ..StubDocker::default()
    };
    assert!(is_success(list(&app(), &populated).await.expect("list")));
}

#[tokio::test]
async fn interrupted_forwarding_exits_cleanly() {
    let connector = EchoConnector::default();
    let interrupt = CancellationToken::new();
    let trigger = interrupt.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let code = run_tunnel(
        &app(),
        ephemeral(),
        &connector,
        &credentials(),
        Duration::from_secs(1),
        &interrupt,
    )
    .await
    .expect("tunnel");

    assert!(is_success(code));
    assert_eq!(connector.stats.closes(), 1);
}

#[tokio::test]
async fn forwarding_fails_when_ssh_is_unreachable() {
    let err = run_tunnel(
        &app(),
        ephemeral(),
        &UnreachableConnector,
        &credentials(),
        Duration::from_secs(1),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    let msg = format!("{err:#}");
    assert!(msg.starts_with("failed to start port forwarding server"), "got: {msg}");
    assert!(msg.contains("failed to establish connection with SSH server"), "got: {msg}");
}
