//! `boot2k8s forward`: expose the API server running inside the Docker VM.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::app::AppContext;
use crate::application::ports::TransportConnector;
use crate::application::services::tunnel::{TunnelConfig, TunnelProxy};
use crate::commands::interrupt_on_ctrl_c;
use crate::domain::outcome::needs_port_forwarding;
use crate::domain::{Credentials, TunnelSettings};
use crate::infra::keys;
use crate::infra::ssh::SshConnector;

/// Arguments for the forward command.
#[derive(Args, Debug, Default)]
pub struct ForwardArgs {
    /// Forward even when docker runs natively on this platform
    #[arg(long)]
    pub force: bool,

    /// Local address to listen on (host:port)
    #[arg(long, value_name = "ADDR")]
    pub local: Option<String>,

    /// Address to reach from inside the VM (host:port)
    #[arg(long, value_name = "ADDR")]
    pub remote: Option<String>,
}

/// Run `boot2k8s forward`.
///
/// # Errors
///
/// Returns an error if the key cannot be loaded, the SSH connection fails or
/// the local address cannot be bound.
pub async fn run(app: &AppContext, args: &ForwardArgs) -> Result<ExitCode> {
    if !needs_port_forwarding() && !args.force {
        app.output
            .info("You don't need to run port forwarding: docker runs natively on this platform");
        return Ok(ExitCode::SUCCESS);
    }

    let mut settings = app.config.tunnel.clone();
    if let Some(local) = &args.local {
        settings.local.clone_from(local);
    }
    if let Some(remote) = &args.remote {
        settings.remote.clone_from(remote);
    }
    serve(app, &settings, &interrupt_on_ctrl_c()).await
}

/// Key from the configured path, or `~/.ssh/id_boot2docker`.
///
/// # Errors
///
/// Returns an error if the key is missing, unreadable or empty.
pub fn load_key(settings: &TunnelSettings) -> Result<Credentials> {
    let path = match &settings.key_path {
        Some(path) => path.clone(),
        None => keys::default_key_path()?,
    };
    Ok(keys::load_credentials(&path)?)
}

/// Run the tunnel over SSH until `interrupt` fires or the listener fails.
///
/// # Errors
///
/// Returns an error if the tunnel cannot be started.
pub async fn serve(
    app: &AppContext,
    settings: &TunnelSettings,
    interrupt: &CancellationToken,
) -> Result<ExitCode> {
    let config = TunnelConfig::from_settings(settings)?;
    let credentials = load_key(settings)?;
    let connector = SshConnector::new(
        settings.ssh_endpoint()?,
        settings.ssh_user.clone(),
        settings.connect_timeout(),
    );
    run_tunnel(
        app,
        config,
        &connector,
        &credentials,
        settings.closing_grace(),
        interrupt,
    )
    .await
}

/// Start the proxy and report per-connection errors until it ends.
///
/// Per-connection errors are printed and the proxy keeps serving. A fatal
/// listener error ends the command with status 1; an interrupt ends it with
/// status 0 once the proxy has closed or the closing grace has elapsed.
///
/// # Errors
///
/// Returns an error if the tunnel cannot be started.
pub async fn run_tunnel<C: TransportConnector>(
    app: &AppContext,
    config: TunnelConfig,
    connector: &C,
    credentials: &Credentials,
    closing_grace: Duration,
    interrupt: &CancellationToken,
) -> Result<ExitCode> {
    let remote = config.remote.clone();
    let mut tunnel = TunnelProxy::new(config)
        .start(connector, credentials, interrupt.child_token())
        .await
        .context("failed to start port forwarding server")?;
    app.output.success(&format!(
        "Forwarding {} to {remote} inside the VM. Use ^C to stop",
        tunnel.local_addr()
    ));

    let shutdown = tunnel.shutdown_handle();
    let code = loop {
        tokio::select! {
            biased;
            () = interrupt.cancelled() => {
                app.output.error("Interrupted!");
                shutdown.shutdown();
                break ExitCode::SUCCESS;
            }
            next = tunnel.next_error() => match next {
                Some(error) if error.is_fatal() => {
                    app.output
                        .error(&format!("Error while running port forwarding server: {error}"));
                    shutdown.shutdown();
                    break ExitCode::FAILURE;
                }
                Some(error) => app.output.error(&error.to_string()),
                None => break ExitCode::SUCCESS,
            },
        }
    };

    if !tunnel.wait_closed(closing_grace).await {
        warn!(grace = ?closing_grace, "tunnel still closing; exiting anyway");
    }
    Ok(code)
}
