//! `boot2k8s up`: start the cluster and, on VM platforms, forward the API server.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::app::AppContext;
use crate::application::ports::{ClusterProject, ContainerClient};
use crate::application::services::cluster_up::bring_up;
use crate::commands::{DockerArgs, EXIT_AMBIGUOUS, forward, interrupt_on_ctrl_c};
use crate::domain::outcome::needs_port_forwarding;
use crate::domain::{AmbiguousReason, UpOutcome};
use crate::output::{OutputContext, progress};

/// Arguments for the up command.
#[derive(Args, Debug, Default)]
pub struct UpArgs {
    #[command(flatten)]
    pub docker: DockerArgs,

    /// Start port forwarding even when docker runs natively
    #[arg(long)]
    pub forward: bool,
}

/// Run `boot2k8s up`.
///
/// # Errors
///
/// Returns an error if the containers cannot be started or the tunnel
/// cannot be set up.
pub async fn run(app: &AppContext, args: &UpArgs) -> Result<ExitCode> {
    let docker = Arc::new(app.docker(args.docker.insecure));
    let interrupt = interrupt_on_ctrl_c();

    if let UpOutcome::Ambiguous(_) = start_cluster(app, &docker, &interrupt).await? {
        return Ok(ExitCode::from(EXIT_AMBIGUOUS));
    }
    if !(needs_port_forwarding() || args.forward) {
        return Ok(ExitCode::SUCCESS);
    }

    app.output.notice(
        "You're running docker on boot2docker!",
        &[
            "To connect to the master API server from the local environment,",
            "port forwarding is needed. boot2k8s starts a server for that.",
            "To stop the server, use ^C (Interrupt).",
        ],
    );
    forward::serve(app, &app.config.tunnel, &interrupt).await
}

/// Start the cluster and wait for readiness behind a spinner.
///
/// An ambiguous outcome has already been explained to the user on return.
///
/// # Errors
///
/// Returns an error if the container runtime rejects the cluster definition.
pub async fn start_cluster<D>(
    app: &AppContext,
    docker: &Arc<D>,
    interrupt: &CancellationToken,
) -> Result<UpOutcome>
where
    D: ClusterProject + ContainerClient,
{
    app.output.header("Start kubernetes cluster!");
    let pb = progress::spinner(
        "Waiting until containers are ready",
        app.output.show_progress(),
    );

    let outcome = bring_up(docker.as_ref(), Arc::clone(docker), &app.config.readiness, interrupt)
        .await
        .inspect_err(|_| progress::finish_error(&pb, "Failed to start containers"))?;

    match outcome {
        UpOutcome::Ready => {
            progress::finish_ok(&pb, "Successfully started kubernetes cluster");
            if !app.output.show_progress() {
                app.output.success("Successfully started kubernetes cluster");
            }
        }
        UpOutcome::Ambiguous(reason) => {
            progress::finish_warn(&pb, &reason.to_string());
            report_ambiguous(&app.output, reason);
        }
    }
    Ok(outcome)
}

/// Tell the user the cluster may or may not be running.
pub fn report_ambiguous(output: &OutputContext, reason: AmbiguousReason) {
    output.error(&format!("{reason}."));
    output.notice(
        "State unknown: boot2k8s cannot tell whether the containers started correctly.",
        &[
            "Requests to the kubelet may fail. Verify manually that the",
            "containers are working with `docker ps`.",
        ],
    );
}
