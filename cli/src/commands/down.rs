//! `boot2k8s down`: destroy the cluster and the containers kubernetes left behind.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use owo_colors::OwoColorize as _;

use crate::app::AppContext;
use crate::application::ports::{ClusterProject, ContainerClient};
use crate::application::services::cluster_down::{
    delete_project, kubernetes_containers, local_master_containers, remove_containers,
};
use crate::commands::{DockerArgs, batch_exit_code};
use crate::domain::Container;
use crate::output::reporter::TerminalReporter;
use crate::output::{OutputContext, progress};

/// Arguments for the down command.
#[derive(Args, Debug, Default)]
pub struct DownArgs {
    #[command(flatten)]
    pub docker: DockerArgs,
}

/// Run `boot2k8s down`.
///
/// # Errors
///
/// Returns an error if the project cannot be deleted, the containers cannot
/// be listed or the confirmation prompt fails.
pub async fn run(app: &AppContext, args: &DownArgs) -> Result<ExitCode> {
    let docker = Arc::new(app.docker(args.docker.insecure));
    destroy(&app.output, &docker, |prompt| app.confirm(prompt)).await
}

/// Delete the project, then remove leftover containers after confirmation.
///
/// Declining a prompt is not an error: nothing more is removed and the
/// command succeeds. Returns status 1 when any removal failed.
///
/// # Errors
///
/// Returns an error if the project cannot be deleted, the containers cannot
/// be listed or `confirm` fails.
pub async fn destroy<D, F>(output: &OutputContext, docker: &Arc<D>, confirm: F) -> Result<ExitCode>
where
    D: ClusterProject + ContainerClient,
    F: Fn(&str) -> Result<bool>,
{
    output.header("Destroy kubernetes cluster!");
    let pb = progress::spinner("Destroying project", output.show_progress());
    delete_project(docker.as_ref())
        .await
        .inspect_err(|_| progress::finish_error(&pb, "Failed to destroy project"))?;
    progress::finish_ok(&pb, "Project destroyed");

    let reporter = TerminalReporter::new(output);
    let mut any_failed = false;

    let masters = local_master_containers(docker.as_ref()).await?;
    if !masters.is_empty() {
        output.line("Are you sure you want to destroy the containers below?");
        list_names(output, &masters);
        if !ask(output, &confirm, "Destroy the local master containers?")? {
            return Ok(ExitCode::SUCCESS);
        }
        any_failed |= remove_containers(docker, masters, &reporter)
            .await
            .failed
            > 0;
    }

    let leftovers = kubernetes_containers(docker.as_ref()).await?;
    if !leftovers.is_empty() {
        output.notice(
            "boot2k8s cannot tell whether kubernetes created the containers below.",
            &[
                "Containers started by other tools may carry the same label.",
                "Check the list carefully before confirming.",
            ],
        );
        list_names(output, &leftovers);
        if !ask(output, &confirm, "Destroy these containers?")? {
            return Ok(ExitCode::SUCCESS);
        }
        any_failed |= remove_containers(docker, leftovers, &reporter)
            .await
            .failed
            > 0;
    }

    if !any_failed {
        output.success("Successfully destroyed kubernetes cluster");
    }
    Ok(batch_exit_code(any_failed))
}

fn ask(output: &OutputContext, confirm: impl Fn(&str) -> Result<bool>, prompt: &str) -> Result<bool> {
    let confirmed = confirm(prompt).context("terminated")?;
    if !confirmed {
        output.info("Containers will not be destroyed without confirmation");
    }
    Ok(confirmed)
}

fn list_names(output: &OutputContext, containers: &[Container]) {
    for container in containers {
        output.line(&format!("  {}", container.name.style(output.styles.dim)));
    }
}
