//! `boot2k8s list`: containers created by the kubelet.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::ports::ContainerClient;
use crate::application::services::cluster_down::kubernetes_containers;
use crate::commands::DockerArgs;
use crate::domain::container::POD_NAME_LABEL;

/// Run `boot2k8s list`.
///
/// # Errors
///
/// Returns an error if the container runtime cannot be queried.
pub async fn run(app: &AppContext, args: DockerArgs) -> Result<ExitCode> {
    list(app, &app.docker(args.insecure)).await
}

/// Print one container name per line under a `NAME` header.
///
/// # Errors
///
/// Returns an error if the container runtime cannot be queried.
pub async fn list(app: &AppContext, client: &impl ContainerClient) -> Result<ExitCode> {
    let containers = kubernetes_containers(client).await?;
    if containers.is_empty() {
        app.output
            .info(&format!("There are no containers labeled {POD_NAME_LABEL}"));
        return Ok(ExitCode::SUCCESS);
    }

    app.output.header("NAME");
    for container in &containers {
        app.output.line(&container.name);
    }
    Ok(ExitCode::SUCCESS)
}
