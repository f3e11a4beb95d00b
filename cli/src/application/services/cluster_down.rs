//! Application service: tear the cluster down.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! Confirmation is the caller's job; these functions act immediately.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::application::ports::{ClusterProject, ContainerClient, ProgressReporter};
use crate::application::services::parallel::{self, BatchCounts};
use crate::domain::{Container, LabelFilter};

/// Stop and remove the services of the cluster definition.
///
/// # Errors
///
/// Returns an error if the runtime refuses to delete the project.
pub async fn delete_project(project: &impl ClusterProject) -> Result<()> {
    project.delete().await.context("failed to destroy project")
}

/// Containers of the local master pod, stopped ones included.
///
/// # Errors
///
/// Returns an error if the container runtime cannot be queried.
pub async fn local_master_containers(client: &impl ContainerClient) -> Result<Vec<Container>> {
    client
        .list_containers(&LabelFilter::local_master(), true)
        .await
        .context("failed to list local master containers")
}

/// Every container the kubelet created, stopped ones included.
///
/// # Errors
///
/// Returns an error if the container runtime cannot be queried.
pub async fn kubernetes_containers(client: &impl ContainerClient) -> Result<Vec<Container>> {
    client
        .list_containers(&LabelFilter::kubernetes_related(), true)
        .await
        .context("failed to list containers")
}

/// Force-remove `containers` and their volumes concurrently.
///
/// Each outcome is reported as it arrives. The batch always runs to the end;
/// the returned counts tell the caller whether anything failed.
pub async fn remove_containers<C: ContainerClient>(
    client: &Arc<C>,
    containers: Vec<Container>,
    reporter: &impl ProgressReporter,
) -> BatchCounts {
    let tasks = containers.into_iter().map(|container| {
        let client = Arc::clone(client);
        async move {
            client
                .remove_container(&container.id, true, true)
                .await
                .with_context(|| format!("failed to remove {} ({})", container.name, container.id))?;
            Ok::<_, anyhow::Error>(container)
        }
    });

    parallel::run(tasks)
        .drain_with(
            |container| reporter.success(&format!("removed {}", container.name)),
            |error| reporter.warn(&format!("{error:#}")),
        )
        .await
}
