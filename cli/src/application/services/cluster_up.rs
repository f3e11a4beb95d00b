//! Application service: bring the cluster up and wait for the master pod.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::application::ports::{ClusterProject, ContainerClient};
use crate::application::services::readiness::{ReadinessPoller, WaitOutcome, wait_until_ready};
use crate::domain::{AmbiguousReason, LabelFilter, ReadinessSettings, UpOutcome};

const START_FAILED: &str = "failed to start containers. Check that the docker daemon is working";

/// Number of running containers that belong to the local master pod.
///
/// # Errors
///
/// Returns an error if the container runtime cannot be queried.
pub async fn count_local_master(client: &impl ContainerClient) -> Result<usize> {
    let containers = client
        .list_containers(&LabelFilter::local_master(), false)
        .await?;
    Ok(containers.len())
}

/// Start the cluster definition and wait until the master pod is running.
///
/// Starting the project and polling for readiness run concurrently. When the
/// pod is ready before the runtime has finished starting the project, the
/// start is still awaited so no service is left half-created. A failed start
/// is an error; a timeout or an `interrupt` is reported as
/// [`UpOutcome::Ambiguous`] since the containers may still come up.
///
/// # Errors
///
/// Returns an error if the poll interval is zero or the runtime rejects the
/// cluster definition.
pub async fn bring_up<P, C>(
    project: &P,
    client: Arc<C>,
    settings: &ReadinessSettings,
    interrupt: &CancellationToken,
) -> Result<UpOutcome>
where
    P: ClusterProject,
    C: ContainerClient,
{
    let probe = move || {
        let client = Arc::clone(&client);
        async move { count_local_master(client.as_ref()).await }
    };
    let signal = ReadinessPoller::from_settings(settings)?.spawn(probe, interrupt);

    let wait = wait_until_ready(signal, settings.timeout(), interrupt);
    let up = project.up();
    tokio::pin!(wait, up);

    let (waited, starting) = tokio::select! {
        waited = &mut wait => (waited, true),
        started = &mut up => {
            started.context(START_FAILED)?;
            debug!("cluster definition accepted; waiting for readiness");
            (wait.await, false)
        }
    };

    Ok(match waited {
        WaitOutcome::Ready(readiness) => {
            debug!(tick = readiness.tick, count = readiness.count, "cluster ready");
            if starting {
                debug!("waiting for the runtime to finish starting the project");
                tokio::select! {
                    biased;
                    () = interrupt.cancelled() => {
                        return Ok(UpOutcome::Ambiguous(AmbiguousReason::Interrupted));
                    }
                    started = &mut up => started.context(START_FAILED)?,
                }
            }
            UpOutcome::Ready
        }
        WaitOutcome::TimedOut => UpOutcome::Ambiguous(AmbiguousReason::TimedOut),
        WaitOutcome::Interrupted => UpOutcome::Ambiguous(AmbiguousReason::Interrupted),
    })
}
