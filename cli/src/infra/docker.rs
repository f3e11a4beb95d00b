//! Docker CLI adapter: implements `ContainerClient` and `ClusterProject` by
//! shelling out to `docker` and `docker compose`.

use std::process::Output;
use std::time::Duration;

use anyhow::Result;

use crate::application::ports::{ClusterProject, CommandRunner, ContainerClient};
use crate::domain::container::{PROJECT_NAME, parse_ps_output};
use crate::domain::{ClusterError, Container, LabelFilter};
use crate::infra::assets::CLUSTER_DEFINITION;
use crate::infra::command_runner::{COMPOSE_TIMEOUT, DEFAULT_CMD_TIMEOUT};

const DOCKER: &str = "docker";

/// Talks to the Docker daemon the current environment points at.
pub struct DockerCli<R> {
    runner: R,
    insecure: bool,
}

impl<R: CommandRunner> DockerCli<R> {
    /// `insecure` turns TLS verification off for every invocation.
    #[must_use]
    pub fn new(runner: R, insecure: bool) -> Self {
        Self { runner, insecure }
    }

    fn args<'a>(&self, rest: &[&'a str]) -> Vec<&'a str> {
        let mut args = Vec::with_capacity(rest.len() + 1);
        if self.insecure {
            args.push("--tlsverify=false");
        }
        args.extend_from_slice(rest);
        args
    }

    async fn docker(&self, rest: &[&str]) -> Result<Output> {
        let args = self.args(rest);
        let output = self
            .runner
            .run_with_timeout(DOCKER, &args, DEFAULT_CMD_TIMEOUT)
            .await?;
        check(rest, output)
    }

    async fn compose(&self, action: &[&str], timeout: Duration) -> Result<Output> {
        let mut rest = vec!["compose", "-p", PROJECT_NAME, "-f", "-"];
        rest.extend_from_slice(action);
        let args = self.args(&rest);
        let output = self
            .runner
            .run_with_stdin(DOCKER, &args, CLUSTER_DEFINITION.as_bytes(), timeout)
            .await?;
        check(&rest, output)
    }
}

fn check(rest: &[&str], output: Output) -> Result<Output> {
    if output.status.success() {
        return Ok(output);
    }
    let subcommand: Vec<&str> = rest.iter().copied().take_while(|a| !a.starts_with('-')).collect();
    Err(ClusterError::CommandFailed {
        command: format!("{DOCKER} {}", subcommand.join(" ")),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
    .into())
}

impl<R: CommandRunner + 'static> ContainerClient for DockerCli<R> {
    async fn list_containers(&self, filter: &LabelFilter, all: bool) -> Result<Vec<Container>> {
        let filter_arg = filter.to_filter_arg();
        let mut rest = vec![
            "ps",
            "--no-trunc",
            "--filter",
            filter_arg.as_str(),
            "--format",
            "{{json .}}",
        ];
        if all {
            rest.insert(1, "--all");
        }
        let output = self.docker(&rest).await?;
        parse_ps_output(&String::from_utf8_lossy(&output.stdout))
    }

    async fn remove_container(&self, id: &str, force: bool, delete_volumes: bool) -> Result<()> {
        let mut rest = vec!["rm"];
        if force {
            rest.push("--force");
        }
        if delete_volumes {
            rest.push("--volumes");
        }
        rest.push(id);
        self.docker(&rest).await?;
        Ok(())
    }
}

impl<R: CommandRunner + 'static> ClusterProject for DockerCli<R> {
    async fn up(&self) -> Result<()> {
        self.compose(&["up", "--detach"], COMPOSE_TIMEOUT).await?;
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        self.compose(&["down", "--volumes"], COMPOSE_TIMEOUT).await?;
        Ok(())
    }
}
