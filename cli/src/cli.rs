//! CLI argument parsing with clap derive

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands;
use crate::infra::config::YamlConfigStore;

/// Bring up a single-node Kubernetes cluster on Docker
#[derive(Parser)]
#[command(
    name = "boot2k8s",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Answer yes to every confirmation prompt
    #[arg(short, long, global = true, env = "BOOT2K8S_YES")]
    pub yes: bool,

    /// Diagnostic log filter (e.g. `debug`, `boot2k8s=trace`)
    #[arg(long, global = true, env = "BOOT2K8S_LOG", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the kubernetes cluster
    Up(commands::up::UpArgs),

    /// Destroy the kubernetes cluster
    #[command(alias = "destroy")]
    Down(commands::down::DownArgs),

    /// List containers created by kubernetes
    List(commands::DockerArgs),

    /// Forward a local port to the API server inside the docker VM
    Forward(commands::forward::ForwardArgs),

    /// Show version
    Version {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            quiet,
            no_color,
            yes,
            command,
            ..
        } = self;

        if let Command::Version { json } = command {
            commands::version::run(json);
            return Ok(ExitCode::SUCCESS);
        }

        let flags = AppFlags {
            output: OutputFlags { no_color, quiet },
            behaviour: BehaviourFlags { yes },
        };
        let app = AppContext::new(&flags, &YamlConfigStore)?;

        match command {
            Command::Up(args) => commands::up::run(&app, &args).await,
            Command::Down(args) => commands::down::run(&app, &args).await,
            Command::List(args) => commands::list::run(&app, args).await,
            Command::Forward(args) => commands::forward::run(&app, &args).await,
            Command::Version { .. } => Ok(ExitCode::SUCCESS),
        }
    }
}
