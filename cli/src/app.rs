//! Application context: unified state passed to every command handler.
//!
//! Built once in `Cli::run()` from the global flags and the configuration
//! file, then passed as `&AppContext` to every command.

use anyhow::Result;

use crate::application::ports::ConfigStore;
use crate::domain::AppConfig;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::docker::DockerCli;
use crate::output::OutputContext;

/// Output rendering flags.
pub struct OutputFlags {
    pub no_color: bool,
    pub quiet: bool,
}

/// Behaviour flags.
pub struct BehaviourFlags {
    /// Answer yes to every confirmation prompt.
    pub yes: bool,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    pub output: OutputFlags,
    pub behaviour: BehaviourFlags,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Loaded and validated configuration.
    pub config: AppConfig,
    /// When `true`, confirmation prompts are answered with yes.
    pub non_interactive: bool,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read,
    /// parsed or validated.
    pub fn new(flags: &AppFlags, store: &impl ConfigStore) -> Result<Self> {
        Ok(Self {
            output: OutputContext::new(flags.output.no_color, flags.output.quiet),
            config: store.load()?,
            non_interactive: flags.behaviour.yes,
        })
    }

    /// Docker client for the daemon the environment points at.
    #[must_use]
    pub fn docker(&self, insecure: bool) -> DockerCli<TokioCommandRunner> {
        DockerCli::new(TokioCommandRunner::default(), insecure)
    }

    /// Ask the user for confirmation. Defaults to no.
    ///
    /// Returns `true` without prompting when `non_interactive` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available,
    /// or the prompt was interrupted).
    pub fn confirm(&self, prompt: &str) -> Result<bool> {
        if self.non_interactive {
            return Ok(true);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;
        Ok(confirmed)
    }
}
