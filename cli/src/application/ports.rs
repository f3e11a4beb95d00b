//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.
//!
//! Ports whose futures get spawned onto the runtime spell out `+ Send`;
//! implementations can still use plain `async fn`.

use std::future::Future;
use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::domain::{AppConfig, Container, Credentials, Endpoint, LabelFilter};

// ── Secure Transport Ports ────────────────────────────────────────────────────

/// An authenticated, multiplexed connection to the Docker VM.
///
/// Shared read-only by every tunnel session; `close` may be called more
/// than once and must be a no-op after the first call.
pub trait SecureTransport: Send + Sync + 'static {
    /// One logical sub-connection to an address reachable from the far side.
    type Channel: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a channel to `target` through the transport.
    fn open_channel(&self, target: &Endpoint)
    -> impl Future<Output = Result<Self::Channel>> + Send;

    /// Release the transport. In-flight channels error out afterwards.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Establishes a [`SecureTransport`] from credentials.
pub trait TransportConnector {
    type Transport: SecureTransport;

    /// Address of the transport server, for error messages.
    fn server(&self) -> String;

    /// Authenticate and connect.
    fn connect(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Self::Transport>> + Send;
}

// ── Container Ports ───────────────────────────────────────────────────────────

/// Container queries and removal against the Docker daemon.
pub trait ContainerClient: Send + Sync + 'static {
    /// List containers matching `filter`; `all` includes stopped ones.
    fn list_containers(
        &self,
        filter: &LabelFilter,
        all: bool,
    ) -> impl Future<Output = Result<Vec<Container>>> + Send;

    /// Remove one container by id.
    fn remove_container(
        &self,
        id: &str,
        force: bool,
        delete_volumes: bool,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// The declarative cluster definition as a whole.
pub trait ClusterProject: Send + Sync + 'static {
    /// Create and start every service. Returns once the runtime has
    /// accepted the request, not when the cluster is ready.
    fn up(&self) -> impl Future<Output = Result<()>> + Send;
    /// Stop and remove every service.
    fn delete(&self) -> impl Future<Output = Result<()>> + Send;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts user-facing progress output so services stay presentation-free.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
pub trait CommandRunner: Send + Sync {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    fn run(&self, program: &str, args: &[&str]) -> impl Future<Output = Result<Output>> + Send;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> impl Future<Output = Result<Output>> + Send;
    /// Run a program with stdin piped from `input`.
    fn run_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        input: &[u8],
        timeout: Duration,
    ) -> impl Future<Output = Result<Output>> + Send;
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts loading of the configuration file.
pub trait ConfigStore {
    /// Load the configuration, falling back to defaults when absent.
    fn load(&self) -> Result<AppConfig>;
    /// Location of the configuration file.
    fn path(&self) -> Result<PathBuf>;
}
