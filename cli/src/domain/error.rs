//! Typed domain error enums.
//!
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::path::PathBuf;

use thiserror::Error;

// ── Endpoint errors ───────────────────────────────────────────────────────────

/// Errors from parsing a `host:port` address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("invalid address '{0}': expected host:port")]
    MissingPort(String),

    #[error("invalid address '{0}': host is empty")]
    EmptyHost(String),

    #[error("invalid address '{0}': malformed host")]
    InvalidHost(String),

    #[error("invalid address '{0}': port must be a number between 1 and 65535")]
    InvalidPort(String),
}

// ── Tunnel errors ─────────────────────────────────────────────────────────────

/// Errors raised while starting or running the tunnel proxy.
///
/// `Credentials`, `Transport` and `Bind` are fatal to `start`. `Accept` and
/// `OpenChannel` affect a single connection. `ListenerFailed` ends the proxy.
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error(transparent)]
    InvalidEndpoint(#[from] EndpointError),

    #[error("failed to read SSH key {}: {source}", path.display())]
    Credentials {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("SSH key {} is empty", path.display())]
    EmptyCredentials { path: PathBuf },

    #[error("failed to establish connection with SSH server {server}: {reason}")]
    Transport { server: String, reason: String },

    #[error("failed to start local server {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to accept request: {0}")]
    Accept(#[source] std::io::Error),

    #[error("local listener failed {failures} times in a row: {source}")]
    ListenerFailed {
        failures: u32,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "failed to establish connection with remote server {remote}: {reason}\n\
         This happens when the kubelet is not running. Check it with `docker ps`."
    )]
    OpenChannel { remote: String, reason: String },
}

impl TunnelError {
    /// Returns `true` for errors that end the proxy rather than one session.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Accept(_) | Self::OpenChannel { .. })
    }
}

// ── Cluster errors ────────────────────────────────────────────────────────────

/// Errors reported by the container runtime CLI.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("`{command}` failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid tunnel.{field}: {source}")]
    Endpoint {
        field: &'static str,
        #[source]
        source: EndpointError,
    },

    #[error("invalid {field}: must be greater than zero")]
    Zero { field: &'static str },
}
