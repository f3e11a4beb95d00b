//! Configuration schema stored in `~/.boot2k8s/config.yaml`.
//!
//! Pure types and validators, no I/O.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::endpoint::{Endpoint, EndpointRole};
use crate::domain::error::ConfigError;

// ── Defaults ─────────────────────────────────────────────────────────────────

pub const DEFAULT_LOCAL_SERVER: &str = "localhost:8080";
pub const DEFAULT_REMOTE_SERVER: &str = "localhost:8080";
pub const DEFAULT_SSH_SERVER: &str = "localhost:2022";
pub const DEFAULT_SSH_USER: &str = "docker";
pub const DEFAULT_SSH_KEY_FILE: &str = "id_boot2docker";

/// Running local-master containers needed before the cluster counts as up.
/// Empirical: the master pod runs more than three containers once the API
/// server is serving.
pub const DEFAULT_READY_THRESHOLD: usize = 3;
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 3;
pub const DEFAULT_CHECK_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_CLOSING_GRACE_MS: u64 = 1000;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub tunnel: TunnelSettings,
    pub readiness: ReadinessSettings,
}

/// Port forwarding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelSettings {
    /// Address the local listener binds to.
    pub local: String,
    /// Address dialled from inside the VM for every session.
    pub remote: String,
    /// SSH server of the Docker VM.
    pub ssh_server: String,
    pub ssh_user: String,
    /// Private key path. Defaults to `~/.ssh/id_boot2docker`.
    pub key_path: Option<PathBuf>,
    /// Interrupt in-flight sessions on shutdown instead of letting them drain.
    pub abort_sessions_on_shutdown: bool,
    /// How long to wait for the proxy to close after an interrupt.
    pub closing_grace_ms: u64,
    pub connect_timeout_secs: u64,
}

impl Default for TunnelSettings {
    fn default() -> Self {
        Self {
            local: DEFAULT_LOCAL_SERVER.to_string(),
            remote: DEFAULT_REMOTE_SERVER.to_string(),
            ssh_server: DEFAULT_SSH_SERVER.to_string(),
            ssh_user: DEFAULT_SSH_USER.to_string(),
            key_path: None,
            abort_sessions_on_shutdown: false,
            closing_grace_ms: DEFAULT_CLOSING_GRACE_MS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl TunnelSettings {
    /// Parsed local endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if `local` is not a valid `host:port`.
    pub fn local_endpoint(&self) -> Result<Endpoint, ConfigError> {
        Endpoint::parse(&self.local, EndpointRole::Local).map_err(|source| ConfigError::Endpoint {
            field: "local",
            source,
        })
    }

    /// Parsed remote endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if `remote` is not a valid `host:port`.
    pub fn remote_endpoint(&self) -> Result<Endpoint, ConfigError> {
        Endpoint::parse(&self.remote, EndpointRole::Remote).map_err(|source| {
            ConfigError::Endpoint {
                field: "remote",
                source,
            }
        })
    }

    /// Parsed SSH server endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if `ssh_server` is not a valid `host:port`.
    pub fn ssh_endpoint(&self) -> Result<Endpoint, ConfigError> {
        Endpoint::parse(&self.ssh_server, EndpointRole::Remote).map_err(|source| {
            ConfigError::Endpoint {
                field: "ssh_server",
                source,
            }
        })
    }

    #[must_use]
    pub fn closing_grace(&self) -> Duration {
        Duration::from_millis(self.closing_grace_ms)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Readiness polling settings for `up`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessSettings {
    /// The cluster is ready once the running local-master count exceeds this.
    pub threshold: usize,
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_READY_THRESHOLD,
            interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            timeout_secs: DEFAULT_CHECK_TIMEOUT_SECS,
        }
    }
}

impl ReadinessSettings {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Check every field that would otherwise fail later at runtime.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tunnel.local_endpoint()?;
        self.tunnel.remote_endpoint()?;
        self.tunnel.ssh_endpoint()?;
        if self.tunnel.connect_timeout_secs == 0 {
            return Err(ConfigError::Zero {
                field: "tunnel.connect_timeout_secs",
            });
        }
        if self.readiness.interval_secs == 0 {
            return Err(ConfigError::Zero {
                field: "readiness.interval_secs",
            });
        }
        if self.readiness.timeout_secs == 0 {
            return Err(ConfigError::Zero {
                field: "readiness.timeout_secs",
            });
        }
        Ok(())
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
