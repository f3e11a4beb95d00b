//! Domain layer: pure types, parsing and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`
//! sockets. All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod container;
pub mod credentials;
pub mod endpoint;
pub mod error;
pub mod outcome;

pub use config::{AppConfig, ReadinessSettings, TunnelSettings};
pub use container::{Container, LabelFilter};
pub use credentials::Credentials;
pub use endpoint::{Endpoint, EndpointRole};
pub use error::{ClusterError, ConfigError, EndpointError, TunnelError};
pub use outcome::{AmbiguousReason, UpOutcome};
