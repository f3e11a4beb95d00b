//! Network endpoints for the tunnel proxy.
//!
//! Pure parsing and formatting only: no resolution, no sockets.

use std::fmt;
use std::net::Ipv6Addr;

use crate::domain::error::EndpointError;

/// Which side of the tunnel an endpoint lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRole {
    /// Bound on this machine; accepts client connections.
    Local,
    /// Reached from the far side of the secure transport.
    Remote,
}

impl fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

/// A `host:port` address with its role.
///
/// IPv6 hosts are stored without brackets and printed with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
    role: EndpointRole,
}

impl Endpoint {
    /// Parse `host:port`, `[v6]:port`.
    ///
    /// Port `0` is only accepted for local endpoints, where it asks the OS
    /// for an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns an [`EndpointError`] if the host is empty or malformed, the
    /// port is missing or out of range.
    pub fn parse(input: &str, role: EndpointRole) -> Result<Self, EndpointError> {
        let input = input.trim();
        let (raw_host, raw_port) = input
            .rsplit_once(':')
            .ok_or_else(|| EndpointError::MissingPort(input.to_string()))?;

        let host = if let Some(inner) = raw_host.strip_prefix('[') {
            let inner = inner
                .strip_suffix(']')
                .ok_or_else(|| EndpointError::InvalidHost(input.to_string()))?;
            inner
                .parse::<Ipv6Addr>()
                .map_err(|_| EndpointError::InvalidHost(input.to_string()))?;
            inner
        } else {
            validate_host(raw_host, input)?;
            raw_host
        };

        let port: u16 = raw_port
            .parse()
            .map_err(|_| EndpointError::InvalidPort(input.to_string()))?;
        if port == 0 && role == EndpointRole::Remote {
            return Err(EndpointError::InvalidPort(input.to_string()));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            role,
        })
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn role(&self) -> EndpointRole {
        self.role
    }
}

fn validate_host(host: &str, input: &str) -> Result<(), EndpointError> {
    if host.is_empty() {
        return Err(EndpointError::EmptyHost(input.to_string()));
    }
    // Unbracketed colons mean an IPv6 literal without brackets or a stray
    // separator; both are ambiguous with the port.
    let valid = host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if !valid {
        return Err(EndpointError::InvalidHost(input.to_string()));
    }
    Ok(())
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
