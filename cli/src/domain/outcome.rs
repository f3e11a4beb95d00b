//! Outcomes of long-running cluster operations.

use std::fmt;

/// Why a wait gave up before the cluster reported ready.
///
/// The remote operation may still have succeeded, so these are neither
/// success nor failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbiguousReason {
    TimedOut,
    Interrupted,
}

impl fmt::Display for AmbiguousReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut => f.write_str("Timeout happened while waiting for cluster containers"),
            Self::Interrupted => f.write_str("Interrupted"),
        }
    }
}

/// Result of `up` once the readiness race has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpOutcome {
    Ready,
    Ambiguous(AmbiguousReason),
}

/// Whether the current platform runs Docker inside a VM, so the API server
/// is only reachable through a tunnel.
#[must_use]
pub fn needs_port_forwarding() -> bool {
    cfg!(target_os = "macos")
}
