//! Containers and label filters for the cluster.
//!
//! Pure data in, data out. The `docker` invocation lives in `crate::infra`.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Compose project name for the cluster containers.
pub const PROJECT_NAME: &str = "boot2k8s";

/// Label the kubelet puts on every container it creates.
pub const POD_NAME_LABEL: &str = "io.kubernetes.pod.name";

/// Pod name of the static master pod (API server, scheduler, controller manager).
pub const LOCAL_MASTER_POD: &str = "default/k8s-master-127.0.0.1";

/// A container as reported by the container runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub id: String,
    /// First name reported by the runtime.
    pub name: String,
    pub state: String,
}

/// A `label=<key>[=<value>]` filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelFilter {
    key: String,
    value: Option<String>,
}

impl LabelFilter {
    #[must_use]
    pub fn new(key: impl Into<String>, value: Option<String>) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// Containers belonging to the local master pod.
    #[must_use]
    pub fn local_master() -> Self {
        Self::new(POD_NAME_LABEL, Some(LOCAL_MASTER_POD.to_string()))
    }

    /// Every container the kubelet created, whatever the pod.
    #[must_use]
    pub fn kubernetes_related() -> Self {
        Self::new(POD_NAME_LABEL, None)
    }

    /// Render as the value of a `docker ps --filter` flag.
    #[must_use]
    pub fn to_filter_arg(&self) -> String {
        match &self.value {
            Some(value) => format!("label={}={value}", self.key),
            None => format!("label={}", self.key),
        }
    }
}

#[derive(Deserialize)]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names", default)]
    names: String,
    #[serde(rename = "State", default)]
    state: String,
}

/// Parse `docker ps --format '{{json .}}'` output, one JSON object per line.
///
/// # Errors
///
/// Returns an error if a non-empty line is not a valid container record.
pub fn parse_ps_output(stdout: &str) -> Result<Vec<Container>> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let raw: PsLine = serde_json::from_str(line)
                .with_context(|| format!("invalid container record: {line}"))?;
            let name = raw
                .names
                .split(',')
                .next()
                .map(|n| n.trim_start_matches('/').to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| raw.id.clone());
            Ok(Container {
                id: raw.id,
                name,
                state: raw.state,
            })
        })
        .collect()
}
