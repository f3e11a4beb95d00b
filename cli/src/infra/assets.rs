//! Assets embedded into the binary at compile time.

/// Compose definition of the single-node cluster (etcd, kubelet, proxy).
pub const CLUSTER_DEFINITION: &str = include_str!("../../assets/k8s.yml");
