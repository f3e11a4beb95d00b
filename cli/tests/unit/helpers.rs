//! Shared test doubles: in-memory transports, a scripted Docker daemon and a
//! recording progress reporter.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use boot2k8s::application::ports::{
    ClusterProject, ContainerClient, ProgressReporter, SecureTransport, TransportConnector,
};
use boot2k8s::domain::container::LOCAL_MASTER_POD;
use boot2k8s::domain::{Container, Credentials, Endpoint, LabelFilter};
use tokio::io::DuplexStream;

pub fn credentials() -> Credentials {
    Credentials::new("/tmp/id_test".into(), b"-----BEGIN KEY-----".to_vec())
}

pub fn container(id: &str, name: &str) -> Container {
    Container {
        id: id.to_string(),
        name: name.to_string(),
        state: "running".to_string(),
    }
}

// ── Transports ───────────────────────────────────────────────────────────────

/// Counters shared between a connector, its transport and the test.
#[derive(Debug, Default)]
pub struct TransportStats {
    pub connects: AtomicUsize,
    pub channels: AtomicUsize,
    pub closes: AtomicUsize,
}

impl TransportStats {
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn channels(&self) -> usize {
        self.channels.load(Ordering::SeqCst)
    }
}

/// Transport whose channels echo every byte back. Echo tasks outlive `close`.
pub struct EchoTransport {
    stats: Arc<TransportStats>,
}

impl SecureTransport for EchoTransport {
    type Channel = DuplexStream;

    async fn open_channel(&self, _target: &Endpoint) -> Result<DuplexStream> {
        self.stats.channels.fetch_add(1, Ordering::SeqCst);
        let (near, far) = tokio::io::duplex(1024);
        tokio::spawn(async move {
            let (mut reader, mut writer) = tokio::io::split(far);
            let _ = tokio::io::copy(&mut reader, &mut writer).await;
        });
        Ok(near)
    }

    async fn close(&self) {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct EchoConnector {
    pub stats: Arc<TransportStats>,
}

impl TransportConnector for EchoConnector {
    type Transport = EchoTransport;

    fn server(&self) -> String {
        "echo:22".to_string()
    }

    async fn connect(&self, _credentials: &Credentials) -> Result<EchoTransport> {
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        Ok(EchoTransport {
            stats: Arc::clone(&self.stats),
        })
    }
}

/// Transport that authenticates but cannot reach the remote address.
pub struct RefusingTransport {
    stats: Arc<TransportStats>,
}

impl SecureTransport for RefusingTransport {
    type Channel = DuplexStream;

    async fn open_channel(&self, target: &Endpoint) -> Result<DuplexStream> {
        self.stats.channels.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("connect to {target} refused")
    }

    async fn close(&self) {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RefusingConnector {
    pub stats: Arc<TransportStats>,
}

impl TransportConnector for RefusingConnector {
    type Transport = RefusingTransport;

    fn server(&self) -> String {
        "refusing:22".to_string()
    }

    async fn connect(&self, _credentials: &Credentials) -> Result<RefusingTransport> {
        Ok(RefusingTransport {
            stats: Arc::clone(&self.stats),
        })
    }
}

/// Connector for an SSH server that is not there.
pub struct UnreachableConnector;

impl TransportConnector for UnreachableConnector {
    type Transport = EchoTransport;

    fn server(&self) -> String {
        "127.0.0.1:1".to_string()
    }

    async fn connect(&self, _credentials: &Credentials) -> Result<EchoTransport> {
        anyhow::bail!("connection refused")
    }
}

// ── Docker ───────────────────────────────────────────────────────────────────

/// Scripted Docker daemon.
///
/// The local master reports `ready_after` empty listings before returning
/// its containers. `up` takes `up_delay` to finish. Removal fails for ids in
/// `failing`.
#[derive(Default)]
pub struct StubDocker {
    pub up_error: Option<String>,
    pub up_delay: Option<Duration>,
    pub delete_error: Option<String>,
    /// `None` means the master never becomes ready.
    pub ready_after: Option<usize>,
    pub masters: Vec<Container>,
    pub others: Vec<Container>,
    pub failing: HashSet<String>,
    pub master_lists: AtomicUsize,
    pub ups: AtomicUsize,
    pub ups_finished: AtomicUsize,
    pub deletes: AtomicUsize,
    pub removed: Mutex<Vec<String>>,
}

impl StubDocker {
    pub fn removed(&self) -> Vec<String> {
        let mut removed = self.removed.lock().expect("lock").clone();
        removed.sort();
        removed
    }
}

impl ClusterProject for StubDocker {
    async fn up(&self) -> Result<()> {
        self.ups.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.up_delay {
            tokio::time::sleep(delay).await;
        }
        self.ups_finished.fetch_add(1, Ordering::SeqCst);
        match &self.up_error {
            Some(msg) => anyhow::bail!("{msg}"),
            None => Ok(()),
        }
    }

    async fn delete(&self) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        match &self.delete_error {
            Some(msg) => anyhow::bail!("{msg}"),
            None => Ok(()),
        }
    }
}

impl ContainerClient for StubDocker {
    async fn list_containers(&self, filter: &LabelFilter, _all: bool) -> Result<Vec<Container>> {
        let removed = self.removed.lock().expect("lock").clone();
        let remaining = |list: &[Container]| -> Vec<Container> {
            list.iter()
                .filter(|c| !removed.contains(&c.id))
                .cloned()
                .collect()
        };

        if filter.to_filter_arg().ends_with(LOCAL_MASTER_POD) {
            let seen = self.master_lists.fetch_add(1, Ordering::SeqCst);
            return Ok(match self.ready_after {
                Some(after) if seen >= after => remaining(&self.masters),
                _ => Vec::new(),
            });
        }
        let mut all = remaining(&self.masters);
        all.extend(remaining(&self.others));
        Ok(all)
    }

    async fn remove_container(&self, id: &str, force: bool, delete_volumes: bool) -> Result<()> {
        assert!(force && delete_volumes, "removal must force and drop volumes");
        if self.failing.contains(id) {
            anyhow::bail!("container {id} is in use");
        }
        self.removed.lock().expect("lock").push(id.to_string());
        Ok(())
    }
}

// ── Reporter ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingReporter {
    pub successes: Mutex<Vec<String>>,
    pub warnings: Mutex<Vec<String>>,
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, _message: &str) {}

    fn success(&self, message: &str) {
        self.successes.lock().expect("lock").push(message.to_string());
    }

    fn warn(&self, message: &str) {
        self.warnings.lock().expect("lock").push(message.to_string());
    }
}
