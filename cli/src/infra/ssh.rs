//! `SecureTransport` over the system OpenSSH client.
//!
//! One master process (`ssh -M -N`) holds the authenticated connection to the
//! Docker VM. Every channel is a short-lived `ssh -W host:port` multiplexed
//! over the master's control socket, with its stdio exposed as a byte stream.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context as TaskContext, Poll, ready};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, BufReader, ReadBuf};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::application::ports::{SecureTransport, TransportConnector};
use crate::domain::{Credentials, Endpoint};

const SSH: &str = "ssh";

/// Delay between control socket checks while the master authenticates.
const MASTER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// `ssh -W` exits almost immediately when the far side refuses the
/// connection; a channel still alive after this long is considered open.
const CHANNEL_SETTLE: Duration = Duration::from_millis(150);

#[cfg(windows)]
const DEVNULL: &str = "NUL";
#[cfg(not(windows))]
const DEVNULL: &str = "/dev/null";

/// Connects to the Docker VM's SSH server.
#[derive(Debug, Clone)]
pub struct SshConnector {
    server: Endpoint,
    user: String,
    connect_timeout: Duration,
}

impl SshConnector {
    #[must_use]
    pub fn new(server: Endpoint, user: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            server,
            user: user.into(),
            connect_timeout,
        }
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.server.host())
    }

    fn master_args(&self, key: &Path, control_path: &Path) -> Vec<String> {
        let mut args = vec![
            "-i".to_string(),
            key.to_string_lossy().into_owned(),
            "-p".to_string(),
            self.server.port().to_string(),
            "-N".to_string(),
            "-M".to_string(),
            "-S".to_string(),
            control_path.to_string_lossy().into_owned(),
        ];
        for option in [
            "BatchMode=yes".to_string(),
            "IdentitiesOnly=yes".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            format!("UserKnownHostsFile={DEVNULL}"),
            "LogLevel=ERROR".to_string(),
            "ExitOnForwardFailure=yes".to_string(),
            "ServerAliveInterval=15".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
        ] {
            args.push("-o".to_string());
            args.push(option);
        }
        args.push(self.destination());
        args
    }
}

fn control_path() -> PathBuf {
    std::env::temp_dir().join(format!("boot2k8s-{}.ctl", std::process::id()))
}

/// `true` once the master accepts multiplexed sessions.
async fn master_ready(control_path: &Path, destination: &str) -> bool {
    Command::new(SSH)
        .arg("-S")
        .arg(control_path)
        .args(["-O", "check", destination])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .is_ok_and(|status| status.success())
}

async fn read_stderr(child: &mut Child) -> String {
    let mut message = String::new();
    if let Some(stderr) = child.stderr.as_mut() {
        let _ = stderr.read_to_string(&mut message).await;
    }
    message.trim().to_string()
}

impl TransportConnector for SshConnector {
    type Transport = SshTransport;

    fn server(&self) -> String {
        self.server.to_string()
    }

    async fn connect(&self, credentials: &Credentials) -> Result<SshTransport> {
        if credentials.key().is_empty() {
            bail!("SSH key {} is empty", credentials.path().display());
        }
        let control_path = control_path();
        let _ = tokio::fs::remove_file(&control_path).await;
        let destination = self.destination();

        debug!(server = %self.server, user = %self.user, "starting ssh master");
        let mut master = Command::new(SSH)
            .args(self.master_args(credentials.path(), &control_path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .context("failed to spawn ssh")?;

        let deadline = Instant::now() + self.connect_timeout * 2;
        loop {
            if let Some(status) = master.try_wait().context("waiting for ssh")? {
                let stderr = read_stderr(&mut master).await;
                bail!("ssh exited with {status}: {stderr}");
            }
            if master_ready(&control_path, &destination).await {
                break;
            }
            if Instant::now() >= deadline {
                let _ = master.kill().await;
                bail!(
                    "no response within {}s",
                    (self.connect_timeout * 2).as_secs()
                );
            }
            tokio::time::sleep(MASTER_POLL_INTERVAL).await;
        }
        debug!(control = %control_path.display(), "ssh master ready");

        Ok(SshTransport::supervise(master, control_path, destination))
    }
}

/// A running ssh master. Dropping it kills the master.
pub struct SshTransport {
    control_path: PathBuf,
    destination: String,
    closing: CancellationToken,
    exited: CancellationToken,
}

impl SshTransport {
    fn supervise(mut master: Child, control_path: PathBuf, destination: String) -> Self {
        let closing = CancellationToken::new();
        let exited = CancellationToken::new();

        let stop = closing.clone();
        let done = exited.clone();
        let socket = control_path.clone();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = master.wait() => Some(status),
                () = stop.cancelled() => None,
            };
            match status {
                Some(status) => debug!(?status, "ssh master exited"),
                None => {
                    let _ = master.kill().await;
                    debug!("ssh master stopped");
                }
            }
            let _ = tokio::fs::remove_file(&socket).await;
            done.cancel();
        });

        Self {
            control_path,
            destination,
            closing,
            exited,
        }
    }
}

impl Drop for SshTransport {
    fn drop(&mut self) {
        self.closing.cancel();
    }
}

impl SecureTransport for SshTransport {
    type Channel = SshChannel;

    async fn open_channel(&self, target: &Endpoint) -> Result<SshChannel> {
        if self.closing.is_cancelled() || self.exited.is_cancelled() {
            bail!("SSH connection is closed");
        }
        let forward = target.to_string();
        let mut child = Command::new(SSH)
            .arg("-S")
            .arg(&self.control_path)
            .args([
                "-o",
                "ControlMaster=no",
                "-W",
                forward.as_str(),
                self.destination.as_str(),
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .context("failed to spawn ssh")?;

        if let Ok(status) = tokio::time::timeout(CHANNEL_SETTLE, child.wait()).await {
            let status = status.context("waiting for ssh")?;
            let stderr = read_stderr(&mut child).await;
            bail!("ssh exited with {status}: {stderr}");
        }

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "boot2k8s::ssh", "{line}");
                }
            });
        }
        SshChannel::from_child(child)
    }

    async fn close(&self) {
        self.closing.cancel();
        self.exited.cancelled().await;
    }
}

/// Stdio of a child process as one bidirectional stream.
///
/// Shutting down the write half closes the child's stdin, which `ssh -W`
/// forwards as EOF to the remote end.
pub struct SshChannel {
    stdout: ChildStdout,
    stdin: Option<ChildStdin>,
    _child: Child,
}

impl SshChannel {
    /// # Errors
    ///
    /// Returns an error if the child was not spawned with piped stdin and stdout.
    pub fn from_child(mut child: Child) -> Result<Self> {
        let stdin = child.stdin.take().context("child stdin is not piped")?;
        let stdout = child.stdout.take().context("child stdout is not piped")?;
        Ok(Self {
            stdout,
            stdin: Some(stdin),
            _child: child,
        })
    }
}

impl AsyncRead for SshChannel {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

impl AsyncWrite for SshChannel {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.stdin.as_mut() {
            Some(stdin) => Pin::new(stdin).poll_write(cx, buf),
            None => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "channel is shut down for writing",
            ))),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        match self.stdin.as_mut() {
            Some(stdin) => Pin::new(stdin).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        if let Some(stdin) = self.stdin.as_mut() {
            ready!(Pin::new(stdin).poll_flush(cx))?;
        }
        self.stdin = None;
        Poll::Ready(Ok(()))
    }
}
