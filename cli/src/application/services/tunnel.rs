//! Port forwarding proxy: a local TCP listener whose connections are relayed
//! to a remote endpoint through a [`SecureTransport`].
//!
//! Lifecycle: `Starting → Running → Closing → Closed`. Shutdown stops the
//! accept loop and closes the listener and the transport. In-flight sessions
//! keep running until their streams close, unless
//! [`TunnelConfig::abort_sessions_on_shutdown`] is set.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::ports::{SecureTransport, TransportConnector};
use crate::application::services::relay;
use crate::domain::{Credentials, Endpoint, EndpointRole, TunnelError, TunnelSettings};

/// Accept failures in a row after which the listener is considered broken.
pub const MAX_CONSECUTIVE_ACCEPT_FAILURES: u32 = 8;

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Proxy lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProxyState {
    Starting,
    Running,
    Closing,
    Closed,
}

/// Addresses and session policy for one proxy.
#[derive(Debug, Clone)]
pub struct TunnelConfig {
    pub local: Endpoint,
    pub remote: Endpoint,
    pub abort_sessions_on_shutdown: bool,
}

impl TunnelConfig {
    /// # Errors
    ///
    /// Returns [`TunnelError::InvalidEndpoint`] if either address does not parse.
    pub fn new(local: &str, remote: &str) -> Result<Self, TunnelError> {
        Ok(Self {
            local: Endpoint::parse(local, EndpointRole::Local)?,
            remote: Endpoint::parse(remote, EndpointRole::Remote)?,
            abort_sessions_on_shutdown: false,
        })
    }

    /// # Errors
    ///
    /// Returns [`TunnelError::InvalidEndpoint`] if either address does not parse.
    pub fn from_settings(settings: &TunnelSettings) -> Result<Self, TunnelError> {
        let mut config = Self::new(&settings.local, &settings.remote)?;
        config.abort_sessions_on_shutdown = settings.abort_sessions_on_shutdown;
        Ok(config)
    }
}

/// Idempotent shutdown trigger. Cheap to clone; safe to call from any task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    /// Stop accepting connections and release the listener and transport.
    pub fn shutdown(&self) {
        if !self.token.is_cancelled() {
            debug!("tunnel shutdown requested");
        }
        self.token.cancel();
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// A configured proxy that has not been started.
///
/// `start` consumes the proxy, so it runs at most once.
pub struct TunnelProxy {
    config: TunnelConfig,
    state: watch::Sender<ProxyState>,
}

impl TunnelProxy {
    #[must_use]
    pub fn new(config: TunnelConfig) -> Self {
        let (state, _) = watch::channel(ProxyState::Starting);
        Self { config, state }
    }

    /// Observe lifecycle transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ProxyState> {
        self.state.subscribe()
    }

    /// Connect the transport, bind the listener and spawn the accept loop.
    ///
    /// `shutdown` may already be cancelled; the proxy then closes right
    /// after binding.
    ///
    /// # Errors
    ///
    /// Returns [`TunnelError::Transport`] without touching the local port if
    /// the transport cannot be established, or [`TunnelError::Bind`] if the
    /// local address is unavailable.
    pub async fn start<C>(
        self,
        connector: &C,
        credentials: &Credentials,
        shutdown: CancellationToken,
    ) -> Result<RunningTunnel, TunnelError>
    where
        C: TransportConnector,
    {
        let transport = connector
            .connect(credentials)
            .await
            .map_err(|e| TunnelError::Transport {
                server: connector.server(),
                reason: format!("{e:#}"),
            })?;
        debug!(server = %connector.server(), "established connection with SSH server");

        let (listener, local_addr) = match bind(&self.config.local).await {
            Ok(bound) => bound,
            Err(error) => {
                transport.close().await;
                return Err(error);
            }
        };
        info!(%local_addr, remote = %self.config.remote, "listening (ready to connect)");
        Ok(self.launch(listener, local_addr, transport, shutdown))
    }

    /// Move to `Running` and hand `listener` to a spawned accept loop.
    fn launch<T, L>(
        self,
        listener: L,
        local_addr: SocketAddr,
        transport: T,
        shutdown: CancellationToken,
    ) -> RunningTunnel
    where
        T: SecureTransport,
        L: Listener,
    {
        self.state.send_replace(ProxyState::Running);

        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        let state = self.state.subscribe();
        let accept_loop = AcceptLoop {
            listener,
            transport: Arc::new(transport),
            config: self.config,
            shutdown: shutdown.clone(),
            errors: errors_tx,
            state: self.state,
        };
        tokio::spawn(accept_loop.run());

        RunningTunnel {
            local_addr,
            shutdown: ShutdownHandle { token: shutdown },
            errors: errors_rx,
            state,
        }
    }
}

/// Source of inbound connections for the accept loop.
trait Listener: Send + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;
}

impl Listener for TcpListener {
    type Stream = TcpStream;

    fn accept(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

async fn bind(local: &Endpoint) -> Result<(TcpListener, SocketAddr), TunnelError> {
    let bind_error = |source| TunnelError::Bind {
        addr: local.to_string(),
        source,
    };
    let listener = TcpListener::bind((local.host(), local.port()))
        .await
        .map_err(bind_error)?;
    let addr = listener.local_addr().map_err(bind_error)?;
    Ok((listener, addr))
}

/// Handle to a started proxy.
pub struct RunningTunnel {
    local_addr: SocketAddr,
    shutdown: ShutdownHandle,
    errors: mpsc::UnboundedReceiver<TunnelError>,
    state: watch::Receiver<ProxyState>,
}

impl RunningTunnel {
    /// Address the listener is actually bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    #[must_use]
    pub fn state(&self) -> ProxyState {
        *self.state.borrow()
    }

    /// Next per-session or listener error. `None` once the accept loop and
    /// every session have finished.
    pub async fn next_error(&mut self) -> Option<TunnelError> {
        self.errors.recv().await
    }

    /// Wait until the listener and transport have been released.
    pub async fn closed(&mut self) {
        let _ = self.state.wait_for(|s| *s == ProxyState::Closed).await;
    }

    /// Wait at most `grace` for [`ProxyState::Closed`]. Returns `false` on timeout.
    pub async fn wait_closed(&mut self, grace: Duration) -> bool {
        tokio::time::timeout(grace, self.closed()).await.is_ok()
    }
}

struct AcceptLoop<T, L> {
    listener: L,
    transport: Arc<T>,
    config: TunnelConfig,
    shutdown: CancellationToken,
    errors: mpsc::UnboundedSender<TunnelError>,
    state: watch::Sender<ProxyState>,
}

impl<T: SecureTransport, L: Listener> AcceptLoop<T, L> {
    async fn run(mut self) {
        let mut failures = 0u32;
        loop {
            let accepted = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => {
                    failures = 0;
                    debug!(%peer, "accepted request");
                    self.spawn_session(stream, peer);
                }
                Err(source) => {
                    failures += 1;
                    if failures >= MAX_CONSECUTIVE_ACCEPT_FAILURES {
                        warn!(failures, %source, "local listener is failing; stopping");
                        let _ = self
                            .errors
                            .send(TunnelError::ListenerFailed { failures, source });
                        break;
                    }
                    debug!(failures, %source, "accept failed");
                    let _ = self.errors.send(TunnelError::Accept(source));
                    tokio::select! {
                        biased;
                        () = self.shutdown.cancelled() => break,
                        () = tokio::time::sleep(ACCEPT_RETRY_DELAY) => {}
                    }
                }
            }
        }

        self.state.send_replace(ProxyState::Closing);
        info!("stopping local server and closing SSH connection");
        self.shutdown.cancel();
        let Self {
            listener,
            transport,
            state,
            ..
        } = self;
        drop(listener);
        transport.close().await;
        state.send_replace(ProxyState::Closed);
        debug!("tunnel closed");
    }

    fn spawn_session(&self, local: L::Stream, peer: SocketAddr) {
        let transport = Arc::clone(&self.transport);
        let remote = self.config.remote.clone();
        let errors = self.errors.clone();
        let cancel = if self.config.abort_sessions_on_shutdown {
            self.shutdown.child_token()
        } else {
            CancellationToken::new()
        };

        tokio::spawn(async move {
            let channel = match transport.open_channel(&remote).await {
                Ok(channel) => channel,
                Err(e) => {
                    let error = TunnelError::OpenChannel {
                        remote: remote.to_string(),
                        reason: format!("{e:#}"),
                    };
                    warn!(%peer, %remote, "failed to open remote channel");
                    let _ = errors.send(error);
                    return;
                }
            };
            debug!(%peer, %remote, "established connection with remote server");
            let outcome = relay::relay_with_cancel(local, channel, &cancel).await;
            debug!(%peer, ?outcome, "finished forwarding");
        });
    }
}
