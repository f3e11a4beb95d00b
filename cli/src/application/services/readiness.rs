//! Periodic readiness polling.
//!
//! A background task runs a probe on a fixed interval and fires a one-shot
//! signal the first time the probe reports more than `threshold` items.
//! Probe errors are logged and retried on the next tick.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::domain::{ConfigError, ReadinessSettings};

/// The tick on which readiness was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    /// 1-based tick number.
    pub tick: u64,
    pub count: usize,
}

/// Result of waiting on a [`ReadySignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready(Readiness),
    TimedOut,
    Interrupted,
}

/// Fires at most once. Dropping it stops the poller.
#[derive(Debug)]
pub struct ReadySignal {
    rx: oneshot::Receiver<Readiness>,
    _stop: DropGuard,
}

impl ReadySignal {
    /// Resolve once ready. `None` if the poller was cancelled first.
    pub async fn ready(self) -> Option<Readiness> {
        let Self { rx, _stop } = self;
        rx.await.ok()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReadinessPoller {
    threshold: usize,
    interval: Duration,
}

impl ReadinessPoller {
    /// # Errors
    ///
    /// Returns [`ConfigError::Zero`] if `interval` is zero.
    pub fn new(threshold: usize, interval: Duration) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::Zero {
                field: "readiness.interval_secs",
            });
        }
        Ok(Self {
            threshold,
            interval,
        })
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Zero`] if the configured interval is zero.
    pub fn from_settings(settings: &ReadinessSettings) -> Result<Self, ConfigError> {
        Self::new(settings.threshold, settings.interval())
    }

    /// Start polling. The first probe runs one interval from now.
    ///
    /// Polling stops when the signal fires, when `cancel` fires, or when the
    /// returned signal is dropped.
    pub fn spawn<P, Fut>(&self, mut probe: P, cancel: &CancellationToken) -> ReadySignal
    where
        P: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<usize>> + Send,
    {
        let stop = cancel.child_token();
        let (tx, rx) = oneshot::channel();
        let Self {
            threshold,
            interval,
        } = *self;

        let token = stop.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut tick = 0u64;
            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tick += 1;
                let probed = tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    probed = probe() => probed,
                };
                match probed {
                    Ok(count) if count > threshold => {
                        info!(tick, count, "readiness threshold reached");
                        let _ = tx.send(Readiness { tick, count });
                        return;
                    }
                    Ok(count) => debug!(tick, count, threshold, "not ready yet"),
                    Err(e) => warn!(tick, error = %format!("{e:#}"), "readiness check failed"),
                }
            }
            debug!(tick, "readiness polling stopped");
        });

        ReadySignal {
            rx,
            _stop: stop.drop_guard(),
        }
    }
}

/// Wait for `signal`, giving up after `timeout` or when `interrupt` fires.
pub async fn wait_until_ready(
    signal: ReadySignal,
    timeout: Duration,
    interrupt: &CancellationToken,
) -> WaitOutcome {
    tokio::select! {
        biased;
        () = interrupt.cancelled() => WaitOutcome::Interrupted,
        waited = tokio::time::timeout(timeout, signal.ready()) => match waited {
            Ok(Some(readiness)) => WaitOutcome::Ready(readiness),
            Ok(None) => WaitOutcome::Interrupted,
            Err(_) => WaitOutcome::TimedOut,
        },
    }
}
