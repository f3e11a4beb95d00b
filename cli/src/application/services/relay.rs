//! Bidirectional byte relay for a single tunnel session.
//!
//! Both directions are copied concurrently. The session ends as soon as one
//! direction reaches EOF or fails; the write halves are then shut down and
//! both streams dropped, so the other direction stops as well.

use std::io;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Direction of a copy, relative to the argument order of [`relay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `a → b`
    Outbound,
    /// `b → a`
    Inbound,
}

/// How a relay session ended.
#[derive(Debug)]
pub enum RelayOutcome {
    /// One direction reached end-of-stream after copying `bytes`.
    Eof { direction: Direction, bytes: u64 },
    /// One direction failed; the error has already been logged.
    Failed {
        direction: Direction,
        error: io::Error,
    },
    /// The session was interrupted by its cancellation token.
    Cancelled,
}

impl RelayOutcome {
    fn from_copy(direction: Direction, result: io::Result<u64>) -> Self {
        match result {
            Ok(bytes) => Self::Eof { direction, bytes },
            Err(error) => Self::Failed { direction, error },
        }
    }
}

/// Relay bytes between `a` and `b` until either side finishes.
pub async fn relay<A, B>(a: A, b: B) -> RelayOutcome
where
    A: AsyncRead + AsyncWrite,
    B: AsyncRead + AsyncWrite,
{
    relay_with_cancel(a, b, &CancellationToken::new()).await
}

/// Like [`relay`], but also ends the session when `cancel` fires.
pub async fn relay_with_cancel<A, B>(a: A, b: B, cancel: &CancellationToken) -> RelayOutcome
where
    A: AsyncRead + AsyncWrite,
    B: AsyncRead + AsyncWrite,
{
    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);

    let outcome = tokio::select! {
        result = tokio::io::copy(&mut a_read, &mut b_write) => {
            RelayOutcome::from_copy(Direction::Outbound, result)
        }
        result = tokio::io::copy(&mut b_read, &mut a_write) => {
            RelayOutcome::from_copy(Direction::Inbound, result)
        }
        () = cancel.cancelled() => RelayOutcome::Cancelled,
    };

    match &outcome {
        RelayOutcome::Failed { direction, error } => {
            warn!(?direction, %error, "failed to transfer data");
        }
        RelayOutcome::Eof { direction, bytes } => {
            debug!(?direction, bytes, "data transfer finished");
        }
        RelayOutcome::Cancelled => debug!("relay cancelled"),
    }

    // Errors here mean the peer is already gone.
    let _ = a_write.shutdown().await;
    let _ = b_write.shutdown().await;
    outcome
}
