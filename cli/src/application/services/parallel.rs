//! Concurrent execution of independent fallible tasks.
//!
//! Every task's outcome lands on exactly one of two bounded streams. Both
//! streams close once every task has finished, so a consumer can drain them
//! to completion without knowing the batch size.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinSet};

/// Buffer size of each output stream. Producers wait when it is full.
pub const CHANNEL_CAPACITY: usize = 16;

/// The two output streams of a batch.
///
/// Both must be drained concurrently: a full error stream blocks the tasks
/// that would otherwise fill the result stream. [`TaskStreams::drain_with`]
/// and [`TaskStreams::collect`] do this.
#[derive(Debug)]
pub struct TaskStreams<T, E> {
    pub results: mpsc::Receiver<T>,
    pub errors: mpsc::Receiver<E>,
}

/// Number of outcomes seen while draining a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCounts {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Every outcome of a batch, in completion order.
#[derive(Debug)]
pub struct BatchReport<T, E> {
    pub succeeded: Vec<T>,
    pub failed: Vec<E>,
}

impl<T, E> BatchReport<T, E> {
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Start every task at once.
///
/// A task that panics is reported on the error stream through
/// `E: From<JoinError>`.
///
/// # Panics
///
/// Panics if called outside a Tokio runtime.
pub fn run<I, F, T, E>(tasks: I) -> TaskStreams<T, E>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: From<JoinError> + Send + 'static,
{
    spawn_batch(tasks, None)
}

/// Like [`run`], with at most `limit` tasks in flight.
///
/// # Panics
///
/// Panics if called outside a Tokio runtime.
pub fn run_bounded<I, F, T, E>(tasks: I, limit: NonZeroUsize) -> TaskStreams<T, E>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: From<JoinError> + Send + 'static,
{
    spawn_batch(tasks, Some(Arc::new(Semaphore::new(limit.get()))))
}

fn spawn_batch<I, F, T, E>(tasks: I, limit: Option<Arc<Semaphore>>) -> TaskStreams<T, E>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: From<JoinError> + Send + 'static,
{
    let (results_tx, results) = mpsc::channel(CHANNEL_CAPACITY);
    let (errors_tx, errors) = mpsc::channel(CHANNEL_CAPACITY);

    let mut set = JoinSet::new();
    for task in tasks {
        let results_tx = results_tx.clone();
        let errors_tx = errors_tx.clone();
        let limit = limit.clone();
        set.spawn(async move {
            // The semaphore is never closed, so acquiring cannot fail.
            let _permit = match limit {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };
            // A closed stream means the consumer went away; nothing to report to.
            match task.await {
                Ok(value) => {
                    let _ = results_tx.send(value).await;
                }
                Err(error) => {
                    let _ = errors_tx.send(error).await;
                }
            }
        });
    }
    drop(results_tx);

    // Holds the last error sender, so both streams close only after every
    // task has been joined and any panic has been reported.
    tokio::spawn(async move {
        while let Some(joined) = set.join_next().await {
            if let Err(join_error) = joined {
                let _ = errors_tx.send(E::from(join_error)).await;
            }
        }
    });

    TaskStreams { results, errors }
}

impl<T, E> TaskStreams<T, E> {
    /// Drain both streams concurrently, handing each outcome to its callback
    /// as it arrives.
    pub async fn drain_with(
        mut self,
        mut on_result: impl FnMut(T),
        mut on_error: impl FnMut(E),
    ) -> BatchCounts {
        let mut counts = BatchCounts::default();
        let mut results_open = true;
        let mut errors_open = true;

        while results_open || errors_open {
            tokio::select! {
                next = self.results.recv(), if results_open => match next {
                    Some(value) => {
                        counts.succeeded += 1;
                        on_result(value);
                    }
                    None => results_open = false,
                },
                next = self.errors.recv(), if errors_open => match next {
                    Some(error) => {
                        counts.failed += 1;
                        on_error(error);
                    }
                    None => errors_open = false,
                },
            }
        }
        counts
    }

    /// Drain both streams and keep every outcome.
    pub async fn collect(self) -> BatchReport<T, E> {
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        self.drain_with(|value| succeeded.push(value), |error| failed.push(error))
            .await;
        BatchReport { succeeded, failed }
    }
}
