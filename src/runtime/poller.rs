use crate::api::{split_log_lines, LogSource};
use crate::config::DEFAULT_CHUNK_SIZE;
use crate::state::Transform;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

/// Callbacks fired by [`Poller::notify`]. Both default to no-ops.
pub trait PollObserver: Send + Sync {
    /// After every successful fetch, whether or not it carried new lines.
    fn on_update(&self) {}

    /// Once, on the first transition to finished.
    fn on_complete(&self) {}
}

impl PollObserver for () {}

/// What a single [`Poller::notify`] call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Another fetch was in flight or the job had already finished.
    Skipped,
    Updated { lines: usize, finished: bool },
    /// The fetch failed; the cursor did not move.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Fetching,
    Finished,
}

/// Point-in-time view of where the poller is in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchCursor {
    pub next_offset: u64,
    pub state: FetchState,
}

/// Incrementally pulls new console lines from a [`LogSource`] and feeds them
/// to a transformer. At most one fetch is outstanding at a time.
pub struct Poller<S, T> {
    source: S,
    transformer: AsyncMutex<T>,
    observer: Arc<dyn PollObserver>,
    chunk_size: usize,
    next_offset: AtomicU64,
    in_flight: AtomicBool,
    finished: AtomicBool,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S: LogSource, T: Transform> Poller<S, T> {
    pub fn new(source: S, transformer: T) -> Self {
        Self {
            source,
            transformer: AsyncMutex::new(transformer),
            observer: Arc::new(()),
            chunk_size: DEFAULT_CHUNK_SIZE,
            next_offset: AtomicU64::new(0),
            in_flight: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PollObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Lines handed to a single `transform` call. Zero is treated as one.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn cursor(&self) -> FetchCursor {
        let state = if self.finished.load(Ordering::Acquire) {
            FetchState::Finished
        } else if self.in_flight.load(Ordering::Acquire) {
            FetchState::Fetching
        } else {
            FetchState::Idle
        };
        FetchCursor {
            next_offset: self.next_offset.load(Ordering::Acquire),
            state,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Locks the transformer, e.g. to dequeue a deferred pane.
    pub async fn transformer(&self) -> tokio::sync::MutexGuard<'_, T> {
        self.transformer.lock().await
    }

    /// Fetches everything past the cursor and transforms it. `completed` is
    /// the caller's latest job status; once a fetch succeeds with it set,
    /// every later call is skipped.
    pub async fn notify(&self, completed: bool) -> NotifyOutcome {
        if self.finished.load(Ordering::Acquire) {
            return NotifyOutcome::Skipped;
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("console fetch already in flight; skipping tick");
            return NotifyOutcome::Skipped;
        }
        let _guard = InFlightGuard(&self.in_flight);

        if self.finished.load(Ordering::Acquire) {
            return NotifyOutcome::Skipped;
        }

        let offset = self.next_offset.load(Ordering::Acquire);
        let chunk = match self.source.fetch_log(offset).await {
            Ok(chunk) => chunk,
            Err(error) => {
                warn!(
                    offset,
                    retryable = error.is_retryable(),
                    "console fetch failed: {error}"
                );
                return NotifyOutcome::Failed(error.to_string());
            }
        };

        let mut lines = 0;
        if chunk.next_offset > offset {
            let split = split_log_lines(&chunk.text);
            lines = split.len();
            let mut transformer = self.transformer.lock().await;
            for batch in split.chunks(self.chunk_size) {
                transformer.transform(batch);
            }
            drop(transformer);
            self.next_offset.store(chunk.next_offset, Ordering::Release);
            debug!(offset, next_offset = chunk.next_offset, lines, "console advanced");
        } else if chunk.next_offset < offset {
            warn!(
                offset,
                server_offset = chunk.next_offset,
                "server offset moved backwards; ignoring response"
            );
        }

        let newly_finished = completed && !self.finished.swap(true, Ordering::AcqRel);

        self.observer.on_update();
        if newly_finished {
            info!(next_offset = self.next_offset.load(Ordering::Acquire), "job finished");
            self.observer.on_complete();
        }

        NotifyOutcome::Updated {
            lines,
            finished: completed,
        }
    }
}
