use crate::api::client::{CompletionProbe, LogChunk, LogSource};
use crate::api::error::FetchError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Scripted `LogSource` for tests. Each call pops the next response; once
/// the script is exhausted every call fails with `FetchError::Decode`.
#[derive(Clone, Default)]
pub struct MockLogSource {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    requested: Arc<Mutex<Vec<u64>>>,
    calls: Arc<AtomicUsize>,
    completed: Arc<AtomicBool>,
    gate: Option<Arc<Notify>>,
}

#[derive(Debug, Clone)]
enum MockResponse {
    Chunk(LogChunk),
    Failure(u16),
}

impl MockLogSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk(self, text: impl Into<String>, next_offset: u64) -> Self {
        self.push(MockResponse::Chunk(LogChunk {
            text: text.into(),
            next_offset,
        }))
    }

    /// Scripts an HTTP failure with the given status code.
    pub fn with_failure(self, status: u16) -> Self {
        self.push(MockResponse::Failure(status))
    }

    /// Holds every fetch until the returned handle is notified. Used to keep a
    /// request in flight while a second `notify` races it.
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(gate.clone());
        (self, gate)
    }

    /// What [`CompletionProbe::is_completed`] reports from now on.
    pub fn set_completed(&self, completed: bool) {
        self.completed.store(completed, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Start offsets requested so far, in call order.
    pub fn requested_offsets(&self) -> Vec<u64> {
        self.requested
            .lock()
            .map(|offsets| offsets.clone())
            .unwrap_or_default()
    }

    fn push(self, response: MockResponse) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(response);
        }
        self
    }
}

#[async_trait]
impl LogSource for MockLogSource {
    async fn fetch_log(&self, start_line: u64) -> Result<LogChunk, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(start_line);
        }

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut responses| responses.pop_front());

        match next {
            Some(MockResponse::Chunk(chunk)) => Ok(chunk),
            Some(MockResponse::Failure(status)) => Err(FetchError::Status {
                url: "mock://console".to_string(),
                status,
            }),
            None => Err(FetchError::Decode {
                url: "mock://console".to_string(),
                message: "MockLogSource: no more responses configured".to_string(),
            }),
        }
    }
}

#[async_trait]
impl CompletionProbe for MockLogSource {
    async fn is_completed(&self) -> Result<bool, FetchError> {
        Ok(self.completed.load(Ordering::SeqCst))
    }
}
