use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::event::WeightChangeEvent;
use crate::ports::events::{EventSource, EventSourceError};

/// In-memory implementation of `EventSource`.
///
/// Pages a fixed history the way the indexer would. Optionally fails the
/// request at a given offset to exercise transport errors.
pub struct InMemoryEventSource {
    events: Vec<WeightChangeEvent>,
    fail_at_offset: Option<usize>,
    requests: AtomicUsize,
}

impl InMemoryEventSource {
    pub fn new(events: Vec<WeightChangeEvent>) -> Self {
        Self {
            events,
            fail_at_offset: None,
            requests: AtomicUsize::new(0),
        }
    }

    /// Fail any page request whose offset is `offset`.
    pub fn failing_at(mut self, offset: usize) -> Self {
        self.fail_at_offset = Some(offset);
        self
    }

    /// Number of `fetch_page` calls served so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryEventSource {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl EventSource for InMemoryEventSource {
    async fn fetch_page(
        &self,
        page_size: usize,
        offset: usize,
    ) -> Result<Vec<WeightChangeEvent>, EventSourceError> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if self.fail_at_offset == Some(offset) {
            return Err(EventSourceError::Transport(format!(
                "connection reset at offset {offset}"
            )));
        }

        let start = offset.min(self.events.len());
        let end = offset.saturating_add(page_size).min(self.events.len());
        Ok(self.events[start..end].to_vec())
    }
}
