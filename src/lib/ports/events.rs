use std::future::Future;

use crate::domain::event::WeightChangeEvent;

/// Port for reading the chronological `WeightChanged` history.
///
/// Implementations:
/// - `SubgraphClient` (GraphQL indexer)
/// - `InMemoryEventSource` for tests
pub trait EventSource: Send + Sync {
    /// Return up to `page_size` events starting at `offset`, ascending by
    /// `(block_number, log_index)`. An empty page marks the end of history.
    fn fetch_page(
        &self,
        page_size: usize,
        offset: usize,
    ) -> impl Future<Output = Result<Vec<WeightChangeEvent>, EventSourceError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum EventSourceError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("indexer returned an error: {0}")]
    Query(String),

    #[error("malformed event {id}: {reason}")]
    Decode { id: String, reason: String },
}
