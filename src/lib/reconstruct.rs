use alloy::primitives::{Address, U256};
use tracing::{debug, info, warn};

use crate::domain::event::{classify, ClassifyError, OrderKey, TreeOp, WeightChangeEvent};
use crate::domain::merkle::{CensusTree, NodeHasher, TreeError};
use crate::ports::events::{EventSource, EventSourceError};

/// Page size used against the indexer unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Orchestrator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconstructConfig {
    /// Events requested per page.
    pub page_size: usize,
}

impl Default for ReconstructConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Error type for replay failures. Every variant is terminal for the run.
#[derive(Debug, thiserror::Error)]
pub enum ReconstructError {
    #[error("page size must be positive")]
    InvalidPageSize,

    #[error("failed to fetch events at offset {offset}: {source}")]
    Fetch {
        offset: usize,
        #[source]
        source: EventSourceError,
    },

    #[error("event {position}: {source}")]
    Classify {
        position: usize,
        account: Address,
        order: OrderKey,
        #[source]
        source: ClassifyError,
    },

    #[error("event {position} ({account} at {order}): {op} needs leaf {leaf:#x}, which is not in the tree")]
    LeafNotFound {
        position: usize,
        account: Address,
        order: OrderKey,
        op: &'static str,
        leaf: U256,
    },

    #[error("event {position} ({account} at {order}): {source}")]
    Tree {
        position: usize,
        account: Address,
        order: OrderKey,
        #[source]
        source: TreeError,
    },
}

/// Reconstructed root does not match the authoritative one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("root mismatch: expected {expected:#x}, reconstructed {actual:#x}")]
pub struct RootMismatch {
    pub expected: U256,
    pub actual: U256,
}

/// Outcome of a full replay.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub tree: CensusTree,
    /// Final root, `0` for an empty history.
    pub root: U256,
    /// Slots in the tree, tombstones included.
    pub size: usize,
    /// Events replayed.
    pub events: usize,
}

/// Rebuilds the census tree by replaying the full `WeightChanged` history.
///
/// Generic over `EventSource`; the source is trusted to page in ascending
/// `(block_number, log_index)` order and is never re-sorted here.
pub struct TreeReconstructor<S: EventSource> {
    source: S,
    config: ReconstructConfig,
}

impl<S: EventSource> TreeReconstructor<S> {
    pub fn new(source: S, config: ReconstructConfig) -> Self {
        Self { source, config }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Page through the whole history until the source returns an empty page.
    pub async fn fetch_all(&self) -> Result<Vec<WeightChangeEvent>, ReconstructError> {
        let page_size = self.config.page_size;
        if page_size == 0 {
            return Err(ReconstructError::InvalidPageSize);
        }

        let mut events = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .source
                .fetch_page(page_size, offset)
                .await
                .map_err(|source| ReconstructError::Fetch { offset, source })?;
            if page.is_empty() {
                break;
            }
            debug!(offset, count = page.len(), "fetched event page");
            offset += page.len();
            events.extend(page);
        }

        info!(events = events.len(), "fetched WeightChanged history");
        Ok(events)
    }

    /// Fetch every event and replay it into a fresh tree.
    pub async fn reconstruct(&self) -> Result<Reconstruction, ReconstructError> {
        let events = self.fetch_all().await?;
        let tree = replay(&events)?;
        let root = tree.root_or_zero();
        let size = tree.size();

        if events.is_empty() {
            warn!("no events found, census tree is empty");
        }
        info!(
            size,
            active = tree.active_count(),
            empty = tree.empty_count(),
            root = %format!("{root:#x}"),
            "census tree reconstructed"
        );

        Ok(Reconstruction {
            tree,
            root,
            size,
            events: events.len(),
        })
    }
}

/// Replay an ordered event slice into a new Poseidon tree.
pub fn replay(events: &[WeightChangeEvent]) -> Result<CensusTree, ReconstructError> {
    let mut tree: CensusTree = CensusTree::new();
    let mut last_order: Option<OrderKey> = None;

    for (position, event) in events.iter().enumerate() {
        if let Some(previous) = last_order {
            if event.order < previous {
                warn!(
                    position,
                    previous = %previous,
                    current = %event.order,
                    "event feed is not in ascending order"
                );
            }
        }
        last_order = Some(event.order);

        apply_event(&mut tree, position, event)?;

        if (position + 1) % 1000 == 0 {
            info!(applied = position + 1, size = tree.size(), "replay progress");
        }
    }

    Ok(tree)
}

/// Apply one event to `tree`. `position` is the event's place in the feed and
/// only feeds error context.
pub fn apply_event<H: NodeHasher>(
    tree: &mut CensusTree<H>,
    position: usize,
    event: &WeightChangeEvent,
) -> Result<TreeOp, ReconstructError> {
    let account = event.account;
    let order = event.order;

    let op = classify(event).map_err(|source| ReconstructError::Classify {
        position,
        account,
        order,
        source,
    })?;
    let tree_error = |source| ReconstructError::Tree {
        position,
        account,
        order,
        source,
    };

    match op {
        TreeOp::Insert { leaf } => {
            let index = tree.insert(leaf).map_err(tree_error)?;
            debug!(%account, weight = event.new_weight, index, size = tree.size(), "insert");
        }
        TreeOp::Remove { old_leaf } => {
            let index = locate(tree, position, event, &op, old_leaf)?;
            tree.update(index, U256::ZERO).map_err(tree_error)?;
            debug!(%account, index, size = tree.size(), "remove");
        }
        TreeOp::Update { old_leaf, new_leaf } => {
            let index = locate(tree, position, event, &op, old_leaf)?;
            tree.update(index, new_leaf).map_err(tree_error)?;
            debug!(
                %account,
                from = event.previous_weight,
                to = event.new_weight,
                index,
                "update"
            );
        }
    }

    Ok(op)
}

fn locate<H: NodeHasher>(
    tree: &CensusTree<H>,
    position: usize,
    event: &WeightChangeEvent,
    op: &TreeOp,
    leaf: U256,
) -> Result<usize, ReconstructError> {
    tree.index_of(&leaf)
        .ok_or_else(|| ReconstructError::LeafNotFound {
            position,
            account: event.account,
            order: event.order,
            op: op.name(),
            leaf,
        })
}

/// Compare the tree's root (0 when empty) with the authoritative root.
pub fn validate_root<H: NodeHasher>(
    tree: &CensusTree<H>,
    expected: U256,
) -> Result<(), RootMismatch> {
    let actual = tree.root_or_zero();
    if actual != expected {
        return Err(RootMismatch { expected, actual });
    }
    Ok(())
}
