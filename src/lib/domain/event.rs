use std::fmt;

use alloy::primitives::{Address, B256, U256};

use super::leaf::{pack_leaf, LeafError};

/// Position of an event in chain history: `(block_number, log_index)`.
///
/// Replay order is ascending `OrderKey`; derived `Ord` compares the block first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderKey {
    pub block_number: u64,
    pub log_index: u64,
}

impl OrderKey {
    pub fn new(block_number: u64, log_index: u64) -> Self {
        Self {
            block_number,
            log_index,
        }
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block {} log {}", self.block_number, self.log_index)
    }
}

/// One `WeightChanged(account, previousWeight, newWeight)` emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightChangeEvent {
    pub account: Address,
    pub previous_weight: u128,
    pub new_weight: u128,
    pub order: OrderKey,
    /// Emitting transaction, when the source provides it (diagnostics only).
    pub transaction_hash: Option<B256>,
}

impl WeightChangeEvent {
    pub fn new(account: Address, previous_weight: u128, new_weight: u128, order: OrderKey) -> Self {
        Self {
            account,
            previous_weight,
            new_weight,
            order,
            transaction_hash: None,
        }
    }
}

/// Tree mutation implied by a weight change.
///
/// Removal is an update to the empty leaf, so `Remove` only carries the leaf to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeOp {
    /// `0 -> n`: append a new leaf.
    Insert { leaf: U256 },
    /// `p -> 0`: overwrite the account's slot with `0`.
    Remove { old_leaf: U256 },
    /// `p -> n`: overwrite the account's slot with the new leaf.
    Update { old_leaf: U256, new_leaf: U256 },
}

impl TreeOp {
    /// The leaf that must already be in the tree for this op to apply.
    pub fn required_leaf(&self) -> Option<U256> {
        match self {
            TreeOp::Insert { .. } => None,
            TreeOp::Remove { old_leaf } | TreeOp::Update { old_leaf, .. } => Some(*old_leaf),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TreeOp::Insert { .. } => "insert",
            TreeOp::Remove { .. } => "remove",
            TreeOp::Update { .. } => "update",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    #[error("no-op weight change 0 -> 0 for {account} at {order}")]
    NoOp { account: Address, order: OrderKey },

    #[error("{source} at {order}")]
    Leaf {
        order: OrderKey,
        #[source]
        source: LeafError,
    },
}

/// Decide which tree operation a weight change represents.
pub fn classify(event: &WeightChangeEvent) -> Result<TreeOp, ClassifyError> {
    let account = event.account;
    let leaf_for = |weight| {
        pack_leaf(account, weight).map_err(|source| ClassifyError::Leaf {
            order: event.order,
            source,
        })
    };
    match (event.previous_weight, event.new_weight) {
        (0, 0) => Err(ClassifyError::NoOp {
            account,
            order: event.order,
        }),
        (0, new) => Ok(TreeOp::Insert {
            leaf: leaf_for(new)?,
        }),
        (previous, 0) => Ok(TreeOp::Remove {
            old_leaf: leaf_for(previous)?,
        }),
        (previous, new) => Ok(TreeOp::Update {
            old_leaf: leaf_for(previous)?,
            new_leaf: leaf_for(new)?,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::leaf::MAX_WEIGHT;
    use alloy::primitives::address;

    const ALICE: Address = address!("0xdeb8699659be5d41a0e57e179d6cb42e00b9200c");

    fn event(previous_weight: u128, new_weight: u128) -> WeightChangeEvent {
        WeightChangeEvent::new(ALICE, previous_weight, new_weight, OrderKey::new(10, 2))
    }

    #[test]
    fn test_insert() {
        let op = classify(&event(0, 5)).unwrap();
        assert_eq!(
            op,
            TreeOp::Insert {
                leaf: pack_leaf(ALICE, 5).unwrap()
            }
        );
        assert_eq!(op.required_leaf(), None);
    }

    #[test]
    fn test_remove_locates_previous_leaf() {
        let op = classify(&event(5, 0)).unwrap();
        assert_eq!(
            op,
            TreeOp::Remove {
                old_leaf: pack_leaf(ALICE, 5).unwrap()
            }
        );
        assert_eq!(op.required_leaf(), Some(pack_leaf(ALICE, 5).unwrap()));
    }

    #[test]
    fn test_update() {
        let op = classify(&event(5, 8)).unwrap();
        assert_eq!(
            op,
            TreeOp::Update {
                old_leaf: pack_leaf(ALICE, 5).unwrap(),
                new_leaf: pack_leaf(ALICE, 8).unwrap(),
            }
        );
        assert_eq!(op.name(), "update");
    }

    #[test]
    fn test_zero_to_zero_is_an_error() {
        let err = classify(&event(0, 0)).unwrap_err();
        assert_eq!(
            err,
            ClassifyError::NoOp {
                account: ALICE,
                order: OrderKey::new(10, 2)
            }
        );
    }

    #[test]
    fn test_oversized_weight_surfaces_leaf_error() {
        let err = classify(&event(0, MAX_WEIGHT + 1)).unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::Leaf {
                source: LeafError::WeightOverflow { .. },
                ..
            }
        ));
        assert!(err.to_string().ends_with("at block 10 log 2"));
    }

    #[test]
    fn test_order_key_sorts_by_block_then_log() {
        let mut keys = vec![
            OrderKey::new(2, 0),
            OrderKey::new(1, 7),
            OrderKey::new(1, 3),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![OrderKey::new(1, 3), OrderKey::new(1, 7), OrderKey::new(2, 0)]
        );
    }
}
