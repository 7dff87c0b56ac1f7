use std::fmt;

use alloy::primitives::{Address, U256};
use tracing::{debug, info, warn};

use crate::domain::leaf::{is_empty_leaf, unpack_leaf};
use crate::domain::merkle::{CensusTree, NodeHasher};
use crate::ports::chain::{CensusChainPort, ChainError};

/// A slot where the rebuilt tree and the contract disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discrepancy {
    /// `getAccountAt(index)` differs from the account packed in the leaf
    /// (zero address for a tombstone).
    Account {
        index: usize,
        expected: Address,
        on_chain: Address,
    },
    /// `getDelegations(account).leaf` differs from the tree's leaf.
    Leaf {
        index: usize,
        account: Address,
        expected: U256,
        on_chain: U256,
    },
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discrepancy::Account {
                index,
                expected,
                on_chain,
            } => write!(
                f,
                "slot {index}: tree has account {expected}, contract has {on_chain}"
            ),
            Discrepancy::Leaf {
                index,
                account,
                expected,
                on_chain,
            } => write!(
                f,
                "slot {index} ({account}): tree leaf {expected:#x}, contract leaf {on_chain:#x}"
            ),
        }
    }
}

/// Result of walking every slot against the contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossCheckReport {
    /// Slots inspected.
    pub checked: usize,
    pub discrepancies: Vec<Discrepancy>,
}

impl CrossCheckReport {
    pub fn is_consistent(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

/// Compare each slot of `tree` with the contract's per-index account and
/// per-account leaf. Chain errors abort; disagreements are collected.
pub async fn cross_check<H, C>(
    tree: &CensusTree<H>,
    chain: &C,
) -> Result<CrossCheckReport, ChainError>
where
    H: NodeHasher,
    C: CensusChainPort,
{
    let mut report = CrossCheckReport::default();

    for (index, leaf) in tree.leaves().iter().enumerate() {
        let expected = if is_empty_leaf(leaf) {
            Address::ZERO
        } else {
            unpack_leaf(*leaf).0
        };

        let on_chain = chain.get_account_at(index as u64).await?;
        if on_chain != expected {
            warn!(index, %expected, %on_chain, "account mismatch");
            report.discrepancies.push(Discrepancy::Account {
                index,
                expected,
                on_chain,
            });
        }

        if !is_empty_leaf(leaf) {
            let delegation = chain.get_delegations(expected).await?;
            if delegation.leaf != *leaf {
                warn!(index, account = %expected, "leaf mismatch");
                report.discrepancies.push(Discrepancy::Leaf {
                    index,
                    account: expected,
                    expected: *leaf,
                    on_chain: delegation.leaf,
                });
            }
        }

        debug!(index, "slot checked");
        report.checked += 1;
    }

    info!(
        checked = report.checked,
        discrepancies = report.discrepancies.len(),
        "cross-check complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock_chain::MockCensusChain;
    use crate::domain::leaf::pack_leaf;
    use crate::ports::AccountDelegation;
    use alloy::primitives::address;

    const A: Address = address!("0x00000000000000000000000000000000000000aa");
    const B: Address = address!("0x00000000000000000000000000000000000000bb");
    const C: Address = address!("0x00000000000000000000000000000000000000cc");

    /// Tree with A tombstoned at 0, B(2) at 1 and C(5) at 2.
    fn tree() -> CensusTree {
        let mut tree: CensusTree = CensusTree::new();
        tree.insert(pack_leaf(A, 1).unwrap()).unwrap();
        tree.insert(pack_leaf(B, 2).unwrap()).unwrap();
        tree.insert(pack_leaf(C, 5).unwrap()).unwrap();
        tree.update(0, U256::ZERO).unwrap();
        tree
    }

    async fn matching_chain() -> MockCensusChain {
        let chain = MockCensusChain::new();
        for (index, account, weight) in [(1, B, 2), (2, C, 5)] {
            chain
                .set_account(
                    index,
                    account,
                    AccountDelegation {
                        weight,
                        leaf: pack_leaf(account, weight).unwrap(),
                    },
                )
                .await;
        }
        chain
    }

    #[tokio::test]
    async fn test_consistent_contract() {
        let report = cross_check(&tree(), &matching_chain().await).await.unwrap();
        assert_eq!(report.checked, 3);
        assert!(report.is_consistent());
    }

    #[tokio::test]
    async fn test_account_in_tombstoned_slot() {
        let chain = matching_chain().await;
        chain
            .set_account(
                0,
                A,
                AccountDelegation {
                    weight: 1,
                    leaf: pack_leaf(A, 1).unwrap(),
                },
            )
            .await;

        let report = cross_check(&tree(), &chain).await.unwrap();
        assert_eq!(
            report.discrepancies,
            vec![Discrepancy::Account {
                index: 0,
                expected: Address::ZERO,
                on_chain: A,
            }]
        );
    }

    #[tokio::test]
    async fn test_stale_leaf_reported() {
        let chain = matching_chain().await;
        let stale = pack_leaf(C, 4).unwrap();
        chain
            .set_account(2, C, AccountDelegation { weight: 4, leaf: stale })
            .await;

        let report = cross_check(&tree(), &chain).await.unwrap();
        assert_eq!(report.discrepancies.len(), 1);
        match &report.discrepancies[0] {
            Discrepancy::Leaf {
                index, on_chain, ..
            } => {
                assert_eq!(*index, 2);
                assert_eq!(*on_chain, stale);
            }
            other => panic!("unexpected discrepancy: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_slot_on_chain() {
        let chain = matching_chain().await;
        chain.clear_slot(1).await;

        let report = cross_check(&tree(), &chain).await.unwrap();
        // Slot 1 reads as the zero address and B has no delegation left.
        assert_eq!(report.discrepancies.len(), 2);
        assert!(report.discrepancies[0].to_string().starts_with("slot 1"));
    }
}
