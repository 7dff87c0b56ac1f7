//! Lean incremental Merkle tree (LeanIMT) holding the census.
//!
//! Wraps zk-kit's `HashedLeanIMT`, the same structure as the on-chain LeanIMT
//! library: depth grows only as needed, and a node with no right-hand partner
//! is carried to the next level unhashed. Removed accounts keep their slot with
//! the leaf value `0`, so indices are never reassigned.

use std::collections::HashMap;

use alloy::primitives::{Address, U256};
use lean_imt::hashed_tree::{HashedLeanIMT, LeanIMTHasher};
use lean_imt::lean_imt::MerkleProof;

use super::leaf::unpack_leaf;
use crate::crypto::poseidon::poseidon2;

/// Two-to-one compression used for internal nodes, over 32-byte big-endian words.
pub trait NodeHasher: LeanIMTHasher<32> + Default {}

impl<T: LeanIMTHasher<32> + Default> NodeHasher for T {}

/// Poseidon hasher for LeanIMT.
///
/// BN254 with circom parameters, matching the contract's `PoseidonT3`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PoseidonHash;

impl LeanIMTHasher<32> for PoseidonHash {
    fn hash(input: &[u8]) -> [u8; 32] {
        let left = U256::from_be_slice(&input[..32]);
        let right = U256::from_be_slice(&input[32..]);
        poseidon2(left, right).to_be_bytes::<32>()
    }
}

fn to_word(value: U256) -> [u8; 32] {
    value.to_be_bytes::<32>()
}

fn from_word(word: &[u8; 32]) -> U256 {
    U256::from_be_bytes(*word)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("leaf 0 marks an empty slot and cannot be inserted")]
    ZeroLeaf,

    #[error("leaf {leaf:#x} already present at index {index}")]
    LeafAlreadyExists { leaf: U256, index: usize },

    #[error("index {index} out of range for tree of size {size}")]
    IndexOutOfRange { index: usize, size: usize },
}

/// Membership proof for one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CensusProof {
    /// Root the proof was generated against.
    pub root: U256,
    /// Value at the proven slot.
    pub leaf: U256,
    /// Direction bits for the levels that had a sibling, lowest level in bit 0.
    /// A set bit means the proven node is the right child at that level.
    pub index: usize,
    /// Sibling values from the leaf level upward. Levels where the node was
    /// carried up without a partner contribute nothing.
    pub siblings: Vec<U256>,
}

impl From<MerkleProof<32>> for CensusProof {
    fn from(proof: MerkleProof<32>) -> Self {
        Self {
            root: from_word(&proof.root),
            leaf: from_word(&proof.leaf),
            index: proof.index,
            siblings: proof.siblings.iter().map(from_word).collect(),
        }
    }
}

impl CensusProof {
    /// Direction bits expanded to one byte per sibling (0 = left, 1 = right).
    pub fn path_indices(&self) -> Vec<u8> {
        decode_path(self.index, self.siblings.len())
    }

    fn to_merkle_proof(&self) -> MerkleProof<32> {
        MerkleProof {
            root: to_word(self.root),
            leaf: to_word(self.leaf),
            index: self.index,
            siblings: self.siblings.iter().copied().map(to_word).collect(),
        }
    }

    /// Check the proof against its own root using hasher `H`.
    pub fn verify_with<H: NodeHasher>(&self) -> bool {
        HashedLeanIMT::<32, H>::verify_proof(&self.to_merkle_proof())
    }

    /// Check the proof against its own root with Poseidon.
    pub fn verify(&self) -> bool {
        self.verify_with::<PoseidonHash>()
    }
}

/// Extract direction bits from a packed index (LSB to MSB).
fn decode_path(index: usize, path_len: usize) -> Vec<u8> {
    (0..path_len).map(|i| ((index >> i) & 1) as u8).collect()
}

/// Census tree: a `HashedLeanIMT` plus the guards the census needs.
#[derive(Debug, Clone)]
pub struct CensusTree<H: NodeHasher = PoseidonHash> {
    inner: HashedLeanIMT<32, H>,
    /// Non-zero leaf value -> slot. Kept in step with every insert and update.
    leaf_indices: HashMap<U256, usize>,
}

impl<H: NodeHasher> CensusTree<H> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            inner: HashedLeanIMT::new_from_tree(Default::default(), H::default()),
            leaf_indices: HashMap::new(),
        }
    }

    /// Number of slots, tombstones included.
    pub fn size(&self) -> usize {
        self.inner.size()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Levels above the leaves; 0 for trees of size 0 or 1.
    pub fn depth(&self) -> usize {
        self.inner.depth()
    }

    /// Current root, `None` when the tree has no slots.
    pub fn root(&self) -> Option<U256> {
        self.inner.root().map(|root| from_word(&root))
    }

    /// Root with the empty tree reported as `0`.
    pub fn root_or_zero(&self) -> U256 {
        self.root().unwrap_or(U256::ZERO)
    }

    /// All slot values in index order.
    pub fn leaves(&self) -> Vec<U256> {
        self.inner.leaves().iter().map(from_word).collect()
    }

    pub fn leaf(&self, index: usize) -> Option<U256> {
        self.inner.get_leaf(index).ok().map(|leaf| from_word(&leaf))
    }

    /// Append a leaf and return its index.
    pub fn insert(&mut self, leaf: U256) -> Result<usize, TreeError> {
        if leaf.is_zero() {
            return Err(TreeError::ZeroLeaf);
        }
        if let Some(&index) = self.leaf_indices.get(&leaf) {
            return Err(TreeError::LeafAlreadyExists { leaf, index });
        }

        let index = self.size();
        self.inner.insert(&to_word(leaf));
        self.leaf_indices.insert(leaf, index);
        Ok(index)
    }

    /// Overwrite the slot at `index` and return the previous value.
    ///
    /// Writing `0` tombstones the slot; the size does not change.
    pub fn update(&mut self, index: usize, leaf: U256) -> Result<U256, TreeError> {
        let size = self.size();
        let previous = self
            .leaf(index)
            .ok_or(TreeError::IndexOutOfRange { index, size })?;
        if !leaf.is_zero() {
            if let Some(&existing) = self.leaf_indices.get(&leaf) {
                if existing != index {
                    return Err(TreeError::LeafAlreadyExists {
                        leaf,
                        index: existing,
                    });
                }
            }
        }

        self.inner
            .update(index, &to_word(leaf))
            .map_err(|_| TreeError::IndexOutOfRange { index, size })?;

        if !previous.is_zero() && self.leaf_indices.get(&previous) == Some(&index) {
            self.leaf_indices.remove(&previous);
        }
        if !leaf.is_zero() {
            self.leaf_indices.insert(leaf, index);
        }
        Ok(previous)
    }

    /// Slot currently holding `leaf`. For `0` this is the first tombstone.
    pub fn index_of(&self, leaf: &U256) -> Option<usize> {
        if leaf.is_zero() {
            return self.inner.index_of(&to_word(U256::ZERO));
        }
        self.leaf_indices.get(leaf).copied()
    }

    pub fn contains(&self, leaf: &U256) -> bool {
        !leaf.is_zero() && self.leaf_indices.contains_key(leaf)
    }

    /// Build the sibling path for the slot at `index`.
    pub fn generate_proof(&self, index: usize) -> Result<CensusProof, TreeError> {
        self.inner
            .generate_proof(index)
            .map(CensusProof::from)
            .map_err(|_| TreeError::IndexOutOfRange {
                index,
                size: self.size(),
            })
    }

    /// Live accounts as `(index, account, weight)`, skipping tombstones.
    pub fn entries(&self) -> impl Iterator<Item = (usize, Address, u128)> + '_ {
        self.inner
            .leaves()
            .iter()
            .enumerate()
            .map(|(index, leaf)| (index, from_word(leaf)))
            .filter(|(_, leaf)| !leaf.is_zero())
            .map(|(index, leaf)| {
                let (account, weight) = unpack_leaf(leaf);
                (index, account, weight)
            })
    }

    /// Slots holding a live account.
    pub fn active_count(&self) -> usize {
        self.leaf_indices.len()
    }

    /// Tombstoned slots.
    pub fn empty_count(&self) -> usize {
        self.size() - self.active_count()
    }
}

impl<H: NodeHasher> Default for CensusTree<H> {
    fn default() -> Self {
        Self::new()
    }
}
