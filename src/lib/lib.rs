//! Off-chain reconstruction of the weighted census tree.
//!
//! Replays the contract's `WeightChanged` history into a LeanIMT, checks the
//! resulting root against the one stored on-chain, and serves membership
//! proofs from the rebuilt tree.

pub mod adapters;
pub mod crosscheck;
pub mod crypto;
pub mod domain;
pub mod ports;
pub mod reconstruct;

pub use domain::leaf::{pack_leaf, unpack_leaf};
pub use domain::merkle::{CensusProof, CensusTree};
pub use reconstruct::{validate_root, ReconstructConfig, Reconstruction, TreeReconstructor};
