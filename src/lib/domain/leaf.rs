//! Census leaf encoding.
//!
//! A leaf packs an account address and its voting weight into one field element,
//! exactly as the contract's `computeLeaf` does:
//!
//! ```text
//! leaf = (uint160(account) << 88) | uint88(weight)
//! ```
//!
//! The value `0` never encodes a live account; it marks an empty slot.

use alloy::primitives::{Address, U256};

/// Number of low bits holding the weight.
pub const WEIGHT_BITS: usize = 88;

/// Largest weight representable in a leaf (`2^88 - 1`).
pub const MAX_WEIGHT: u128 = (1u128 << WEIGHT_BITS) - 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LeafError {
    #[error("weight {weight} for {account} does not fit in 88 bits")]
    WeightOverflow { account: Address, weight: u128 },
}

/// Pack `(account, weight)` into a leaf value.
pub fn pack_leaf(account: Address, weight: u128) -> Result<U256, LeafError> {
    if weight > MAX_WEIGHT {
        return Err(LeafError::WeightOverflow { account, weight });
    }
    let identity = U256::from_be_slice(account.as_slice());
    Ok((identity << WEIGHT_BITS) | U256::from(weight))
}

/// Split a leaf back into `(account, weight)`. Inverse of [`pack_leaf`].
pub fn unpack_leaf(leaf: U256) -> (Address, u128) {
    let weight = (leaf & U256::from(MAX_WEIGHT)).to::<u128>();
    let identity = (leaf >> WEIGHT_BITS).to_be_bytes::<32>();
    (Address::from_slice(&identity[12..]), weight)
}

/// True for the reserved empty-slot value.
pub fn is_empty_leaf(leaf: &U256) -> bool {
    leaf.is_zero()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn test_pack_layout() {
        let account = address!("0x0000000000000000000000000000000000000001");
        let leaf = pack_leaf(account, 5).unwrap();
        assert_eq!(leaf, (U256::from(1) << 88) | U256::from(5));
    }

    #[test]
    fn test_unpack_inverts_pack() {
        let cases = [
            (address!("0xdeb8699659be5d41a0e57e179d6cb42e00b9200c"), 3u128),
            (address!("0xffffffffffffffffffffffffffffffffffffffff"), MAX_WEIGHT),
            (address!("0x1234567890123456789012345678901234567890"), 42),
            (Address::ZERO, 1),
        ];
        for (account, weight) in cases {
            let leaf = pack_leaf(account, weight).unwrap();
            assert_eq!(unpack_leaf(leaf), (account, weight));
        }
    }

    #[test]
    fn test_weight_overflow_rejected() {
        let account = address!("0x1234567890123456789012345678901234567890");
        let err = pack_leaf(account, MAX_WEIGHT + 1).unwrap_err();
        assert_eq!(
            err,
            LeafError::WeightOverflow {
                account,
                weight: MAX_WEIGHT + 1
            }
        );
    }

    #[test]
    fn test_weight_does_not_bleed_into_address() {
        let account = address!("0x00000000000000000000000000000000000000aa");
        let leaf = pack_leaf(account, MAX_WEIGHT).unwrap();
        let (unpacked, weight) = unpack_leaf(leaf);
        assert_eq!(unpacked, account);
        assert_eq!(weight, MAX_WEIGHT);
    }

    #[test]
    fn test_only_zero_account_with_zero_weight_is_empty() {
        assert!(is_empty_leaf(&pack_leaf(Address::ZERO, 0).unwrap()));
        let account = address!("0x1234567890123456789012345678901234567890");
        assert!(!is_empty_leaf(&pack_leaf(account, 0).unwrap()));
        assert!(!is_empty_leaf(&pack_leaf(Address::ZERO, 1).unwrap()));
    }

    #[test]
    fn test_max_leaf_stays_in_scalar_field() {
        let leaf = pack_leaf(Address::repeat_byte(0xff), MAX_WEIGHT).unwrap();
        assert!(leaf < crate::crypto::poseidon::SNARK_SCALAR_FIELD);
    }
}
