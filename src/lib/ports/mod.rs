pub mod chain;
pub mod events;

use alloy::primitives::U256;

/// Result of the contract's `getDelegations(account)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountDelegation {
    /// Current weight (`uint88` on-chain).
    pub weight: u128,
    /// Leaf the contract computed for the account; 0 when it has no slot.
    pub leaf: U256,
}
