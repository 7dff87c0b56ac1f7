use alloy::primitives::{Address, U256};
use std::future::Future;

use super::AccountDelegation;

/// Read-only port onto the census contract.
///
/// Implementations:
/// - `EthereumCensus` (alloy)
/// - `MockCensusChain` for testing
pub trait CensusChainPort: Send + Sync {
    /// Current census root as stored by the contract.
    fn get_census_root(&self) -> impl Future<Output = Result<U256, ChainError>> + Send;

    /// Account occupying tree slot `index` (zero address for an empty slot).
    fn get_account_at(
        &self,
        index: u64,
    ) -> impl Future<Output = Result<Address, ChainError>> + Send;

    /// Weight and packed leaf the contract holds for `account`.
    fn get_delegations(
        &self,
        account: Address,
    ) -> impl Future<Output = Result<AccountDelegation, ChainError>> + Send;

    /// Block at which `root` became the census root; 0 if it never was.
    fn get_root_block_number(
        &self,
        root: U256,
    ) -> impl Future<Output = Result<u64, ChainError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("value out of range: {0}")]
    OutOfRange(String),
}
