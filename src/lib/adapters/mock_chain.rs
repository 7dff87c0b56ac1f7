use alloy::primitives::{Address, U256};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::ports::chain::{CensusChainPort, ChainError};
use crate::ports::AccountDelegation;

/// In-memory stand-in for the census contract.
///
/// Unknown slots read as the zero address and unknown accounts as an empty
/// delegation, matching the contract's default storage.
pub struct MockCensusChain {
    root: Mutex<U256>,
    accounts: Mutex<HashMap<u64, Address>>,
    delegations: Mutex<HashMap<Address, AccountDelegation>>,
    root_blocks: Mutex<HashMap<U256, u64>>,
}

impl MockCensusChain {
    pub fn new() -> Self {
        Self {
            root: Mutex::new(U256::ZERO),
            accounts: Mutex::new(HashMap::new()),
            delegations: Mutex::new(HashMap::new()),
            root_blocks: Mutex::new(HashMap::new()),
        }
    }

    /// Set the current root and record the block it was published at.
    pub async fn set_root(&self, root: U256, block_number: u64) {
        *self.root.lock().await = root;
        self.root_blocks.lock().await.insert(root, block_number);
    }

    /// Place `account` at tree slot `index` with the given delegation.
    pub async fn set_account(&self, index: u64, account: Address, delegation: AccountDelegation) {
        self.accounts.lock().await.insert(index, account);
        self.delegations.lock().await.insert(account, delegation);
    }

    /// Empty slot `index`, as the contract does on removal.
    pub async fn clear_slot(&self, index: u64) {
        if let Some(account) = self.accounts.lock().await.remove(&index) {
            self.delegations.lock().await.remove(&account);
        }
    }
}

impl Default for MockCensusChain {
    fn default() -> Self {
        Self::new()
    }
}

impl CensusChainPort for MockCensusChain {
    async fn get_census_root(&self) -> Result<U256, ChainError> {
        Ok(*self.root.lock().await)
    }

    async fn get_account_at(&self, index: u64) -> Result<Address, ChainError> {
        Ok(self
            .accounts
            .lock()
            .await
            .get(&index)
            .copied()
            .unwrap_or(Address::ZERO))
    }

    async fn get_delegations(&self, account: Address) -> Result<AccountDelegation, ChainError> {
        Ok(self
            .delegations
            .lock()
            .await
            .get(&account)
            .copied()
            .unwrap_or(AccountDelegation {
                weight: 0,
                leaf: U256::ZERO,
            }))
    }

    async fn get_root_block_number(&self, root: U256) -> Result<u64, ChainError> {
        Ok(self.root_blocks.lock().await.get(&root).copied().unwrap_or(0))
    }
}
