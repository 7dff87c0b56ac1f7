use alloy::{
    primitives::{Address, U256},
    providers::{DynProvider, ProviderBuilder},
    sol,
};

use crate::ports::{
    chain::{CensusChainPort, ChainError},
    AccountDelegation,
};

sol! {
    #[sol(rpc)]
    interface ICensusDao {
        function getCensusRoot() external view returns (uint256);
        function getAccountAt(uint256 index) external view returns (address);
        function getDelegations(address account) external view returns (uint88 weight, uint256 leaf);
        function getRootBlockNumber(uint256 root) external view returns (uint256);
    }
}

/// Read-only RPC adapter for the census contract. No wallet is attached.
#[derive(Clone)]
pub struct EthereumCensus {
    provider: DynProvider,
    contract: Address,
}

impl EthereumCensus {
    pub fn new(rpc_url: &str, contract: Address) -> Result<Self, ChainError> {
        let provider = DynProvider::new(
            ProviderBuilder::new().connect_http(
                rpc_url
                    .parse()
                    .map_err(|e| ChainError::Rpc(format!("Invalid RPC URL: {}", e)))?,
            ),
        );

        Ok(Self { provider, contract })
    }

    pub fn contract(&self) -> Address {
        self.contract
    }
}

impl CensusChainPort for EthereumCensus {
    async fn get_census_root(&self) -> Result<U256, ChainError> {
        let dao = ICensusDao::new(self.contract, &self.provider);
        let root = dao
            .getCensusRoot()
            .call()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        Ok(root)
    }

    async fn get_account_at(&self, index: u64) -> Result<Address, ChainError> {
        let dao = ICensusDao::new(self.contract, &self.provider);
        let account = dao
            .getAccountAt(U256::from(index))
            .call()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        Ok(account)
    }

    async fn get_delegations(&self, account: Address) -> Result<AccountDelegation, ChainError> {
        let dao = ICensusDao::new(self.contract, &self.provider);
        let result = dao
            .getDelegations(account)
            .call()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        Ok(AccountDelegation {
            weight: result.weight.to::<u128>(),
            leaf: result.leaf,
        })
    }

    async fn get_root_block_number(&self, root: U256) -> Result<u64, ChainError> {
        let dao = ICensusDao::new(self.contract, &self.provider);
        let block = dao
            .getRootBlockNumber(root)
            .call()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        u64::try_from(block)
            .map_err(|_| ChainError::OutOfRange(format!("block number {block} exceeds u64")))
    }
}
