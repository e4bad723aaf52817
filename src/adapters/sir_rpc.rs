//! JSON-RPC backed [`PositionSource`] for the SIR Vault and SIR token contracts.

use alloy::primitives::aliases::U48;
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::sol;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::{Result, ScanError};
use crate::scanner::{PositionSource, StakeBalance, VaultParams};

/// Vault ids are `uint48` on-chain.
pub const MAX_VAULT_ID: u64 = (1 << 48) - 1;

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IVault {
        struct VaultParameters {
            address debtToken;
            address collateralToken;
            int8 leverageTier;
        }

        function paramsById(uint48 vaultId) external view returns (VaultParameters memory);

        function numberOfVaults() external view returns (uint48);

        /// TEA balance (ERC-1155)
        function balanceOf(address account, uint256 vaultId) external view returns (uint256);

        function unclaimedRewards(uint256 vaultId, address lper) external view returns (uint80);
    }
}

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface ISir {
        function contributorUnclaimedSIR(address contributor) external view returns (uint80);

        function stakeOf(address staker) external view returns (uint80 unlockedStake, uint80 lockedStake);

        function unclaimedDividends(address staker) external view returns (uint96);
    }
}

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
    }
}

fn to_uint48(vault_id: u64) -> Result<U48> {
    if vault_id > MAX_VAULT_ID {
        return Err(ScanError::InvalidArgument(format!(
            "vault id {} does not fit in uint48",
            vault_id
        )));
    }
    Ok(U48::from(vault_id))
}

/// Reads positions through an HTTP provider
#[derive(Clone)]
pub struct RpcPositionSource {
    provider: DynProvider,
    vault: Address,
    sir: Address,
}

impl RpcPositionSource {
    pub fn new(provider: DynProvider, vault: Address, sir: Address) -> Self {
        Self {
            provider,
            vault,
            sir,
        }
    }

    /// Connect to `rpc_url` over HTTP.
    pub fn connect_http(rpc_url: &str, vault: Address, sir: Address) -> Result<Self> {
        let url = rpc_url
            .trim()
            .parse()
            .map_err(|e| ScanError::InvalidUrl(format!("'{}': {}", rpc_url, e)))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();

        info!("RPC source connected to {} (vault {}, sir {})", rpc_url, vault, sir);
        Ok(Self::new(provider, vault, sir))
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::connect_http(
            &config.rpc.url,
            config.contracts.vault_address()?,
            config.contracts.sir_address()?,
        )
    }

    pub fn vault_address(&self) -> Address {
        self.vault
    }

    pub fn sir_address(&self) -> Address {
        self.sir
    }

    /// Chain id reported by the node
    pub async fn chain_id(&self) -> Result<u64> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| ScanError::Rpc(format!("eth_chainId failed: {}", e)))
    }
}

#[async_trait]
impl PositionSource for RpcPositionSource {
    async fn number_of_vaults(&self) -> Result<u64> {
        let vault = IVault::new(self.vault, self.provider.clone());
        let count = vault.numberOfVaults().call().await?;
        debug!("numberOfVaults = {}", count);
        Ok(count.to::<u64>())
    }

    async fn vault_params(&self, vault_id: u64) -> Result<VaultParams> {
        let vault = IVault::new(self.vault, self.provider.clone());
        let params = vault.paramsById(to_uint48(vault_id)?).call().await?;
        Ok(VaultParams {
            debt_token: params.debtToken,
            collateral_token: params.collateralToken,
            leverage_tier: params.leverageTier,
        })
    }

    async fn tea_balance(&self, owner: Address, vault_id: u64) -> Result<U256> {
        let vault = IVault::new(self.vault, self.provider.clone());
        Ok(vault
            .balanceOf(owner, U256::from(vault_id))
            .call()
            .await?)
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        let erc20 = IERC20::new(token, self.provider.clone());
        Ok(erc20.balanceOf(owner).call().await?)
    }

    async fn unclaimed_lp_rewards(&self, vault_id: u64, owner: Address) -> Result<U256> {
        let vault = IVault::new(self.vault, self.provider.clone());
        let rewards = vault
            .unclaimedRewards(U256::from(vault_id), owner)
            .call()
            .await?;
        Ok(U256::from(rewards))
    }

    async fn contributor_rewards(&self, owner: Address) -> Result<U256> {
        let sir = ISir::new(self.sir, self.provider.clone());
        let rewards = sir.contributorUnclaimedSIR(owner).call().await?;
        Ok(U256::from(rewards))
    }

    async fn stake_of(&self, owner: Address) -> Result<StakeBalance> {
        let sir = ISir::new(self.sir, self.provider.clone());
        let stake = sir.stakeOf(owner).call().await?;
        Ok(StakeBalance {
            unlocked: U256::from(stake.unlockedStake),
            locked: U256::from(stake.lockedStake),
        })
    }

    async fn unclaimed_dividends(&self, owner: Address) -> Result<U256> {
        let sir = ISir::new(self.sir, self.provider.clone());
        let dividends = sir.unclaimedDividends(owner).call().await?;
        Ok(U256::from(dividends))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::VAULT_ADDRESS;

    #[test]
    fn test_to_uint48_bounds() {
        assert_eq!(to_uint48(0).unwrap(), U48::ZERO);
        assert_eq!(to_uint48(MAX_VAULT_ID).unwrap(), U48::MAX);
        assert!(matches!(
            to_uint48(MAX_VAULT_ID + 1),
            Err(ScanError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_connect_http_rejects_bad_url() {
        let err = RpcPositionSource::connect_http("not a url", VAULT_ADDRESS, Address::ZERO)
            .err()
            .unwrap();
        assert!(matches!(err, ScanError::InvalidUrl(_)));
        assert!(err.to_string().starts_with("Invalid RPC URL: 'not a url'"));
    }

    #[test]
    fn test_from_default_config() {
        let source = RpcPositionSource::from_config(&AppConfig::default_config()).unwrap();
        assert_eq!(source.vault_address(), VAULT_ADDRESS);
        assert_eq!(
            source.sir_address().to_checksum(None),
            crate::config::DEFAULT_SIR_ADDRESS
        );
    }
}
