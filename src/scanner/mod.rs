//! Position scan over every registered vault.
//!
//! Vault ids run from 1 to `numberOfVaults()`. Each vault costs four
//! independent reads (params, TEA, APE, LP rewards) and the APE token address
//! comes from [`ApeDeriver`] instead of a registry lookup.

pub mod report;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, info};

use crate::derive::ApeDeriver;
use crate::error::Result;

pub use report::{
    ApePosition, PositionReport, SirPositions, TeaPosition, VaultParams, VaultScan,
};

/// Unlocked/locked split returned by the SIR staking contract
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StakeBalance {
    pub unlocked: U256,
    pub locked: U256,
}

/// Read-only view of the vault and SIR contracts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn number_of_vaults(&self) -> Result<u64>;

    async fn vault_params(&self, vault_id: u64) -> Result<VaultParams>;

    /// ERC-1155 TEA balance held on the vault contract
    async fn tea_balance(&self, owner: Address, vault_id: u64) -> Result<U256>;

    /// ERC-20 `balanceOf` on an arbitrary token
    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256>;

    async fn unclaimed_lp_rewards(&self, vault_id: u64, owner: Address) -> Result<U256>;

    async fn contributor_rewards(&self, owner: Address) -> Result<U256>;

    async fn stake_of(&self, owner: Address) -> Result<StakeBalance>;

    async fn unclaimed_dividends(&self, owner: Address) -> Result<U256>;
}

pub struct PositionScanner {
    source: Arc<dyn PositionSource>,
    deriver: ApeDeriver,
    concurrency: usize,
}

impl PositionScanner {
    pub fn new(source: Arc<dyn PositionSource>, deriver: ApeDeriver) -> Self {
        Self {
            source,
            deriver,
            concurrency: 1,
        }
    }

    /// Number of vaults queried at once. Results stay ordered by vault id.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn deriver(&self) -> &ApeDeriver {
        &self.deriver
    }

    pub async fn vault_count(&self) -> Result<u64> {
        self.source.number_of_vaults().await
    }

    /// Scan every vault plus the SIR contract for `owner`'s positions.
    ///
    /// The first failing query aborts the scan.
    pub async fn scan(&self, owner: Address) -> Result<PositionReport> {
        let vault_count = self.source.number_of_vaults().await?;
        info!(
            "Scanning {} vaults for {} (concurrency: {})",
            vault_count, owner, self.concurrency
        );

        let vaults: Vec<VaultScan> = stream::iter(1..=vault_count)
            .map(|vault_id| self.scan_vault(owner, vault_id))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let mut report = PositionReport::new(owner, vault_count);
        for vault in vaults {
            report.record_vault(vault);
        }

        report.sir.contributor = self.source.contributor_rewards(owner).await?;
        report.sir.staked = self.source.stake_of(owner).await?.locked;
        report.sir.dividends = self.source.unclaimed_dividends(owner).await?;

        info!(
            "Scan complete: {} TEA, {} APE positions",
            report.tea.len(),
            report.ape.len()
        );
        Ok(report)
    }

    /// Read one vault; errors are tagged with the vault id.
    pub async fn scan_vault(&self, owner: Address, vault_id: u64) -> Result<VaultScan> {
        self.read_vault(owner, vault_id)
            .await
            .map_err(|e| e.for_vault(vault_id))
    }

    async fn read_vault(&self, owner: Address, vault_id: u64) -> Result<VaultScan> {
        let params = self.source.vault_params(vault_id).await?;

        let tea_balance = self.source.tea_balance(owner, vault_id).await?;
        debug!("TEA balance for vault {} is {}", vault_id, tea_balance);

        let ape_token = self.deriver.derive(vault_id);
        debug!("APE address for vault {} is {}", vault_id, ape_token);
        let ape_balance = self.source.token_balance(ape_token, owner).await?;
        debug!("APE balance for vault {} is {}", vault_id, ape_balance);

        let lp_rewards = self.source.unclaimed_lp_rewards(vault_id, owner).await?;
        debug!("LP rewards for vault {} is {}", vault_id, lp_rewards);

        Ok(VaultScan {
            vault_id,
            params,
            ape_token,
            tea_balance,
            ape_balance,
            lp_rewards,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use alloy::primitives::address;
    use mockall::predicate::eq;

    const OWNER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
    const USDC: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");

    fn params() -> VaultParams {
        VaultParams {
            debt_token: USDC,
            collateral_token: WETH,
            leverage_tier: -1,
        }
    }

    fn sir_expectations(source: &mut MockPositionSource) {
        source
            .expect_contributor_rewards()
            .with(eq(OWNER))
            .returning(|_| Ok(U256::from(3)));
        source.expect_stake_of().returning(|_| {
            Ok(StakeBalance {
                unlocked: U256::from(100),
                locked: U256::from(40),
            })
        });
        source
            .expect_unclaimed_dividends()
            .returning(|_| Ok(U256::from(9)));
    }

    #[tokio::test]
    async fn test_scan_collects_positions_across_vaults() {
        let deriver = ApeDeriver::default();
        let ape_two = deriver.derive(2);

        let mut source = MockPositionSource::new();
        source.expect_number_of_vaults().returning(|| Ok(3));
        source.expect_vault_params().times(3).returning(|_| Ok(params()));
        source
            .expect_tea_balance()
            .returning(|_, id| Ok(if id == 1 { U256::from(500) } else { U256::ZERO }));
        source
            .expect_token_balance()
            .returning(move |token, _| {
                Ok(if token == ape_two {
                    U256::from(77)
                } else {
                    U256::ZERO
                })
            });
        source
            .expect_unclaimed_lp_rewards()
            .returning(|id, _| Ok(U256::from(id * 10)));
        sir_expectations(&mut source);

        let scanner = PositionScanner::new(Arc::new(source), deriver).with_concurrency(2);
        let report = scanner.scan(OWNER).await.unwrap();

        assert_eq!(report.vault_count, 3);
        assert_eq!(report.tea.len(), 1);
        assert_eq!(report.tea[0].vault_id, 1);
        assert_eq!(report.tea[0].collateral, WETH);
        assert_eq!(report.ape.len(), 1);
        assert_eq!(report.ape[0].vault_id, 2);
        assert_eq!(report.ape[0].token, ape_two);
        assert_eq!(report.sir.lp_rewards, U256::from(60));
        assert_eq!(report.sir.staked, U256::from(40));
        assert_eq!(report.sir.dividends, U256::from(9));
        assert_eq!(report.sir.contributor, U256::from(3));
    }

    #[tokio::test]
    async fn test_scan_with_no_vaults_still_reads_sir() {
        let mut source = MockPositionSource::new();
        source.expect_number_of_vaults().returning(|| Ok(0));
        source.expect_vault_params().never();
        sir_expectations(&mut source);

        let scanner = PositionScanner::new(Arc::new(source), ApeDeriver::default());
        let report = scanner.scan(OWNER).await.unwrap();

        assert!(report.tea.is_empty());
        assert!(report.ape.is_empty());
        assert_eq!(report.sir.staked, U256::from(40));
    }

    #[tokio::test]
    async fn test_scan_keeps_vault_order_with_concurrency() {
        let mut source = MockPositionSource::new();
        source.expect_number_of_vaults().returning(|| Ok(8));
        source.expect_vault_params().returning(|_| Ok(params()));
        source
            .expect_tea_balance()
            .returning(|_, id| Ok(U256::from(id)));
        source
            .expect_token_balance()
            .returning(|_, _| Ok(U256::from(1)));
        source
            .expect_unclaimed_lp_rewards()
            .returning(|_, _| Ok(U256::ZERO));
        sir_expectations(&mut source);

        let scanner = PositionScanner::new(Arc::new(source), ApeDeriver::default())
            .with_concurrency(4);
        let report = scanner.scan(OWNER).await.unwrap();

        let ids: Vec<u64> = report.tea.iter().map(|p| p.vault_id).collect();
        assert_eq!(ids, (1..=8).collect::<Vec<_>>());
        let ape_ids: Vec<u64> = report.ape.iter().map(|p| p.vault_id).collect();
        assert_eq!(ape_ids, ids);
    }

    #[tokio::test]
    async fn test_scan_aborts_on_vault_failure() {
        let mut source = MockPositionSource::new();
        source.expect_number_of_vaults().returning(|| Ok(2));
        source.expect_vault_params().returning(|id| {
            if id == 2 {
                Err(ScanError::Rpc("execution reverted".to_string()))
            } else {
                Ok(params())
            }
        });
        source
            .expect_tea_balance()
            .returning(|_, _| Ok(U256::ZERO));
        source
            .expect_token_balance()
            .returning(|_, _| Ok(U256::ZERO));
        source
            .expect_unclaimed_lp_rewards()
            .returning(|_, _| Ok(U256::ZERO));
        source.expect_contributor_rewards().never();

        let scanner = PositionScanner::new(Arc::new(source), ApeDeriver::default());
        let err = scanner.scan(OWNER).await.unwrap_err();

        match err {
            ScanError::VaultQuery { vault_id, reason } => {
                assert_eq!(vault_id, 2);
                assert!(reason.contains("execution reverted"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let scanner = PositionScanner::new(Arc::new(MockPositionSource::new()), ApeDeriver::default())
            .with_concurrency(0);
        assert_eq!(scanner.concurrency, 1);
    }
}
