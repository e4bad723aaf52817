//! Scan results, as JSON or as plain text with 18-decimal formatting.

use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, U256};
use serde::{Serialize, Serializer};
use std::fmt;

fn as_display<T: fmt::Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Parameters registered for a vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VaultParams {
    #[serde(serialize_with = "as_display")]
    pub debt_token: Address,
    #[serde(serialize_with = "as_display")]
    pub collateral_token: Address,
    pub leverage_tier: i8,
}

/// Everything read for one vault during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultScan {
    pub vault_id: u64,
    pub params: VaultParams,
    pub ape_token: Address,
    pub tea_balance: U256,
    pub ape_balance: U256,
    pub lp_rewards: U256,
}

/// Non-zero TEA (ERC-1155 on the vault) holding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeaPosition {
    pub vault_id: u64,
    #[serde(serialize_with = "as_display")]
    pub collateral: Address,
    #[serde(serialize_with = "as_display")]
    pub balance: U256,
}

/// Non-zero APE (derived ERC-20) holding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApePosition {
    pub vault_id: u64,
    #[serde(serialize_with = "as_display")]
    pub token: Address,
    #[serde(serialize_with = "as_display")]
    pub collateral: Address,
    #[serde(serialize_with = "as_display")]
    pub balance: U256,
}

/// SIR-side balances; `lp_rewards` is summed over all vaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SirPositions {
    #[serde(serialize_with = "as_display")]
    pub staked: U256,
    #[serde(serialize_with = "as_display")]
    pub dividends: U256,
    #[serde(serialize_with = "as_display")]
    pub lp_rewards: U256,
    #[serde(serialize_with = "as_display")]
    pub contributor: U256,
}

impl SirPositions {
    pub fn is_empty(&self) -> bool {
        self.staked.is_zero()
            && self.dividends.is_zero()
            && self.lp_rewards.is_zero()
            && self.contributor.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionReport {
    #[serde(serialize_with = "as_display")]
    pub owner: Address,
    pub vault_count: u64,
    pub tea: Vec<TeaPosition>,
    pub ape: Vec<ApePosition>,
    pub sir: SirPositions,
}

impl PositionReport {
    pub fn new(owner: Address, vault_count: u64) -> Self {
        Self {
            owner,
            vault_count,
            tea: Vec::new(),
            ape: Vec::new(),
            sir: SirPositions::default(),
        }
    }

    /// Fold one vault into the report, keeping only non-zero token balances.
    pub fn record_vault(&mut self, vault: VaultScan) {
        if !vault.tea_balance.is_zero() {
            self.tea.push(TeaPosition {
                vault_id: vault.vault_id,
                collateral: vault.params.collateral_token,
                balance: vault.tea_balance,
            });
        }
        if !vault.ape_balance.is_zero() {
            self.ape.push(ApePosition {
                vault_id: vault.vault_id,
                token: vault.ape_token,
                collateral: vault.params.collateral_token,
                balance: vault.ape_balance,
            });
        }
        self.sir.lp_rewards = self.sir.lp_rewards.saturating_add(vault.lp_rewards);
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for PositionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Positions for {}", self.owner)?;
        writeln!(f, "Vaults scanned: {}", self.vault_count)?;

        if !self.tea.is_empty() {
            writeln!(f)?;
            writeln!(f, "TEA Positions")?;
            for p in &self.tea {
                writeln!(
                    f,
                    "  Vault {}: {} ({})",
                    p.vault_id,
                    format_ether(p.balance),
                    p.collateral
                )?;
            }
        }

        if !self.ape.is_empty() {
            writeln!(f)?;
            writeln!(f, "APE Positions")?;
            for p in &self.ape {
                writeln!(
                    f,
                    "  Vault {}: {} ({}) token {}",
                    p.vault_id,
                    format_ether(p.balance),
                    p.collateral,
                    p.token
                )?;
            }
        }

        writeln!(f)?;
        writeln!(f, "SIR Positions")?;
        writeln!(f, "  Staked: {}", format_ether(self.sir.staked))?;
        writeln!(f, "  Dividends: {} ETH", format_ether(self.sir.dividends))?;
        writeln!(f, "  LP Rewards: {}", format_ether(self.sir.lp_rewards))?;
        write!(
            f,
            "  Contributor Rewards: {}",
            format_ether(self.sir.contributor)
        )
    }
}
