use alloy::primitives::{Address, B256};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::derive::{ApeDeriver, APE_PROXY_BYTECODE_HASH, VAULT_ADDRESS};
use crate::error::{Result, ScanError};

pub const DEFAULT_RPC_URL: &str = "https://ethereum-rpc.publicnode.com";
pub const DEFAULT_SIR_ADDRESS: &str = "0x1278B112943Abc025a0DF081Ee42369414c3A834";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub rpc: RpcConfig,
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    /// JSON-RPC HTTP endpoint
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractsConfig {
    /// Vault contract (TEA balances, vault registry, APE deployer)
    pub vault: String,
    /// SIR token contract (staking, dividends, contributor rewards)
    pub sir: String,
    /// Init code hash of the per-vault APE proxy
    pub ape_proxy_bytecode_hash: String,
}

impl ContractsConfig {
    pub fn vault_address(&self) -> Result<Address> {
        parse_address("contracts.vault", &self.vault)
    }

    pub fn sir_address(&self) -> Result<Address> {
        parse_address("contracts.sir", &self.sir)
    }

    pub fn proxy_bytecode_hash(&self) -> Result<B256> {
        self.ape_proxy_bytecode_hash.trim().parse::<B256>().map_err(|e| {
            ScanError::AddressParsing(format!(
                "contracts.ape_proxy_bytecode_hash: invalid 32-byte hash: {}",
                e
            ))
        })
    }

    /// Deriver for the configured vault and proxy bytecode
    pub fn ape_deriver(&self) -> Result<ApeDeriver> {
        ApeDeriver::try_new(self.vault_address()?, self.proxy_bytecode_hash()?)
    }
}

fn parse_address(field: &str, value: &str) -> Result<Address> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|e| ScanError::AddressParsing(format!("{}: invalid address: {}", field, e)))
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Vaults queried in parallel (1 = sequential)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    4
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for daily-rotated log files (console only when unset)
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> std::result::Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("rpc.url", DEFAULT_RPC_URL)?
            .set_default("contracts.vault", VAULT_ADDRESS.to_checksum(None))?
            .set_default("contracts.sir", DEFAULT_SIR_ADDRESS)?
            .set_default(
                "contracts.ape_proxy_bytecode_hash",
                APE_PROXY_BYTECODE_HASH.to_string(),
            )?
            .set_default("scan.concurrency", default_concurrency() as i64)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("SIR_SCAN_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (SIR_SCAN_RPC__URL, etc.)
            .add_source(
                Environment::with_prefix("SIR_SCAN")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Create a default configuration for CLI usage
    pub fn default_config() -> Self {
        Self {
            rpc: RpcConfig {
                url: DEFAULT_RPC_URL.to_string(),
            },
            contracts: ContractsConfig {
                vault: VAULT_ADDRESS.to_checksum(None),
                sir: DEFAULT_SIR_ADDRESS.to_string(),
                ape_proxy_bytecode_hash: APE_PROXY_BYTECODE_HASH.to_string(),
            },
            scan: ScanConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.rpc.url.trim().is_empty() {
            errors.push("rpc.url must not be empty".to_string());
        }

        match self.contracts.vault_address() {
            Ok(vault) if vault.is_zero() => {
                errors.push("contracts.vault must not be the zero address".to_string());
            }
            Ok(_) => {}
            Err(e) => errors.push(e.to_string()),
        }
        if let Err(e) = self.contracts.sir_address() {
            errors.push(e.to_string());
        }
        if let Err(e) = self.contracts.proxy_bytecode_hash() {
            errors.push(e.to_string());
        }

        if self.scan.concurrency == 0 {
            errors.push("scan.concurrency must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.contracts.vault_address().unwrap(), VAULT_ADDRESS);
        assert_eq!(
            config.contracts.proxy_bytecode_hash().unwrap(),
            APE_PROXY_BYTECODE_HASH
        );
        assert_eq!(config.contracts.ape_deriver().unwrap(), ApeDeriver::default());
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = AppConfig::default_config();
        config.rpc.url = "  ".to_string();
        config.contracts.sir = "0x1234".to_string();
        config.contracts.ape_proxy_bytecode_hash = "0xdeadbeef".to_string();
        config.scan.concurrency = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("contracts.sir")));
        assert!(errors.iter().any(|e| e.contains("scan.concurrency")));
    }

    #[test]
    fn test_zero_vault_is_rejected() {
        let mut config = AppConfig::default_config();
        config.contracts.vault = Address::ZERO.to_string();

        let errors = config.validate().unwrap_err();
        assert_eq!(errors, vec!["contracts.vault must not be the zero address".to_string()]);
        assert!(matches!(
            config.contracts.ape_deriver(),
            Err(ScanError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_sir_address_tolerates_whitespace() {
        let mut config = AppConfig::default_config();
        config.contracts.sir = format!("{} ", DEFAULT_SIR_ADDRESS);
        assert!(config.contracts.sir_address().is_ok());
    }

    #[test]
    fn test_load_from_missing_dir_uses_defaults() {
        let config = AppConfig::load_from("does-not-exist").unwrap();
        assert_eq!(config.scan.concurrency, 4);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.contracts.vault_address().unwrap(), VAULT_ADDRESS);
    }
}
