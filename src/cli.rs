use alloy::primitives::{Address, B256, U256};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::adapters::RpcPositionSource;
use crate::config::AppConfig;
use crate::derive::{self, ApeDeriver};
use crate::error::{Result, ScanError};
use crate::scanner::{PositionScanner, PositionSource};

#[derive(Parser, Debug)]
#[command(name = "sir-scan")]
#[command(version = "0.1.0")]
#[command(about = "Scan SIR vault positions and derive APE token addresses", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory (default.toml, then $SIR_SCAN_ENV)
    #[arg(short, long, default_value = "config", global = true)]
    pub config: String,

    /// Override the JSON-RPC endpoint
    #[arg(long, global = true)]
    pub rpc_url: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Derive the APE token address for a vault (no RPC)
    Derive {
        /// Vault id, decimal or 0x-prefixed hex
        vault_id: String,
        /// Deployer address (defaults to the configured vault)
        #[arg(long)]
        deployer: Option<String>,
        /// Proxy init code hash (defaults to the configured hash)
        #[arg(long)]
        bytecode_hash: Option<String>,
        /// Also print the intermediate proxy address
        #[arg(long)]
        proxy: bool,
    },
    /// Derive APE addresses for an inclusive range of vault ids (no RPC)
    DeriveRange {
        from: u64,
        to: u64,
    },
    /// Print the number of registered vaults
    Vaults,
    /// Scan every vault for an owner's TEA, APE and SIR positions
    Scan {
        /// Owner address
        owner: String,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Vaults queried in parallel
        #[arg(long)]
        concurrency: Option<usize>,
    },
}

pub fn parse_vault_id(value: &str) -> Result<U256> {
    U256::from_str(value.trim())
        .map_err(|e| ScanError::InvalidArgument(format!("invalid vault id '{}': {}", value, e)))
}

pub fn parse_address(value: &str) -> Result<Address> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|e| ScanError::AddressParsing(format!("invalid address '{}': {}", value, e)))
}

fn parse_hash(value: &str) -> Result<B256> {
    value
        .trim()
        .parse::<B256>()
        .map_err(|e| ScanError::InvalidArgument(format!("invalid 32-byte hash '{}': {}", value, e)))
}

/// Load configuration and apply command line overrides
pub fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load_from(&cli.config)
        .map_err(ScanError::from)
        .with_context(|| format!("failed to load configuration from '{}'", cli.config))?;
    if let Some(url) = &cli.rpc_url {
        config.rpc.url = url.clone();
    }
    if let Commands::Scan {
        concurrency: Some(concurrency),
        ..
    } = &cli.command
    {
        config.scan.concurrency = *concurrency;
    }

    config
        .validate()
        .map_err(ScanError::InvalidConfig)
        .with_context(|| format!("configuration in '{}' rejected", cli.config))?;
    Ok(config)
}

pub fn run_derive(
    config: &AppConfig,
    vault_id: &str,
    deployer: Option<&str>,
    bytecode_hash: Option<&str>,
    show_proxy: bool,
) -> Result<()> {
    let vault_id = parse_vault_id(vault_id)?;
    let deployer = match deployer {
        Some(d) => parse_address(d)?,
        None => config.contracts.vault_address()?,
    };
    let hash = match bytecode_hash {
        Some(h) => parse_hash(h)?,
        None => config.contracts.proxy_bytecode_hash()?,
    };

    let ape = derive::derive_from_slices(deployer.as_slice(), vault_id, hash.as_slice())?;
    if show_proxy {
        println!("proxy: {}", derive::proxy_address(deployer, vault_id, hash));
        println!("ape:   {}", ape);
    } else {
        println!("{}", ape);
    }
    Ok(())
}

pub fn run_derive_range(config: &AppConfig, from: u64, to: u64) -> Result<()> {
    if from > to {
        return Err(ScanError::InvalidArgument(format!(
            "empty range: {} > {}",
            from, to
        )));
    }

    let deriver: ApeDeriver = config.contracts.ape_deriver()?;
    // Lazy: each line prints as soon as it is derived
    for (vault_id, ape) in deriver.derive_range(from..=to) {
        println!("{:>6}  {}", vault_id, ape);
    }
    Ok(())
}

pub async fn run_vaults(config: &AppConfig) -> Result<()> {
    let source = RpcPositionSource::from_config(config)?;
    let count = source.number_of_vaults().await?;
    println!("{}", count);
    Ok(())
}

pub async fn run_scan(config: &AppConfig, owner: &str, json: bool) -> Result<()> {
    let owner = parse_address(owner)?;
    let source = RpcPositionSource::from_config(config)?;
    let chain_id = source.chain_id().await?;
    info!("Connected to chain {}", chain_id);

    let scanner = PositionScanner::new(Arc::new(source), config.contracts.ape_deriver()?)
        .with_concurrency(config.scan.concurrency);
    let report = scanner.scan(owner).await?;

    if json {
        println!("{}", report.to_json()?);
    } else {
        println!("{}", report);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scan_command() {
        let cli = Cli::try_parse_from([
            "sir-scan",
            "scan",
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
            "--json",
            "--concurrency",
            "8",
        ])
        .unwrap();

        match cli.command {
            Commands::Scan {
                owner,
                json,
                concurrency,
            } => {
                assert!(owner.starts_with("0xf39F"));
                assert!(json);
                assert_eq!(concurrency, Some(8));
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.config, "config");
    }

    #[test]
    fn test_parse_derive_with_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["sir-scan", "derive", "1", "--proxy", "-c", "conf"]).unwrap();
        assert_eq!(cli.config, "conf");
        assert!(matches!(cli.command, Commands::Derive { proxy: true, .. }));
    }

    #[test]
    fn test_parse_vault_id_accepts_decimal_and_hex() {
        assert_eq!(parse_vault_id("42").unwrap(), U256::from(42));
        assert_eq!(parse_vault_id("0x2a").unwrap(), U256::from(42));
        assert!(matches!(
            parse_vault_id("forty-two"),
            Err(ScanError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_derive_range_rejects_reversed_bounds() {
        let config = AppConfig::default_config();
        assert!(matches!(
            run_derive_range(&config, 5, 1),
            Err(ScanError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_load_config_keeps_cause_under_context() {
        let cli = Cli::try_parse_from([
            "sir-scan",
            "vaults",
            "-c",
            "does-not-exist",
            "--rpc-url",
            " ",
        ])
        .unwrap();

        let err = load_config(&cli).unwrap_err();
        assert!(format!("{err:#}").starts_with("configuration in 'does-not-exist' rejected: "));
        match err.downcast_ref::<ScanError>() {
            Some(ScanError::InvalidConfig(problems)) => {
                assert_eq!(problems, &vec!["rpc.url must not be empty".to_string()]);
            }
            other => panic!("unexpected cause: {other:?}"),
        }
    }

    #[test]
    fn test_load_config_applies_overrides() {
        let cli = Cli::try_parse_from([
            "sir-scan",
            "scan",
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
            "--concurrency",
            "2",
            "-c",
            "does-not-exist",
            "--rpc-url",
            "http://localhost:8545",
        ])
        .unwrap();

        let config = load_config(&cli).unwrap();
        assert_eq!(config.rpc.url, "http://localhost:8545");
        assert_eq!(config.scan.concurrency, 2);
    }

    #[test]
    fn test_run_derive_rejects_short_hash() {
        let config = AppConfig::default_config();
        let err = run_derive(&config, "1", None, Some("0x1234"), false).unwrap_err();
        assert!(matches!(err, ScanError::InvalidArgument(_)));
    }
}
