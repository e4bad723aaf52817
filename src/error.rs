use thiserror::Error;

/// Main error type for the position scanner
#[derive(Error, Debug)]
pub enum ScanError {
    // Caller errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    #[error("Address parsing error: {0}")]
    AddressParsing(String),

    // Chain access errors
    #[error("Invalid RPC URL: {0}")]
    InvalidUrl(String),

    #[error("Contract call failed: {0}")]
    Contract(#[from] alloy::contract::Error),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Query failed for vault {vault_id}: {reason}")]
    VaultQuery { vault_id: u64, reason: String },

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for ScanError
pub type Result<T> = std::result::Result<T, ScanError>;

impl ScanError {
    /// Attach the vault id to a failure raised while scanning that vault.
    pub fn for_vault(self, vault_id: u64) -> Self {
        match self {
            err @ ScanError::VaultQuery { .. } => err,
            err => ScanError::VaultQuery {
                vault_id,
                reason: err.to_string(),
            },
        }
    }
}
