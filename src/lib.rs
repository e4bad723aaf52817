pub mod adapters;
pub mod cli;
pub mod config;
pub mod derive;
pub mod error;
pub mod scanner;

pub use adapters::RpcPositionSource;
pub use config::AppConfig;
pub use derive::{ape_address, derive_from_slices, ApeDeriver};
pub use error::{Result, ScanError};
pub use scanner::{PositionReport, PositionScanner, PositionSource};
