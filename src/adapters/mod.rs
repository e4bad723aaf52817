pub mod sir_rpc;

pub use sir_rpc::{RpcPositionSource, MAX_VAULT_ID};
