//! Off-chain derivation of per-vault APE token addresses.
//!
//! The Vault contract deploys each APE token in two steps: a CREATE2 proxy at
//! `salt = vaultId`, which then deploys the token with CREATE as its first
//! action (nonce 1). Both steps are reproduced here so a scan never has to ask
//! the chain where a token lives.

use std::ops::RangeInclusive;

use alloy::primitives::{address, b256, Address, B256, U256};
use alloy::rlp::{Encodable, Header};

use crate::error::{Result, ScanError};

/// Vault contract on Ethereum mainnet; deployer of every APE proxy.
pub const VAULT_ADDRESS: Address = address!("B91AE2c8365FD45030abA84a4666C4dB074E53E7");

/// Init code hash of the CREATE3-style proxy the Vault deploys per APE token.
pub const APE_PROXY_BYTECODE_HASH: B256 =
    b256!("21c35dbe1b344a2488cf3321d6ce542f8e9f305544ff09e4993a62319a497c1f");

/// The proxy's token deployment is its first transaction.
pub const APE_DEPLOYMENT_NONCE: u64 = 1;

/// Encode a vault id as a 32-byte big-endian, left zero-padded salt.
pub fn salt_for_vault(vault_id: U256) -> B256 {
    B256::from(vault_id.to_be_bytes::<32>())
}

/// CREATE2: `keccak256(0xff ++ deployer ++ salt ++ init_code_hash)[12..]`
pub fn create2_address(deployer: Address, salt: B256, init_code_hash: B256) -> Address {
    deployer.create2(salt.0, init_code_hash.0)
}

/// RLP encoding of `[sender, nonce]`, the CREATE address preimage.
///
/// For nonce 1 this is `0xd6 0x94 ++ sender ++ 0x01`.
pub fn create_preimage(sender: Address, nonce: u64) -> Vec<u8> {
    let header = Header {
        list: true,
        payload_length: sender.length() + nonce.length(),
    };
    let mut out = Vec::with_capacity(header.length() + header.payload_length);
    header.encode(&mut out);
    sender.encode(&mut out);
    nonce.encode(&mut out);
    out
}

/// CREATE: `keccak256(rlp([sender, nonce]))[12..]`
pub fn create_address(sender: Address, nonce: u64) -> Address {
    sender.create(nonce)
}

/// Stage 1: the proxy the deployer creates for `vault_id`.
pub fn proxy_address(deployer: Address, vault_id: U256, proxy_bytecode_hash: B256) -> Address {
    create2_address(deployer, salt_for_vault(vault_id), proxy_bytecode_hash)
}

/// Both stages: the APE token address for `vault_id`.
pub fn ape_address(deployer: Address, vault_id: U256, proxy_bytecode_hash: B256) -> Address {
    let proxy = proxy_address(deployer, vault_id, proxy_bytecode_hash);
    create_address(proxy, APE_DEPLOYMENT_NONCE)
}

/// Same as [`ape_address`] for raw byte inputs.
///
/// Returns `InvalidArgument` when the deployer is not exactly 20 bytes (or is
/// the zero address) or the bytecode hash is not exactly 32 bytes.
pub fn derive_from_slices(
    deployer: &[u8],
    vault_id: U256,
    proxy_bytecode_hash: &[u8],
) -> Result<Address> {
    let deployer: [u8; 20] = deployer.try_into().map_err(|_| {
        ScanError::InvalidArgument(format!(
            "deployer must be 20 bytes, got {}",
            deployer.len()
        ))
    })?;
    let hash: [u8; 32] = proxy_bytecode_hash.try_into().map_err(|_| {
        ScanError::InvalidArgument(format!(
            "proxy bytecode hash must be 32 bytes, got {}",
            proxy_bytecode_hash.len()
        ))
    })?;

    let deriver = ApeDeriver::try_new(Address::from(deployer), B256::from(hash))?;
    Ok(ape_address(deriver.deployer, vault_id, deriver.proxy_bytecode_hash))
}

/// Derives APE addresses for one deployer/bytecode pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApeDeriver {
    deployer: Address,
    proxy_bytecode_hash: B256,
}

impl Default for ApeDeriver {
    fn default() -> Self {
        Self::new(VAULT_ADDRESS, APE_PROXY_BYTECODE_HASH)
    }
}

impl ApeDeriver {
    pub const fn new(deployer: Address, proxy_bytecode_hash: B256) -> Self {
        Self {
            deployer,
            proxy_bytecode_hash,
        }
    }

    /// Like [`ApeDeriver::new`], but rejects the zero deployer.
    pub fn try_new(deployer: Address, proxy_bytecode_hash: B256) -> Result<Self> {
        if deployer.is_zero() {
            return Err(ScanError::InvalidArgument(
                "deployer must not be the zero address".to_string(),
            ));
        }
        Ok(Self::new(deployer, proxy_bytecode_hash))
    }

    pub fn deployer(&self) -> Address {
        self.deployer
    }

    pub fn proxy_bytecode_hash(&self) -> B256 {
        self.proxy_bytecode_hash
    }

    pub fn proxy(&self, vault_id: u64) -> Address {
        proxy_address(self.deployer, U256::from(vault_id), self.proxy_bytecode_hash)
    }

    pub fn derive(&self, vault_id: u64) -> Address {
        ape_address(self.deployer, U256::from(vault_id), self.proxy_bytecode_hash)
    }

    /// Lazily derives `(vault_id, ape)` pairs in ascending id order.
    pub fn derive_range(
        &self,
        vault_ids: RangeInclusive<u64>,
    ) -> impl Iterator<Item = (u64, Address)> {
        let deriver = *self;
        vault_ids.map(move |id| (id, deriver.derive(id)))
    }
}
