//! Escrow secrets, their public commitments, and escrow address derivation
//!
//! Only `sha256(secret)` ever reaches the ledger at creation time. The escrow
//! address is a hash of the program id, the sender, the commitment and the
//! asset class, so both sender and redeemer can recompute it from a link.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use wallet::{Address, WalletError};
use zeroize::Zeroizing;

use crate::asset::AssetClass;
use crate::error::EscrowError;

pub const SECRET_LEN: usize = 16;

const ESCROW_SEED: &[u8] = b"escrow";
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Bearer secret of one escrow. ASCII alphanumeric, never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct EscrowSecret(Zeroizing<String>);

impl EscrowSecret {
    pub fn new(secret: &str) -> Result<Self, EscrowError> {
        if secret.is_empty() || !secret.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(EscrowError::InvalidSecret);
        }
        Ok(Self(Zeroizing::new(secret.to_string())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn commitment(&self) -> SecretCommitment {
        SecretCommitment(Sha256::digest(self.0.as_bytes()).into())
    }
}

impl fmt::Debug for EscrowSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EscrowSecret(..)")
    }
}

impl Serialize for EscrowSecret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EscrowSecret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Zeroizing::new(String::deserialize(deserializer)?);
        Self::new(&raw).map_err(serde::de::Error::custom)
    }
}

/// Fresh secret from the OS RNG, [`SECRET_LEN`] characters of `[A-Za-z0-9]`
pub fn generate_secret() -> Result<EscrowSecret, EscrowError> {
    // 62 * 4 = 248; bytes at or above it are rejected to keep the draw uniform
    const LIMIT: u8 = 248;

    let mut secret = Zeroizing::new(String::with_capacity(SECRET_LEN));
    let mut buf = Zeroizing::new([0u8; 32]);
    while secret.len() < SECRET_LEN {
        OsRng
            .try_fill_bytes(&mut buf[..])
            .map_err(|e| WalletError::Entropy(e.to_string()))?;
        for &b in buf.iter().filter(|&&b| b < LIMIT) {
            if secret.len() == SECRET_LEN {
                break;
            }
            secret.push(ALPHABET[(b % 62) as usize] as char);
        }
    }
    Ok(EscrowSecret(secret))
}

/// `sha256(secret)`, hex on the wire
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SecretCommitment([u8; 32]);

impl SecretCommitment {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for SecretCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for SecretCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretCommitment({})", self)
    }
}

impl Serialize for SecretCommitment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SecretCommitment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(raw.as_bytes(), &mut bytes).map_err(serde::de::Error::custom)?;
        Ok(Self(bytes))
    }
}

/// Holding address for `(sender, commitment, asset)` under `program_id`
pub fn derive_escrow_address(
    program_id: &Address,
    sender: &Address,
    commitment: &SecretCommitment,
    asset_class: &AssetClass,
) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(ESCROW_SEED);
    hasher.update(program_id.as_bytes());
    hasher.update(sender.as_bytes());
    hasher.update(commitment.as_bytes());
    hasher.update(asset_class.tag_bytes());
    Address::new(hasher.finalize().into())
}

/// Program id used when none is configured
pub fn default_program_id() -> Address {
    Address::new(Sha256::digest(b"instant-send escrow program").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::DEVNET_USDC_MINT;

    #[test]
    fn test_commitment_is_sha256() {
        let secret = EscrowSecret::new("abc123").unwrap();
        assert_eq!(
            secret.commitment().to_string(),
            "6ca13d52ca70c883e0f0bb101e425a89e8624de51db2d2392593af6a84118090"
        );
    }

    #[test]
    fn test_secret_validation() {
        assert!(EscrowSecret::new("").is_err());
        assert!(EscrowSecret::new("has__delim").is_err());
        assert!(EscrowSecret::new("with space").is_err());
        assert!(EscrowSecret::new("Abc123").is_ok());
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = EscrowSecret::new("topsecret").unwrap();
        assert!(!format!("{:?}", secret).contains("topsecret"));
    }

    #[test]
    fn test_generated_secrets() {
        let a = generate_secret().unwrap();
        let b = generate_secret().unwrap();
        assert_eq!(a.as_str().len(), SECRET_LEN);
        assert!(a.as_str().bytes().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_escrow_address_binds_every_input() {
        let program = default_program_id();
        let sender = Address::new([1u8; 32]);
        let other_sender = Address::new([2u8; 32]);
        let c1 = EscrowSecret::new("one").unwrap().commitment();
        let c2 = EscrowSecret::new("two").unwrap().commitment();
        let usdc = AssetClass::Fungible(DEVNET_USDC_MINT);

        let base = derive_escrow_address(&program, &sender, &c1, &AssetClass::Native);
        assert_eq!(
            base,
            derive_escrow_address(&program, &sender, &c1, &AssetClass::Native)
        );
        assert_ne!(base, derive_escrow_address(&program, &other_sender, &c1, &AssetClass::Native));
        assert_ne!(base, derive_escrow_address(&program, &sender, &c2, &AssetClass::Native));
        assert_ne!(base, derive_escrow_address(&program, &sender, &c1, &usdc));
    }

    #[test]
    fn test_commitment_serde() {
        let commitment = EscrowSecret::new("abc123").unwrap().commitment();
        let json = serde_json::to_string(&commitment).unwrap();
        let back: SecretCommitment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, commitment);
    }
}
