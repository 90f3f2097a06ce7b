//! Seed phrases and deterministic key pairs
//!
//! - BIP-39 phrase generation (128-bit entropy, 12 words)
//! - SLIP-0010 Ed25519 derivation along `m/44'/{coin}'/{account}'/0'`
//! - Ed25519 signing and verification

use bip39::Mnemonic;
use bitcoin::bip32::{ChildNumber, DerivationPath};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha512;
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

use crate::address::Address;
use crate::error::WalletError;

/// SLIP-44 coin type of the ledger this wallet targets.
pub const SOLANA_COIN_TYPE: u32 = 501;

const ENTROPY_BYTES: usize = 16;
const HARDENED_OFFSET: u32 = 0x8000_0000;
const ED25519_SEED_KEY: &[u8] = b"ed25519 seed";

type HmacSha512 = Hmac<Sha512>;

/// A BIP-39 phrase. Never printed through `Debug`.
#[derive(Clone)]
pub struct SeedPhrase(Mnemonic);

impl SeedPhrase {
    /// Parse and checksum-validate a phrase
    pub fn parse(words: &str) -> Result<Self, WalletError> {
        let mnemonic =
            Mnemonic::parse(words).map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
        Ok(Self(mnemonic))
    }

    pub fn phrase(&self) -> Zeroizing<String> {
        Zeroizing::new(self.0.to_string())
    }

    pub fn word_count(&self) -> usize {
        self.0.word_count()
    }

    fn to_seed(&self) -> Zeroizing<[u8; 64]> {
        Zeroizing::new(self.0.to_seed(""))
    }
}

impl fmt::Debug for SeedPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeedPhrase({} words)", self.word_count())
    }
}

/// Ed25519 key pair. The signing key is zeroized on drop.
pub struct KeyPair {
    public_key: Address,
    signing_key: SigningKey,
}

impl KeyPair {
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(secret);
        let public_key = Address::new(signing_key.verifying_key().to_bytes());
        Self {
            public_key,
            signing_key,
        }
    }

    /// Restore from the 64-byte `secret || public` base58 export
    pub fn from_base58(encoded: &str) -> Result<Self, WalletError> {
        let bytes = Zeroizing::new(
            bs58::decode(encoded.trim())
                .into_vec()
                .map_err(|e| WalletError::InvalidKey(e.to_string()))?,
        );
        if bytes.len() != 64 {
            return Err(WalletError::InvalidKey(format!(
                "expected 64 bytes, got {}",
                bytes.len()
            )));
        }

        let mut secret = Zeroizing::new([0u8; 32]);
        secret.copy_from_slice(&bytes[..32]);
        let key_pair = Self::from_secret_bytes(&secret);

        if key_pair.public_key.as_bytes()[..] != bytes[32..] {
            return Err(WalletError::InvalidKey(
                "public half does not match secret".to_string(),
            ));
        }

        Ok(key_pair)
    }

    /// 64-byte `secret || public` export, base58
    pub fn to_base58(&self) -> Zeroizing<String> {
        let mut bytes = Zeroizing::new([0u8; 64]);
        bytes[..32].copy_from_slice(self.signing_key.as_bytes());
        bytes[32..].copy_from_slice(self.public_key.as_bytes());
        Zeroizing::new(bs58::encode(&bytes[..]).into_string())
    }

    pub fn public_key(&self) -> Address {
        self.public_key
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// Check an Ed25519 signature made by `public_key`
pub fn verify_signature(public_key: &Address, message: &[u8], signature: &[u8; 64]) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(public_key.as_bytes()) else {
        return false;
    };
    let signature = Signature::from_bytes(signature);
    verifying_key.verify_strict(message, &signature).is_ok()
}

pub struct KeyManager;

impl KeyManager {
    /// Generate a fresh phrase from the OS CSPRNG
    pub fn create_seed_phrase() -> Result<SeedPhrase, WalletError> {
        let mut entropy = Zeroizing::new([0u8; ENTROPY_BYTES]);
        OsRng
            .try_fill_bytes(&mut entropy[..])
            .map_err(|e| WalletError::Entropy(e.to_string()))?;

        let mnemonic = Mnemonic::from_entropy(&entropy[..])
            .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;

        Ok(SeedPhrase(mnemonic))
    }

    /// Derive the key pair for `(coin_type, phrase, account_index)`.
    ///
    /// Pure: the same triple always yields the same pair, which is what makes
    /// a wallet recoverable from its phrase alone.
    pub fn derive_key_pair(
        coin_type: u32,
        seed_phrase: &SeedPhrase,
        account_index: u32,
    ) -> Result<KeyPair, WalletError> {
        if coin_type != SOLANA_COIN_TYPE {
            return Err(WalletError::UnsupportedCoinType(coin_type));
        }

        let path = Self::derivation_path(coin_type, account_index)?;
        let seed = seed_phrase.to_seed();
        let secret = derive_ed25519_secret(&seed[..], &path)?;

        Ok(KeyPair::from_secret_bytes(&secret))
    }

    /// Same as [`KeyManager::derive_key_pair`] from raw phrase words
    pub fn key_pair_from_phrase(
        coin_type: u32,
        words: &str,
        account_index: u32,
    ) -> Result<KeyPair, WalletError> {
        let seed_phrase = SeedPhrase::parse(words)?;
        Self::derive_key_pair(coin_type, &seed_phrase, account_index)
    }

    /// Returns: "m/44'/501'/0'/0'" for the first account
    pub fn derivation_path(
        coin_type: u32,
        account_index: u32,
    ) -> Result<DerivationPath, WalletError> {
        DerivationPath::from_str(&format!("m/44'/{}'/{}'/0'", coin_type, account_index))
            .map_err(|e| WalletError::InvalidDerivationPath(e.to_string()))
    }
}

/// SLIP-0010 Ed25519: hardened children only.
pub(crate) fn derive_ed25519_secret(
    seed: &[u8],
    path: &DerivationPath,
) -> Result<Zeroizing<[u8; 32]>, WalletError> {
    let (mut key, mut chain_code) = hmac_sha512_split(ED25519_SEED_KEY, seed)?;

    for child in path.as_ref() {
        let index = match child {
            ChildNumber::Hardened { index } => *index,
            ChildNumber::Normal { index } => {
                return Err(WalletError::InvalidDerivationPath(format!(
                    "Ed25519 requires hardened indices, got {}",
                    index
                )))
            }
        };

        // 0x00 || key || ser32(index | 2^31)
        let mut data = Zeroizing::new([0u8; 37]);
        data[1..33].copy_from_slice(&key[..]);
        data[33..].copy_from_slice(&(index | HARDENED_OFFSET).to_be_bytes());

        let (child_key, child_chain) = hmac_sha512_split(&chain_code[..], &data[..])?;
        key = child_key;
        chain_code = child_chain;
    }

    Ok(key)
}

fn hmac_sha512_split(
    key: &[u8],
    data: &[u8],
) -> Result<(Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>), WalletError> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| WalletError::Internal(format!("HMAC-SHA512 init failed: {}", e)))?;
    mac.update(data);
    let output = mac.finalize().into_bytes();

    let mut left = Zeroizing::new([0u8; 32]);
    let mut right = Zeroizing::new([0u8; 32]);
    left.copy_from_slice(&output[..32]);
    right.copy_from_slice(&output[32..]);

    Ok((left, right))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    // SLIP-0010 test vector 1, seed 000102030405060708090a0b0c0d0e0f
    #[test]
    fn test_slip10_vector1() {
        let seed = (0u8..16).collect::<Vec<_>>();

        let master = derive_ed25519_secret(&seed, &DerivationPath::master()).unwrap();
        assert_eq!(
            hex::encode(&master[..]),
            "2b4be7f19ee27bbf30c667b642d5f4aa69fd169872f8fc3059c08ebae2eb19e7"
        );

        let path = DerivationPath::from_str("m/0'").unwrap();
        let child = derive_ed25519_secret(&seed, &path).unwrap();
        assert_eq!(
            hex::encode(&child[..]),
            "68e0fe46dfb67e368c75379acec591dad19df3cde26e63b93a8e704f1dade7a3"
        );
    }

    #[test]
    fn test_rejects_normal_child() {
        let path = DerivationPath::from_str("m/44'/501'/0'/0").unwrap();
        let result = derive_ed25519_secret(&[1u8; 64], &path);
        assert!(matches!(result, Err(WalletError::InvalidDerivationPath(_))));
    }

    #[test]
    fn test_derivation_path_format() {
        let path = KeyManager::derivation_path(SOLANA_COIN_TYPE, 3).unwrap();
        assert_eq!(path.to_string(), "m/44'/501'/3'/0'");
    }

    #[test]
    fn test_deterministic_key_pair() {
        let phrase = SeedPhrase::parse(PHRASE).unwrap();
        let a = KeyManager::derive_key_pair(SOLANA_COIN_TYPE, &phrase, 0).unwrap();
        let b = KeyManager::derive_key_pair(SOLANA_COIN_TYPE, &phrase, 0).unwrap();
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(*a.to_base58(), *b.to_base58());

        let other = KeyManager::derive_key_pair(SOLANA_COIN_TYPE, &phrase, 1).unwrap();
        assert_ne!(a.public_key(), other.public_key());
    }

    #[test]
    fn test_unsupported_coin_type() {
        let phrase = SeedPhrase::parse(PHRASE).unwrap();
        let result = KeyManager::derive_key_pair(60, &phrase, 0);
        assert!(matches!(result, Err(WalletError::UnsupportedCoinType(60))));
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let bad = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon";
        assert!(matches!(
            SeedPhrase::parse(bad),
            Err(WalletError::InvalidMnemonic(_))
        ));
    }

    #[test]
    fn test_sign_and_verify() {
        let key_pair = KeyManager::key_pair_from_phrase(SOLANA_COIN_TYPE, PHRASE, 0).unwrap();
        let signature = key_pair.sign(b"message");
        assert!(verify_signature(&key_pair.public_key(), b"message", &signature));
        assert!(!verify_signature(&key_pair.public_key(), b"tampered", &signature));
    }

    #[test]
    fn test_base58_export_round_trip() {
        let key_pair = KeyManager::key_pair_from_phrase(SOLANA_COIN_TYPE, PHRASE, 0).unwrap();
        let restored = KeyPair::from_base58(&key_pair.to_base58()).unwrap();
        assert_eq!(restored.public_key(), key_pair.public_key());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let phrase = SeedPhrase::parse(PHRASE).unwrap();
        assert_eq!(format!("{:?}", phrase), "SeedPhrase(12 words)");

        let key_pair = KeyManager::derive_key_pair(SOLANA_COIN_TYPE, &phrase, 0).unwrap();
        let debug = format!("{:?}", key_pair);
        assert!(!debug.contains(key_pair.to_base58().as_str()));
    }
}
