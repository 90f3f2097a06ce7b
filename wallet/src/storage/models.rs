//! Data models for wallet storage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

use crate::address::Address;
use crate::error::WalletError;
use crate::keys::{KeyPair, SeedPhrase};

/// Persisted key pair plus the phrase it came from.
///
/// Secret fields are wiped when the record is dropped and never shown by `Debug`.
#[derive(Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    pub user_id: Option<String>,
    pub coin_type: u32,
    pub account_index: u32,
    pub public_key: Address,
    private_key: String,
    seed_phrase: String,
    pub created_at: DateTime<Utc>,
}

impl WalletRecord {
    pub fn new(
        user_id: Option<String>,
        seed_phrase: &SeedPhrase,
        key_pair: &KeyPair,
        coin_type: u32,
        account_index: u32,
    ) -> Self {
        Self {
            user_id,
            coin_type,
            account_index,
            public_key: key_pair.public_key(),
            private_key: key_pair.to_base58().to_string(),
            seed_phrase: seed_phrase.phrase().to_string(),
            created_at: Utc::now(),
        }
    }

    /// Rebuild the signing key pair, checking it still matches `public_key`
    pub fn key_pair(&self) -> Result<KeyPair, WalletError> {
        let key_pair = KeyPair::from_base58(&self.private_key)?;
        if key_pair.public_key() != self.public_key {
            return Err(WalletError::InvalidKey(format!(
                "stored key does not belong to {}",
                self.public_key
            )));
        }
        Ok(key_pair)
    }

    pub fn seed_phrase(&self) -> Result<SeedPhrase, WalletError> {
        SeedPhrase::parse(&self.seed_phrase)
    }
}

impl fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletRecord")
            .field("user_id", &self.user_id)
            .field("coin_type", &self.coin_type)
            .field("account_index", &self.account_index)
            .field("public_key", &self.public_key)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl Drop for WalletRecord {
    fn drop(&mut self) {
        self.private_key.zeroize();
        self.seed_phrase.zeroize();
    }
}

/// Salted Argon2id hash in PHC string form
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub unlocked_at: DateTime<Utc>,
}
