use std::sync::Arc;

use crate::address::Address;
use crate::auth::AuthManager;
use crate::error::WalletError;
use crate::keys::KeyPair;
use crate::storage::{WalletStore, DEFAULT_SLOT};

/// Hands out signing keys only while the wallet's session allows it.
///
/// The auth identity is the wallet's base58 public key. Each call reloads the
/// record so a key is never cached past one operation.
#[derive(Clone)]
pub struct WalletSigner {
    wallets: Arc<WalletStore>,
    auth: Arc<AuthManager>,
}

impl WalletSigner {
    pub fn new(wallets: Arc<WalletStore>, auth: Arc<AuthManager>) -> Self {
        Self { wallets, auth }
    }

    pub fn public_key(&self, user_id: Option<&str>) -> Result<Address, WalletError> {
        let record = self
            .wallets
            .load_wallet(user_id)?
            .ok_or_else(|| WalletError::WalletNotFound(user_id.unwrap_or(DEFAULT_SLOT).to_string()))?;
        Ok(record.public_key)
    }

    /// Key pair for exactly one operation; drop it when done
    pub fn key_pair(&self, user_id: Option<&str>) -> Result<KeyPair, WalletError> {
        let record = self
            .wallets
            .load_wallet(user_id)?
            .ok_or_else(|| WalletError::WalletNotFound(user_id.unwrap_or(DEFAULT_SLOT).to_string()))?;

        let identity = record.public_key.to_string();
        self.auth.require_unlocked(&identity)?;

        log::debug!("Releasing signing key for {}", identity);
        record.key_pair()
    }

    /// Sign `message`, returning the signer's address with the signature
    pub fn sign(
        &self,
        user_id: Option<&str>,
        message: &[u8],
    ) -> Result<(Address, [u8; 64]), WalletError> {
        let key_pair = self.key_pair(user_id)?;
        Ok((key_pair.public_key(), key_pair.sign(message)))
    }
}
