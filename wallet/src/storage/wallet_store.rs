use std::sync::{Arc, RwLock};

use super::{load_json, save_json, KeyValueStore, WalletRecord, WALLETS_NAMESPACE};
use crate::error::{StorageError, WalletError};
use crate::keys::KeyPair;

/// Slot used when no external identity is known
pub const DEFAULT_SLOT: &str = "default";

/// Owns the device's wallet records.
///
/// Never generates keys on its own; see `wallet_ops` for the one place that
/// does. Writes take the lock exclusively so a key is never read while it is
/// being replaced.
pub struct WalletStore {
    store: Arc<dyn KeyValueStore>,
    lock: RwLock<()>,
}

impl WalletStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            lock: RwLock::new(()),
        }
    }

    fn slot(identity: Option<&str>) -> &str {
        identity.unwrap_or(DEFAULT_SLOT)
    }

    pub fn load_wallet(&self, identity: Option<&str>) -> Result<Option<WalletRecord>, WalletError> {
        let _guard = self.lock.read().map_err(|_| StorageError::Poisoned)?;
        let record = load_json(self.store.as_ref(), WALLETS_NAMESPACE, Self::slot(identity))?;
        Ok(record)
    }

    /// Persist `record` under its own `user_id` slot, replacing any previous one
    pub fn set_wallet(&self, record: &WalletRecord) -> Result<(), WalletError> {
        let _guard = self.lock.write().map_err(|_| StorageError::Poisoned)?;
        let slot = Self::slot(record.user_id.as_deref());
        save_json(self.store.as_ref(), WALLETS_NAMESPACE, slot, record)?;
        log::info!("Stored wallet {} in slot '{}'", record.public_key, slot);
        Ok(())
    }

    /// Remove the record. Only for explicit logout/reset.
    pub fn clear_wallet(&self, identity: Option<&str>) -> Result<bool, WalletError> {
        let _guard = self.lock.write().map_err(|_| StorageError::Poisoned)?;
        let slot = Self::slot(identity);
        let removed = self.store.delete(WALLETS_NAMESPACE, slot)?;
        if removed {
            log::warn!("Cleared wallet in slot '{}'", slot);
        }
        Ok(removed)
    }

    /// Load the key pair for one signing operation
    pub fn key_pair(&self, identity: Option<&str>) -> Result<KeyPair, WalletError> {
        let record = self
            .load_wallet(identity)?
            .ok_or_else(|| WalletError::WalletNotFound(Self::slot(identity).to_string()))?;
        record.key_pair()
    }

    pub fn list_slots(&self) -> Result<Vec<String>, WalletError> {
        let _guard = self.lock.read().map_err(|_| StorageError::Poisoned)?;
        Ok(self.store.keys(WALLETS_NAMESPACE)?)
    }
}
