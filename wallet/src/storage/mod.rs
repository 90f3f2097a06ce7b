//! Storage and persistence layer
//!
//! - Key-value credential store (file system or in-memory)
//! - Wallet store
//! - Data models

mod file_system;
mod memory;
mod models;
mod wallet_store;

pub use file_system::FileStore;
pub use memory::MemoryStore;
pub use models::{CredentialRecord, SessionRecord, WalletRecord};
pub use wallet_store::{WalletStore, DEFAULT_SLOT};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;

pub const WALLETS_NAMESPACE: &str = "wallets";
pub const CREDENTIALS_NAMESPACE: &str = "credentials";
pub const SESSIONS_NAMESPACE: &str = "sessions";

/// Opaque get/set/delete persistence, last write wins.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), StorageError>;

    /// Returns whether a value was removed
    fn delete(&self, namespace: &str, key: &str) -> Result<bool, StorageError>;

    fn keys(&self, namespace: &str) -> Result<Vec<String>, StorageError>;
}

pub fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    namespace: &str,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(namespace, key)? {
        Some(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        None => Ok(None),
    }
}

pub fn save_json<T: Serialize>(
    store: &dyn KeyValueStore,
    namespace: &str,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(value)?;
    store.set(namespace, key, &json)
}

/// Keys become file names, so anything that could escape a directory is refused
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty()
        || key == "."
        || key.contains("..")
        || key.contains('/')
        || key.contains('\\')
        || key.contains('\0')
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("alice").is_ok());
        assert!(validate_key("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc").is_err());
        assert!(validate_key("a/b").is_err());
    }

    #[test]
    fn test_json_helpers() {
        let store = MemoryStore::new();
        let record = SessionRecord {
            unlocked_at: chrono::Utc::now(),
        };
        save_json(&store, SESSIONS_NAMESPACE, "alice", &record).unwrap();

        let loaded: Option<SessionRecord> = load_json(&store, SESSIONS_NAMESPACE, "alice").unwrap();
        assert_eq!(loaded.unwrap().unlocked_at, record.unlocked_at);

        let missing: Option<SessionRecord> = load_json(&store, SESSIONS_NAMESPACE, "bob").unwrap();
        assert!(missing.is_none());
    }
}
