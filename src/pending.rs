//! The sender's own record of links it has handed out
//!
//! This is the one place a redeem link may be persisted. Entries are keyed by
//! transaction id and live in the `pending` namespace of the sender's store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use wallet::storage::{load_json, save_json, KeyValueStore};
use wallet::{Address, StorageError};

use crate::transaction::TransactionId;

pub const PENDING_NAMESPACE: &str = "pending";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    /// The ledger accepted the create
    Accepted,
    /// The create was sent but its outcome never came back
    Unknown,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSend {
    pub transaction_id: TransactionId,
    pub escrow_address: Address,
    pub link: String,
    pub asset_symbol: String,
    pub amount: u64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub state: SubmissionState,
}

impl PendingSend {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for PendingSend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSend")
            .field("transaction_id", &self.transaction_id)
            .field("escrow_address", &self.escrow_address)
            .field("asset_symbol", &self.asset_symbol)
            .field("amount", &self.amount)
            .field("expires_at", &self.expires_at)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct PendingSends {
    store: Arc<dyn KeyValueStore>,
}

impl PendingSends {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn record(&self, entry: &PendingSend) -> Result<(), StorageError> {
        save_json(
            self.store.as_ref(),
            PENDING_NAMESPACE,
            entry.transaction_id.as_str(),
            entry,
        )?;
        log::debug!(
            "Recorded pending send {} ({})",
            entry.transaction_id,
            entry.escrow_address
        );
        Ok(())
    }

    pub fn get(&self, transaction_id: &TransactionId) -> Result<Option<PendingSend>, StorageError> {
        load_json(self.store.as_ref(), PENDING_NAMESPACE, transaction_id.as_str())
    }

    /// Oldest first
    pub fn list(&self) -> Result<Vec<PendingSend>, StorageError> {
        let mut entries = Vec::new();
        for key in self.store.keys(PENDING_NAMESPACE)? {
            if let Some(entry) = load_json::<PendingSend>(self.store.as_ref(), PENDING_NAMESPACE, &key)? {
                entries.push(entry);
            }
        }
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    pub fn remove(&self, transaction_id: &TransactionId) -> Result<bool, StorageError> {
        self.store.delete(PENDING_NAMESPACE, transaction_id.as_str())
    }

    pub fn find_by_escrow(&self, escrow_address: &Address) -> Result<Option<PendingSend>, StorageError> {
        Ok(self
            .list()?
            .into_iter()
            .find(|e| &e.escrow_address == escrow_address))
    }

    /// Removes the entries for `escrow_address` that `settled` accepts;
    /// returns how many
    pub fn remove_by_escrow(
        &self,
        escrow_address: &Address,
        settled: impl Fn(&PendingSend) -> bool,
    ) -> Result<usize, StorageError> {
        let mut removed = 0;
        for entry in self.list()? {
            if &entry.escrow_address == escrow_address
                && settled(&entry)
                && self.remove(&entry.transaction_id)?
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Entries whose links can no longer be redeemed, candidates for reclaim
    pub fn expired(&self, now: DateTime<Utc>) -> Result<Vec<PendingSend>, StorageError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|e| e.is_expired(now))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use wallet::MemoryStore;

    fn entry(id: &str, escrow: u8, expires_in: Duration) -> PendingSend {
        let now = Utc::now();
        PendingSend {
            transaction_id: TransactionId::from(id.to_string()),
            escrow_address: Address::new([escrow; 32]),
            link: format!("https://example.invalid/?startapp={}", id),
            asset_symbol: "SOL".to_string(),
            amount: 1_000,
            expires_at: now + expires_in,
            created_at: now,
            state: SubmissionState::Accepted,
        }
    }

    #[test]
    fn test_record_get_remove() {
        let pending = PendingSends::new(Arc::new(MemoryStore::new()));
        let e = entry("tx1", 1, Duration::hours(1));
        pending.record(&e).unwrap();

        assert_eq!(pending.get(&e.transaction_id).unwrap(), Some(e.clone()));
        assert!(pending.remove(&e.transaction_id).unwrap());
        assert!(pending.get(&e.transaction_id).unwrap().is_none());
    }

    #[test]
    fn test_expired_and_by_escrow() {
        let pending = PendingSends::new(Arc::new(MemoryStore::new()));
        pending.record(&entry("tx1", 1, Duration::hours(1))).unwrap();
        pending.record(&entry("tx2", 2, Duration::hours(-1))).unwrap();

        let expired = pending.expired(Utc::now()).unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].transaction_id.as_str(), "tx2");

        assert!(pending.find_by_escrow(&Address::new([1; 32])).unwrap().is_some());
        assert_eq!(pending.remove_by_escrow(&Address::new([1; 32]), |e| e.is_expired(Utc::now())).unwrap(), 0);
        assert_eq!(pending.remove_by_escrow(&Address::new([2; 32]), |_| true).unwrap(), 1);
        assert_eq!(pending.list().unwrap().len(), 1);
    }

    #[test]
    fn test_debug_hides_link() {
        let e = entry("tx1", 1, Duration::hours(1));
        assert!(!format!("{:?}", e).contains("startapp"));
    }
}
