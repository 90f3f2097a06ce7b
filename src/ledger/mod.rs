//! Ledger client seam
//!
//! - `LedgerClient`: the operations the escrow engine needs from a ledger
//! - `HttpLedgerClient`: JSON over HTTP against a ledger node (or the mock)
//! - `InMemoryLedger`: process-local devnet executing the escrow program

mod http;
mod memory;
pub mod types;

pub use http::HttpLedgerClient;
pub use memory::{Fault, InMemoryLedger};
pub use types::{EscrowAccount, TransactionStatus};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use wallet::Address;

use crate::asset::AssetClass;
use crate::error::LedgerError;
use crate::transaction::TransactionId;

/// The ledger is the only source of truth for balances and escrow state.
///
/// `submit_transaction` returning `Timeout` means the outcome is unknown,
/// not that the transaction failed.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn get_balance(&self, address: &Address, asset: &AssetClass) -> Result<u64, LedgerError>;

    async fn get_escrow(&self, address: &Address) -> Result<Option<EscrowAccount>, LedgerError>;

    async fn submit_transaction(&self, signed_bytes: &[u8]) -> Result<TransactionId, LedgerError>;

    async fn get_transaction_status(
        &self,
        id: &TransactionId,
    ) -> Result<TransactionStatus, LedgerError>;

    async fn current_time(&self) -> Result<DateTime<Utc>, LedgerError>;
}
