/// Ledger account state and the JSON shapes of the ledger HTTP API
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wallet::Address;

use crate::asset::AssetClass;
use crate::commitment::SecretCommitment;
use crate::error::RejectReason;
use crate::transaction::TransactionId;

/// On-ledger escrow record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowAccount {
    pub address: Address,
    pub sender: Address,
    pub asset: AssetClass,
    pub amount: u64,
    pub commitment: SecretCommitment,
    pub expires_at: DateTime<Utc>,
    pub redeemed: bool,
    pub reclaimed: bool,
}

impl EscrowAccount {
    /// Redeemed or reclaimed; either way it never changes again
    pub fn is_consumed(&self) -> bool {
        self.redeemed || self.reclaimed
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Open, funded and not past expiry
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        !self.is_consumed() && self.amount > 0 && !self.is_expired(now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransactionStatus {
    Committed { slot: u64 },
    Rejected { reason: RejectReason },
    NotFound,
}

/// GET /time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeResponse {
    pub now: DateTime<Utc>,
}

/// GET /balance/{address}?asset=
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceQuery {
    #[serde(default)]
    pub asset: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub address: Address,
    pub asset: AssetClass,
    pub amount: u64,
}

/// POST /tx
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub transaction_id: TransactionId,
}

/// Error body for a refused POST /tx
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectResponse {
    pub transaction_id: Option<TransactionId>,
    pub reason: RejectReason,
}

/// POST /devnet/airdrop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirdropRequest {
    pub address: Address,
    pub asset: AssetClass,
    pub amount: u64,
}

/// POST /devnet/advance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceRequest {
    pub seconds: i64,
}
