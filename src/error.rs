//! Error types for escrow operations
//!
//! `EscrowError` is what callers see; `LedgerError` is what a ledger client
//! reports and is translated per operation by the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use wallet::{Address, AuthError, StorageError, WalletError};

use crate::transaction::TransactionId;

/// Why the ledger refused a transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    Malformed { detail: String },
    InvalidSignature,
    WrongProgram,
    Duplicate,
    InsufficientFunds { required: u64, available: u64 },
    InvalidAmount,
    InvalidExpiry,
    AddressMismatch,
    EscrowExists,
    EscrowNotFound,
    AlreadyConsumed,
    CommitmentMismatch,
    Expired,
    NotYetExpired,
    NotSender,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { detail } => write!(f, "malformed transaction: {}", detail),
            Self::InvalidSignature => write!(f, "invalid signature"),
            Self::WrongProgram => write!(f, "wrong program id"),
            Self::Duplicate => write!(f, "duplicate transaction"),
            Self::InsufficientFunds { required, available } => {
                write!(f, "insufficient funds: need {}, have {}", required, available)
            }
            Self::InvalidAmount => write!(f, "amount must be positive"),
            Self::InvalidExpiry => write!(f, "expiry is not in the future"),
            Self::AddressMismatch => write!(f, "escrow address does not match its inputs"),
            Self::EscrowExists => write!(f, "escrow address already in use"),
            Self::EscrowNotFound => write!(f, "escrow not found"),
            Self::AlreadyConsumed => write!(f, "escrow already consumed"),
            Self::CommitmentMismatch => write!(f, "secret does not match commitment"),
            Self::Expired => write!(f, "escrow expired"),
            Self::NotYetExpired => write!(f, "escrow not yet expired"),
            Self::NotSender => write!(f, "signer is not the escrow sender"),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    /// The ledger received the transaction and refused it; nothing changed
    #[error("Transaction rejected: {0}")]
    Rejected(RejectReason),

    /// The request never reached the ledger
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    /// The request may have reached the ledger but no answer was observed
    #[error("Ledger timed out: {0}")]
    Timeout(String),

    #[error("Invalid ledger response: {0}")]
    InvalidResponse(String),
}

/// Fieldless view of an [`EscrowError`], for mapping to user-facing messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InsufficientFunds,
    InvalidExpiry,
    InvalidAmount,
    InvalidSecret,
    UnknownAsset,
    LedgerSubmission,
    SubmissionStatusUnknown,
    InvalidOrExpiredLink,
    MalformedLink,
    EscrowNotFound,
    NotYetExpired,
    NotEscrowSender,
    Ledger,
    Entropy,
    InvalidSeed,
    AuthMismatch,
    Locked,
    CredentialStore,
    Wallet,
}

#[derive(Error, Debug)]
pub enum EscrowError {
    #[error("Insufficient funds: need {required}, have {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("Expiry must be in the future")]
    InvalidExpiry,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid escrow secret")]
    InvalidSecret,

    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    /// Definitely not applied; a fresh transaction may be sent
    #[error("Ledger submission failed: {0}")]
    LedgerSubmission(String),

    /// Sent, outcome unobserved. Poll the id before sending anything new.
    #[error("Submission status unknown for transaction {tx_id}")]
    SubmissionStatusUnknown { tx_id: TransactionId },

    /// Covers never-created, already-redeemed, reclaimed and expired alike
    #[error("This link is invalid or has expired")]
    InvalidOrExpiredLink,

    #[error("Malformed link: {0}")]
    MalformedLink(String),

    #[error("Escrow not found: {0}")]
    EscrowNotFound(Address),

    #[error("Escrow cannot be reclaimed before {0}")]
    NotYetExpired(chrono::DateTime<chrono::Utc>),

    #[error("Only the escrow sender may reclaim it")]
    NotEscrowSender,

    /// Read-side ledger failure
    #[error("Ledger error: {0}")]
    Ledger(LedgerError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),
}

impl From<AuthError> for EscrowError {
    fn from(err: AuthError) -> Self {
        Self::Wallet(WalletError::Auth(err))
    }
}

impl EscrowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::InvalidExpiry => ErrorKind::InvalidExpiry,
            Self::InvalidAmount(_) => ErrorKind::InvalidAmount,
            Self::InvalidSecret => ErrorKind::InvalidSecret,
            Self::UnknownAsset(_) => ErrorKind::UnknownAsset,
            Self::LedgerSubmission(_) => ErrorKind::LedgerSubmission,
            Self::SubmissionStatusUnknown { .. } => ErrorKind::SubmissionStatusUnknown,
            Self::InvalidOrExpiredLink => ErrorKind::InvalidOrExpiredLink,
            Self::MalformedLink(_) => ErrorKind::MalformedLink,
            Self::EscrowNotFound(_) => ErrorKind::EscrowNotFound,
            Self::NotYetExpired(_) => ErrorKind::NotYetExpired,
            Self::NotEscrowSender => ErrorKind::NotEscrowSender,
            Self::Ledger(_) => ErrorKind::Ledger,
            Self::Wallet(err) => match err {
                WalletError::Entropy(_) => ErrorKind::Entropy,
                WalletError::InvalidMnemonic(_) => ErrorKind::InvalidSeed,
                WalletError::Auth(AuthError::Mismatch) => ErrorKind::AuthMismatch,
                WalletError::Auth(AuthError::Locked) => ErrorKind::Locked,
                WalletError::Auth(AuthError::CredentialStore(_)) | WalletError::Storage(_) => {
                    ErrorKind::CredentialStore
                }
                _ => ErrorKind::Wallet,
            },
        }
    }

    /// Whether the caller may simply try again.
    ///
    /// `SubmissionStatusUnknown` is deliberately not retryable: the caller
    /// must resolve the pending id first.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::LedgerSubmission(_) => true,
            Self::Ledger(err) => matches!(
                err,
                LedgerError::Unavailable(_) | LedgerError::Timeout(_)
            ),
            Self::Wallet(WalletError::Storage(StorageError::Io(_)))
            | Self::Wallet(WalletError::Storage(StorageError::Unavailable(_))) => true,
            Self::Wallet(WalletError::Auth(AuthError::CredentialStore(_))) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_failure_hides_detail() {
        let err = EscrowError::InvalidOrExpiredLink;
        assert_eq!(err.to_string(), "This link is invalid or has expired");
        assert_eq!(err.kind(), ErrorKind::InvalidOrExpiredLink);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retry_policy() {
        assert!(EscrowError::LedgerSubmission("connection refused".into()).is_retryable());
        assert!(!EscrowError::SubmissionStatusUnknown {
            tx_id: TransactionId::from("5x".to_string())
        }
        .is_retryable());
        assert!(!EscrowError::MalformedLink("missing field".into()).is_retryable());
        assert!(EscrowError::Ledger(LedgerError::Timeout("read".into())).is_retryable());
    }

    #[test]
    fn test_wallet_kinds() {
        let locked: EscrowError = AuthError::Locked.into();
        assert_eq!(locked.kind(), ErrorKind::Locked);
        let entropy = EscrowError::from(WalletError::Entropy("no rng".into()));
        assert_eq!(entropy.kind(), ErrorKind::Entropy);
    }

    #[test]
    fn test_reject_reason_wire_format() {
        let json = serde_json::to_value(RejectReason::InsufficientFunds {
            required: 10,
            available: 3,
        })
        .unwrap();
        assert_eq!(json["reason"], "insufficient_funds");
        assert_eq!(json["required"], 10);
    }
}
