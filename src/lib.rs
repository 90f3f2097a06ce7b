//! Instant-Send: link-based escrow payments
//!
//! A sender locks funds in an escrow account whose address commits to a
//! random secret, then shares a deep link carrying that secret. Whoever opens
//! the link can redeem the funds to their own wallet; once the escrow
//! expires, the sender can reclaim it instead.
//!
//! # Architecture
//!
//! - **Wallet** (`wallet` crate): seed phrases, Ed25519 keys, stored records
//!   and a password-gated session in front of signing
//! - **Escrow Engine**: create/redeem/reclaim against a [`LedgerClient`]
//! - **Redeem Links**: `startapp=secret__sender__SYMBOL` deep links
//! - **Ledger**: in-process devnet or a JSON-over-HTTP client
//!
//! # Example
//!
//! ```ignore
//! use instant_send::{EscrowConfig, EscrowEngine, HttpLedgerClient};
//! use std::sync::Arc;
//!
//! let config = EscrowConfig::from_env();
//! let ledger = Arc::new(HttpLedgerClient::from_config(&config)?);
//! let engine = EscrowEngine::new(ledger, config);
//!
//! // Sender
//! let created = engine.send(&sender_keys, "SOL", 1_000_000_000).await?;
//!
//! // Redeemer, given created.url
//! let tx_id = engine.receive(&redeemer_keys, &url).await?;
//! ```

// Public modules
pub mod asset;
pub mod commitment;
pub mod config;
pub mod error;
pub mod escrow;
pub mod ledger;
pub mod link;
pub mod pending;
pub mod transaction;

// Re-exports for convenience
pub use asset::{format_amount, parse_amount, AssetClass, AssetRegistry, TokenInfo};
pub use commitment::{derive_escrow_address, generate_secret, EscrowSecret, SecretCommitment};
pub use config::EscrowConfig;
pub use error::{ErrorKind, EscrowError, LedgerError, RejectReason};
pub use escrow::{CreatedEscrow, EscrowEngine};
pub use ledger::{
    EscrowAccount, Fault, HttpLedgerClient, InMemoryLedger, LedgerClient, TransactionStatus,
};
pub use link::RedeemLink;
pub use pending::{PendingSend, PendingSends, SubmissionState};
pub use transaction::{Instruction, SignedTransaction, Transaction, TransactionId};

pub type Result<T> = std::result::Result<T, EscrowError>;
