//! Device wallet: seed phrases, Ed25519 keys, a key-value store for wallet
//! records and credentials, and a password-gated session in front of signing.

pub mod address;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod keys;
pub mod manager;
pub mod signer;
pub mod storage;
pub mod wallet_ops;

pub use address::Address;
pub use auth::{AuthManager, AuthSession, AuthState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::WalletConfig;
pub use error::{AuthError, StorageError, WalletError};
pub use keys::{verify_signature, KeyManager, KeyPair, SeedPhrase, SOLANA_COIN_TYPE};
pub use manager::WalletManager;
pub use signer::WalletSigner;
pub use storage::{FileStore, KeyValueStore, MemoryStore, WalletRecord, WalletStore};
