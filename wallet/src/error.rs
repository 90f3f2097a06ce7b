use thiserror::Error;

use crate::auth::AuthState;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Wallet already exists: {0}")]
    WalletExists(String),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Entropy source unavailable: {0}")]
    Entropy(String),

    #[error("Unsupported coin type: {0}")]
    UnsupportedCoinType(u32),

    #[error("Invalid derivation path: {0}")]
    InvalidDerivationPath(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage lock poisoned")]
    Poisoned,

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the password-gated session.
///
/// Display strings stay generic: no hash material or comparison detail
/// is ever attached.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Password does not match")]
    Mismatch,

    #[error("Session is locked")]
    Locked,

    #[error("Operation not valid in state {0:?}")]
    InvalidState(AuthState),

    #[error("Credential store error: {0}")]
    CredentialStore(#[from] StorageError),

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}
