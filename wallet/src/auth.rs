//! Password-gated sessions
//!
//! Each identity (in practice the wallet's base58 public key) cycles through
//! three states:
//!
//! - `NoPassword`: no credential was ever stored; the holder is let through
//! - `Locked`: a credential exists and no session is within the TTL
//! - `Unlocked`: `now - unlocked_at < session_ttl`
//!
//! Expiry is evaluated lazily on every query; nothing runs in the background.
//! The session stamp is persisted so a restart inside the TTL resumes
//! `Unlocked` without prompting.

use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::WalletConfig;
use crate::error::{AuthError, StorageError};
use crate::storage::{
    load_json, save_json, CredentialRecord, KeyValueStore, SessionRecord, CREDENTIALS_NAMESPACE,
    SESSIONS_NAMESPACE,
};

const SALT_BYTES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    NoPassword,
    Locked,
    Unlocked,
}

/// Snapshot of one identity's session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub identity: String,
    pub unlocked_at: Option<DateTime<Utc>>,
    pub password_set: bool,
}

pub struct AuthManager {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    session_ttl: Duration,
    hasher: Argon2<'static>,
}

impl AuthManager {
    pub fn new(store: Arc<dyn KeyValueStore>, session_ttl: Duration) -> Self {
        Self::with_clock(store, session_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn KeyValueStore>,
        session_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            clock,
            session_ttl,
            hasher: Argon2::default(),
        }
    }

    pub fn from_config(store: Arc<dyn KeyValueStore>, config: &WalletConfig) -> Self {
        Self::new(store, config.session_ttl)
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// A failed lookup counts as "no password": an unreadable credential store
    /// drops the holder into first-run state rather than a hard lock.
    pub fn has_password(&self, identity: &str) -> bool {
        match self.load_credential(identity) {
            Ok(credential) => credential.is_some(),
            Err(e) => {
                log::warn!("Credential lookup failed for {}: {}", identity, e);
                false
            }
        }
    }

    pub fn state(&self, identity: &str) -> AuthState {
        if !self.has_password(identity) {
            AuthState::NoPassword
        } else if self.is_session_valid(identity) {
            AuthState::Unlocked
        } else {
            AuthState::Locked
        }
    }

    /// `now - unlocked_at < session_ttl`; read-only
    pub fn is_session_valid(&self, identity: &str) -> bool {
        let session: Option<SessionRecord> =
            match load_json(self.store.as_ref(), SESSIONS_NAMESPACE, identity) {
                Ok(session) => session,
                Err(e) => {
                    log::warn!("Session lookup failed for {}: {}", identity, e);
                    return false;
                }
            };

        match session {
            Some(session) => {
                let elapsed = self.clock.now() - session.unlocked_at;
                elapsed >= Duration::zero() && elapsed < self.session_ttl
            }
            None => false,
        }
    }

    /// Whether the holder may use the wallet right now
    pub fn is_authenticated(&self, identity: &str) -> bool {
        matches!(
            self.state(identity),
            AuthState::NoPassword | AuthState::Unlocked
        )
    }

    pub fn require_unlocked(&self, identity: &str) -> Result<(), AuthError> {
        if self.is_authenticated(identity) {
            Ok(())
        } else {
            Err(AuthError::Locked)
        }
    }

    pub fn session(&self, identity: &str) -> AuthSession {
        let unlocked_at = load_json::<SessionRecord>(self.store.as_ref(), SESSIONS_NAMESPACE, identity)
            .ok()
            .flatten()
            .map(|s| s.unlocked_at);

        AuthSession {
            identity: identity.to_string(),
            unlocked_at,
            password_set: self.has_password(identity),
        }
    }

    /// Store the first password. Returns false if one already exists or the
    /// write fails. Confirm-password checks are the caller's job.
    pub fn create_password(&self, identity: &str, password: &str) -> bool {
        match self.try_create_password(identity, password) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Password creation failed for {}: {}", identity, e);
                false
            }
        }
    }

    pub fn try_create_password(&self, identity: &str, password: &str) -> Result<(), AuthError> {
        let state = self.state(identity);
        if state != AuthState::NoPassword {
            return Err(AuthError::InvalidState(state));
        }

        let password_hash = self.hash_password(password)?;
        let credential = CredentialRecord {
            password_hash,
            created_at: self.clock.now(),
        };
        save_json(self.store.as_ref(), CREDENTIALS_NAMESPACE, identity, &credential)?;
        self.stamp_session(identity)?;

        log::info!("Password created for {}, session unlocked", identity);
        Ok(())
    }

    /// Check `password` and unlock. A mismatch leaves the identity `Locked`.
    pub fn login(&self, identity: &str, password: &str) -> bool {
        match self.try_login(identity, password) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Login failed for {}: {}", identity, e);
                false
            }
        }
    }

    pub fn try_login(&self, identity: &str, password: &str) -> Result<(), AuthError> {
        let credential = self
            .load_credential(identity)?
            .ok_or(AuthError::InvalidState(AuthState::NoPassword))?;

        let parsed = PasswordHash::new(&credential.password_hash)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;

        // password-hash compares the derived output in constant time
        match self.hasher.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => {
                self.stamp_session(identity)?;
                log::info!("Session unlocked for {}", identity);
                Ok(())
            }
            Err(password_hash::Error::Password) => {
                self.store.delete(SESSIONS_NAMESPACE, identity)?;
                Err(AuthError::Mismatch)
            }
            Err(e) => Err(AuthError::Hashing(e.to_string())),
        }
    }

    /// Back to `Locked` (or `NoPassword` when no credential exists)
    pub fn clear_session(&self, identity: &str) -> Result<(), AuthError> {
        self.store.delete(SESSIONS_NAMESPACE, identity)?;
        log::info!("Session cleared for {}", identity);
        Ok(())
    }

    fn load_credential(&self, identity: &str) -> Result<Option<CredentialRecord>, StorageError> {
        load_json(self.store.as_ref(), CREDENTIALS_NAMESPACE, identity)
    }

    fn stamp_session(&self, identity: &str) -> Result<(), AuthError> {
        let session = SessionRecord {
            unlocked_at: self.clock.now(),
        };
        save_json(self.store.as_ref(), SESSIONS_NAMESPACE, identity, &session)?;
        Ok(())
    }

    fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let mut salt = [0u8; SALT_BYTES];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt).map_err(|e| AuthError::Hashing(e.to_string()))?;

        let hash = self
            .hasher
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;

        Ok(hash.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;

    fn manager() -> (AuthManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = AuthManager::with_clock(
            Arc::new(MemoryStore::new()),
            Duration::minutes(10),
            clock.clone(),
        );
        (manager, clock)
    }

    #[test]
    fn test_first_sight_is_no_password() {
        let (auth, _) = manager();
        assert_eq!(auth.state("alice"), AuthState::NoPassword);
        assert!(auth.is_authenticated("alice"));
        assert!(!auth.is_session_valid("alice"));
    }

    #[test]
    fn test_hash_is_salted_phc() {
        let (auth, _) = manager();
        let a = auth.hash_password("pw").unwrap();
        let b = auth.hash_password("pw").unwrap();
        assert!(a.starts_with("$argon2id$"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_future_stamp_is_not_valid() {
        let (auth, clock) = manager();
        assert!(auth.create_password("alice", "pw"));
        clock.advance(Duration::minutes(-5));
        assert!(!auth.is_session_valid("alice"));
    }
}
