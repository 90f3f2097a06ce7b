use chrono::{Duration, Utc};
use std::sync::Arc;

use tempfile::TempDir;
use wallet::error::StorageError;
use wallet::storage::{FileStore, KeyValueStore, MemoryStore};
use wallet::{AuthError, AuthManager, AuthState, ManualClock, WalletConfig, WalletError, WalletManager};

fn init_logger() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

fn manual_auth(ttl: Duration) -> (AuthManager, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let auth = AuthManager::with_clock(Arc::new(MemoryStore::new()), ttl, clock.clone());
    (auth, clock)
}

/// Store whose every read and write fails
struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn get(&self, _namespace: &str, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("disk gone".to_string()))
    }

    fn set(&self, _namespace: &str, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("disk gone".to_string()))
    }

    fn delete(&self, _namespace: &str, _key: &str) -> Result<bool, StorageError> {
        Err(StorageError::Unavailable("disk gone".to_string()))
    }

    fn keys(&self, _namespace: &str) -> Result<Vec<String>, StorageError> {
        Err(StorageError::Unavailable("disk gone".to_string()))
    }
}

#[test]
fn test_wrong_password_locks() {
    init_logger();
    let (auth, _) = manual_auth(Duration::hours(1));

    assert!(!auth.has_password("alice"));
    assert!(auth.create_password("alice", "pw1"));
    assert_eq!(auth.state("alice"), AuthState::Unlocked);

    assert!(!auth.login("alice", "pw2"));
    assert_eq!(auth.state("alice"), AuthState::Locked);
    assert!(!auth.is_authenticated("alice"));

    assert!(auth.login("alice", "pw1"));
    assert_eq!(auth.state("alice"), AuthState::Unlocked);
}

#[test]
fn test_session_expires_lazily() {
    init_logger();
    let (auth, clock) = manual_auth(Duration::minutes(30));

    assert!(auth.create_password("alice", "secret"));
    clock.advance(Duration::minutes(29));
    assert!(auth.is_session_valid("alice"));

    clock.advance(Duration::minutes(1));
    assert!(!auth.is_session_valid("alice"));
    assert_eq!(auth.state("alice"), AuthState::Locked);
    assert!(matches!(auth.require_unlocked("alice"), Err(AuthError::Locked)));

    assert!(auth.login("alice", "secret"));
    assert!(auth.is_session_valid("alice"));
}

#[test]
fn test_session_resumes_after_restart() -> anyhow::Result<()> {
    init_logger();
    let temp_dir = TempDir::new()?;
    let clock = Arc::new(ManualClock::new(Utc::now()));

    {
        let store = Arc::new(FileStore::new_with_base_dir(temp_dir.path().to_path_buf()));
        let auth = AuthManager::with_clock(store, Duration::hours(1), clock.clone());
        assert!(auth.create_password("alice", "pw"));
    }

    clock.advance(Duration::minutes(10));
    let store = Arc::new(FileStore::new_with_base_dir(temp_dir.path().to_path_buf()));
    let auth = AuthManager::with_clock(store, Duration::hours(1), clock.clone());
    assert_eq!(auth.state("alice"), AuthState::Unlocked);

    let stored = std::fs::read_to_string(temp_dir.path().join("credentials").join("alice.json"))?;
    assert!(!stored.contains("\"pw\""));
    assert!(stored.contains("$argon2id$"));
    Ok(())
}

#[test]
fn test_create_password_only_once() {
    init_logger();
    let (auth, _) = manual_auth(Duration::hours(1));

    assert!(auth.create_password("alice", "first"));
    assert!(!auth.create_password("alice", "second"));
    assert!(matches!(
        auth.try_create_password("alice", "second"),
        Err(AuthError::InvalidState(AuthState::Unlocked))
    ));
    assert!(auth.login("alice", "first"));
    assert!(!auth.login("alice", "second"));
}

#[test]
fn test_login_without_password_is_refused() {
    init_logger();
    let (auth, _) = manual_auth(Duration::hours(1));
    assert!(!auth.login("alice", "anything"));
    assert!(matches!(
        auth.try_login("alice", "anything"),
        Err(AuthError::InvalidState(AuthState::NoPassword))
    ));
}

#[test]
fn test_unreadable_store_means_no_password() {
    init_logger();
    let auth = AuthManager::new(Arc::new(BrokenStore), Duration::hours(1));

    assert!(!auth.has_password("alice"));
    assert_eq!(auth.state("alice"), AuthState::NoPassword);
    assert!(!auth.create_password("alice", "pw"));
    assert!(matches!(
        auth.try_login("alice", "pw"),
        Err(AuthError::CredentialStore(_))
    ));
}

#[test]
fn test_clear_session_relocks() {
    init_logger();
    let (auth, _) = manual_auth(Duration::hours(1));
    assert!(auth.create_password("alice", "pw"));
    auth.clear_session("alice").unwrap();
    assert_eq!(auth.state("alice"), AuthState::Locked);

    let session = auth.session("alice");
    assert!(session.password_set);
    assert!(session.unlocked_at.is_none());
}

#[test]
fn test_signer_refuses_while_locked() -> anyhow::Result<()> {
    init_logger();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let manager = WalletManager::new_with_clock(
        Arc::new(MemoryStore::new()),
        WalletConfig::default(),
        clock.clone(),
    );
    let record = manager.load_or_create_wallet(None)?;
    let signer = manager.signer();

    // no password yet: implicitly authenticated
    assert_eq!(signer.key_pair(None)?.public_key(), record.public_key);

    assert!(manager.create_password(None, "pw")?);
    clock.advance(Duration::hours(2));
    assert_eq!(manager.auth_state(None)?, AuthState::Locked);

    let err = signer.key_pair(None).unwrap_err();
    assert!(matches!(err, WalletError::Auth(AuthError::Locked)));

    assert!(manager.login(None, "pw")?);
    let (address, _signature) = signer.sign(None, b"payload")?;
    assert_eq!(address, record.public_key);
    Ok(())
}
