use std::sync::Arc;

use crate::address::Address;
use crate::auth::{AuthManager, AuthState};
use crate::clock::Clock;
use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::signer::WalletSigner;
use crate::storage::{FileStore, KeyValueStore, WalletRecord, WalletStore};
use crate::wallet_ops;

/// Entry point tying the store, the session gate and the signer together.
///
/// All three share one `KeyValueStore`, so wallets, credentials and session
/// stamps for a device live side by side.
pub struct WalletManager {
    pub config: WalletConfig,
    pub wallets: Arc<WalletStore>,
    pub auth: Arc<AuthManager>,
    store: Arc<dyn KeyValueStore>,
}

impl WalletManager {
    /// File-backed manager rooted at `config.wallet_dir`
    pub fn new(config: WalletConfig) -> Self {
        let store: Arc<dyn KeyValueStore> =
            Arc::new(FileStore::new_with_base_dir(config.wallet_dir.clone()));
        Self::new_with_store(store, config)
    }

    pub fn new_with_store(store: Arc<dyn KeyValueStore>, config: WalletConfig) -> Self {
        let auth = Arc::new(AuthManager::from_config(store.clone(), &config));
        Self::assemble(store, config, auth)
    }

    pub fn new_with_clock(
        store: Arc<dyn KeyValueStore>,
        config: WalletConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let auth = Arc::new(AuthManager::with_clock(
            store.clone(),
            config.session_ttl,
            clock,
        ));
        Self::assemble(store, config, auth)
    }

    fn assemble(store: Arc<dyn KeyValueStore>, config: WalletConfig, auth: Arc<AuthManager>) -> Self {
        Self {
            config,
            wallets: Arc::new(WalletStore::new(store.clone())),
            auth,
            store,
        }
    }

    /// The underlying store, for components that keep their own namespace
    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        self.store.clone()
    }

    pub fn create_wallet(&self, user_id: Option<&str>) -> Result<WalletRecord, WalletError> {
        wallet_ops::create_wallet(&self.wallets, user_id, &self.config)
    }

    pub fn import_wallet(&self, user_id: Option<&str>, words: &str) -> Result<WalletRecord, WalletError> {
        wallet_ops::import_wallet(&self.wallets, user_id, words, &self.config)
    }

    pub fn load_or_create_wallet(&self, user_id: Option<&str>) -> Result<WalletRecord, WalletError> {
        wallet_ops::load_or_create_wallet(&self.wallets, user_id, &self.config)
    }

    /// Remove the wallet and its session. The credential is kept so a
    /// re-imported key still asks for the same password.
    pub fn clear_wallet(&self, user_id: Option<&str>) -> Result<bool, WalletError> {
        if let Some(record) = self.wallets.load_wallet(user_id)? {
            self.auth.clear_session(&record.public_key.to_string())?;
        }
        self.wallets.clear_wallet(user_id)
    }

    pub fn signer(&self) -> WalletSigner {
        WalletSigner::new(self.wallets.clone(), self.auth.clone())
    }

    pub fn auth_state(&self, user_id: Option<&str>) -> Result<AuthState, WalletError> {
        let address = self.public_key(user_id)?;
        Ok(self.auth.state(&address.to_string()))
    }

    pub fn create_password(&self, user_id: Option<&str>, password: &str) -> Result<bool, WalletError> {
        let address = self.public_key(user_id)?;
        Ok(self.auth.create_password(&address.to_string(), password))
    }

    pub fn login(&self, user_id: Option<&str>, password: &str) -> Result<bool, WalletError> {
        let address = self.public_key(user_id)?;
        Ok(self.auth.login(&address.to_string(), password))
    }

    pub fn public_key(&self, user_id: Option<&str>) -> Result<Address, WalletError> {
        self.signer().public_key(user_id)
    }
}
