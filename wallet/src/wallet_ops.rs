/// Wallet lifecycle operations
///
/// The only place in the crate that generates or imports key material.
use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::keys::{KeyManager, SeedPhrase};
use crate::storage::{WalletRecord, WalletStore, DEFAULT_SLOT};

/// Create a new wallet with a generated seed phrase
pub fn create_wallet(
    store: &WalletStore,
    user_id: Option<&str>,
    config: &WalletConfig,
) -> Result<WalletRecord, WalletError> {
    if store.load_wallet(user_id)?.is_some() {
        return Err(WalletError::WalletExists(
            user_id.unwrap_or(DEFAULT_SLOT).to_string(),
        ));
    }

    let seed_phrase = KeyManager::create_seed_phrase()?;
    let record = build_record(user_id, &seed_phrase, config)?;
    store.set_wallet(&record)?;

    log::info!("Created wallet {}", record.public_key);
    Ok(record)
}

/// Recover a wallet from an existing phrase, replacing whatever is stored
pub fn import_wallet(
    store: &WalletStore,
    user_id: Option<&str>,
    words: &str,
    config: &WalletConfig,
) -> Result<WalletRecord, WalletError> {
    let seed_phrase = SeedPhrase::parse(words)?;
    let record = build_record(user_id, &seed_phrase, config)?;

    if let Some(previous) = store.load_wallet(user_id)? {
        if previous.public_key != record.public_key {
            log::warn!(
                "Import replaces wallet {} with {}",
                previous.public_key,
                record.public_key
            );
        }
    }

    store.set_wallet(&record)?;
    log::info!("Imported wallet {}", record.public_key);
    Ok(record)
}

/// Return the stored wallet, creating one on first use
pub fn load_or_create_wallet(
    store: &WalletStore,
    user_id: Option<&str>,
    config: &WalletConfig,
) -> Result<WalletRecord, WalletError> {
    match store.load_wallet(user_id)? {
        Some(record) => Ok(record),
        None => create_wallet(store, user_id, config),
    }
}

fn build_record(
    user_id: Option<&str>,
    seed_phrase: &SeedPhrase,
    config: &WalletConfig,
) -> Result<WalletRecord, WalletError> {
    let key_pair =
        KeyManager::derive_key_pair(config.coin_type, seed_phrase, config.account_index)?;

    Ok(WalletRecord::new(
        user_id.map(str::to_string),
        seed_phrase,
        &key_pair,
        config.coin_type,
        config.account_index,
    ))
}
