/// Wallet configuration from environment variables
///
/// Controls where wallet files live, which key is derived, and how long an
/// unlocked session lasts.
use bitcoin::bip32::DerivationPath;
use chrono::Duration;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::WalletError;
use crate::keys::{KeyManager, SOLANA_COIN_TYPE};

const DEFAULT_WALLET_DIR: &str = "./wallets";
const DEFAULT_SESSION_TTL_SECS: i64 = 3600;

#[derive(Clone, Debug)]
pub struct WalletConfig {
    /// Root directory for the file-backed store
    pub wallet_dir: PathBuf,
    /// SLIP-44 coin type
    pub coin_type: u32,
    /// Hardened account index in `m/44'/{coin}'/{account}'/0'`
    pub account_index: u32,
    /// How long a successful login keeps the wallet unlocked
    pub session_ttl: Duration,
}

impl WalletConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `WALLET_DIR`: storage root (default `./wallets`)
    /// - `COIN_TYPE`: SLIP-44 coin type (default 501)
    /// - `ACCOUNT_INDEX`: account to derive (default 0)
    /// - `SESSION_TTL_SECS`: session lifetime in seconds (default 3600)
    ///
    /// Unparseable values are logged and replaced by the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let wallet_dir = env::var("WALLET_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.wallet_dir);
        log::info!("Wallet directory: {}", wallet_dir.display());

        let coin_type = parse_var("COIN_TYPE", defaults.coin_type);
        let account_index = parse_var("ACCOUNT_INDEX", defaults.account_index);

        let ttl_secs = parse_var("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS);
        let session_ttl = if ttl_secs > 0 {
            Duration::seconds(ttl_secs)
        } else {
            log::warn!("SESSION_TTL_SECS must be positive, using {}", DEFAULT_SESSION_TTL_SECS);
            defaults.session_ttl
        };
        log::info!("Session TTL: {}s", session_ttl.num_seconds());

        Self {
            wallet_dir,
            coin_type,
            account_index,
            session_ttl,
        }
    }

    /// Returns: "m/44'/501'/0'/0'" for the default account
    pub fn derivation_path(&self) -> Result<DerivationPath, WalletError> {
        KeyManager::derivation_path(self.coin_type, self.account_index)
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
{
    match env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Invalid {} '{}', defaulting to {}", name, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            wallet_dir: PathBuf::from(DEFAULT_WALLET_DIR),
            coin_type: SOLANA_COIN_TYPE,
            account_index: 0,
            session_ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_targets_first_solana_account() {
        let config = WalletConfig::default();
        assert_eq!(config.coin_type, 501);
        assert_eq!(config.account_index, 0);
        assert_eq!(config.session_ttl, Duration::hours(1));
    }

    #[test]
    fn test_derivation_path() {
        let config = WalletConfig {
            account_index: 3,
            ..Default::default()
        };
        assert_eq!(
            config.derivation_path().unwrap().to_string(),
            "m/44'/501'/3'/0'"
        );
    }

    #[test]
    fn test_parse_var_falls_back() {
        env::set_var("WALLET_TEST_BAD_NUMBER", "not-a-number");
        assert_eq!(parse_var("WALLET_TEST_BAD_NUMBER", 7u32), 7);
        env::set_var("WALLET_TEST_GOOD_NUMBER", " 12 ");
        assert_eq!(parse_var("WALLET_TEST_GOOD_NUMBER", 7u32), 12);
        assert_eq!(parse_var("WALLET_TEST_UNSET_NUMBER", 9u32), 9);
    }
}
