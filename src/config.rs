/// Escrow engine configuration from environment variables
///
/// Controls the ledger endpoint, the deep-link prefix redeem links are built
/// on, and how long a link stays redeemable.
use chrono::Duration;
use std::env;
use wallet::Address;

use crate::commitment::default_program_id;
use crate::link::{DEVELOPMENT_LINK_PREFIX, PRODUCTION_LINK_PREFIX};

const DEFAULT_LEDGER_URL: &str = "http://localhost:3030";
const DEFAULT_LEDGER_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ESCROW_TTL_SECS: i64 = 24 * 60 * 60;
const DEFAULT_LEDGER_FEE: u64 = 5_000;

#[derive(Clone, Debug)]
pub struct EscrowConfig {
    /// Ledger API base URL
    pub ledger_url: String,
    /// Per-request timeout; hitting it on a submission yields an unknown outcome
    pub ledger_timeout: std::time::Duration,
    /// Deep-link URL the `startapp` parameter is appended to
    pub link_prefix: String,
    /// Lifetime of a link created by `send`
    pub escrow_ttl: Duration,
    /// Native-asset fee per transaction, used for balance pre-checks
    pub ledger_fee: u64,
    /// Escrow program, mixed into every escrow address
    pub program_id: Address,
}

impl EscrowConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `LEDGER_URL`: ledger API endpoint (default `http://localhost:3030`)
    /// - `LEDGER_TIMEOUT_SECS`: request timeout (default 30)
    /// - `APP_ENV`: `development` selects the test bot's link prefix
    /// - `LINK_PREFIX`: overrides the link prefix outright
    /// - `ESCROW_TTL_SECS`: link lifetime (default 86400)
    /// - `LEDGER_FEE`: per-transaction fee in base units (default 5000)
    /// - `ESCROW_PROGRAM_ID`: base58 program address
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let ledger_url = env::var("LEDGER_URL").unwrap_or(defaults.ledger_url);
        log::info!("Ledger URL: {}", ledger_url);

        let ledger_timeout = std::time::Duration::from_secs(parse_var(
            "LEDGER_TIMEOUT_SECS",
            DEFAULT_LEDGER_TIMEOUT_SECS,
        ));

        let link_prefix = match env::var("LINK_PREFIX") {
            Ok(prefix) => prefix,
            Err(_) => link_prefix_for(&env::var("APP_ENV").unwrap_or_default()).to_string(),
        };
        log::info!("Redeem link prefix: {}", link_prefix);

        let ttl_secs = parse_var("ESCROW_TTL_SECS", DEFAULT_ESCROW_TTL_SECS);
        let escrow_ttl = if ttl_secs > 0 {
            Duration::seconds(ttl_secs)
        } else {
            log::warn!("ESCROW_TTL_SECS must be positive, using {}", DEFAULT_ESCROW_TTL_SECS);
            defaults.escrow_ttl
        };

        let ledger_fee = parse_var("LEDGER_FEE", DEFAULT_LEDGER_FEE);

        let program_id = match env::var("ESCROW_PROGRAM_ID") {
            Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
                log::warn!("Invalid ESCROW_PROGRAM_ID '{}' ({}), using default", raw, e);
                defaults.program_id
            }),
            Err(_) => defaults.program_id,
        };
        log::info!("Escrow program: {}", program_id);

        Self {
            ledger_url,
            ledger_timeout,
            link_prefix,
            escrow_ttl,
            ledger_fee,
            program_id,
        }
    }
}

/// Test bot for `development`, the production bot otherwise
pub fn link_prefix_for(app_env: &str) -> &'static str {
    if app_env.eq_ignore_ascii_case("development") {
        DEVELOPMENT_LINK_PREFIX
    } else {
        PRODUCTION_LINK_PREFIX
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Invalid {} '{}', defaulting to {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            ledger_url: DEFAULT_LEDGER_URL.to_string(),
            ledger_timeout: std::time::Duration::from_secs(DEFAULT_LEDGER_TIMEOUT_SECS),
            link_prefix: PRODUCTION_LINK_PREFIX.to_string(),
            escrow_ttl: Duration::seconds(DEFAULT_ESCROW_TTL_SECS),
            ledger_fee: DEFAULT_LEDGER_FEE,
            program_id: default_program_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EscrowConfig::default();
        assert_eq!(config.escrow_ttl, Duration::hours(24));
        assert_eq!(config.ledger_fee, 5_000);
        assert_eq!(config.link_prefix, PRODUCTION_LINK_PREFIX);
    }

    #[test]
    fn test_link_prefix_by_environment() {
        assert_eq!(link_prefix_for("development"), DEVELOPMENT_LINK_PREFIX);
        assert_eq!(link_prefix_for("Development"), DEVELOPMENT_LINK_PREFIX);
        assert_eq!(link_prefix_for("production"), PRODUCTION_LINK_PREFIX);
        assert_eq!(link_prefix_for(""), PRODUCTION_LINK_PREFIX);
    }
}
