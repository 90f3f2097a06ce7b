//! Redeem link encoding and parsing
//!
//! A redeem link is a deep link whose `startapp` query value carries three
//! `__`-delimited fields:
//!
//! ```text
//! https://t.me/InstantSendAppBot/InstantSendApp?startapp=<secret>__<sender>__<SYMBOL>
//! ```
//!
//! The link is a bearer capability: whoever holds it can redeem the escrow.
//! It is never logged, and `Debug` on [`RedeemLink`] hides the secret.
//!
//! # Flow
//!
//! ## Sender
//!
//! ```ignore
//! let link = RedeemLink::new(secret, sender_address, "SOL")?;
//! let shareable = link.encode(&config.link_prefix)?;
//! ```
//!
//! ## Redeemer
//!
//! ```ignore
//! let link = RedeemLink::parse(&shareable)?;
//! engine.redeem_escrow(&key_pair, &asset, &link.sender(), link.secret()).await?;
//! ```

use std::fmt;
use std::str::FromStr;
use url::Url;
use wallet::Address;
use zeroize::Zeroizing;

use crate::commitment::EscrowSecret;
use crate::error::EscrowError;

pub const PRODUCTION_LINK_PREFIX: &str = "https://t.me/InstantSendAppBot/InstantSendApp";
pub const DEVELOPMENT_LINK_PREFIX: &str = "https://t.me/InstantSendTestBot/InstantSendLocalTest";

/// Query parameter holding the encoded fields
pub const START_PARAM: &str = "startapp";
pub const FIELD_DELIMITER: &str = "__";

/// Decoded contents of a redeem link
#[derive(Clone, PartialEq, Eq)]
pub struct RedeemLink {
    secret: EscrowSecret,
    sender: Address,
    asset_symbol: String,
}

impl RedeemLink {
    pub fn new(
        secret: EscrowSecret,
        sender: Address,
        asset_symbol: impl Into<String>,
    ) -> Result<Self, EscrowError> {
        let asset_symbol = asset_symbol.into();
        validate_symbol(&asset_symbol)?;
        Ok(Self {
            secret,
            sender,
            asset_symbol,
        })
    }

    pub fn secret(&self) -> &EscrowSecret {
        &self.secret
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn asset_symbol(&self) -> &str {
        &self.asset_symbol
    }

    /// `secret__sender__SYMBOL`, the value of the `startapp` parameter
    pub fn start_param(&self) -> Zeroizing<String> {
        Zeroizing::new(format!(
            "{}{delim}{}{delim}{}",
            self.secret.as_str(),
            self.sender,
            self.asset_symbol,
            delim = FIELD_DELIMITER
        ))
    }

    /// Full shareable URL under `prefix`
    pub fn encode(&self, prefix: &str) -> Result<Zeroizing<String>, EscrowError> {
        let start_param = self.start_param();
        let url = Url::parse_with_params(prefix, &[(START_PARAM, start_param.as_str())])
            .map_err(|e| EscrowError::MalformedLink(format!("invalid link prefix: {}", e)))?;
        Ok(Zeroizing::new(url.into()))
    }

    /// Inverse of [`RedeemLink::encode`]. Any prefix is accepted; only the
    /// `startapp` value matters.
    pub fn parse(link: &str) -> Result<Self, EscrowError> {
        let url = Url::parse(link.trim())
            .map_err(|_| EscrowError::MalformedLink("not a URL".to_string()))?;

        let start_param = url
            .query_pairs()
            .find(|(key, _)| key == START_PARAM)
            .map(|(_, value)| Zeroizing::new(value.into_owned()))
            .ok_or_else(|| EscrowError::MalformedLink(format!("missing {} parameter", START_PARAM)))?;

        Self::from_start_param(&start_param)
    }

    /// Parse the bare start parameter, as handed to a mini app on launch
    pub fn from_start_param(value: &str) -> Result<Self, EscrowError> {
        let fields: Vec<&str> = value.split(FIELD_DELIMITER).collect();
        let [secret, sender, symbol] = fields.as_slice() else {
            return Err(EscrowError::MalformedLink(format!(
                "expected 3 fields, found {}",
                fields.len()
            )));
        };
        if secret.is_empty() || sender.is_empty() || symbol.is_empty() {
            return Err(EscrowError::MalformedLink("empty field".to_string()));
        }

        let secret = EscrowSecret::new(secret)
            .map_err(|_| EscrowError::MalformedLink("invalid secret field".to_string()))?;
        let sender: Address = sender
            .parse()
            .map_err(|_| EscrowError::MalformedLink("invalid sender field".to_string()))?;
        validate_symbol(symbol)?;

        Ok(Self {
            secret,
            sender,
            asset_symbol: symbol.to_string(),
        })
    }
}

impl FromStr for RedeemLink {
    type Err = EscrowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for RedeemLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedeemLink")
            .field("secret", &self.secret)
            .field("sender", &self.sender)
            .field("asset_symbol", &self.asset_symbol)
            .finish()
    }
}

fn validate_symbol(symbol: &str) -> Result<(), EscrowError> {
    if symbol.is_empty() || !symbol.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(EscrowError::MalformedLink(format!(
            "invalid asset symbol '{}'",
            symbol
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENDER: &str = "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU";

    fn sender() -> Address {
        SENDER.parse().unwrap()
    }

    #[test]
    fn test_encode_format() {
        let link = RedeemLink::new(EscrowSecret::new("abc123").unwrap(), sender(), "SOL").unwrap();
        assert_eq!(
            link.encode(PRODUCTION_LINK_PREFIX).unwrap().as_str(),
            format!(
                "https://t.me/InstantSendAppBot/InstantSendApp?startapp=abc123__{}__SOL",
                SENDER
            )
        );
    }

    #[test]
    fn test_round_trip_both_symbols() {
        for symbol in ["SOL", "USDC"] {
            let link =
                RedeemLink::new(EscrowSecret::new("k3y9Zq").unwrap(), sender(), symbol).unwrap();
            let encoded = link.encode(DEVELOPMENT_LINK_PREFIX).unwrap();
            let decoded = RedeemLink::parse(&encoded).unwrap();
            assert_eq!(decoded, link);
            assert_eq!(decoded.secret().as_str(), "k3y9Zq");
            assert_eq!(decoded.sender(), sender());
            assert_eq!(decoded.asset_symbol(), symbol);
        }
    }

    #[test]
    fn test_missing_symbol_is_malformed() {
        let link = format!("{}?startapp=abc123__{}", PRODUCTION_LINK_PREFIX, SENDER);
        assert!(matches!(
            RedeemLink::parse(&link),
            Err(EscrowError::MalformedLink(_))
        ));
    }

    #[test]
    fn test_malformed_shapes() {
        let cases = [
            "not a url".to_string(),
            PRODUCTION_LINK_PREFIX.to_string(),
            format!("{}?other=abc__{}__SOL", PRODUCTION_LINK_PREFIX, SENDER),
            format!("{}?startapp=__{}__SOL", PRODUCTION_LINK_PREFIX, SENDER),
            format!("{}?startapp=abc__{}__", PRODUCTION_LINK_PREFIX, SENDER),
            format!("{}?startapp=abc__{}__SOL__x", PRODUCTION_LINK_PREFIX, SENDER),
            format!("{}?startapp=abc__notbase58!__SOL", PRODUCTION_LINK_PREFIX),
            format!("{}?startapp=abc_{}_SOL", PRODUCTION_LINK_PREFIX, SENDER),
        ];
        for case in cases {
            assert!(
                matches!(RedeemLink::parse(&case), Err(EscrowError::MalformedLink(_))),
                "accepted {}",
                case
            );
        }
    }

    #[test]
    fn test_padded_sender_is_malformed() {
        for value in [
            format!("abc123__ {}__SOL", SENDER),
            format!("abc123__{} __SOL", SENDER),
        ] {
            assert!(matches!(
                RedeemLink::from_start_param(&value),
                Err(EscrowError::MalformedLink(_))
            ));
        }
    }

    #[test]
    fn test_bare_start_param() {
        let value = format!("abc123__{}__USDC", SENDER);
        let link = RedeemLink::from_start_param(&value).unwrap();
        assert_eq!(link.start_param().as_str(), value);
    }

    #[test]
    fn test_debug_hides_secret() {
        let link = RedeemLink::new(EscrowSecret::new("hunter2").unwrap(), sender(), "SOL").unwrap();
        let shown = format!("{:?}", link);
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains(SENDER));
    }

    #[test]
    fn test_bad_symbol_refused_at_build() {
        assert!(RedeemLink::new(EscrowSecret::new("abc").unwrap(), sender(), "S__L").is_err());
        assert!(RedeemLink::new(EscrowSecret::new("abc").unwrap(), sender(), "").is_err());
    }
}
