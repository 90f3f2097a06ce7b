//! Asset classes, the token registry, and decimal amount handling

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use wallet::Address;

use crate::error::EscrowError;

/// USDC mint on devnet, `4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU`
pub const DEVNET_USDC_MINT: Address = Address::new([
    0x3b, 0x44, 0x2c, 0xb3, 0x91, 0x21, 0x57, 0xf1, 0x3a, 0x93, 0x3d, 0x01, 0x34, 0x28, 0x2d, 0x03,
    0x2b, 0x5f, 0xfe, 0xcd, 0x01, 0xa2, 0xdb, 0xf1, 0xb7, 0x79, 0x06, 0x08, 0xdf, 0x00, 0x2e, 0xa7,
]);

pub const NATIVE_SYMBOL: &str = "SOL";
pub const NATIVE_DECIMALS: u8 = 9;
pub const USDC_SYMBOL: &str = "USDC";
pub const USDC_DECIMALS: u8 = 6;

/// The ledger's base coin, or a token identified by its mint
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "mint", rename_all = "snake_case")]
pub enum AssetClass {
    Native,
    Fungible(Address),
}

impl AssetClass {
    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native)
    }

    /// Bytes mixed into escrow address derivation
    pub fn tag_bytes(&self) -> Vec<u8> {
        match self {
            Self::Native => vec![0],
            Self::Fungible(mint) => {
                let mut bytes = Vec::with_capacity(1 + Address::LEN);
                bytes.push(1);
                bytes.extend_from_slice(mint.as_bytes());
                bytes
            }
        }
    }
}

/// `native` or `fungible:<mint>`, the form used in query strings
impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => f.write_str("native"),
            Self::Fungible(mint) => write!(f, "fungible:{}", mint),
        }
    }
}

impl FromStr for AssetClass {
    type Err = EscrowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            None if s == "native" => Ok(Self::Native),
            Some(("fungible", mint)) => {
                let mint = mint
                    .parse()
                    .map_err(|_| EscrowError::UnknownAsset(s.to_string()))?;
                Ok(Self::Fungible(mint))
            }
            _ => Err(EscrowError::UnknownAsset(s.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub asset_class: AssetClass,
    pub decimals: u8,
}

impl TokenInfo {
    pub fn new(symbol: impl Into<String>, asset_class: AssetClass, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            asset_class,
            decimals,
        }
    }
}

/// Symbols a link may name, and what they resolve to
#[derive(Clone, Debug)]
pub struct AssetRegistry {
    tokens: Vec<TokenInfo>,
}

impl AssetRegistry {
    pub fn empty() -> Self {
        Self { tokens: Vec::new() }
    }

    /// Replaces any token already registered under the same symbol
    pub fn insert(&mut self, token: TokenInfo) {
        self.tokens.retain(|t| t.symbol != token.symbol);
        self.tokens.push(token);
    }

    pub fn by_symbol(&self, symbol: &str) -> Result<&TokenInfo, EscrowError> {
        self.tokens
            .iter()
            .find(|t| t.symbol == symbol)
            .ok_or_else(|| EscrowError::UnknownAsset(symbol.to_string()))
    }

    pub fn by_asset(&self, asset_class: &AssetClass) -> Option<&TokenInfo> {
        self.tokens.iter().find(|t| &t.asset_class == asset_class)
    }

    pub fn tokens(&self) -> &[TokenInfo] {
        &self.tokens
    }
}

impl Default for AssetRegistry {
    /// SOL and devnet USDC
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.insert(TokenInfo::new(NATIVE_SYMBOL, AssetClass::Native, NATIVE_DECIMALS));
        registry.insert(TokenInfo::new(
            USDC_SYMBOL,
            AssetClass::Fungible(DEVNET_USDC_MINT),
            USDC_DECIMALS,
        ));
        registry
    }
}

/// Convert a decimal amount such as `"1.25"` to base units without floats
pub fn parse_amount(text: &str, decimals: u8) -> Result<u64, EscrowError> {
    let invalid = || EscrowError::InvalidAmount(text.to_string());
    let text = text.trim();

    let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }
    if fraction.len() > decimals as usize {
        return Err(EscrowError::InvalidAmount(format!(
            "{} has more than {} decimal places",
            text, decimals
        )));
    }

    let scale = 10u64.checked_pow(decimals as u32).ok_or_else(invalid)?;
    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let fraction: u64 = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", fraction, width = decimals as usize);
        padded.parse().map_err(|_| invalid())?
    };

    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(invalid)
}

/// Inverse of [`parse_amount`], trailing zeros trimmed
pub fn format_amount(amount: u64, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let scale = 10u128.pow(decimals as u32);
    let whole = amount as u128 / scale;
    let fraction = amount as u128 % scale;
    if fraction == 0 {
        return whole.to_string();
    }
    let fraction = format!("{:0>width$}", fraction, width = decimals as usize);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}
