//! Network parameters advertised by a proxy and the big-integer quantities
//! they carry.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A proxy asking for a minimum proof value above `2^MAX_THRESHOLD_BITS` is
/// refused before any mining starts.
pub const MAX_THRESHOLD_BITS: u32 = 20;

/// The largest minimum threshold a probe agrees to mine for (`2^20`).
#[must_use]
pub fn threshold_ceiling() -> BigUint {
    BigUint::from(1u8) << MAX_THRESHOLD_BITS
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("quantity is empty")]
    Empty,
    #[error("invalid quantity {0:?}")]
    Invalid(String),
}

/// Parse an unsigned big integer written either as `0x`-prefixed hex or as
/// plain decimal.
pub fn parse_quantity(raw: &str) -> Result<BigUint, QuantityError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(QuantityError::Empty);
    }

    let (digits, radix) = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => (hex, 16),
        None => (trimmed, 10),
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(QuantityError::Invalid(trimmed.to_string()));
    }

    BigUint::parse_bytes(digits.as_bytes(), radix)
        .ok_or_else(|| QuantityError::Invalid(trimmed.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThresholdError {
    #[error("unparsable minimum threshold: {0}")]
    Unparsable(#[from] QuantityError),
    #[error("minimum threshold {threshold} exceeds the 2^20 ceiling")]
    TooHigh { threshold: BigUint },
}

/// Parameters returned by `net_get`.
///
/// Only `minimumThreshold` is mandatory on the wire; the addresses and chain
/// id default to empty strings, which the miner treats as zero words. The older
/// `*ZeroHex` / `chainIdString` field names are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParams {
    #[serde(rename = "chainId", alias = "chainIdString", default)]
    pub chain_id: String,
    #[serde(rename = "contractAddress", alias = "contractZeroHex", default)]
    pub contract_address: String,
    #[serde(rename = "receiverAddress", alias = "receiverZeroHex", default)]
    pub receiver_address: String,
    #[serde(rename = "minimumThreshold", alias = "minimumZeroHex")]
    pub minimum_threshold: String,
}

impl NetworkParams {
    pub fn threshold(&self) -> Result<BigUint, QuantityError> {
        parse_quantity(&self.minimum_threshold)
    }

    /// Parse the minimum threshold and enforce the `2^20` ceiling.
    ///
    /// A threshold equal to the ceiling is accepted; anything strictly above
    /// it is rejected.
    pub fn checked_threshold(&self) -> Result<BigUint, ThresholdError> {
        let threshold = self.threshold()?;
        if threshold > threshold_ceiling() {
            return Err(ThresholdError::TooHigh { threshold });
        }
        Ok(threshold)
    }
}
