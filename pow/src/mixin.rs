//! Proof-of-work for proxy tips.
//!
//! A network's mixin binds secrets to its chain id, contract and receiver.
//! A secret is worth `(2^256 - 1) / keccak256(mixin || keccak256(secret))`,
//! and a tip is a run of random secrets whose values sum to the unit price.

use std::sync::atomic::{AtomicBool, Ordering};

use num_bigint::BigUint;
use proxyprobe_types::{NetworkParams, QuantityError, parse_quantity};
use sha3::{Digest, Keccak256};
use thiserror::Error;

/// Value a tip must reach, in the units produced by [`Mixin::value_of`].
pub const DEFAULT_UNIT_PRICE: u64 = 100_000;

const WORD: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MixinError {
    #[error("invalid chain id {0:?}")]
    ChainId(String),
    #[error("invalid {field} {value:?}")]
    Address { field: &'static str, value: String },
}

#[must_use]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

fn left_pad(bytes: &[u8]) -> Option<[u8; WORD]> {
    if bytes.len() > WORD {
        return None;
    }
    let mut word = [0u8; WORD];
    word[WORD - bytes.len()..].copy_from_slice(bytes);
    Some(word)
}

fn address_word(field: &'static str, value: &str) -> Result<[u8; WORD], MixinError> {
    let invalid = || MixinError::Address {
        field,
        value: value.to_string(),
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok([0u8; WORD]);
    }
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(invalid)?;
    let bytes = hex::decode(digits).map_err(|_| invalid())?;
    left_pad(&bytes).ok_or_else(invalid)
}

fn chain_word(value: &str) -> Result<[u8; WORD], MixinError> {
    let invalid = || MixinError::ChainId(value.to_string());
    let chain_id = match parse_quantity(value) {
        Ok(chain_id) => chain_id,
        Err(QuantityError::Empty) => return Ok([0u8; WORD]),
        Err(QuantityError::Invalid(_)) => return Err(invalid()),
    };
    left_pad(&chain_id.to_bytes_be()).ok_or_else(invalid)
}

/// Per-network salt binding secrets to one chain, contract and receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mixin([u8; 32]);

impl Mixin {
    /// Empty fields count as zero words.
    pub fn from_params(params: &NetworkParams) -> Result<Self, MixinError> {
        let chain = chain_word(&params.chain_id)?;
        let contract_word = address_word("contract address", &params.contract_address)?;
        let receiver_word = address_word("receiver address", &params.receiver_address)?;

        let mut preimage = [0u8; WORD * 3];
        preimage[..WORD].copy_from_slice(&chain);
        preimage[WORD..WORD * 2].copy_from_slice(&contract_word);
        preimage[WORD * 2..].copy_from_slice(&receiver_word);
        Ok(Self(keccak256(&preimage)))
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// `(2^256 - 1) / keccak256(mixin || keccak256(secret))`.
    ///
    /// Smaller digests are rarer and therefore worth more.
    #[must_use]
    pub fn value_of(&self, secret: &[u8; 32]) -> BigUint {
        let proof = keccak256(secret);
        let mut preimage = [0u8; WORD * 2];
        preimage[..WORD].copy_from_slice(&self.0);
        preimage[WORD..].copy_from_slice(&proof);
        let digest = BigUint::from_bytes_be(&keccak256(&preimage));

        let max = BigUint::from_bytes_be(&[0xff; WORD]);
        if digest == BigUint::default() {
            return max;
        }
        max / digest
    }
}

/// Draw random secrets until their summed value reaches `price`.
///
/// Returns the secrets concatenated, or `None` once `cancel` is raised.
pub fn generate(mixin: &Mixin, price: &BigUint, cancel: &AtomicBool) -> Option<Vec<u8>> {
    let mut total = BigUint::default();
    let mut buffer = Vec::new();
    while total < *price {
        if cancel.load(Ordering::Relaxed) {
            return None;
        }
        let secret: [u8; 32] = rand::random();
        total += mixin.value_of(&secret);
        buffer.extend_from_slice(&secret);
    }
    Some(buffer)
}
