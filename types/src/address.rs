//! Candidate proxy addresses.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Host and optional path of a candidate proxy, as published by the
/// candidate list (e.g. `proxy.example.net` or `example.net/ws`).
///
/// The value is opaque to the prober apart from trimming surrounding
/// whitespace and a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProxyAddress(String);

#[derive(Debug, Error)]
#[error("proxy address must not be empty")]
pub struct EmptyAddressError;

impl ProxyAddress {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyAddressError> {
        let value = value.into();
        let trimmed = value.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(EmptyAddressError);
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProxyAddress {
    type Error = EmptyAddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ProxyAddress {
    type Error = EmptyAddressError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProxyAddress> for String {
    fn from(value: ProxyAddress) -> Self {
        value.0
    }
}

impl fmt::Display for ProxyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
