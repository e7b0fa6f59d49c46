//! Ledger fingerprint hash type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// A 32-byte ledger fingerprint or intermediate hash-chain value.
///
/// Serialized as 64 lowercase hex digits so snapshot artifacts stay readable.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LedgerHash([u8; 32]);

impl LedgerHash {
    /// The empty starting value of a hash chain.
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Parse a hash from 64 hex digits (an optional `0x` prefix is accepted).
    pub fn from_hex(raw: &str) -> Result<Self, TypesError> {
        let digits = raw.strip_prefix("0x").unwrap_or(raw);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| TypesError::InvalidHash(format!("{raw}: {e}")))?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for LedgerHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerHash({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for LedgerHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for LedgerHash {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for LedgerHash {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<LedgerHash> for String {
    fn from(hash: LedgerHash) -> Self {
        hash.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let hash = LedgerHash::new([0xab; 32]);
        let parsed = LedgerHash::from_hex(&hash.to_string()).unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn accepts_0x_prefix() {
        let hash = LedgerHash::new([0x01; 32]);
        let parsed: LedgerHash = format!("0x{hash}").parse().unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn rejects_short_hex() {
        assert!(LedgerHash::from_hex("abcd").is_err());
    }

    #[test]
    fn default_is_zero() {
        assert!(LedgerHash::default().is_zero());
    }
}
