//! Account and contract address type with `0x` prefix.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// A 20-byte account or contract address.
///
/// Rendered as `0x` followed by 40 lowercase hex digits. Parsing accepts any
/// letter case so addresses copied from checksummed sources compare equal.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    /// The standard prefix for all rendered addresses.
    pub const PREFIX: &'static str = "0x";

    /// The reserved system owner. Holds un-issued global tokens and stands in
    /// for "no owner" on records that carry an optional owner.
    pub const ZERO: Self = Self([0u8; 20]);

    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Parse an address from its `0x`-prefixed hex form.
    pub fn parse(raw: &str) -> Result<Self, TypesError> {
        let digits = raw
            .strip_prefix(Self::PREFIX)
            .or_else(|| raw.strip_prefix("0X"))
            .ok_or_else(|| TypesError::InvalidAddress(format!("{raw}: missing 0x prefix")))?;
        if digits.len() != 40 {
            return Err(TypesError::InvalidAddress(format!(
                "{raw}: expected 40 hex digits, got {}",
                digits.len()
            )));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| TypesError::InvalidAddress(format!("{raw}: {e}")))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_roundtrip() {
        let raw = "0x00000000000000000000000000000000000000aa";
        let addr = Address::parse(raw).unwrap();
        assert_eq!(addr.to_string(), raw);
    }

    #[test]
    fn parse_is_case_insensitive() {
        let lower = Address::parse("0xabcdef0000000000000000000000000000000001").unwrap();
        let upper = Address::parse("0xABCDEF0000000000000000000000000000000001").unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(Address::parse("abcdef0000000000000000000000000000000001").is_err());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Address::parse("0xabcd").is_err());
    }

    #[test]
    fn rejects_non_hex() {
        assert!(Address::parse("0xzzcdef0000000000000000000000000000000001").is_err());
    }

    #[test]
    fn zero_is_zero() {
        assert!(Address::ZERO.is_zero());
        assert_eq!(
            Address::ZERO.to_string(),
            "0x0000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn serde_uses_hex_string() {
        let addr = Address::new([0x11; 20]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0x1111111111111111111111111111111111111111\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
