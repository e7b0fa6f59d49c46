//! The running hash.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

use mirror_types::{Address, LedgerHash};

type Blake2b256 = Blake2b<U32>;

/// `H <- blake2b-256(H || len(field) || field)`, starting from all zeroes.
///
/// The length prefix keeps adjacent fields from sliding into each other:
/// `("ab", "c")` and `("a", "bc")` produce different chains.
#[derive(Clone, Debug, Default)]
pub struct ChainHasher {
    state: [u8; 32],
}

impl ChainHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mix(&mut self, field: &[u8]) {
        let mut hasher = Blake2b256::new();
        hasher.update(self.state);
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field);
        self.state.copy_from_slice(&hasher.finalize());
    }

    pub fn mix_u64(&mut self, v: u64) {
        self.mix(&v.to_le_bytes());
    }

    pub fn mix_i64(&mut self, v: i64) {
        self.mix(&v.to_le_bytes());
    }

    pub fn mix_u32(&mut self, v: u32) {
        self.mix(&v.to_le_bytes());
    }

    pub fn mix_u16(&mut self, v: u16) {
        self.mix(&v.to_le_bytes());
    }

    pub fn mix_u8(&mut self, v: u8) {
        self.mix(&[v]);
    }

    pub fn mix_bool(&mut self, v: bool) {
        self.mix(&[u8::from(v)]);
    }

    pub fn mix_str(&mut self, s: &str) {
        self.mix(s.as_bytes());
    }

    pub fn mix_address(&mut self, addr: &Address) {
        self.mix(addr.as_bytes());
    }

    pub fn mix_hash(&mut self, hash: &LedgerHash) {
        self.mix(hash.as_bytes());
    }

    pub fn current(&self) -> LedgerHash {
        LedgerHash::new(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        assert_eq!(ChainHasher::new().current(), LedgerHash::ZERO);
    }

    #[test]
    fn field_boundaries_matter() {
        let mut a = ChainHasher::new();
        a.mix_str("ab");
        a.mix_str("c");
        let mut b = ChainHasher::new();
        b.mix_str("a");
        b.mix_str("bc");
        assert_ne!(a.current(), b.current());
    }

    #[test]
    fn order_matters() {
        let mut a = ChainHasher::new();
        a.mix_u64(1);
        a.mix_u64(2);
        let mut b = ChainHasher::new();
        b.mix_u64(2);
        b.mix_u64(1);
        assert_ne!(a.current(), b.current());
    }
}
