//! Hash-chain fingerprints.
//!
//! A fingerprint reduces a snapshot to one 32-byte value by folding every
//! relevant field, in a fixed canonical order, into a running blake2b-256
//! chain. Every record also leaves a labelled checkpoint so that two
//! diverging fingerprints can be traced back to the first record that
//! differs.

pub mod chain;
pub mod fingerprint;
pub mod fold;
pub mod onchain;

pub use chain::ChainHasher;
pub use fingerprint::{
    fingerprint, fingerprint_with, first_divergence, Checkpoint, Divergence, Fingerprint,
    FingerprintOptions,
};
pub use fold::Fold;
pub use onchain::{onchain_fingerprint, DEFAULT_SEGMENTS};
