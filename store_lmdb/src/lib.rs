//! LMDB storage backend for the deployment lookup store.
//!
//! Implements [`mirror_store::ContractStore`] using the `heed` LMDB bindings.
//! A forward database maps `network/name/version` to an address and a
//! reverse database maps the address back to its deployment key.

pub mod deployment;
pub mod environment;
pub mod error;

pub use deployment::LmdbContractStore;
pub use environment::LmdbEnvironment;
pub use error::LmdbError;
