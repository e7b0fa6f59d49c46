//! Abstract lookup-store traits for ledger migration.
//!
//! The lookup store is an index, never a source of truth for ledger state:
//! it only remembers which contract address was deployed for a given
//! network, contract name and version. Every backend (LMDB, in-memory for
//! testing) implements [`ContractStore`].

pub mod deployment;
pub mod error;

pub use deployment::{ContractStore, DeploymentKey};
pub use error::StoreError;
