//! Nullable infrastructure for deterministic testing.
//!
//! [`NullLedger`] is an in-memory ledger contract that enforces the
//! service-side rules the migration engine relies on, with fault injection
//! and call counters. [`NullContractStore`] is an in-memory lookup store.

pub mod fixture;
pub mod ledger;
pub mod store;

pub use ledger::NullLedger;
pub use store::NullContractStore;
