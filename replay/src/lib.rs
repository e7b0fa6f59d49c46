//! State loader.
//!
//! Replays a snapshot into a target contract instance, phase by phase, in an
//! order that satisfies every cross-record dependency: types before fees and
//! batches, whitelisting before ledger entries, batches and ledger entries
//! before tokens, totals last. Every phase first asks the target what it
//! already holds and only writes what is missing, so a partially loaded
//! target can be resumed by running the loader again.

pub mod error;
pub mod loader;
pub mod report;

pub use error::ReplayError;
pub use loader::{LoaderOptions, StateLoader};
pub use report::ReplayReport;
