//! State extractor.
//!
//! Produces a complete, self-consistent [`SnapshotData`](mirror_snapshot::SnapshotData)
//! of one ledger contract instance. Every read goes through a
//! [`BatchExecutor`](mirror_executor::BatchExecutor), so transient failures
//! are absorbed and only permanent ones abort the extraction.

pub mod error;
pub mod extractor;

pub use error::ExtractError;
pub use extractor::StateExtractor;
