//! Ledger state snapshots.
//!
//! A [`Snapshot`] is the complete, self-consistent state of one contract
//! instance at one logical point in time, together with its fingerprint.
//! Snapshots are written as JSON artifacts keyed by the source address
//! after extraction and read back before replay and verification.

pub mod archive;
pub mod conservation;
pub mod error;
pub mod snapshot;

pub use archive::SnapshotArchive;
pub use conservation::{check_conservation, type_sums, ConservationViolation, TypeSums};
pub use error::SnapshotError;
pub use snapshot::{HashMode, Snapshot, SnapshotData, SnapshotInfo};
