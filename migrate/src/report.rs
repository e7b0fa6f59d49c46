use serde::{Deserialize, Serialize};

use mirror_fingerprint::{Checkpoint, Divergence};
use mirror_replay::ReplayReport;
use mirror_snapshot::HashMode;
use mirror_types::{Address, LedgerHash, Timestamp};

/// The finalized record of a verified migration, written next to the
/// source snapshot as `<target>.migration.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub source: Address,
    pub target: Address,
    pub hash_mode: HashMode,
    pub hash_source: LedgerHash,
    pub hash_target: LedgerHash,
    pub completed_at: Timestamp,
    /// What the final loader run wrote.
    pub replay: ReplayReport,
}

/// Everything known about a restore whose target did not reproduce the
/// source, written as `<target>.mismatch.json`.
///
/// The traces are always the offchain ones, also in onchain mode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MismatchReport {
    pub source: Address,
    pub target: Address,
    pub hash_mode: HashMode,
    pub hash_source: LedgerHash,
    pub hash_target: LedgerHash,
    pub divergence: Option<Divergence>,
    pub source_trace: Vec<Checkpoint>,
    pub target_trace: Vec<Checkpoint>,
    pub recorded_at: Timestamp,
}

/// Result of re-hashing a stored snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactCheck {
    pub address: Address,
    pub hash_mode: HashMode,
    pub recorded: LedgerHash,
    /// Offchain fingerprint of the stored data, exclusions applied.
    pub computed: LedgerHash,
}

impl ArtifactCheck {
    /// Whether the recorded hash is reproduced. `None` for onchain
    /// artifacts, whose hash cannot be recomputed offline.
    pub fn matches(&self) -> Option<bool> {
        match self.hash_mode {
            HashMode::Offchain => Some(self.recorded == self.computed),
            HashMode::Onchain => None,
        }
    }
}
