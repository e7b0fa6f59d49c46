use std::path::PathBuf;

use thiserror::Error;

use mirror_executor::ExecutorError;
use mirror_fingerprint::Divergence;
use mirror_remote::RemoteError;
use mirror_types::{Address, LedgerHash};

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("config error: {0}")]
    Config(String),

    /// Rejected before any remote call was made.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("extraction failed: {0}")]
    Extract(#[from] mirror_extract::ExtractError),

    #[error("replay failed: {0}")]
    Replay(#[from] mirror_replay::ReplayError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] mirror_snapshot::SnapshotError),

    #[error("lookup store error: {0}")]
    Store(#[from] mirror_store::StoreError),

    #[error("onchain fingerprint failed: {0}")]
    Onchain(#[source] ExecutorError<RemoteError>),

    /// The snapshot artifact does not hash to the fingerprint recorded in it.
    #[error("artifact for {address} records {recorded} but its data hashes to {computed}")]
    ArtifactMismatch {
        address: Address,
        recorded: LedgerHash,
        computed: LedgerHash,
    },

    /// The target does not reproduce the source. The target is left as is.
    #[error(
        "fingerprint mismatch: source {hash_source}, target {hash_target}{}; trace written to {}",
        divergence.as_ref().map(|d| format!(", first divergence at {d}")).unwrap_or_default(),
        trace.display()
    )]
    FingerprintMismatch {
        hash_source: LedgerHash,
        hash_target: LedgerHash,
        divergence: Option<Divergence>,
        trace: PathBuf,
    },
}
