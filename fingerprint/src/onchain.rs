//! Onchain fingerprint: the service hashes its own ledger in segments and the
//! segment hashes are chained here.
//!
//! Never assumed bit-equal to the offchain fingerprint of the same state.

use tracing::info;

use mirror_executor::{BatchExecutor, ExecutorError, RetryPolicy};
use mirror_remote::{LedgerService, RemoteError};

use crate::{ChainHasher, Checkpoint, Fingerprint};

pub const DEFAULT_SEGMENTS: u32 = 4;

pub async fn onchain_fingerprint<S, P>(
    service: &S,
    reads: &BatchExecutor<P>,
    segments: u32,
) -> Result<Fingerprint, ExecutorError<RemoteError>>
where
    S: LedgerService,
    P: RetryPolicy,
{
    let segments = segments.max(1);
    let calls: Vec<_> = (0..segments)
        .map(|i| move || service.ledger_hashcode(i, segments))
        .collect();
    let segment_hashes = reads.run("ledger_hashcode", &calls).await?;

    let mut hasher = ChainHasher::new();
    let mut checkpoints = Vec::with_capacity(segment_hashes.len());
    for (i, segment_hash) in segment_hashes.iter().enumerate() {
        hasher.mix_hash(segment_hash);
        checkpoints.push(Checkpoint {
            label: format!("segment:{i}"),
            hash: hasher.current(),
        });
    }

    let hash = hasher.current();
    info!(segments, %hash, "onchain fingerprint computed");
    Ok(Fingerprint { hash, checkpoints })
}
