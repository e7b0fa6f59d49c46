//! Backup and restore.

use tracing::{error, info, warn};

use mirror_executor::{BatchExecutor, RetryPolicy};
use mirror_extract::StateExtractor;
use mirror_fingerprint::{
    fingerprint, fingerprint_with, first_divergence, onchain_fingerprint, FingerprintOptions,
};
use mirror_remote::LedgerService;
use mirror_replay::StateLoader;
use mirror_snapshot::{check_conservation, HashMode, Snapshot, SnapshotArchive, SnapshotData};
use mirror_store::{ContractStore, DeploymentKey};
use mirror_types::{Address, LedgerHash, NetworkId, Timestamp};

use crate::{ArtifactCheck, MigrateConfig, MigrateError, MigrationReport, MismatchReport};

/// Resolve a deployment to its contract address through the lookup store.
pub fn resolve_address(
    store: &dyn ContractStore,
    network: NetworkId,
    name: &str,
    version: &str,
) -> Result<Address, MigrateError> {
    Ok(store.require_address(&DeploymentKey::new(network, name, version))?)
}

/// Runs backups and restores against one snapshot archive.
pub struct Migrator<'a> {
    config: &'a MigrateConfig,
    archive: SnapshotArchive,
    store: Option<&'a dyn ContractStore>,
    refresh: bool,
}

impl<'a> Migrator<'a> {
    pub fn new(config: &'a MigrateConfig) -> Self {
        Self {
            config,
            archive: SnapshotArchive::new(&config.backup_dir),
            store: None,
            refresh: false,
        }
    }

    /// Record deployments in `store` as they are backed up and restored.
    pub fn with_store(mut self, store: &'a dyn ContractStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Reuse fee schedules from the existing snapshot of the same source.
    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn archive(&self) -> &SnapshotArchive {
        &self.archive
    }

    /// Extract the state of `source`, fingerprint it, and write the snapshot
    /// artifact.
    pub async fn backup<S: LedgerService>(
        &self,
        source: &S,
        address: Address,
        hash_mode: HashMode,
    ) -> Result<Snapshot, MigrateError> {
        let reads = self.config.read_executor();
        let previous = if self.refresh && self.archive.has_snapshot(&address) {
            Some(self.archive.load(&address)?)
        } else {
            None
        };

        let mut extractor =
            StateExtractor::new(source, &reads).serial_reads(self.config.serial_reads);
        if let Some(previous) = &previous {
            info!(%address, "refreshing from previous snapshot");
            extractor = extractor.resume_from(&previous.data);
        }
        let (info, data) = extractor
            .extract(self.config.network, address, hash_mode)
            .await?;

        warn_on_conservation(&data, "source");

        let offchain = fingerprint(&data).hash;
        let hash = match hash_mode {
            HashMode::Offchain => offchain,
            HashMode::Onchain => {
                let onchain = self.onchain_hash(source, &reads).await?;
                info!(%onchain, %offchain, "onchain fingerprint recorded, offchain shown for reference");
                onchain
            }
        };

        let snapshot = Snapshot::new(hash, info, data);
        let path = self.archive.save(&snapshot)?;
        info!(
            %address,
            %hash,
            path = %path.display(),
            summary = %snapshot.summary(),
            "backup complete"
        );

        let info = &snapshot.info;
        self.record_deployment(info.network, &info.name, &info.version, address)?;
        Ok(snapshot)
    }

    /// Replay the stored snapshot of `source` into `target`, then prove the
    /// target reproduces it.
    ///
    /// A fingerprint mismatch leaves the target as it is for inspection.
    pub async fn restore<T: LedgerService>(
        &self,
        source: Address,
        target: &T,
        target_address: Address,
        hash_mode: HashMode,
    ) -> Result<MigrationReport, MigrateError> {
        if source == target_address {
            return Err(MigrateError::InvalidInput(format!(
                "source and target are the same contract {source}"
            )));
        }

        let snapshot = self.archive.load(&source)?;
        let source_fp = fingerprint(&snapshot.data);
        let hash_source = match (snapshot.info.hash_mode, hash_mode) {
            (HashMode::Offchain, HashMode::Offchain) => {
                if source_fp.hash != snapshot.ledger_hash {
                    return Err(MigrateError::ArtifactMismatch {
                        address: source,
                        recorded: snapshot.ledger_hash,
                        computed: source_fp.hash,
                    });
                }
                snapshot.ledger_hash
            }
            (HashMode::Onchain, HashMode::Onchain) => snapshot.ledger_hash,
            (recorded, requested) => {
                return Err(MigrateError::InvalidInput(format!(
                    "snapshot of {source} was taken in {recorded} mode, cannot verify in {requested} mode"
                )));
            }
        };

        let writes = self.config.write_executor();
        let replay = StateLoader::new(target, &writes)
            .with_options(self.config.loader_options())
            .load(&snapshot)
            .await?;

        let reads = self.config.read_executor();
        let (target_info, target_data) = StateExtractor::new(target, &reads)
            .serial_reads(self.config.serial_reads)
            .extract(self.config.network, target_address, hash_mode)
            .await?;
        warn_on_conservation(&target_data, "target");

        let target_fp = fingerprint(&target_data);
        let hash_target = match hash_mode {
            HashMode::Offchain => target_fp.hash,
            HashMode::Onchain => self.onchain_hash(target, &reads).await?,
        };

        if hash_target != hash_source {
            let divergence = first_divergence(&source_fp, &target_fp);
            let mismatch = MismatchReport {
                source,
                target: target_address,
                hash_mode,
                hash_source,
                hash_target,
                divergence,
                source_trace: source_fp.checkpoints,
                target_trace: target_fp.checkpoints,
                recorded_at: Timestamp::now(),
            };
            let trace = self.archive.save_mismatch(&target_address, &mismatch)?;
            error!(
                %source,
                target = %target_address,
                %hash_source,
                %hash_target,
                divergence = ?mismatch.divergence.as_ref().map(ToString::to_string),
                trace = %trace.display(),
                "fingerprint mismatch, target left as is"
            );
            return Err(MigrateError::FingerprintMismatch {
                hash_source,
                hash_target,
                divergence: mismatch.divergence,
                trace,
            });
        }

        let report = MigrationReport {
            source,
            target: target_address,
            hash_mode,
            hash_source,
            hash_target,
            completed_at: Timestamp::now(),
            replay,
        };
        let path = self.archive.save_report(&target_address, &report)?;
        info!(
            %source,
            target = %target_address,
            hash = %hash_target,
            path = %path.display(),
            "migration verified"
        );

        self.record_deployment(
            target_info.network,
            &target_info.name,
            &target_info.version,
            target_address,
        )?;
        Ok(report)
    }

    /// Recompute the offchain fingerprint of a stored snapshot.
    pub fn verify_artifact(
        &self,
        address: Address,
        options: &FingerprintOptions,
    ) -> Result<ArtifactCheck, MigrateError> {
        let snapshot = self.archive.load(&address)?;
        let computed = fingerprint_with(&snapshot.data, options).hash;
        let check = ArtifactCheck {
            address,
            hash_mode: snapshot.info.hash_mode,
            recorded: snapshot.ledger_hash,
            computed,
        };
        match check.matches() {
            Some(true) => info!(%address, hash = %computed, "artifact fingerprint verified"),
            Some(false) => warn!(%address, recorded = %check.recorded, %computed, "artifact fingerprint differs"),
            None => info!(%address, recorded = %check.recorded, offchain = %computed, "onchain artifact, offchain fingerprint computed"),
        }
        Ok(check)
    }

    async fn onchain_hash<S: LedgerService, P: RetryPolicy>(
        &self,
        service: &S,
        reads: &BatchExecutor<P>,
    ) -> Result<LedgerHash, MigrateError> {
        onchain_fingerprint(service, reads, self.config.onchain_segments)
            .await
            .map(|fp| fp.hash)
            .map_err(MigrateError::Onchain)
    }

    fn record_deployment(
        &self,
        network: NetworkId,
        name: &str,
        version: &str,
        address: Address,
    ) -> Result<(), MigrateError> {
        let Some(store) = self.store else {
            return Ok(());
        };
        let key = DeploymentKey::new(network, name, version);
        store.put_deployment(&key, address)?;
        info!(%key, %address, "deployment recorded");
        Ok(())
    }
}

fn warn_on_conservation(data: &SnapshotData, side: &str) {
    for violation in check_conservation(data) {
        warn!(
            side,
            tok_type_id = violation.tok_type_id,
            minted = violation.sums.minted,
            burned = violation.sums.burned,
            current = violation.sums.current,
            "conservation law violated"
        );
    }
}
