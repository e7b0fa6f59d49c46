//! Backup then restore through in-memory ledgers.

use std::path::Path;

use mirror_fingerprint::{fingerprint, FingerprintOptions};
use mirror_migrate::{
    resolve_address, MigrateConfig, MigrateError, MigrationReport, Migrator, MismatchReport,
};
use mirror_nullables::fixture::{sample_address, seed_sample};
use mirror_nullables::{NullContractStore, NullLedger};
use mirror_remote::LedgerService;
use mirror_snapshot::{check_conservation, HashMode, Snapshot};
use mirror_types::{
    Address, FeeKey, FeeSchedule, FeeScheduleEntry, FeeSubject, LedgerEntry, NetworkId,
};

fn config(dir: &Path) -> MigrateConfig {
    MigrateConfig {
        network: NetworkId::Test,
        backup_dir: dir.to_path_buf(),
        read_concurrency: 3,
        write_concurrency: 2,
        whitelist_chunk: 2,
        ledger_entry_chunk: 2,
        batch_chunk: 2,
        read_retry_ms: 1,
        write_retry_ms: 1,
        phase_delay_ms: 0,
        ..Default::default()
    }
}

fn source_address() -> Address {
    sample_address(0xa1)
}

fn target_address() -> Address {
    sample_address(0xb2)
}

async fn seeded() -> NullLedger {
    let ledger = NullLedger::default();
    seed_sample(&ledger).await.unwrap();
    ledger
}

#[tokio::test]
async fn backup_then_restore_reproduces_fingerprint() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let store = NullContractStore::new();
    let migrator = Migrator::new(&config).with_store(&store);

    let source = seeded().await;
    let snapshot = migrator
        .backup(&source, source_address(), HashMode::Offchain)
        .await
        .unwrap();

    assert!(dir.path().join(format!("{}.json", source_address())).is_file());
    assert_eq!(snapshot.data.currency_types.len(), 2);
    assert_eq!(snapshot.data.token_types.len(), 2);
    assert_eq!(snapshot.data.ledger_owners.len(), 3);
    assert_eq!(snapshot.data.batches.len(), 3);
    assert!(snapshot.data.owner_fees().any(|e| !e.fee.is_null()));
    assert!(check_conservation(&snapshot.data).is_empty());
    assert_eq!(
        resolve_address(&store, NetworkId::Test, "StMaster", "1.0").unwrap(),
        source_address()
    );

    let target = NullLedger::default();
    let report = migrator
        .restore(source_address(), &target, target_address(), HashMode::Offchain)
        .await
        .unwrap();

    assert_eq!(report.hash_source, snapshot.ledger_hash);
    assert_eq!(report.hash_target, report.hash_source);
    assert_eq!(report.replay.tokens_added, 6);

    let saved: MigrationReport = migrator.archive().load_report(&target_address()).unwrap();
    assert_eq!(saved, report);
    assert_eq!(
        resolve_address(&store, NetworkId::Test, "StMaster", "1.0").unwrap(),
        target_address()
    );

    // The target holds a conserving state too.
    let target_snapshot = migrator
        .backup(&target, target_address(), HashMode::Offchain)
        .await
        .unwrap();
    assert!(check_conservation(&target_snapshot.data).is_empty());
    assert_eq!(target_snapshot.ledger_hash, snapshot.ledger_hash);
}

#[tokio::test]
async fn restore_is_resumable_and_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let migrator = Migrator::new(&config);

    let source = seeded().await;
    migrator
        .backup(&source, source_address(), HashMode::Offchain)
        .await
        .unwrap();

    let target = NullLedger::default();
    target.fail_next("create_ledger_entries", 3);
    target.fail_next("add_token", 2);
    let first = migrator
        .restore(source_address(), &target, target_address(), HashMode::Offchain)
        .await
        .unwrap();
    let second = migrator
        .restore(source_address(), &target, target_address(), HashMode::Offchain)
        .await
        .unwrap();

    assert_eq!(first.hash_target, second.hash_target);
    assert!(second.replay.is_noop());
    assert_eq!(target.token_count(), 6);
    assert_eq!(target.currency_types().await.unwrap().len(), 2);
}

#[tokio::test]
async fn divergent_target_fails_with_first_divergence() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let migrator = Migrator::new(&config);

    let source = seeded().await;
    migrator
        .backup(&source, source_address(), HashMode::Offchain)
        .await
        .unwrap();

    let target = NullLedger::default();
    let stranger = sample_address(0x77);
    target.whitelist_many(&[stranger]).await.unwrap();

    let err = migrator
        .restore(source_address(), &target, target_address(), HashMode::Offchain)
        .await
        .unwrap_err();
    match err {
        MigrateError::FingerprintMismatch {
            hash_source,
            hash_target,
            divergence,
            trace,
        } => {
            assert_ne!(hash_source, hash_target);
            let divergence = divergence.expect("traces differ");
            assert!(divergence.label.starts_with("whitelist:"), "{divergence}");
            assert_eq!(trace, migrator.archive().mismatch_path(&target_address()));

            let kept: MismatchReport = migrator
                .archive()
                .load_mismatch(&target_address())
                .unwrap();
            assert_eq!(kept.hash_source, hash_source);
            assert_eq!(kept.hash_target, hash_target);
            assert_eq!(kept.divergence, Some(divergence.clone()));
            let at = divergence.position;
            assert_eq!(Some(kept.source_trace[at].hash), divergence.expected);
            assert_eq!(Some(kept.target_trace[at].hash), divergence.actual);
            assert_eq!(kept.source_trace.last().unwrap().label, "totals");
            assert_eq!(kept.target_trace.last().unwrap().label, "totals");
        }
        other => panic!("expected fingerprint mismatch, got {other}"),
    }
    assert!(!migrator.archive().report_path(&target_address()).exists());
}

#[tokio::test]
async fn tampered_artifact_is_rejected_before_any_call() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let migrator = Migrator::new(&config);

    let source = seeded().await;
    let snapshot = migrator
        .backup(&source, source_address(), HashMode::Offchain)
        .await
        .unwrap();

    let mut tampered: Snapshot = snapshot.clone();
    tampered.data.batches[0].minted_qty += 1;
    migrator.archive().save(&tampered).unwrap();

    let target = NullLedger::default();
    let err = migrator
        .restore(source_address(), &target, target_address(), HashMode::Offchain)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::ArtifactMismatch { .. }), "{err}");
    assert_eq!(target.calls("is_sealed"), 0);

    let check = migrator
        .verify_artifact(source_address(), &FingerprintOptions::default())
        .unwrap();
    assert_eq!(check.matches(), Some(false));
    assert_eq!(check.computed, fingerprint(&tampered.data).hash);
}

#[tokio::test]
async fn artifact_with_records_outside_the_owner_list_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let migrator = Migrator::new(&config);

    let source = seeded().await;
    let snapshot = migrator
        .backup(&source, source_address(), HashMode::Offchain)
        .await
        .unwrap();

    let mut tampered = snapshot.clone();
    tampered.data.fee_schedules.push(FeeScheduleEntry {
        key: FeeKey::owned(FeeSubject::Currency, 1, sample_address(9)),
        fee: FeeSchedule {
            fee_fixed: 999,
            ..Default::default()
        },
    });
    tampered.data.ledger_entries.push(LedgerEntry::empty(sample_address(0x55)));
    assert_ne!(fingerprint(&tampered.data).hash, snapshot.ledger_hash);
    migrator.archive().save(&tampered).unwrap();

    let target = NullLedger::default();
    let err = migrator
        .restore(source_address(), &target, target_address(), HashMode::Offchain)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::ArtifactMismatch { .. }), "{err}");
    assert_eq!(target.write_calls(), 0);
}

#[tokio::test]
async fn onchain_mode_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let migrator = Migrator::new(&config);

    let source = seeded().await;
    let snapshot = migrator
        .backup(&source, source_address(), HashMode::Onchain)
        .await
        .unwrap();
    assert_eq!(snapshot.info.hash_mode, HashMode::Onchain);
    assert_eq!(source.calls("ledger_hashcode"), config.onchain_segments);

    let check = migrator
        .verify_artifact(source_address(), &FingerprintOptions::default())
        .unwrap();
    assert_eq!(check.matches(), None);

    let mismatch = migrator
        .restore(source_address(), &NullLedger::default(), target_address(), HashMode::Offchain)
        .await
        .unwrap_err();
    assert!(matches!(mismatch, MigrateError::InvalidInput(_)));

    let target = NullLedger::default();
    let report = migrator
        .restore(source_address(), &target, target_address(), HashMode::Onchain)
        .await
        .unwrap();
    assert_eq!(report.hash_target, snapshot.ledger_hash);
}

#[tokio::test]
async fn refresh_reuses_previous_fee_reads() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());

    let source = seeded().await;
    Migrator::new(&config)
        .backup(&source, source_address(), HashMode::Offchain)
        .await
        .unwrap();
    let fee_reads = source.calls("fee");

    Migrator::new(&config)
        .refresh(true)
        .backup(&source, source_address(), HashMode::Offchain)
        .await
        .unwrap();
    assert_eq!(source.calls("fee"), fee_reads);
}

#[tokio::test]
async fn restore_without_backup_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let target = NullLedger::default();
    let err = Migrator::new(&config)
        .restore(source_address(), &target, target_address(), HashMode::Offchain)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::Snapshot(_)));
    assert!(matches!(
        Migrator::new(&config)
            .restore(source_address(), &target, source_address(), HashMode::Offchain)
            .await,
        Err(MigrateError::InvalidInput(_))
    ));
}
