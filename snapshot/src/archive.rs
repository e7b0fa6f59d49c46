//! Snapshot artifact persistence.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use mirror_types::Address;

use crate::{Snapshot, SnapshotError};

/// A directory of JSON artifacts keyed by contract address.
///
/// Snapshots live at `<dir>/<address>.json`; migration reports at
/// `<dir>/<address>.migration.json`.
#[derive(Clone, Debug)]
pub struct SnapshotArchive {
    dir: PathBuf,
}

impl SnapshotArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(&self, address: &Address) -> PathBuf {
        self.dir.join(format!("{address}.json"))
    }

    pub fn report_path(&self, target: &Address) -> PathBuf {
        self.dir.join(format!("{target}.migration.json"))
    }

    pub fn mismatch_path(&self, target: &Address) -> PathBuf {
        self.dir.join(format!("{target}.mismatch.json"))
    }

    pub fn has_snapshot(&self, address: &Address) -> bool {
        self.snapshot_path(address).is_file()
    }

    /// Write a snapshot under its source address. Returns the artifact path.
    pub fn save(&self, snapshot: &Snapshot) -> Result<PathBuf, SnapshotError> {
        let path = self.snapshot_path(&snapshot.address());
        self.write_json(&path, snapshot)?;
        info!(path = %path.display(), hash = %snapshot.ledger_hash, "snapshot written");
        Ok(path)
    }

    /// Read the snapshot of `address`.
    pub fn load(&self, address: &Address) -> Result<Snapshot, SnapshotError> {
        self.read_json(&self.snapshot_path(address))
    }

    /// Write any serializable report next to the snapshots.
    pub fn save_report<T: Serialize>(
        &self,
        target: &Address,
        report: &T,
    ) -> Result<PathBuf, SnapshotError> {
        let path = self.report_path(target);
        self.write_json(&path, report)?;
        Ok(path)
    }

    pub fn load_report<T: DeserializeOwned>(&self, target: &Address) -> Result<T, SnapshotError> {
        self.read_json(&self.report_path(target))
    }

    /// Write the evidence of a failed verification of `target`.
    pub fn save_mismatch<T: Serialize>(
        &self,
        target: &Address,
        mismatch: &T,
    ) -> Result<PathBuf, SnapshotError> {
        let path = self.mismatch_path(target);
        self.write_json(&path, mismatch)?;
        Ok(path)
    }

    pub fn load_mismatch<T: DeserializeOwned>(
        &self,
        target: &Address,
    ) -> Result<T, SnapshotError> {
        self.read_json(&self.mismatch_path(target))
    }

    /// Write through a temporary file and rename, so a crash never leaves a
    /// truncated artifact behind.
    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), SnapshotError> {
        fs::create_dir_all(&self.dir).map_err(|source| SnapshotError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| SnapshotError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|source| SnapshotError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, SnapshotError> {
        if !path.is_file() {
            return Err(SnapshotError::NotFound(path.to_path_buf()));
        }
        let bytes = fs::read(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| SnapshotError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HashMode, SnapshotData, SnapshotInfo};
    use mirror_types::{Frontier, LedgerHash, NetworkId, Timestamp};

    fn sample(address: Address) -> Snapshot {
        Snapshot::new(
            LedgerHash::new([0x5a; 32]),
            SnapshotInfo {
                network: NetworkId::Dev,
                address,
                name: "StMaster".into(),
                version: "1.0".into(),
                symbol: "CCC".into(),
                owners: vec![Address::new([0x0f; 20])],
                sealed: true,
                hash_mode: HashMode::Offchain,
                created_at: Timestamp::new(1_000),
                frontier: Frontier::default(),
            },
            SnapshotData::default(),
        )
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let archive = SnapshotArchive::new(dir.path().join("backups"));
        let address = Address::new([0x33; 20]);
        let snap = sample(address);

        let path = archive.save(&snap).unwrap();
        assert!(path.ends_with(format!("{address}.json")));
        assert!(archive.has_snapshot(&address));
        assert_eq!(archive.load(&address).unwrap(), snap);
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let archive = SnapshotArchive::new(dir.path());
        let err = archive.load(&Address::new([0x01; 20])).unwrap_err();
        assert!(matches!(err, SnapshotError::NotFound(_)));
    }

    #[test]
    fn malformed_artifact_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = SnapshotArchive::new(dir.path());
        let address = Address::new([0x02; 20]);
        std::fs::write(archive.snapshot_path(&address), b"{not json").unwrap();
        assert!(matches!(
            archive.load(&address).unwrap_err(),
            SnapshotError::Json { .. }
        ));
    }

    #[test]
    fn reports_are_keyed_by_target() {
        let dir = tempfile::tempdir().unwrap();
        let archive = SnapshotArchive::new(dir.path());
        let target = Address::new([0x44; 20]);
        archive
            .save_report(&target, &serde_json::json!({"ok": true}))
            .unwrap();
        let back: serde_json::Value = archive.load_report(&target).unwrap();
        assert_eq!(back["ok"], true);
        assert!(!archive.has_snapshot(&target));
        assert!(!archive.mismatch_path(&target).exists());

        archive
            .save_mismatch(&target, &serde_json::json!({"ok": false}))
            .unwrap();
        let back: serde_json::Value = archive.load_mismatch(&target).unwrap();
        assert_eq!(back["ok"], false);
        let kept: serde_json::Value = archive.load_report(&target).unwrap();
        assert_eq!(kept["ok"], true);
    }
}
