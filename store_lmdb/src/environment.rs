//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use tracing::debug;

use crate::{LmdbContractStore, LmdbError};

/// Default LMDB map size: the lookup store is tiny.
pub const DEFAULT_MAP_SIZE: usize = 16 * 1024 * 1024;

const MAX_DBS: u32 = 4;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    deployments_db: Database<Bytes, Bytes>,
    addresses_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given directory.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;
        // SAFETY: the environment directory is owned by this process for the
        // lifetime of the `Env`; nothing else maps the same files.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let deployments_db = env.create_database(&mut wtxn, Some("deployments"))?;
        let addresses_db = env.create_database(&mut wtxn, Some("addresses"))?;
        wtxn.commit()?;
        debug!(path = %path.display(), "opened lookup store");

        Ok(Self {
            env: Arc::new(env),
            deployments_db,
            addresses_db,
        })
    }

    /// Open with [`DEFAULT_MAP_SIZE`].
    pub fn open_default(path: &Path) -> Result<Self, LmdbError> {
        Self::open(path, DEFAULT_MAP_SIZE)
    }

    pub fn contract_store(&self) -> LmdbContractStore {
        LmdbContractStore {
            env: Arc::clone(&self.env),
            deployments_db: self.deployments_db,
            addresses_db: self.addresses_db,
        }
    }
}
