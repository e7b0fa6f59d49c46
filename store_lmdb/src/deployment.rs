//! LMDB implementation of ContractStore.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use mirror_store::{ContractStore, DeploymentKey, StoreError};
use mirror_types::Address;

use crate::LmdbError;

pub struct LmdbContractStore {
    pub(crate) env: Arc<Env>,
    /// `network/name/version` -> 20 address bytes.
    pub(crate) deployments_db: Database<Bytes, Bytes>,
    /// 20 address bytes -> bincode-encoded `DeploymentKey`.
    pub(crate) addresses_db: Database<Bytes, Bytes>,
}

impl ContractStore for LmdbContractStore {
    fn put_deployment(&self, key: &DeploymentKey, address: Address) -> Result<(), StoreError> {
        let encoded_key = bincode::serialize(key).map_err(LmdbError::from)?;
        let storage_key = key.storage_key();

        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let previous = self
            .deployments_db
            .get(&wtxn, storage_key.as_bytes())
            .map_err(LmdbError::from)?
            .map(<[u8]>::to_vec);
        if let Some(previous) = previous {
            self.addresses_db
                .delete(&mut wtxn, &previous)
                .map_err(LmdbError::from)?;
        }
        self.deployments_db
            .put(&mut wtxn, storage_key.as_bytes(), address.as_bytes())
            .map_err(LmdbError::from)?;
        self.addresses_db
            .put(&mut wtxn, address.as_bytes(), &encoded_key)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_address(&self, key: &DeploymentKey) -> Result<Option<Address>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .deployments_db
            .get(&rtxn, key.storage_key().as_bytes())
            .map_err(LmdbError::from)?;
        match val {
            Some(bytes) => {
                let arr: [u8; 20] = bytes.try_into().map_err(|_| {
                    LmdbError::Serialization("invalid deployment address length".into())
                })?;
                Ok(Some(Address::new(arr)))
            }
            None => Ok(None),
        }
    }

    fn get_deployment(&self, address: &Address) -> Result<Option<DeploymentKey>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .addresses_db
            .get(&rtxn, address.as_bytes())
            .map_err(LmdbError::from)?;
        match val {
            Some(bytes) => {
                let key: DeploymentKey = bincode::deserialize(bytes).map_err(LmdbError::from)?;
                Ok(Some(key))
            }
            None => Ok(None),
        }
    }
}
