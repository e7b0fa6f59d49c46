//! Nullable lookup store: thread-safe in-memory deployment index.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use mirror_store::{ContractStore, DeploymentKey, StoreError};
use mirror_types::Address;

/// An in-memory deployment index for testing.
#[derive(Default)]
pub struct NullContractStore {
    inner: Mutex<Index>,
}

#[derive(Default)]
struct Index {
    by_key: HashMap<DeploymentKey, Address>,
    by_address: HashMap<Address, DeploymentKey>,
}

impl NullContractStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(&self) -> MutexGuard<'_, Index> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ContractStore for NullContractStore {
    fn put_deployment(&self, key: &DeploymentKey, address: Address) -> Result<(), StoreError> {
        let mut index = self.index();
        if let Some(previous) = index.by_key.insert(key.clone(), address) {
            index.by_address.remove(&previous);
        }
        index.by_address.insert(address, key.clone());
        Ok(())
    }

    fn get_address(&self, key: &DeploymentKey) -> Result<Option<Address>, StoreError> {
        Ok(self.index().by_key.get(key).copied())
    }

    fn get_deployment(&self, address: &Address) -> Result<Option<DeploymentKey>, StoreError> {
        Ok(self.index().by_address.get(address).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_types::NetworkId;

    #[test]
    fn test_put_get_deployment() {
        let store = NullContractStore::new();
        let key = DeploymentKey::new(NetworkId::Dev, "StMaster", "1.0");
        let addr = Address::new([0x09; 20]);
        store.put_deployment(&key, addr).unwrap();
        assert_eq!(store.get_address(&key).unwrap(), Some(addr));
        assert_eq!(store.get_deployment(&addr).unwrap(), Some(key));
    }

    #[test]
    fn test_deployment_not_found() {
        let store = NullContractStore::new();
        let key = DeploymentKey::new(NetworkId::Dev, "StMaster", "0.0");
        assert!(store.require_address(&key).is_err());
    }
}
