//! Deployment lookup trait.

use std::fmt;

use mirror_types::{Address, NetworkId};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Identifies one deployment of a contract.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentKey {
    pub network: NetworkId,
    pub name: String,
    pub version: String,
}

impl DeploymentKey {
    pub fn new(network: NetworkId, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            network,
            name: name.into(),
            version: version.into(),
        }
    }

    /// Flat string form used as a storage key: `network/name/version`.
    pub fn storage_key(&self) -> String {
        format!("{}/{}/{}", self.network.as_str(), self.name, self.version)
    }
}

impl fmt::Display for DeploymentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{} on {}", self.name, self.version, self.network)
    }
}

/// Trait for deployment lookup operations.
pub trait ContractStore {
    /// Record (or overwrite) the address deployed under `key`.
    fn put_deployment(&self, key: &DeploymentKey, address: Address) -> Result<(), StoreError>;

    /// The address deployed under `key`, if any.
    fn get_address(&self, key: &DeploymentKey) -> Result<Option<Address>, StoreError>;

    /// The deployment an address belongs to, if known.
    fn get_deployment(&self, address: &Address) -> Result<Option<DeploymentKey>, StoreError>;

    /// Like [`get_address`](Self::get_address) but missing keys are an error.
    fn require_address(&self, key: &DeploymentKey) -> Result<Address, StoreError> {
        self.get_address(key)?
            .ok_or_else(|| StoreError::NotFound(key.storage_key()))
    }
}
