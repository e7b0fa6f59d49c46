//! Entities and account-to-entity mappings.

use serde::{Deserialize, Serialize};

use crate::Address;

/// Groups accounts under a shared fee owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: u64,
    pub fee_owner: Address,
}

/// Maps one account address to the entity it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountEntity {
    pub address: Address,
    pub entity_id: u64,
}
