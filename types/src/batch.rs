//! Issuance batches.

use serde::{Deserialize, Serialize};

use crate::{Address, Timestamp};

/// An issuance event that minted a quantity of one token type.
///
/// Immutable once minted except for `burned_qty`, which only grows. Batch ids
/// are a contiguous sequence from 1; the highest id is the batch frontier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: u64,
    pub minted_timestamp: Timestamp,
    pub tok_type_id: u32,
    pub minted_qty: u64,
    pub burned_qty: u64,
    pub meta_keys: Vec<String>,
    pub meta_values: Vec<String>,
    pub originator_fee: u64,
    pub originator_ccy_fee_bips: u16,
    pub originator: Address,
}

impl Batch {
    /// Quantity still outstanding (minted minus burned).
    pub fn outstanding_qty(&self) -> u64 {
        self.minted_qty.saturating_sub(self.burned_qty)
    }
}
