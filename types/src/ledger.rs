//! Per-owner ledger entries.

use serde::{Deserialize, Serialize};

use crate::{Address, Token};

/// A currency balance held inside a ledger entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CcyBalance {
    pub ccy_type_id: u32,
    pub balance: i64,
    pub reserved: i64,
}

/// The complete holdings record (currency balances + tokens) for one owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub owner: Address,
    #[serde(rename = "spot_sumQty")]
    pub spot_sum_qty: u64,
    #[serde(rename = "spot_sumQtyMinted")]
    pub spot_sum_qty_minted: u64,
    #[serde(rename = "spot_sumQtyBurned")]
    pub spot_sum_qty_burned: u64,
    pub ccy_balances: Vec<CcyBalance>,
    pub tokens: Vec<Token>,
}

impl LedgerEntry {
    /// An entry with no balances and no tokens.
    pub fn empty(owner: Address) -> Self {
        Self {
            owner,
            spot_sum_qty: 0,
            spot_sum_qty_minted: 0,
            spot_sum_qty_burned: 0,
            ccy_balances: Vec::new(),
            tokens: Vec::new(),
        }
    }

    /// The entry without its tokens: what must exist before tokens attach.
    pub fn seed(&self) -> Self {
        Self {
            tokens: Vec::new(),
            ..self.clone()
        }
    }

    pub fn token_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.tokens.iter().map(|t| t.st_id)
    }
}
