//! Token type definitions and individual token records.

use serde::{Deserialize, Serialize};

use crate::Address;

/// How tokens of a type settle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementType {
    Spot,
    Future,
}

impl SettlementType {
    /// Stable numeric code, used when folding into a fingerprint.
    pub fn code(&self) -> u8 {
        match self {
            Self::Spot => 1,
            Self::Future => 2,
        }
    }
}

/// Fixed numeric parameters of a futures token type. All zero for spot types.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FutureParams {
    pub expiry_timestamp: u64,
    pub underlyer_type_id: u32,
    pub ref_ccy_id: u32,
    pub init_margin_bips: u16,
    pub var_margin_bips: u16,
    pub contract_size: u16,
    pub fee_per_contract: u64,
}

/// A token type definition. Append-only, like currency types.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenType {
    pub id: u32,
    pub name: String,
    pub settlement_type: SettlementType,
    pub future_params: FutureParams,
    /// Contract this type is bridged to; `Address::ZERO` when unlinked.
    pub linked_contract: Address,
}

/// A single token record.
///
/// `st_id` is dense from 1 to the published maximum. A token is attached to
/// exactly one ledger entry or is global (owned by the system).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub st_id: u64,
    pub tok_type_id: u32,
    pub batch_id: u64,
    pub minted_qty: u64,
    pub current_qty: u64,
    pub ft_price: i64,
    pub ft_last_mark_price: i64,
    pub ft_ledger_owner: Address,
    #[serde(rename = "ftPL")]
    pub ft_pl: i64,
}
