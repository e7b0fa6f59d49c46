//! Currency type definitions.

use serde::{Deserialize, Serialize};

/// A currency the ledger can hold balances in.
///
/// Immutable once created on an instance; the set of currency types only grows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyType {
    /// Service-assigned id, dense from 1.
    pub id: u32,
    /// Unique name (the idempotency key during replay).
    pub name: String,
    /// Display unit, e.g. `"cents"`.
    pub unit: String,
    pub decimals: u16,
}
