//! Snapshot records: the full state of a contract instance at a point in time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use mirror_types::{
    AccountEntity, Address, Batch, CurrencyType, Entity, FeeKey, FeeSchedule, FeeScheduleEntry,
    Frontier, LedgerEntry, LedgerHash, NetworkId, Timestamp, Token, TokenTotals, TokenType,
};

use crate::SnapshotError;

/// How a snapshot's fingerprint was computed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashMode {
    /// Folded locally from the extracted records. Authoritative.
    #[default]
    Offchain,
    /// Chained from segment hashes the service computes itself.
    Onchain,
}

impl HashMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offchain => "offchain",
            Self::Onchain => "onchain",
        }
    }
}

impl fmt::Display for HashMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashMode {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "offchain" => Ok(Self::Offchain),
            "onchain" => Ok(Self::Onchain),
            other => Err(SnapshotError::UnknownHashMode(other.to_string())),
        }
    }
}

/// Where and when a snapshot was taken.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    pub network: NetworkId,
    /// Address of the contract instance the snapshot was extracted from.
    pub address: Address,
    pub name: String,
    pub version: String,
    pub symbol: String,
    pub owners: Vec<Address>,
    /// Whether the source refused structural changes at extraction time.
    pub sealed: bool,
    pub hash_mode: HashMode,
    pub created_at: Timestamp,
    /// Batch and token id frontier observed during extraction.
    pub frontier: Frontier,
}

/// Every record the migration transports.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotData {
    pub currency_types: Vec<CurrencyType>,
    pub token_types: Vec<TokenType>,
    /// Global and per-owner schedules. Only non-null schedules are kept.
    pub fee_schedules: Vec<FeeScheduleEntry>,
    /// Ledger owners in source creation order.
    pub ledger_owners: Vec<Address>,
    pub ledger_entries: Vec<LedgerEntry>,
    pub batches: Vec<Batch>,
    /// Tokens not attached to any ledger entry.
    pub global_tokens: Vec<Token>,
    /// Whitelisted addresses in admission order.
    pub whitelist: Vec<Address>,
    pub entities: Vec<Entity>,
    pub account_entity_map: Vec<AccountEntity>,
    pub totals: TokenTotals,
}

impl SnapshotData {
    /// The fee schedule stored under `key`, or a null schedule.
    pub fn fee(&self, key: &FeeKey) -> FeeSchedule {
        self.fee_schedules
            .iter()
            .find(|entry| entry.key == *key)
            .map(|entry| entry.fee.clone())
            .unwrap_or_default()
    }

    pub fn global_fees(&self) -> impl Iterator<Item = &FeeScheduleEntry> {
        self.fee_schedules.iter().filter(|e| e.key.owner.is_global())
    }

    pub fn owner_fees(&self) -> impl Iterator<Item = &FeeScheduleEntry> {
        self.fee_schedules.iter().filter(|e| !e.key.owner.is_global())
    }

    /// Every token with the ledger owner it is attached to (`None` = global).
    pub fn all_tokens(&self) -> impl Iterator<Item = (Option<Address>, &Token)> {
        self.ledger_entries
            .iter()
            .flat_map(|entry| entry.tokens.iter().map(move |t| (Some(entry.owner), t)))
            .chain(self.global_tokens.iter().map(|t| (None, t)))
    }

    /// The frontier implied by the records themselves.
    pub fn frontier(&self) -> Frontier {
        Frontier {
            max_batch_id: self.batches.iter().map(|b| b.id).max().unwrap_or(0),
            max_token_id: self
                .all_tokens()
                .map(|(_, t)| t.st_id)
                .max()
                .unwrap_or(0),
        }
    }

    pub fn token_count(&self) -> usize {
        self.all_tokens().count()
    }
}

/// A snapshot: fingerprint, provenance, and the records themselves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "ledgerHash")]
    pub ledger_hash: LedgerHash,
    pub info: SnapshotInfo,
    pub data: SnapshotData,
}

impl Snapshot {
    pub fn new(ledger_hash: LedgerHash, info: SnapshotInfo, data: SnapshotData) -> Self {
        Self {
            ledger_hash,
            info,
            data,
        }
    }

    pub fn address(&self) -> Address {
        self.info.address
    }

    /// One-line summary for progress output.
    pub fn summary(&self) -> String {
        format!(
            "{} ccy types, {} token types, {} fee schedules, {} whitelisted, {} ledger entries, \
             {} batches, {} tokens ({} global), {} entities",
            self.data.currency_types.len(),
            self.data.token_types.len(),
            self.data.fee_schedules.len(),
            self.data.whitelist.len(),
            self.data.ledger_entries.len(),
            self.data.batches.len(),
            self.data.token_count(),
            self.data.global_tokens.len(),
            self.data.entities.len(),
        )
    }
}
