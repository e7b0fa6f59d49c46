//! The call/response surface of a deployed ledger contract.

use serde::{Deserialize, Serialize};

use mirror_types::{
    AccountEntity, Address, Batch, CurrencyType, Entity, FeeKey, FeeSchedule, Frontier,
    FutureParams, LedgerEntry, LedgerHash, SettlementType, Token, TokenTotals, TokenType,
};

use crate::RemoteError;

/// Descriptive metadata of a contract instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractInfo {
    pub name: String,
    pub version: String,
    pub symbol: String,
    /// Privileged owner accounts of the contract.
    pub owners: Vec<Address>,
    pub sealed: bool,
}

/// Every remote operation the migration engine issues.
///
/// Each call is atomic on the service side. Writes that carry explicit ids
/// (`load_batches`, `add_token`, `create_entity`) are accepted as no-ops when
/// an identical record already exists, and rejected when a different record
/// holds the id. Type creation is keyed by name and assigns the next id.
#[allow(async_fn_in_trait)]
pub trait LedgerService {
    // ── Reads ──────────────────────────────────────────────────────────

    async fn contract_info(&self) -> Result<ContractInfo, RemoteError>;

    async fn currency_types(&self) -> Result<Vec<CurrencyType>, RemoteError>;

    async fn token_types(&self) -> Result<Vec<TokenType>, RemoteError>;

    /// The fee schedule stored under `key`; a null schedule when none is set.
    async fn fee(&self, key: FeeKey) -> Result<FeeSchedule, RemoteError>;

    /// Whitelisted addresses in admission order.
    async fn whitelist(&self) -> Result<Vec<Address>, RemoteError>;

    /// Every address with a ledger entry, in entry creation order.
    async fn ledger_owners(&self) -> Result<Vec<Address>, RemoteError>;

    async fn ledger_entry(&self, owner: Address) -> Result<LedgerEntry, RemoteError>;

    async fn batch(&self, id: u64) -> Result<Batch, RemoteError>;

    async fn token(&self, st_id: u64) -> Result<Token, RemoteError>;

    /// Highest assigned batch and token ids.
    async fn frontier(&self) -> Result<Frontier, RemoteError>;

    async fn entities(&self) -> Result<Vec<Entity>, RemoteError>;

    async fn account_entities(&self) -> Result<Vec<AccountEntity>, RemoteError>;

    async fn totals(&self) -> Result<TokenTotals, RemoteError>;

    async fn is_sealed(&self) -> Result<bool, RemoteError>;

    /// The service's own hash over one of `segments` slices of its ledger.
    async fn ledger_hashcode(&self, segment: u32, segments: u32)
        -> Result<LedgerHash, RemoteError>;

    // ── Writes ─────────────────────────────────────────────────────────

    /// Create a currency type and return the id the service assigned.
    async fn add_currency_type(
        &self,
        name: &str,
        unit: &str,
        decimals: u16,
    ) -> Result<u32, RemoteError>;

    /// Create a token type and return the id the service assigned.
    async fn add_token_type(
        &self,
        name: &str,
        settlement_type: SettlementType,
        future_params: &FutureParams,
        linked_contract: Address,
    ) -> Result<u32, RemoteError>;

    async fn set_fee(&self, key: FeeKey, fee: &FeeSchedule) -> Result<(), RemoteError>;

    async fn create_entity(&self, entity: &Entity) -> Result<(), RemoteError>;

    /// Admit addresses in the given order. Already-admitted ones are skipped.
    async fn whitelist_many(&self, addresses: &[Address]) -> Result<(), RemoteError>;

    async fn set_account_entity(&self, mapping: &AccountEntity) -> Result<(), RemoteError>;

    /// Create ledger entries carrying balances and spot sums. Tokens listed
    /// on the entries are ignored; they attach later through `add_token`.
    async fn create_ledger_entries(&self, entries: &[LedgerEntry]) -> Result<(), RemoteError>;

    /// Load batches with their source ids. Ids must continue the target's
    /// batch sequence without gaps.
    async fn load_batches(&self, batches: &[Batch]) -> Result<(), RemoteError>;

    /// Attach a token to `owner`'s ledger entry, or hold it globally when
    /// `owner` is `None`. The token's batch must already exist.
    async fn add_token(&self, owner: Option<Address>, token: &Token) -> Result<(), RemoteError>;

    async fn set_totals(&self, totals: &TokenTotals) -> Result<(), RemoteError>;

    /// Refuse further structural (type-level) changes.
    async fn seal(&self) -> Result<(), RemoteError>;
}
