//! Nullable ledger service: an in-memory contract instance.
//!
//! Holds the same records a deployed ledger contract would and enforces the
//! rules the migration engine depends on: contiguous batch ids, tokens that
//! reference existing batches, whitelisting before ledger entries, and no
//! type-level changes after sealing. Calls can be made to fail transiently
//! a set number of times, and every call is counted.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

use mirror_remote::{ContractInfo, LedgerService, RemoteError};
use mirror_types::{
    AccountEntity, Address, Batch, CurrencyType, Entity, FeeKey, FeeSchedule, FeeSubject,
    Frontier, FutureParams, LedgerEntry, LedgerHash, SettlementType, Token, TokenTotals,
    TokenType,
};

type Blake2b256 = Blake2b<U32>;

/// An in-memory ledger contract for testing.
/// Thread-safe for use with tokio's multi-threaded runtime.
pub struct NullLedger {
    state: Mutex<LedgerState>,
    faults: Mutex<Faults>,
}

#[derive(Default)]
struct Faults {
    /// Remaining transient failures per operation.
    pending: HashMap<&'static str, u32>,
    /// Calls observed per operation, failed ones included.
    calls: HashMap<&'static str, u32>,
}

struct LedgerState {
    info: ContractInfo,
    currency_types: Vec<CurrencyType>,
    token_types: Vec<TokenType>,
    fees: BTreeMap<FeeKey, FeeSchedule>,
    whitelist: Vec<Address>,
    owners: Vec<Address>,
    entries: HashMap<Address, LedgerEntry>,
    /// Batch `n` lives at index `n - 1`.
    batches: Vec<Batch>,
    global_tokens: BTreeMap<u64, Token>,
    /// Which ledger entry holds each attached token.
    attached: HashMap<u64, Address>,
    entities: BTreeMap<u64, Entity>,
    account_entities: Vec<AccountEntity>,
    totals: TokenTotals,
    max_token_id: u64,
}

impl LedgerState {
    fn new(info: ContractInfo) -> Self {
        Self {
            info,
            currency_types: Vec::new(),
            token_types: Vec::new(),
            fees: BTreeMap::new(),
            whitelist: Vec::new(),
            owners: Vec::new(),
            entries: HashMap::new(),
            batches: Vec::new(),
            global_tokens: BTreeMap::new(),
            attached: HashMap::new(),
            entities: BTreeMap::new(),
            account_entities: Vec::new(),
            totals: TokenTotals::default(),
            max_token_id: 0,
        }
    }

    fn find_token(&self, st_id: u64) -> Option<&Token> {
        match self.attached.get(&st_id) {
            Some(owner) => self
                .entries
                .get(owner)
                .and_then(|e| e.tokens.iter().find(|t| t.st_id == st_id)),
            None => self.global_tokens.get(&st_id),
        }
    }

    fn find_token_mut(&mut self, st_id: u64) -> Option<&mut Token> {
        match self.attached.get(&st_id) {
            Some(owner) => self
                .entries
                .get_mut(owner)
                .and_then(|e| e.tokens.iter_mut().find(|t| t.st_id == st_id)),
            None => self.global_tokens.get_mut(&st_id),
        }
    }

    fn ensure_not_sealed(&self, what: &str) -> Result<(), RemoteError> {
        if self.info.sealed {
            return Err(RemoteError::Rejected(format!(
                "contract is sealed: cannot {what}"
            )));
        }
        Ok(())
    }

    fn subject_exists(&self, subject: FeeSubject, id: u32) -> bool {
        match subject {
            FeeSubject::Currency => self.currency_types.iter().any(|c| c.id == id),
            FeeSubject::Token => self.token_types.iter().any(|t| t.id == id),
        }
    }
}

impl Default for NullLedger {
    fn default() -> Self {
        Self::new(ContractInfo {
            name: "StMaster".to_string(),
            version: "1.0".to_string(),
            symbol: "CCC".to_string(),
            owners: Vec::new(),
            sealed: false,
        })
    }
}

impl NullLedger {
    pub fn new(info: ContractInfo) -> Self {
        Self {
            state: Mutex::new(LedgerState::new(info)),
            faults: Mutex::new(Faults::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `times` calls of `op` fail with a transient error.
    ///
    /// `op` is the `LedgerService` method name, e.g. `"batch"` or `"add_token"`.
    pub fn fail_next(&self, op: &'static str, times: u32) {
        *self.faults().pending.entry(op).or_default() += times;
    }

    /// Number of times `op` was called, failed attempts included.
    pub fn calls(&self, op: &str) -> u32 {
        self.faults().calls.get(op).copied().unwrap_or(0)
    }

    /// Total calls of all write operations.
    pub fn write_calls(&self) -> u32 {
        const WRITES: &[&str] = &[
            "add_currency_type",
            "add_token_type",
            "set_fee",
            "create_entity",
            "whitelist_many",
            "set_account_entity",
            "create_ledger_entries",
            "load_batches",
            "add_token",
            "set_totals",
            "seal",
        ];
        WRITES.iter().map(|op| self.calls(op)).sum()
    }

    fn enter(&self, op: &'static str) -> Result<(), RemoteError> {
        let mut faults = self.faults();
        *faults.calls.entry(op).or_default() += 1;
        if let Some(remaining) = faults.pending.get_mut(op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RemoteError::Transient(format!("{op}: injected failure")));
            }
        }
        Ok(())
    }

    /// Burn `qty` from a token, as the service's own burn operation would.
    pub fn burn(&self, st_id: u64, qty: u64) -> Result<(), RemoteError> {
        let mut state = self.state();
        let owner = state.attached.get(&st_id).copied();
        let token = state
            .find_token_mut(st_id)
            .ok_or_else(|| RemoteError::NotFound(format!("token {st_id}")))?;
        if token.current_qty < qty {
            return Err(RemoteError::Rejected(format!(
                "token {st_id}: cannot burn {qty}, only {} left",
                token.current_qty
            )));
        }
        token.current_qty -= qty;
        let batch_id = token.batch_id;

        let batch = batch_id
            .checked_sub(1)
            .and_then(|i| state.batches.get_mut(i as usize))
            .ok_or_else(|| RemoteError::NotFound(format!("batch {batch_id}")))?;
        batch.burned_qty += qty;

        if let Some(entry) = owner.and_then(|o| state.entries.get_mut(&o)) {
            entry.spot_sum_qty = entry.spot_sum_qty.saturating_sub(qty);
            entry.spot_sum_qty_burned += qty;
        }
        state.totals.total_burned_qty += qty;
        Ok(())
    }

    /// Number of tokens held, attached and global.
    pub fn token_count(&self) -> usize {
        let state = self.state();
        state.attached.len() + state.global_tokens.len()
    }
}

fn mix(hash: &mut [u8; 32], parts: &[&[u8]]) {
    let mut hasher = Blake2b256::new();
    hasher.update(*hash);
    for part in parts {
        hasher.update(part);
    }
    hash.copy_from_slice(&hasher.finalize());
}

impl LedgerService for NullLedger {
    async fn contract_info(&self) -> Result<ContractInfo, RemoteError> {
        self.enter("contract_info")?;
        Ok(self.state().info.clone())
    }

    async fn currency_types(&self) -> Result<Vec<CurrencyType>, RemoteError> {
        self.enter("currency_types")?;
        Ok(self.state().currency_types.clone())
    }

    async fn token_types(&self) -> Result<Vec<TokenType>, RemoteError> {
        self.enter("token_types")?;
        Ok(self.state().token_types.clone())
    }

    async fn fee(&self, key: FeeKey) -> Result<FeeSchedule, RemoteError> {
        self.enter("fee")?;
        Ok(self.state().fees.get(&key).cloned().unwrap_or_default())
    }

    async fn whitelist(&self) -> Result<Vec<Address>, RemoteError> {
        self.enter("whitelist")?;
        Ok(self.state().whitelist.clone())
    }

    async fn ledger_owners(&self) -> Result<Vec<Address>, RemoteError> {
        self.enter("ledger_owners")?;
        Ok(self.state().owners.clone())
    }

    async fn ledger_entry(&self, owner: Address) -> Result<LedgerEntry, RemoteError> {
        self.enter("ledger_entry")?;
        self.state()
            .entries
            .get(&owner)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("ledger entry {owner}")))
    }

    async fn batch(&self, id: u64) -> Result<Batch, RemoteError> {
        self.enter("batch")?;
        let state = self.state();
        id.checked_sub(1)
            .and_then(|i| state.batches.get(i as usize))
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("batch {id}")))
    }

    async fn token(&self, st_id: u64) -> Result<Token, RemoteError> {
        self.enter("token")?;
        self.state()
            .find_token(st_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("token {st_id}")))
    }

    async fn frontier(&self) -> Result<Frontier, RemoteError> {
        self.enter("frontier")?;
        let state = self.state();
        Ok(Frontier {
            max_batch_id: state.batches.len() as u64,
            max_token_id: state.max_token_id,
        })
    }

    async fn entities(&self) -> Result<Vec<Entity>, RemoteError> {
        self.enter("entities")?;
        Ok(self.state().entities.values().cloned().collect())
    }

    async fn account_entities(&self) -> Result<Vec<AccountEntity>, RemoteError> {
        self.enter("account_entities")?;
        Ok(self.state().account_entities.clone())
    }

    async fn totals(&self) -> Result<TokenTotals, RemoteError> {
        self.enter("totals")?;
        Ok(self.state().totals.clone())
    }

    async fn is_sealed(&self) -> Result<bool, RemoteError> {
        self.enter("is_sealed")?;
        Ok(self.state().info.sealed)
    }

    async fn ledger_hashcode(
        &self,
        segment: u32,
        segments: u32,
    ) -> Result<LedgerHash, RemoteError> {
        self.enter("ledger_hashcode")?;
        if segments == 0 || segment >= segments {
            return Err(RemoteError::Rejected(format!(
                "segment {segment} out of range for {segments} segments"
            )));
        }
        let state = self.state();
        let mut hash = [0u8; 32];

        if segment == 0 {
            for ccy in &state.currency_types {
                mix(&mut hash, &[&ccy.id.to_be_bytes(), ccy.name.as_bytes()]);
            }
            for tok in &state.token_types {
                mix(&mut hash, &[&tok.id.to_be_bytes(), tok.name.as_bytes()]);
            }
            for batch in &state.batches {
                mix(
                    &mut hash,
                    &[
                        &batch.id.to_be_bytes(),
                        &batch.minted_qty.to_be_bytes(),
                        &batch.burned_qty.to_be_bytes(),
                    ],
                );
            }
            for token in state.global_tokens.values() {
                mix(
                    &mut hash,
                    &[&token.st_id.to_be_bytes(), &token.current_qty.to_be_bytes()],
                );
            }
        }

        let segments = segments as usize;
        let segment = segment as usize;
        for (_, owner) in state
            .owners
            .iter()
            .enumerate()
            .filter(|(i, _)| i % segments == segment)
        {
            let Some(entry) = state.entries.get(owner) else {
                continue;
            };
            mix(
                &mut hash,
                &[
                    owner.as_bytes(),
                    &entry.spot_sum_qty.to_be_bytes(),
                    &entry.spot_sum_qty_minted.to_be_bytes(),
                    &entry.spot_sum_qty_burned.to_be_bytes(),
                ],
            );
            let mut tokens: Vec<&Token> = entry.tokens.iter().collect();
            tokens.sort_by_key(|t| t.st_id);
            for token in tokens {
                mix(
                    &mut hash,
                    &[&token.st_id.to_be_bytes(), &token.current_qty.to_be_bytes()],
                );
            }
        }

        Ok(LedgerHash::new(hash))
    }

    async fn add_currency_type(
        &self,
        name: &str,
        unit: &str,
        decimals: u16,
    ) -> Result<u32, RemoteError> {
        self.enter("add_currency_type")?;
        let mut state = self.state();
        state.ensure_not_sealed("add currency type")?;
        if state.currency_types.iter().any(|c| c.name == name) {
            return Err(RemoteError::Rejected(format!(
                "currency type {name} already exists"
            )));
        }
        let id = state.currency_types.len() as u32 + 1;
        state.currency_types.push(CurrencyType {
            id,
            name: name.to_string(),
            unit: unit.to_string(),
            decimals,
        });
        Ok(id)
    }

    async fn add_token_type(
        &self,
        name: &str,
        settlement_type: SettlementType,
        future_params: &FutureParams,
        linked_contract: Address,
    ) -> Result<u32, RemoteError> {
        self.enter("add_token_type")?;
        let mut state = self.state();
        state.ensure_not_sealed("add token type")?;
        if state.token_types.iter().any(|t| t.name == name) {
            return Err(RemoteError::Rejected(format!(
                "token type {name} already exists"
            )));
        }
        let id = state.token_types.len() as u32 + 1;
        state.token_types.push(TokenType {
            id,
            name: name.to_string(),
            settlement_type,
            future_params: future_params.clone(),
            linked_contract,
        });
        Ok(id)
    }

    async fn set_fee(&self, key: FeeKey, fee: &FeeSchedule) -> Result<(), RemoteError> {
        self.enter("set_fee")?;
        let mut state = self.state();
        if !state.subject_exists(key.subject, key.subject_id) {
            return Err(RemoteError::Rejected(format!(
                "fee {key}: unknown subject type"
            )));
        }
        if fee.is_null() {
            state.fees.remove(&key);
        } else {
            state.fees.insert(key, fee.clone());
        }
        Ok(())
    }

    async fn create_entity(&self, entity: &Entity) -> Result<(), RemoteError> {
        self.enter("create_entity")?;
        let mut state = self.state();
        match state.entities.get(&entity.id) {
            Some(existing) if existing == entity => Ok(()),
            Some(_) => Err(RemoteError::Rejected(format!(
                "entity {} already exists with a different fee owner",
                entity.id
            ))),
            None => {
                state.entities.insert(entity.id, entity.clone());
                Ok(())
            }
        }
    }

    async fn whitelist_many(&self, addresses: &[Address]) -> Result<(), RemoteError> {
        self.enter("whitelist_many")?;
        let mut state = self.state();
        for address in addresses {
            if !state.whitelist.contains(address) {
                state.whitelist.push(*address);
            }
        }
        Ok(())
    }

    async fn set_account_entity(&self, mapping: &AccountEntity) -> Result<(), RemoteError> {
        self.enter("set_account_entity")?;
        let mut state = self.state();
        if !state.entities.contains_key(&mapping.entity_id) {
            return Err(RemoteError::Rejected(format!(
                "entity {} not found",
                mapping.entity_id
            )));
        }
        if !state.whitelist.contains(&mapping.address) {
            return Err(RemoteError::Rejected(format!(
                "{} is not whitelisted",
                mapping.address
            )));
        }
        match state
            .account_entities
            .iter_mut()
            .find(|m| m.address == mapping.address)
        {
            Some(existing) => existing.entity_id = mapping.entity_id,
            None => state.account_entities.push(mapping.clone()),
        }
        Ok(())
    }

    async fn create_ledger_entries(&self, entries: &[LedgerEntry]) -> Result<(), RemoteError> {
        self.enter("create_ledger_entries")?;
        let mut state = self.state();
        for entry in entries {
            if !state.whitelist.contains(&entry.owner) {
                return Err(RemoteError::Rejected(format!(
                    "ledger entry {}: owner is not whitelisted",
                    entry.owner
                )));
            }
            if let Some(bad) = entry
                .ccy_balances
                .iter()
                .find(|b| !state.currency_types.iter().any(|c| c.id == b.ccy_type_id))
            {
                return Err(RemoteError::Rejected(format!(
                    "ledger entry {}: unknown currency type {}",
                    entry.owner, bad.ccy_type_id
                )));
            }
            if state.entries.contains_key(&entry.owner) {
                continue;
            }
            state.owners.push(entry.owner);
            state.entries.insert(entry.owner, entry.seed());
        }
        Ok(())
    }

    async fn load_batches(&self, batches: &[Batch]) -> Result<(), RemoteError> {
        self.enter("load_batches")?;
        let mut state = self.state();
        for batch in batches {
            let next = state.batches.len() as u64 + 1;
            if batch.id < next {
                let existing = &state.batches[(batch.id - 1) as usize];
                if existing == batch {
                    continue;
                }
                return Err(RemoteError::Rejected(format!(
                    "batch {} already exists with different contents",
                    batch.id
                )));
            }
            if batch.id != next {
                return Err(RemoteError::Rejected(format!(
                    "batch {} out of sequence: expected {next}",
                    batch.id
                )));
            }
            if !state.token_types.iter().any(|t| t.id == batch.tok_type_id) {
                return Err(RemoteError::Rejected(format!(
                    "batch {}: unknown token type {}",
                    batch.id, batch.tok_type_id
                )));
            }
            state.batches.push(batch.clone());
        }
        Ok(())
    }

    async fn add_token(&self, owner: Option<Address>, token: &Token) -> Result<(), RemoteError> {
        self.enter("add_token")?;
        let mut state = self.state();
        if token.st_id == 0 {
            return Err(RemoteError::Rejected("token id 0 is reserved".to_string()));
        }
        if token.batch_id == 0 || token.batch_id > state.batches.len() as u64 {
            return Err(RemoteError::Rejected(format!(
                "token {}: batch {} not found",
                token.st_id, token.batch_id
            )));
        }
        if let Some(existing) = state.find_token(token.st_id) {
            let same_place = state.attached.get(&token.st_id).copied() == owner;
            if existing == token && same_place {
                return Ok(());
            }
            return Err(RemoteError::Rejected(format!(
                "token {} already exists with different contents",
                token.st_id
            )));
        }

        match owner {
            Some(addr) => {
                let entry = state.entries.get_mut(&addr).ok_or_else(|| {
                    RemoteError::Rejected(format!(
                        "token {}: no ledger entry for {addr}",
                        token.st_id
                    ))
                })?;
                entry.tokens.push(token.clone());
                state.attached.insert(token.st_id, addr);
            }
            None => {
                state.global_tokens.insert(token.st_id, token.clone());
            }
        }
        state.max_token_id = state.max_token_id.max(token.st_id);
        Ok(())
    }

    async fn set_totals(&self, totals: &TokenTotals) -> Result<(), RemoteError> {
        self.enter("set_totals")?;
        self.state().totals = totals.clone();
        Ok(())
    }

    async fn seal(&self) -> Result<(), RemoteError> {
        self.enter("seal")?;
        self.state().info.sealed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_types::Timestamp;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    fn batch(id: u64, qty: u64) -> Batch {
        Batch {
            id,
            minted_timestamp: Timestamp::new(1_000 + id),
            tok_type_id: 1,
            minted_qty: qty,
            burned_qty: 0,
            meta_keys: vec!["origin".into()],
            meta_values: vec!["test".into()],
            originator_fee: 0,
            originator_ccy_fee_bips: 0,
            originator: addr(9),
        }
    }

    fn token(st_id: u64, batch_id: u64, qty: u64) -> Token {
        Token {
            st_id,
            tok_type_id: 1,
            batch_id,
            minted_qty: qty,
            current_qty: qty,
            ft_price: 0,
            ft_last_mark_price: 0,
            ft_ledger_owner: Address::ZERO,
            ft_pl: 0,
        }
    }

    async fn with_token_type() -> NullLedger {
        let ledger = NullLedger::default();
        ledger
            .add_token_type(
                "CORSIA",
                SettlementType::Spot,
                &FutureParams::default(),
                Address::ZERO,
            )
            .await
            .unwrap();
        ledger
    }

    #[tokio::test]
    async fn type_ids_are_sequential_and_names_unique() {
        let ledger = NullLedger::default();
        assert_eq!(ledger.add_currency_type("USD", "cents", 2).await.unwrap(), 1);
        assert_eq!(ledger.add_currency_type("ETH", "wei", 18).await.unwrap(), 2);
        assert!(matches!(
            ledger.add_currency_type("USD", "cents", 2).await,
            Err(RemoteError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn sealed_ledger_refuses_new_types() {
        let ledger = NullLedger::default();
        ledger.seal().await.unwrap();
        assert!(ledger.is_sealed().await.unwrap());
        assert!(ledger.add_currency_type("USD", "cents", 2).await.is_err());
    }

    #[tokio::test]
    async fn token_needs_existing_batch() {
        let ledger = with_token_type().await;
        let err = ledger.add_token(None, &token(1, 1, 10)).await.unwrap_err();
        assert!(matches!(err, RemoteError::Rejected(msg) if msg.contains("batch 1 not found")));
    }

    #[tokio::test]
    async fn batches_must_be_contiguous() {
        let ledger = with_token_type().await;
        assert!(ledger.load_batches(&[batch(2, 10)]).await.is_err());
        ledger.load_batches(&[batch(1, 10), batch(2, 5)]).await.unwrap();
        // Reloading identical batches is a no-op.
        ledger.load_batches(&[batch(1, 10)]).await.unwrap();
        assert!(ledger.load_batches(&[batch(1, 11)]).await.is_err());
        assert_eq!(ledger.frontier().await.unwrap().max_batch_id, 2);
    }

    #[tokio::test]
    async fn ledger_entry_requires_whitelisting() {
        let ledger = NullLedger::default();
        let entry = LedgerEntry::empty(addr(1));
        assert!(ledger.create_ledger_entries(&[entry.clone()]).await.is_err());
        ledger.whitelist_many(&[addr(1)]).await.unwrap();
        ledger.create_ledger_entries(&[entry]).await.unwrap();
        assert_eq!(ledger.ledger_owners().await.unwrap(), vec![addr(1)]);
    }

    #[tokio::test]
    async fn add_token_is_idempotent_for_identical_records() {
        let ledger = with_token_type().await;
        ledger.load_batches(&[batch(1, 10)]).await.unwrap();
        ledger.add_token(None, &token(1, 1, 10)).await.unwrap();
        ledger.add_token(None, &token(1, 1, 10)).await.unwrap();
        assert_eq!(ledger.token_count(), 1);
        assert!(ledger.add_token(None, &token(1, 1, 9)).await.is_err());
    }

    #[tokio::test]
    async fn injected_failures_are_transient_and_counted() {
        let ledger = NullLedger::default();
        ledger.fail_next("whitelist", 2);
        assert!(matches!(
            ledger.whitelist().await,
            Err(RemoteError::Transient(_))
        ));
        assert!(ledger.whitelist().await.is_err());
        assert!(ledger.whitelist().await.is_ok());
        assert_eq!(ledger.calls("whitelist"), 3);
    }

    #[tokio::test]
    async fn burn_moves_quantity_to_batch() {
        let ledger = with_token_type().await;
        ledger.whitelist_many(&[addr(1)]).await.unwrap();
        let mut entry = LedgerEntry::empty(addr(1));
        entry.spot_sum_qty = 10;
        entry.spot_sum_qty_minted = 10;
        ledger.create_ledger_entries(&[entry]).await.unwrap();
        ledger.load_batches(&[batch(1, 10)]).await.unwrap();
        ledger.add_token(Some(addr(1)), &token(1, 1, 10)).await.unwrap();

        ledger.burn(1, 4).unwrap();

        assert_eq!(ledger.token(1).await.unwrap().current_qty, 6);
        assert_eq!(ledger.batch(1).await.unwrap().burned_qty, 4);
        let entry = ledger.ledger_entry(addr(1)).await.unwrap();
        assert_eq!(entry.spot_sum_qty, 6);
        assert_eq!(entry.spot_sum_qty_burned, 4);
        assert!(ledger.burn(1, 7).is_err());
    }

    #[tokio::test]
    async fn hashcode_changes_with_ledger_state() {
        let ledger = with_token_type().await;
        let before = ledger.ledger_hashcode(0, 2).await.unwrap();
        ledger.load_batches(&[batch(1, 10)]).await.unwrap();
        let after = ledger.ledger_hashcode(0, 2).await.unwrap();
        assert_ne!(before, after);
        assert!(ledger.ledger_hashcode(2, 2).await.is_err());
    }
}
