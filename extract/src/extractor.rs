//! Snapshot extraction.

use std::collections::HashSet;
use std::time::Instant;

use tracing::{debug, info, warn};

use mirror_executor::{BatchExecutor, RetryPolicy};
use mirror_remote::LedgerService;
use mirror_snapshot::{HashMode, SnapshotData, SnapshotInfo};
use mirror_types::{
    Address, Batch, CurrencyType, FeeKey, FeeOwner, FeeSchedule, FeeScheduleEntry, FeeSubject,
    LedgerEntry, NetworkId, Timestamp, Token, TokenType,
};
use mirror_utils::format_duration;

use crate::ExtractError;

/// Pulls the complete state of one contract instance through a
/// [`BatchExecutor`].
///
/// Small sets (types, whitelist, owners, entities) are read with one call
/// each; per-owner and per-id records are fanned out in chunks.
pub struct StateExtractor<'a, S, P> {
    service: &'a S,
    reads: &'a BatchExecutor<P>,
    serial_reads: bool,
    previous: Option<&'a SnapshotData>,
}

impl<'a, S: LedgerService, P: RetryPolicy> StateExtractor<'a, S, P> {
    pub fn new(service: &'a S, reads: &'a BatchExecutor<P>) -> Self {
        Self {
            service,
            reads,
            serial_reads: false,
            previous: None,
        }
    }

    /// Read ledger entries one call at a time.
    pub fn serial_reads(mut self, serial: bool) -> Self {
        self.serial_reads = serial;
        self
    }

    /// Reuse fee schedules a previous extraction of the same instance
    /// already read, for the types and owners it knew about.
    pub fn resume_from(mut self, previous: &'a SnapshotData) -> Self {
        self.previous = Some(previous);
        self
    }

    /// Extract every record of the instance at `address`.
    pub async fn extract(
        &self,
        network: NetworkId,
        address: Address,
        hash_mode: HashMode,
    ) -> Result<(SnapshotInfo, SnapshotData), ExtractError> {
        let started = Instant::now();
        let service = self.service;

        let contract = self
            .reads
            .call("contract_info", move || service.contract_info())
            .await
            .map_err(ExtractError::remote("contract info"))?;
        info!(
            %address,
            name = %contract.name,
            version = %contract.version,
            sealed = contract.sealed,
            "extracting contract state"
        );

        let currency_types = self
            .reads
            .call("currency_types", move || service.currency_types())
            .await
            .map_err(ExtractError::remote("currency types"))?;
        let token_types = self
            .reads
            .call("token_types", move || service.token_types())
            .await
            .map_err(ExtractError::remote("token types"))?;
        let frontier = self
            .reads
            .call("frontier", move || service.frontier())
            .await
            .map_err(ExtractError::remote("frontier"))?;
        info!(
            currency_types = currency_types.len(),
            token_types = token_types.len(),
            max_batch_id = frontier.max_batch_id,
            max_token_id = frontier.max_token_id,
            "types and frontier read"
        );

        let mut fee_schedules = self
            .read_fees("global fees", global_fee_keys(&currency_types, &token_types))
            .await?;

        let whitelist = self
            .reads
            .call("whitelist", move || service.whitelist())
            .await
            .map_err(ExtractError::remote("whitelist"))?;
        let ledger_owners = self
            .reads
            .call("ledger_owners", move || service.ledger_owners())
            .await
            .map_err(ExtractError::remote("ledger owners"))?;
        check_owners_whitelisted(&ledger_owners, &whitelist);

        let ledger_entries = self.read_ledger_entries(&ledger_owners).await?;

        let owner_keys = owner_fee_keys(&ledger_owners, &currency_types, &token_types);
        fee_schedules.extend(self.read_fees("owner fees", owner_keys).await?);

        let batch_ids: Vec<u64> = frontier.batch_ids().collect();
        let batches = self.read_batches(&batch_ids).await?;

        let attached = attached_token_ids(&ledger_entries, frontier.max_token_id)?;
        let global_ids: Vec<u64> = frontier
            .token_ids()
            .filter(|id| !attached.contains(id))
            .collect();
        let global_tokens = self.read_global_tokens(&global_ids).await?;
        check_batch_references(&ledger_entries, &global_tokens, frontier.max_batch_id)?;

        let entities = self
            .reads
            .call("entities", move || service.entities())
            .await
            .map_err(ExtractError::remote("entities"))?;
        let account_entity_map = self
            .reads
            .call("account_entities", move || service.account_entities())
            .await
            .map_err(ExtractError::remote("account entities"))?;
        let totals = self
            .reads
            .call("totals", move || service.totals())
            .await
            .map_err(ExtractError::remote("totals"))?;

        let info = SnapshotInfo {
            network,
            address,
            name: contract.name,
            version: contract.version,
            symbol: contract.symbol,
            owners: contract.owners,
            sealed: contract.sealed,
            hash_mode,
            created_at: Timestamp::now(),
            frontier,
        };
        let data = SnapshotData {
            currency_types,
            token_types,
            fee_schedules,
            ledger_owners,
            ledger_entries,
            batches,
            global_tokens,
            whitelist,
            entities,
            account_entity_map,
            totals,
        };

        info!(
            %address,
            elapsed = %format_duration(started.elapsed()),
            tokens = data.token_count(),
            "extraction complete"
        );
        Ok((info, data))
    }

    async fn read_fees(
        &self,
        phase: &'static str,
        keys: Vec<FeeKey>,
    ) -> Result<Vec<FeeScheduleEntry>, ExtractError> {
        let total = keys.len();
        let mut known: Vec<Option<FeeSchedule>> =
            keys.iter().map(|key| self.previously_read(key)).collect();
        let to_read: Vec<FeeKey> = keys
            .iter()
            .zip(&known)
            .filter(|(_, fee)| fee.is_none())
            .map(|(key, _)| *key)
            .collect();

        let service = self.service;
        let calls: Vec<_> = to_read
            .iter()
            .map(|&key| move || service.fee(key))
            .collect();
        let mut read = self
            .reads
            .run(phase, &calls)
            .await
            .map_err(ExtractError::remote(phase))?
            .into_iter();

        for slot in known.iter_mut().filter(|fee| fee.is_none()) {
            *slot = read.next();
        }

        let entries: Vec<FeeScheduleEntry> = keys
            .into_iter()
            .zip(known)
            .filter_map(|(key, fee)| fee.map(|fee| FeeScheduleEntry { key, fee }))
            .filter(|entry| !entry.fee.is_null())
            .collect();
        info!(
            phase,
            read = to_read.len(),
            reused = total - to_read.len(),
            non_null = entries.len(),
            "fee schedules read"
        );
        Ok(entries)
    }

    /// The schedule under `key` from the previous snapshot, when that snapshot
    /// covered both the subject type and the owner.
    fn previously_read(&self, key: &FeeKey) -> Option<FeeSchedule> {
        let previous = self.previous?;
        let type_known = match key.subject {
            FeeSubject::Currency => previous
                .currency_types
                .iter()
                .any(|c| c.id == key.subject_id),
            FeeSubject::Token => previous.token_types.iter().any(|t| t.id == key.subject_id),
        };
        let owner_known = match key.owner {
            FeeOwner::Global => true,
            FeeOwner::Owner(addr) => previous.ledger_owners.contains(&addr),
        };
        (type_known && owner_known).then(|| previous.fee(key))
    }

    async fn read_ledger_entries(
        &self,
        owners: &[Address],
    ) -> Result<Vec<LedgerEntry>, ExtractError> {
        let service = self.service;
        let calls: Vec<_> = owners
            .iter()
            .map(|&owner| move || service.ledger_entry(owner))
            .collect();
        let entries = if self.serial_reads {
            self.reads
                .with_batch_size(1)
                .run("ledger_entries", &calls)
                .await
        } else {
            self.reads.run("ledger_entries", &calls).await
        }
        .map_err(ExtractError::remote("ledger entries"))?;

        for (owner, entry) in owners.iter().zip(&entries) {
            if entry.owner != *owner {
                return Err(ExtractError::malformed(
                    "ledger entries",
                    format!("asked for {owner}, got entry of {}", entry.owner),
                ));
            }
        }
        info!(entries = entries.len(), serial = self.serial_reads, "ledger entries read");
        Ok(entries)
    }

    async fn read_batches(&self, ids: &[u64]) -> Result<Vec<Batch>, ExtractError> {
        let service = self.service;
        let calls: Vec<_> = ids.iter().map(|&id| move || service.batch(id)).collect();
        let batches = self
            .reads
            .run("batches", &calls)
            .await
            .map_err(ExtractError::remote("batches"))?;

        for (id, batch) in ids.iter().zip(&batches) {
            if batch.id != *id {
                return Err(ExtractError::malformed(
                    "batches",
                    format!("asked for batch {id}, got batch {}", batch.id),
                ));
            }
        }
        info!(batches = batches.len(), "batches read");
        Ok(batches)
    }

    async fn read_global_tokens(&self, ids: &[u64]) -> Result<Vec<Token>, ExtractError> {
        let service = self.service;
        let calls: Vec<_> = ids.iter().map(|&id| move || service.token(id)).collect();
        let tokens = self
            .reads
            .run("global_tokens", &calls)
            .await
            .map_err(ExtractError::remote("global tokens"))?;

        for (id, token) in ids.iter().zip(&tokens) {
            if token.st_id != *id {
                return Err(ExtractError::malformed(
                    "global tokens",
                    format!("asked for token {id}, got token {}", token.st_id),
                ));
            }
        }
        info!(tokens = tokens.len(), "global tokens read");
        Ok(tokens)
    }
}

fn global_fee_keys(currency_types: &[CurrencyType], token_types: &[TokenType]) -> Vec<FeeKey> {
    currency_types
        .iter()
        .map(|c| FeeKey::global(FeeSubject::Currency, c.id))
        .chain(
            token_types
                .iter()
                .map(|t| FeeKey::global(FeeSubject::Token, t.id)),
        )
        .collect()
}

/// One key per (owner, type) pair, owners in ledger order.
fn owner_fee_keys(
    owners: &[Address],
    currency_types: &[CurrencyType],
    token_types: &[TokenType],
) -> Vec<FeeKey> {
    owners
        .iter()
        .flat_map(|&owner| {
            currency_types
                .iter()
                .map(move |c| FeeKey::owned(FeeSubject::Currency, c.id, owner))
                .chain(
                    token_types
                        .iter()
                        .map(move |t| FeeKey::owned(FeeSubject::Token, t.id, owner)),
                )
        })
        .collect()
}

fn check_owners_whitelisted(owners: &[Address], whitelist: &[Address]) {
    let admitted: HashSet<&Address> = whitelist.iter().collect();
    for owner in owners {
        if !owner.is_zero() && !admitted.contains(owner) {
            warn!(%owner, "ledger owner is not whitelisted");
        }
    }
}

/// Ids of tokens held by ledger entries. Each id may be held once, and
/// never beyond the published frontier.
fn attached_token_ids(
    entries: &[LedgerEntry],
    max_token_id: u64,
) -> Result<HashSet<u64>, ExtractError> {
    let mut ids = HashSet::new();
    for entry in entries {
        for st_id in entry.token_ids() {
            if st_id == 0 || st_id > max_token_id {
                return Err(ExtractError::malformed(
                    "ledger entries",
                    format!(
                        "{} holds token {st_id} outside 1..={max_token_id}",
                        entry.owner
                    ),
                ));
            }
            if !ids.insert(st_id) {
                return Err(ExtractError::malformed(
                    "ledger entries",
                    format!("token {st_id} is held by more than one entry"),
                ));
            }
        }
    }
    debug!(attached = ids.len(), "attached tokens indexed");
    Ok(ids)
}

fn check_batch_references(
    entries: &[LedgerEntry],
    global_tokens: &[Token],
    max_batch_id: u64,
) -> Result<(), ExtractError> {
    let tokens = entries
        .iter()
        .flat_map(|e| e.tokens.iter())
        .chain(global_tokens);
    for token in tokens {
        if token.batch_id == 0 || token.batch_id > max_batch_id {
            return Err(ExtractError::malformed(
                "tokens",
                format!(
                    "token {} references batch {} outside 1..={max_batch_id}",
                    token.st_id, token.batch_id
                ),
            ));
        }
    }
    Ok(())
}
