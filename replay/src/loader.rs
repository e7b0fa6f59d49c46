//! Phase-ordered snapshot replay.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use mirror_executor::{BatchExecutor, RetryPolicy};
use mirror_remote::{LedgerService, RemoteError};
use mirror_snapshot::{Snapshot, SnapshotData};
use mirror_types::{
    Address, Batch, CurrencyType, Entity, FeeScheduleEntry, LedgerEntry, Token, TokenType,
};
use mirror_utils::format_duration;

use crate::{ReplayError, ReplayReport};

/// Write chunk sizes and pacing.
#[derive(Clone, Debug)]
pub struct LoaderOptions {
    /// Addresses per `whitelist_many` call.
    pub whitelist_chunk: usize,
    /// Entries per `create_ledger_entries` call.
    pub ledger_entry_chunk: usize,
    /// Batches per `load_batches` call.
    pub batch_chunk: usize,
    /// Pause between phases.
    pub phase_delay: Duration,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            whitelist_chunk: 100,
            ledger_entry_chunk: 20,
            batch_chunk: 4,
            phase_delay: Duration::from_secs(1),
        }
    }
}

/// Brings a target instance to the state a snapshot describes.
///
/// The write executor's batch size bounds how many independent writes
/// (fees, entities, tokens) are in flight at once. Writes whose order the
/// target preserves (whitelist, ledger entries, batches) are issued one
/// call at a time.
pub struct StateLoader<'a, S, P> {
    target: &'a S,
    writes: &'a BatchExecutor<P>,
    options: LoaderOptions,
}

impl<'a, S: LedgerService, P: RetryPolicy> StateLoader<'a, S, P> {
    pub fn new(target: &'a S, writes: &'a BatchExecutor<P>) -> Self {
        Self {
            target,
            writes,
            options: LoaderOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LoaderOptions) -> Self {
        self.options = options;
        self
    }

    /// Replay `snapshot` into the target.
    ///
    /// A target that is already sealed is treated as a closed migration and
    /// left untouched. The target is sealed at the end only when the source
    /// was.
    pub async fn load(&self, snapshot: &Snapshot) -> Result<ReplayReport, ReplayError> {
        let started = Instant::now();
        let data = &snapshot.data;
        let target = self.target;
        let mut report = ReplayReport::default();

        let sealed = self
            .writes
            .call("is_sealed", move || target.is_sealed())
            .await
            .map_err(ReplayError::remote("seal check"))?;
        if sealed {
            self.check_sealed_types(data).await?;
            warn!("target is already sealed, treating migration as closed");
            report.closed = true;
            return Ok(report);
        }

        info!(source = %snapshot.address(), summary = %snapshot.summary(), "replaying snapshot");

        report.currency_types_created = self.load_currency_types(data).await?;
        self.settle("currency types").await;
        report.token_types_created = self.load_token_types(data).await?;
        self.settle("token types").await;
        report.fees_set += self
            .load_fees("global fees", data.global_fees().collect())
            .await?;
        self.settle("global fees").await;
        report.entities_created = self.load_entities(data).await?;
        report.addresses_whitelisted = self.load_whitelist(data).await?;
        report.account_entities_set = self.load_account_entities(data).await?;
        self.settle("whitelist").await;
        report.ledger_entries_created = self.load_ledger_entries(data).await?;
        self.settle("ledger entries").await;
        report.batches_loaded = self.load_batches(data).await?;
        self.settle("batches").await;
        report.tokens_added = self.load_tokens(data).await?;
        self.settle("tokens").await;
        report.fees_set += self
            .load_fees("owner fees", data.owner_fees().collect())
            .await?;
        report.totals_set = self.load_totals(data).await?;

        if snapshot.info.sealed {
            self.writes
                .call("seal", move || target.seal())
                .await
                .map_err(|e| ReplayError::from_executor("seal", e, |_| "target".into()))?;
            report.sealed = true;
            info!("target sealed");
        }

        info!(
            elapsed = %format_duration(started.elapsed()),
            noop = report.is_noop(),
            "replay complete"
        );
        Ok(report)
    }

    async fn settle(&self, after: &str) {
        if self.options.phase_delay.is_zero() {
            return;
        }
        debug!(after, delay_ms = self.options.phase_delay.as_millis() as u64, "settling");
        tokio::time::sleep(self.options.phase_delay).await;
    }

    async fn check_sealed_types(&self, data: &SnapshotData) -> Result<(), ReplayError> {
        let target = self.target;
        let ccy = self
            .writes
            .call("currency_types", move || target.currency_types())
            .await
            .map_err(ReplayError::remote("seal check"))?;
        let tok = self
            .writes
            .call("token_types", move || target.token_types())
            .await
            .map_err(ReplayError::remote("seal check"))?;

        let missing = data
            .currency_types
            .iter()
            .filter(|c| !ccy.iter().any(|t| t.name == c.name))
            .count()
            + data
                .token_types
                .iter()
                .filter(|c| !tok.iter().any(|t| t.name == c.name))
                .count();
        if missing > 0 {
            return Err(ReplayError::Sealed { missing });
        }
        Ok(())
    }

    /// Currency types are created one at a time in id order, so the target
    /// assigns the same ids the source did.
    async fn load_currency_types(&self, data: &SnapshotData) -> Result<usize, ReplayError> {
        const PHASE: &str = "currency types";
        let target = self.target;
        let existing = self
            .writes
            .call("currency_types", move || target.currency_types())
            .await
            .map_err(ReplayError::remote(PHASE))?;

        let mut sorted: Vec<&CurrencyType> = data.currency_types.iter().collect();
        sorted.sort_by_key(|c| c.id);

        let mut created = 0;
        for ccy in sorted {
            if let Some(found) = existing.iter().find(|e| e.name == ccy.name) {
                if found != ccy {
                    return Err(ReplayError::structural(
                        PHASE,
                        &ccy.name,
                        format!("target holds {found:?}"),
                    ));
                }
                continue;
            }

            // Look again inside the call: a reissued call must not create twice.
            let id = self
                .writes
                .call("add_currency_type", move || async move {
                    let present = target.currency_types().await?;
                    if let Some(found) = present.iter().find(|c| c.name == ccy.name) {
                        return Ok::<u32, RemoteError>(found.id);
                    }
                    target
                        .add_currency_type(&ccy.name, &ccy.unit, ccy.decimals)
                        .await
                })
                .await
                .map_err(|e| ReplayError::from_executor(PHASE, e, |_| ccy.name.clone()))?;
            if id != ccy.id {
                return Err(ReplayError::structural(
                    PHASE,
                    &ccy.name,
                    format!("target assigned id {id}, source id is {}", ccy.id),
                ));
            }
            created += 1;
        }
        info!(created, existing = existing.len(), "currency types loaded");
        Ok(created)
    }

    async fn load_token_types(&self, data: &SnapshotData) -> Result<usize, ReplayError> {
        const PHASE: &str = "token types";
        let target = self.target;
        let existing = self
            .writes
            .call("token_types", move || target.token_types())
            .await
            .map_err(ReplayError::remote(PHASE))?;

        let mut sorted: Vec<&TokenType> = data.token_types.iter().collect();
        sorted.sort_by_key(|t| t.id);

        let mut created = 0;
        for tok in sorted {
            if let Some(found) = existing.iter().find(|e| e.name == tok.name) {
                if found != tok {
                    return Err(ReplayError::structural(
                        PHASE,
                        &tok.name,
                        format!("target holds {found:?}"),
                    ));
                }
                continue;
            }

            let id = self
                .writes
                .call("add_token_type", move || async move {
                    let present = target.token_types().await?;
                    if let Some(found) = present.iter().find(|t| t.name == tok.name) {
                        return Ok::<u32, RemoteError>(found.id);
                    }
                    target
                        .add_token_type(
                            &tok.name,
                            tok.settlement_type,
                            &tok.future_params,
                            tok.linked_contract,
                        )
                        .await
                })
                .await
                .map_err(|e| ReplayError::from_executor(PHASE, e, |_| tok.name.clone()))?;
            if id != tok.id {
                return Err(ReplayError::structural(
                    PHASE,
                    &tok.name,
                    format!("target assigned id {id}, source id is {}", tok.id),
                ));
            }
            created += 1;
        }
        info!(created, existing = existing.len(), "token types loaded");
        Ok(created)
    }

    /// Set every schedule the target does not already hold.
    async fn load_fees(
        &self,
        phase: &'static str,
        entries: Vec<&FeeScheduleEntry>,
    ) -> Result<usize, ReplayError> {
        let target = self.target;
        let calls: Vec<_> = entries
            .iter()
            .map(|&entry| {
                move || async move {
                    let current = target.fee(entry.key).await?;
                    if current == entry.fee {
                        return Ok::<bool, RemoteError>(false);
                    }
                    target.set_fee(entry.key, &entry.fee).await.map(|()| true)
                }
            })
            .collect();
        let changed = self
            .writes
            .run(phase, &calls)
            .await
            .map_err(|e| ReplayError::from_executor(phase, e, |i| entries[i].key.to_string()))?;

        let set = changed.into_iter().filter(|c| *c).count();
        info!(phase, set, unchanged = entries.len() - set, "fee schedules loaded");
        Ok(set)
    }

    async fn load_entities(&self, data: &SnapshotData) -> Result<usize, ReplayError> {
        const PHASE: &str = "entities";
        let target = self.target;
        let existing: HashSet<u64> = self
            .writes
            .call("entities", move || target.entities())
            .await
            .map_err(ReplayError::remote(PHASE))?
            .into_iter()
            .map(|e| e.id)
            .collect();

        let missing: Vec<&Entity> = data
            .entities
            .iter()
            .filter(|e| !existing.contains(&e.id))
            .collect();
        let calls: Vec<_> = missing
            .iter()
            .map(|&entity| move || target.create_entity(entity))
            .collect();
        self.writes
            .run("create_entity", &calls)
            .await
            .map_err(|e| {
                ReplayError::from_executor(PHASE, e, |i| format!("entity {}", missing[i].id))
            })?;

        info!(created = missing.len(), "entities loaded");
        Ok(missing.len())
    }

    /// Admission order is preserved: chunks go out one at a time.
    async fn load_whitelist(&self, data: &SnapshotData) -> Result<usize, ReplayError> {
        const PHASE: &str = "whitelist";
        let target = self.target;
        let existing: HashSet<Address> = self
            .writes
            .call("whitelist", move || target.whitelist())
            .await
            .map_err(ReplayError::remote(PHASE))?
            .into_iter()
            .collect();

        let missing: Vec<Address> = data
            .whitelist
            .iter()
            .filter(|a| !existing.contains(*a))
            .copied()
            .collect();
        let chunks: Vec<&[Address]> = missing
            .chunks(self.options.whitelist_chunk.max(1))
            .collect();
        let calls: Vec<_> = chunks
            .iter()
            .map(|&chunk| move || target.whitelist_many(chunk))
            .collect();
        self.writes
            .with_batch_size(1)
            .run("whitelist_many", &calls)
            .await
            .map_err(|e| {
                ReplayError::from_executor(PHASE, e, |i| format!("chunk starting at {}", chunks[i][0]))
            })?;

        info!(admitted = missing.len(), chunks = chunks.len(), "whitelist loaded");
        Ok(missing.len())
    }

    async fn load_account_entities(&self, data: &SnapshotData) -> Result<usize, ReplayError> {
        const PHASE: &str = "account entities";
        let target = self.target;
        let existing = self
            .writes
            .call("account_entities", move || target.account_entities())
            .await
            .map_err(ReplayError::remote(PHASE))?;

        let missing: Vec<_> = data
            .account_entity_map
            .iter()
            .filter(|m| !existing.contains(m))
            .collect();
        let calls: Vec<_> = missing
            .iter()
            .map(|&mapping| move || target.set_account_entity(mapping))
            .collect();
        self.writes
            .run("set_account_entity", &calls)
            .await
            .map_err(|e| {
                ReplayError::from_executor(PHASE, e, |i| missing[i].address.to_string())
            })?;

        info!(set = missing.len(), "account entities loaded");
        Ok(missing.len())
    }

    /// Entries are created without tokens, in source owner order.
    async fn load_ledger_entries(&self, data: &SnapshotData) -> Result<usize, ReplayError> {
        const PHASE: &str = "ledger entries";
        let target = self.target;
        let existing: HashSet<Address> = self
            .writes
            .call("ledger_owners", move || target.ledger_owners())
            .await
            .map_err(ReplayError::remote(PHASE))?
            .into_iter()
            .collect();

        let by_owner: HashMap<Address, &LedgerEntry> =
            data.ledger_entries.iter().map(|e| (e.owner, e)).collect();
        let seeds: Vec<LedgerEntry> = data
            .ledger_owners
            .iter()
            .filter(|owner| !existing.contains(*owner))
            .map(|owner| {
                by_owner
                    .get(owner)
                    .map_or_else(|| LedgerEntry::empty(*owner), |e| e.seed())
            })
            .collect();

        let chunks: Vec<&[LedgerEntry]> = seeds
            .chunks(self.options.ledger_entry_chunk.max(1))
            .collect();
        let calls: Vec<_> = chunks
            .iter()
            .map(|&chunk| move || target.create_ledger_entries(chunk))
            .collect();
        self.writes
            .with_batch_size(1)
            .run("create_ledger_entries", &calls)
            .await
            .map_err(|e| {
                ReplayError::from_executor(PHASE, e, |i| {
                    format!("chunk starting at {}", chunks[i][0].owner)
                })
            })?;

        info!(created = seeds.len(), existing = existing.len(), "ledger entries loaded");
        Ok(seeds.len())
    }

    /// Batches beyond the target's frontier, in id order, one chunk at a time.
    async fn load_batches(&self, data: &SnapshotData) -> Result<usize, ReplayError> {
        const PHASE: &str = "batches";
        let target = self.target;
        let frontier = self
            .writes
            .call("frontier", move || target.frontier())
            .await
            .map_err(ReplayError::remote(PHASE))?;

        let mut pending: Vec<Batch> = data
            .batches
            .iter()
            .filter(|b| b.id > frontier.max_batch_id)
            .cloned()
            .collect();
        pending.sort_by_key(|b| b.id);

        let chunks: Vec<&[Batch]> = pending.chunks(self.options.batch_chunk.max(1)).collect();
        let calls: Vec<_> = chunks
            .iter()
            .map(|&chunk| move || target.load_batches(chunk))
            .collect();
        self.writes
            .with_batch_size(1)
            .run("load_batches", &calls)
            .await
            .map_err(|e| {
                ReplayError::from_executor(PHASE, e, |i| format!("batch {}", chunks[i][0].id))
            })?;

        let expected = data.frontier().max_batch_id;
        let reached = self
            .writes
            .call("frontier", move || target.frontier())
            .await
            .map_err(ReplayError::remote(PHASE))?
            .max_batch_id;
        if reached < expected {
            return Err(ReplayError::structural(
                PHASE,
                format!("batch {expected}"),
                format!("target batch frontier stops at {reached}"),
            ));
        }

        info!(
            loaded = pending.len(),
            previous_frontier = frontier.max_batch_id,
            "batches loaded"
        );
        Ok(pending.len())
    }

    /// Tokens not yet on the target, attached to their owner or held
    /// globally.
    async fn load_tokens(&self, data: &SnapshotData) -> Result<usize, ReplayError> {
        const PHASE: &str = "tokens";
        let target = self.target;
        let frontier = self
            .writes
            .call("frontier", move || target.frontier())
            .await
            .map_err(ReplayError::remote(PHASE))?;

        // Ids at or below the target's frontier may already be present.
        let probe: Vec<(Option<Address>, &Token)> = data
            .all_tokens()
            .filter(|(_, t)| t.st_id <= frontier.max_token_id)
            .collect();
        let calls: Vec<_> = probe
            .iter()
            .map(|&(_, token)| {
                let id = token.st_id;
                move || async move {
                    match target.token(id).await {
                        Ok(found) => Ok(Some(found)),
                        Err(RemoteError::NotFound(_)) => Ok(None),
                        Err(e) => Err(e),
                    }
                }
            })
            .collect();
        let found = self
            .writes
            .run("token", &calls)
            .await
            .map_err(ReplayError::remote(PHASE))?;

        let mut present: HashSet<u64> = HashSet::new();
        let mut holders: HashMap<Address, Vec<u64>> = HashMap::new();
        for (&(owner, token), found) in probe.iter().zip(found) {
            let Some(found) = found else { continue };
            if found != *token {
                return Err(ReplayError::structural(
                    PHASE,
                    format!("token {}", token.st_id),
                    "target holds a different token under this id",
                ));
            }
            present.insert(token.st_id);
            if let Some(owner) = owner {
                holders.entry(owner).or_default().push(token.st_id);
            }
        }
        self.check_holders(&holders).await?;

        let mut pending: Vec<(Option<Address>, &Token)> = data
            .all_tokens()
            .filter(|(_, t)| !present.contains(&t.st_id))
            .collect();
        pending.sort_by_key(|(_, t)| t.st_id);

        let calls: Vec<_> = pending
            .iter()
            .map(|&(owner, token)| move || target.add_token(owner, token))
            .collect();
        self.writes
            .run("add_token", &calls)
            .await
            .map_err(|e| {
                ReplayError::from_executor(PHASE, e, |i| format!("token {}", pending[i].1.st_id))
            })?;

        info!(added = pending.len(), present = present.len(), "tokens loaded");
        Ok(pending.len())
    }

    /// Tokens found on the target must sit in the ledger entry the snapshot
    /// puts them in.
    async fn check_holders(
        &self,
        holders: &HashMap<Address, Vec<u64>>,
    ) -> Result<(), ReplayError> {
        const PHASE: &str = "tokens";
        if holders.is_empty() {
            return Ok(());
        }
        let target = self.target;
        let owners: Vec<Address> = holders.keys().copied().collect();
        let calls: Vec<_> = owners
            .iter()
            .map(|&owner| move || target.ledger_entry(owner))
            .collect();
        let entries = self
            .writes
            .run("ledger_entry", &calls)
            .await
            .map_err(ReplayError::remote(PHASE))?;

        for (owner, entry) in owners.iter().zip(entries) {
            let held: HashSet<u64> = entry.token_ids().collect();
            let ids = holders.get(owner).map(Vec::as_slice).unwrap_or_default();
            if let Some(id) = ids.iter().find(|&&id| !held.contains(&id)) {
                return Err(ReplayError::structural(
                    PHASE,
                    format!("token {id}"),
                    format!("present on the target but not held by {owner}"),
                ));
            }
        }
        Ok(())
    }

    async fn load_totals(&self, data: &SnapshotData) -> Result<bool, ReplayError> {
        const PHASE: &str = "totals";
        let target = self.target;
        let current = self
            .writes
            .call("totals", move || target.totals())
            .await
            .map_err(ReplayError::remote(PHASE))?;
        if current == data.totals {
            return Ok(false);
        }

        let totals = &data.totals;
        self.writes
            .call("set_totals", move || target.set_totals(totals))
            .await
            .map_err(|e| ReplayError::from_executor(PHASE, e, |_| "totals".into()))?;
        info!(
            max_token_id = totals.max_token_id,
            minted = totals.total_minted_qty,
            burned = totals.total_burned_qty,
            "totals set"
        );
        Ok(true)
    }
}
