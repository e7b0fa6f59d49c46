//! Offchain fingerprint of snapshot data.
//!
//! Canonical order:
//!
//! 1. currency types by id, each followed by its global fee schedule
//! 2. token types by id, each followed by its global fee schedule
//! 3. whitelist in snapshot order
//! 4. batches by id
//! 5. ledger entries in ledger-owner order, each followed by the owner's fee
//!    schedules sorted by key; then any stray ledger entries (owner not
//!    listed, or listed twice) by owner, and any stray fee schedules (subject
//!    type or owner unknown, or key repeated) by key
//! 6. global tokens by id
//! 7. entities by id
//! 8. account-entity mappings by address
//! 9. token totals
//!
//! Null fee schedules are never folded. Whitelist and ledger-owner order is
//! significant; every other collection is sorted before folding.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use mirror_snapshot::SnapshotData;
use mirror_types::{
    Address, FeeKey, FeeOwner, FeeScheduleEntry, FeeSubject, LedgerEntry, LedgerHash,
};

use crate::{ChainHasher, Fold};

/// The chain value after one record was folded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub label: String,
    pub hash: LedgerHash,
}

/// A fingerprint together with its trace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub hash: LedgerHash,
    pub checkpoints: Vec<Checkpoint>,
}

/// Known, explainable deltas to leave out of the fold.
#[derive(Clone, Debug, Default)]
pub struct FingerprintOptions {
    /// Global tokens with these ids are skipped.
    pub excluded_global_tokens: BTreeSet<u64>,
    /// Fold only this many whitelist entries.
    pub whitelist_limit: Option<usize>,
}

impl FingerprintOptions {
    pub fn excluding_global_tokens(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.excluded_global_tokens.extend(ids);
        self
    }

    pub fn whitelist_limit(mut self, limit: usize) -> Self {
        self.whitelist_limit = Some(limit);
        self
    }
}

struct Tracer {
    hasher: ChainHasher,
    checkpoints: Vec<Checkpoint>,
}

impl Tracer {
    fn checkpoint(&mut self, label: String) {
        self.checkpoints.push(Checkpoint {
            label,
            hash: self.hasher.current(),
        });
    }

    fn record<T: Fold>(&mut self, label: String, record: &T) {
        record.fold(&mut self.hasher);
        self.checkpoint(label);
    }

    fn finish(self) -> Fingerprint {
        Fingerprint {
            hash: self.hasher.current(),
            checkpoints: self.checkpoints,
        }
    }
}

pub fn fingerprint(data: &SnapshotData) -> Fingerprint {
    fingerprint_with(data, &FingerprintOptions::default())
}

pub fn fingerprint_with(data: &SnapshotData, options: &FingerprintOptions) -> Fingerprint {
    let mut t = Tracer {
        hasher: ChainHasher::new(),
        checkpoints: Vec::new(),
    };

    let mut global_fees: HashMap<FeeKey, &FeeScheduleEntry> = HashMap::new();
    let mut owner_fees: HashMap<Address, Vec<&FeeScheduleEntry>> = HashMap::new();
    let mut stray_fees: Vec<&FeeScheduleEntry> = Vec::new();
    for entry in data.fee_schedules.iter().filter(|e| !e.fee.is_null()) {
        match entry.key.owner {
            FeeOwner::Global => {
                if global_fees.contains_key(&entry.key) {
                    stray_fees.push(entry);
                } else {
                    global_fees.insert(entry.key, entry);
                }
            }
            FeeOwner::Owner(owner) => owner_fees.entry(owner).or_default().push(entry),
        }
    }

    let mut currency_types: Vec<_> = data.currency_types.iter().collect();
    currency_types.sort_by_key(|c| c.id);
    for ccy in currency_types {
        t.record(format!("currency_type:{}", ccy.id), ccy);
        let key = FeeKey::global(FeeSubject::Currency, ccy.id);
        if let Some(fee) = global_fees.remove(&key) {
            t.record(format!("fee:{key}"), fee);
        }
    }

    let mut token_types: Vec<_> = data.token_types.iter().collect();
    token_types.sort_by_key(|tt| tt.id);
    for tok in token_types {
        t.record(format!("token_type:{}", tok.id), tok);
        let key = FeeKey::global(FeeSubject::Token, tok.id);
        if let Some(fee) = global_fees.remove(&key) {
            t.record(format!("fee:{key}"), fee);
        }
    }

    let whitelist_len = options
        .whitelist_limit
        .map_or(data.whitelist.len(), |n| n.min(data.whitelist.len()));
    for addr in &data.whitelist[..whitelist_len] {
        t.hasher.mix_address(addr);
        t.checkpoint(format!("whitelist:{addr}"));
    }

    let mut batches: Vec<_> = data.batches.iter().collect();
    batches.sort_by_key(|b| b.id);
    for batch in batches {
        t.record(format!("batch:{}", batch.id), batch);
    }

    let listed: HashSet<&Address> = data.ledger_owners.iter().collect();
    let mut entries: HashMap<Address, &LedgerEntry> = HashMap::new();
    let mut stray_entries: Vec<&LedgerEntry> = Vec::new();
    for entry in &data.ledger_entries {
        if listed.contains(&entry.owner) && !entries.contains_key(&entry.owner) {
            entries.insert(entry.owner, entry);
        } else {
            stray_entries.push(entry);
        }
    }

    for owner in &data.ledger_owners {
        match entries.get(owner) {
            Some(entry) => entry.fold(&mut t.hasher),
            None => {
                t.hasher.mix_address(owner);
                t.hasher.mix(&[]);
            }
        }
        t.checkpoint(format!("ledger_entry:{owner}"));

        if let Some(mut fees) = owner_fees.remove(owner) {
            fees.sort_by_key(|e| e.key);
            for fee in fees {
                t.record(format!("fee:{}", fee.key), fee);
            }
        }
    }

    stray_entries.sort_by_key(|e| e.owner);
    for entry in stray_entries {
        t.record(format!("ledger_entry:{}", entry.owner), entry);
    }

    stray_fees.extend(global_fees.into_values());
    stray_fees.extend(owner_fees.into_values().flatten());
    stray_fees.sort_by_key(|e| e.key);
    for fee in stray_fees {
        t.record(format!("fee:{}", fee.key), fee);
    }

    let mut global_tokens: Vec<_> = data
        .global_tokens
        .iter()
        .filter(|tok| !options.excluded_global_tokens.contains(&tok.st_id))
        .collect();
    global_tokens.sort_by_key(|tok| tok.st_id);
    for token in global_tokens {
        t.record(format!("global_token:{}", token.st_id), token);
    }

    let mut entities: Vec<_> = data.entities.iter().collect();
    entities.sort_by_key(|e| e.id);
    for entity in entities {
        t.record(format!("entity:{}", entity.id), entity);
    }

    let mut mappings: Vec<_> = data.account_entity_map.iter().collect();
    mappings.sort_by_key(|m| m.address);
    for mapping in mappings {
        t.record(format!("account_entity:{}", mapping.address), mapping);
    }

    t.record("totals".to_string(), &data.totals);

    t.finish()
}

/// Where two fingerprint traces first disagree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Divergence {
    pub position: usize,
    /// Label on the expected side, or on the actual side when the expected
    /// trace ended first.
    pub label: String,
    pub expected: Option<LedgerHash>,
    pub actual: Option<LedgerHash>,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |h: &Option<LedgerHash>| h.map_or_else(|| "<none>".to_string(), |h| h.to_string());
        write!(
            f,
            "checkpoint {} ({}): expected {}, got {}",
            self.position,
            self.label,
            show(&self.expected),
            show(&self.actual)
        )
    }
}

/// The first checkpoint at which `actual` stops matching `expected`.
pub fn first_divergence(expected: &Fingerprint, actual: &Fingerprint) -> Option<Divergence> {
    let len = expected.checkpoints.len().max(actual.checkpoints.len());
    (0..len).find_map(|i| {
        let e = expected.checkpoints.get(i);
        let a = actual.checkpoints.get(i);
        if e == a {
            return None;
        }
        let label = e.or(a).map(|c| c.label.clone()).unwrap_or_default();
        Some(Divergence {
            position: i,
            label,
            expected: e.map(|c| c.hash),
            actual: a.map(|c| c.hash),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_types::{
        Batch, CurrencyType, FeeSchedule, FeeScheduleEntry, Timestamp, Token, TokenTotals,
    };

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    fn batch(id: u64) -> Batch {
        Batch {
            id,
            minted_timestamp: Timestamp::new(id),
            tok_type_id: 1,
            minted_qty: 100,
            burned_qty: 0,
            meta_keys: vec![],
            meta_values: vec![],
            originator_fee: 0,
            originator_ccy_fee_bips: 0,
            originator: addr(9),
        }
    }

    fn token(st_id: u64) -> Token {
        Token {
            st_id,
            tok_type_id: 1,
            batch_id: 1,
            minted_qty: 50,
            current_qty: 50,
            ft_price: 0,
            ft_last_mark_price: 0,
            ft_ledger_owner: Address::ZERO,
            ft_pl: 0,
        }
    }

    fn sample() -> SnapshotData {
        SnapshotData {
            currency_types: vec![
                CurrencyType {
                    id: 1,
                    name: "USD".into(),
                    unit: "cents".into(),
                    decimals: 2,
                },
                CurrencyType {
                    id: 2,
                    name: "ETH".into(),
                    unit: "wei".into(),
                    decimals: 18,
                },
            ],
            whitelist: vec![addr(1), addr(2), addr(3)],
            ledger_owners: vec![addr(1), addr(2)],
            ledger_entries: vec![LedgerEntry::empty(addr(1)), LedgerEntry::empty(addr(2))],
            batches: vec![batch(1), batch(2)],
            global_tokens: vec![token(1), token(2)],
            totals: TokenTotals {
                base_id: 1,
                max_token_id: 2,
                total_minted_qty: 200,
                total_burned_qty: 0,
            },
            ..Default::default()
        }
    }

    #[test]
    fn deterministic() {
        let data = sample();
        assert_eq!(fingerprint(&data), fingerprint(&data));
    }

    #[test]
    fn sorted_collections_ignore_transport_order() {
        let data = sample();
        let mut shuffled = data.clone();
        shuffled.batches.reverse();
        shuffled.currency_types.reverse();
        shuffled.global_tokens.reverse();
        shuffled.ledger_entries.reverse();
        assert_eq!(fingerprint(&data).hash, fingerprint(&shuffled).hash);
    }

    #[test]
    fn ordered_collections_are_order_sensitive() {
        let data = sample();

        let mut whitelist = data.clone();
        whitelist.whitelist.swap(0, 1);
        assert_ne!(fingerprint(&data).hash, fingerprint(&whitelist).hash);

        let mut owners = data.clone();
        owners.ledger_owners.reverse();
        assert_ne!(fingerprint(&data).hash, fingerprint(&owners).hash);
    }

    #[test]
    fn swapping_batch_contents_between_ids_changes_hash() {
        let data = sample();
        let mut swapped = data.clone();
        swapped.batches[0].minted_qty = 70;
        swapped.batches[1].minted_qty = 130;
        assert_ne!(fingerprint(&data).hash, fingerprint(&swapped).hash);
    }

    #[test]
    fn null_fee_schedules_are_not_folded() {
        let data = sample();
        let key = FeeKey::global(FeeSubject::Currency, 1);

        let mut with_null = data.clone();
        with_null.fee_schedules.push(FeeScheduleEntry {
            key,
            fee: FeeSchedule::default(),
        });
        assert_eq!(fingerprint(&data), fingerprint(&with_null));

        let mut with_fee = data.clone();
        with_fee.fee_schedules.push(FeeScheduleEntry {
            key,
            fee: FeeSchedule {
                fee_fixed: 1,
                ..Default::default()
            },
        });
        assert_ne!(fingerprint(&data).hash, fingerprint(&with_fee).hash);
    }

    #[test]
    fn owner_fees_follow_their_entry() {
        let mut data = sample();
        data.fee_schedules.push(FeeScheduleEntry {
            key: FeeKey::owned(FeeSubject::Currency, 2, addr(2)),
            fee: FeeSchedule {
                fee_max: 9,
                ..Default::default()
            },
        });
        let labels: Vec<String> = fingerprint(&data)
            .checkpoints
            .into_iter()
            .map(|c| c.label)
            .collect();
        let entry = labels
            .iter()
            .position(|l| *l == format!("ledger_entry:{}", addr(2)))
            .unwrap();
        assert!(labels[entry + 1].starts_with("fee:ccy:2:"));
    }

    #[test]
    fn records_outside_the_owner_list_change_hash() {
        let data = sample();

        let mut orphan_fee = data.clone();
        orphan_fee.fee_schedules.push(FeeScheduleEntry {
            key: FeeKey::owned(FeeSubject::Currency, 1, addr(9)),
            fee: FeeSchedule {
                fee_fixed: 999,
                ..Default::default()
            },
        });
        assert_ne!(fingerprint(&data).hash, fingerprint(&orphan_fee).hash);

        let mut orphan_entry = data.clone();
        orphan_entry.ledger_entries.push(LedgerEntry::empty(addr(0x55)));
        assert_ne!(fingerprint(&data).hash, fingerprint(&orphan_entry).hash);
        let d = first_divergence(&fingerprint(&data), &fingerprint(&orphan_entry)).unwrap();
        assert_eq!(d.label, format!("ledger_entry:{}", addr(0x55)));

        let mut duplicate_entry = data.clone();
        duplicate_entry
            .ledger_entries
            .push(LedgerEntry::empty(addr(1)));
        assert_ne!(fingerprint(&data).hash, fingerprint(&duplicate_entry).hash);

        let mut unknown_type_fee = data.clone();
        unknown_type_fee.fee_schedules.push(FeeScheduleEntry {
            key: FeeKey::global(FeeSubject::Token, 7),
            fee: FeeSchedule {
                fee_min: 1,
                ..Default::default()
            },
        });
        assert_ne!(fingerprint(&data).hash, fingerprint(&unknown_type_fee).hash);
    }

    #[test]
    fn exclusions_hide_known_deltas() {
        let data = sample();
        let mut later = data.clone();
        later.global_tokens.push(token(3));
        later.whitelist.push(addr(4));

        assert_ne!(fingerprint(&data).hash, fingerprint(&later).hash);

        let options = FingerprintOptions::default()
            .excluding_global_tokens([3])
            .whitelist_limit(3);
        assert_eq!(
            fingerprint_with(&data, &options).hash,
            fingerprint_with(&later, &options).hash
        );
    }

    #[test]
    fn divergence_points_at_first_changed_record() {
        let data = sample();
        let mut changed = data.clone();
        changed.batches[1].burned_qty = 5;

        let d = first_divergence(&fingerprint(&data), &fingerprint(&changed)).unwrap();
        assert_eq!(d.label, "batch:2");
        assert!(d.expected.is_some() && d.actual.is_some());
        assert!(first_divergence(&fingerprint(&data), &fingerprint(&data)).is_none());
    }

    #[test]
    fn divergence_when_one_trace_is_longer() {
        let data = sample();
        let mut longer = data.clone();
        longer.global_tokens.push(token(3));

        let d = first_divergence(&fingerprint(&data), &fingerprint(&longer)).unwrap();
        assert_eq!(d.label, "totals");
        let empty = SnapshotData::default();
        let d = first_divergence(&fingerprint(&empty), &fingerprint(&data)).unwrap();
        assert_eq!(d.position, 0);
        assert_eq!(d.label, "totals");
    }
}
