use proptest::prelude::*;

use mirror_fingerprint::{fingerprint, first_divergence};
use mirror_snapshot::SnapshotData;
use mirror_types::{Address, Batch, FeeKey, FeeSchedule, FeeScheduleEntry, FeeSubject, Timestamp};

fn arb_batch(id: u64) -> impl Strategy<Value = Batch> {
    (1u32..4, 1u64..10_000, 0u64..100, any::<[u8; 20]>()).prop_map(
        move |(tok_type_id, minted_qty, burned_qty, originator)| Batch {
            id,
            minted_timestamp: Timestamp::new(1_600_000_000 + id),
            tok_type_id,
            minted_qty,
            burned_qty: burned_qty.min(minted_qty),
            meta_keys: vec![],
            meta_values: vec![],
            originator_fee: 0,
            originator_ccy_fee_bips: 0,
            originator: Address::new(originator),
        },
    )
}

fn arb_data() -> impl Strategy<Value = SnapshotData> {
    (
        prop::collection::vec(any::<[u8; 20]>(), 0..8),
        (1usize..6).prop_flat_map(|n| {
            (1..=n as u64)
                .map(arb_batch)
                .collect::<Vec<_>>()
        }),
    )
        .prop_map(|(whitelist, batches)| SnapshotData {
            whitelist: whitelist.into_iter().map(Address::new).collect(),
            batches,
            ..Default::default()
        })
}

proptest! {
    /// The fingerprint is a pure function of the data.
    #[test]
    fn deterministic(data in arb_data()) {
        prop_assert_eq!(fingerprint(&data), fingerprint(&data));
    }

    /// Batch order in the snapshot does not matter.
    #[test]
    fn batch_order_is_incidental(data in arb_data(), seed in any::<u64>()) {
        let mut rotated = data.clone();
        let len = rotated.batches.len();
        rotated.batches.rotate_left((seed as usize) % len);
        prop_assert_eq!(fingerprint(&data).hash, fingerprint(&rotated).hash);
    }

    /// Any change to a batch quantity is detected and traced to that batch.
    #[test]
    fn burned_qty_change_detected(data in arb_data(), pick in any::<prop::sample::Index>()) {
        let mut changed = data.clone();
        let i = pick.index(changed.batches.len());
        changed.batches[i].burned_qty += 1;
        let d = first_divergence(&fingerprint(&data), &fingerprint(&changed));
        prop_assert!(d.is_some());
        let label = format!("batch:{}", changed.batches[i].id);
        prop_assert_eq!(d.map(|d| d.label), Some(label));
    }

    /// Adding a null fee schedule never changes the fingerprint.
    #[test]
    fn null_fees_ignored(data in arb_data(), id in 1u32..10) {
        let mut padded = data.clone();
        padded.fee_schedules.push(FeeScheduleEntry {
            key: FeeKey::global(FeeSubject::Token, id),
            fee: FeeSchedule::default(),
        });
        prop_assert_eq!(fingerprint(&data), fingerprint(&padded));
    }
}
