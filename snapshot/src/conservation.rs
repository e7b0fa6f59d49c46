//! Conservation law over token quantities.
//!
//! For every token type, the quantity still held in tokens plus the
//! quantity burned from its batches must equal the quantity minted by its
//! batches. Checked on the source before backup and on the target after
//! replay.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::SnapshotData;

/// Per-type quantity sums.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSums {
    pub minted: u64,
    pub burned: u64,
    pub current: u64,
}

impl TypeSums {
    pub fn balanced(&self) -> bool {
        u128::from(self.current) + u128::from(self.burned) == u128::from(self.minted)
    }
}

/// A token type whose quantities do not add up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConservationViolation {
    pub tok_type_id: u32,
    pub sums: TypeSums,
}

/// Sum minted/burned over batches and current over tokens, per token type.
pub fn type_sums(data: &SnapshotData) -> BTreeMap<u32, TypeSums> {
    let mut sums: BTreeMap<u32, TypeSums> = BTreeMap::new();
    for batch in &data.batches {
        let entry = sums.entry(batch.tok_type_id).or_default();
        entry.minted = entry.minted.saturating_add(batch.minted_qty);
        entry.burned = entry.burned.saturating_add(batch.burned_qty);
    }
    for (_, token) in data.all_tokens() {
        let entry = sums.entry(token.tok_type_id).or_default();
        entry.current = entry.current.saturating_add(token.current_qty);
    }
    sums
}

/// Every token type that violates the conservation law, by ascending id.
pub fn check_conservation(data: &SnapshotData) -> Vec<ConservationViolation> {
    type_sums(data)
        .into_iter()
        .filter(|(_, sums)| !sums.balanced())
        .map(|(tok_type_id, sums)| ConservationViolation { tok_type_id, sums })
        .collect()
}
