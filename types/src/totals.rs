//! Aggregate counters and id frontiers.

use serde::{Deserialize, Serialize};

/// Aggregate token counters kept by the service.
///
/// Set on the target only after every batch and token has been loaded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTotals {
    pub base_id: u64,
    pub max_token_id: u64,
    pub total_minted_qty: u64,
    pub total_burned_qty: u64,
}

/// The highest assigned batch and token ids observed on an instance.
///
/// Passed explicitly between the extractor and the loader; never read from
/// shared state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frontier {
    pub max_batch_id: u64,
    pub max_token_id: u64,
}

impl Frontier {
    pub fn batch_ids(&self) -> impl Iterator<Item = u64> {
        1..=self.max_batch_id
    }

    pub fn token_ids(&self) -> impl Iterator<Item = u64> {
        1..=self.max_token_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_frontier_yields_no_ids() {
        let frontier = Frontier::default();
        assert_eq!(frontier.batch_ids().count(), 0);
        assert_eq!(frontier.token_ids().count(), 0);
    }

    #[test]
    fn frontier_ids_are_one_based_and_inclusive() {
        let frontier = Frontier {
            max_batch_id: 3,
            max_token_id: 2,
        };
        assert_eq!(frontier.batch_ids().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(frontier.token_ids().collect::<Vec<_>>(), vec![1, 2]);
    }
}
