use serde::{Deserialize, Serialize};

/// What one loader run wrote.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    /// The target was already sealed and nothing was loaded.
    pub closed: bool,
    pub currency_types_created: usize,
    pub token_types_created: usize,
    pub fees_set: usize,
    pub entities_created: usize,
    pub addresses_whitelisted: usize,
    pub account_entities_set: usize,
    pub ledger_entries_created: usize,
    pub batches_loaded: usize,
    pub tokens_added: usize,
    pub totals_set: bool,
    pub sealed: bool,
}

impl ReplayReport {
    /// Whether the run changed nothing on the target.
    pub fn is_noop(&self) -> bool {
        *self
            == Self {
                closed: self.closed,
                ..Self::default()
            }
    }
}
