//! Field order of every record folded into a fingerprint.

use mirror_types::{
    AccountEntity, Batch, CcyBalance, CurrencyType, Entity, FeeKey, FeeOwner, FeeSchedule,
    FeeScheduleEntry, FutureParams, LedgerEntry, Token, TokenTotals, TokenType,
};

use crate::ChainHasher;

/// A record that can be folded into a [`ChainHasher`].
///
/// Implementations mix every field that carries meaning, in declaration
/// order. Nested collections whose order is incidental are sorted first.
pub trait Fold {
    fn fold(&self, h: &mut ChainHasher);
}

impl<T: Fold + ?Sized> Fold for &T {
    fn fold(&self, h: &mut ChainHasher) {
        (**self).fold(h);
    }
}

impl Fold for CurrencyType {
    fn fold(&self, h: &mut ChainHasher) {
        h.mix_u32(self.id);
        h.mix_str(&self.name);
        h.mix_str(&self.unit);
        h.mix_u16(self.decimals);
    }
}

impl Fold for FutureParams {
    fn fold(&self, h: &mut ChainHasher) {
        h.mix_u64(self.expiry_timestamp);
        h.mix_u32(self.underlyer_type_id);
        h.mix_u32(self.ref_ccy_id);
        h.mix_u16(self.init_margin_bips);
        h.mix_u16(self.var_margin_bips);
        h.mix_u16(self.contract_size);
        h.mix_u64(self.fee_per_contract);
    }
}

impl Fold for TokenType {
    fn fold(&self, h: &mut ChainHasher) {
        h.mix_u32(self.id);
        h.mix_str(&self.name);
        h.mix_u8(self.settlement_type.code());
        self.future_params.fold(h);
        h.mix_address(&self.linked_contract);
    }
}

impl Fold for FeeKey {
    fn fold(&self, h: &mut ChainHasher) {
        h.mix_u8(self.subject.code());
        h.mix_u32(self.subject_id);
        match self.owner {
            FeeOwner::Global => h.mix(&[]),
            FeeOwner::Owner(addr) => h.mix_address(&addr),
        }
    }
}

impl Fold for FeeSchedule {
    fn fold(&self, h: &mut ChainHasher) {
        h.mix_u64(self.fee_fixed);
        h.mix_u32(self.fee_perc_bips);
        h.mix_u64(self.fee_min);
        h.mix_u64(self.fee_max);
        h.mix_u64(self.ccy_per_million);
        h.mix_bool(self.ccy_mirror_fee);
    }
}

impl Fold for FeeScheduleEntry {
    fn fold(&self, h: &mut ChainHasher) {
        self.key.fold(h);
        self.fee.fold(h);
    }
}

impl Fold for Batch {
    fn fold(&self, h: &mut ChainHasher) {
        h.mix_u64(self.id);
        h.mix_u64(self.minted_timestamp.as_secs());
        h.mix_u32(self.tok_type_id);
        h.mix_u64(self.minted_qty);
        h.mix_u64(self.burned_qty);
        h.mix_u64(self.meta_keys.len() as u64);
        for key in &self.meta_keys {
            h.mix_str(key);
        }
        h.mix_u64(self.meta_values.len() as u64);
        for value in &self.meta_values {
            h.mix_str(value);
        }
        h.mix_u64(self.originator_fee);
        h.mix_u16(self.originator_ccy_fee_bips);
        h.mix_address(&self.originator);
    }
}

impl Fold for Token {
    fn fold(&self, h: &mut ChainHasher) {
        h.mix_u64(self.st_id);
        h.mix_u32(self.tok_type_id);
        h.mix_u64(self.batch_id);
        h.mix_u64(self.minted_qty);
        h.mix_u64(self.current_qty);
        h.mix_i64(self.ft_price);
        h.mix_i64(self.ft_last_mark_price);
        h.mix_address(&self.ft_ledger_owner);
        h.mix_i64(self.ft_pl);
    }
}

impl Fold for CcyBalance {
    fn fold(&self, h: &mut ChainHasher) {
        h.mix_u32(self.ccy_type_id);
        h.mix_i64(self.balance);
        h.mix_i64(self.reserved);
    }
}

impl Fold for LedgerEntry {
    fn fold(&self, h: &mut ChainHasher) {
        h.mix_address(&self.owner);
        h.mix_u64(self.spot_sum_qty);
        h.mix_u64(self.spot_sum_qty_minted);
        h.mix_u64(self.spot_sum_qty_burned);

        let mut balances: Vec<&CcyBalance> = self.ccy_balances.iter().collect();
        balances.sort_by_key(|b| b.ccy_type_id);
        h.mix_u64(balances.len() as u64);
        for balance in balances {
            balance.fold(h);
        }

        let mut tokens: Vec<&Token> = self.tokens.iter().collect();
        tokens.sort_by_key(|t| t.st_id);
        h.mix_u64(tokens.len() as u64);
        for token in tokens {
            token.fold(h);
        }
    }
}

impl Fold for Entity {
    fn fold(&self, h: &mut ChainHasher) {
        h.mix_u64(self.id);
        h.mix_address(&self.fee_owner);
    }
}

impl Fold for AccountEntity {
    fn fold(&self, h: &mut ChainHasher) {
        h.mix_address(&self.address);
        h.mix_u64(self.entity_id);
    }
}

impl Fold for TokenTotals {
    fn fold(&self, h: &mut ChainHasher) {
        h.mix_u64(self.base_id);
        h.mix_u64(self.max_token_id);
        h.mix_u64(self.total_minted_qty);
        h.mix_u64(self.total_burned_qty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_types::{Address, FeeSubject};

    fn folded<T: Fold>(record: &T) -> mirror_types::LedgerHash {
        let mut h = ChainHasher::new();
        record.fold(&mut h);
        h.current()
    }

    #[test]
    fn nested_balances_are_order_insensitive() {
        let mut entry = LedgerEntry::empty(Address::new([1; 20]));
        entry.ccy_balances = vec![
            CcyBalance {
                ccy_type_id: 1,
                balance: 10,
                reserved: 0,
            },
            CcyBalance {
                ccy_type_id: 2,
                balance: 20,
                reserved: 5,
            },
        ];
        let mut reversed = entry.clone();
        reversed.ccy_balances.reverse();
        assert_eq!(folded(&entry), folded(&reversed));
    }

    #[test]
    fn global_and_owned_keys_differ() {
        let global = FeeKey::global(FeeSubject::Token, 1);
        let owned = FeeKey::owned(FeeSubject::Token, 1, Address::ZERO);
        assert_ne!(folded(&global), folded(&owned));
    }

    #[test]
    fn every_fee_field_counts() {
        let base = FeeSchedule::default();
        let variants = [
            FeeSchedule {
                fee_fixed: 1,
                ..base.clone()
            },
            FeeSchedule {
                fee_perc_bips: 1,
                ..base.clone()
            },
            FeeSchedule {
                fee_min: 1,
                ..base.clone()
            },
            FeeSchedule {
                fee_max: 1,
                ..base.clone()
            },
            FeeSchedule {
                ccy_per_million: 1,
                ..base.clone()
            },
            FeeSchedule {
                ccy_mirror_fee: true,
                ..base.clone()
            },
        ];
        let hashes: std::collections::HashSet<_> = variants.iter().map(folded).collect();
        assert_eq!(hashes.len(), variants.len());
        assert!(!hashes.contains(&folded(&base)));
    }
}
