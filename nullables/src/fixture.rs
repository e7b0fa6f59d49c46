//! A populated sample ledger shared by tests across the workspace.

use mirror_remote::{LedgerService, RemoteError};
use mirror_types::{
    AccountEntity, Address, Batch, CcyBalance, Entity, FeeKey, FeeSchedule, FeeSubject,
    FutureParams, LedgerEntry, SettlementType, Timestamp, Token, TokenTotals,
};

use crate::NullLedger;

pub fn sample_address(n: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[0] = 0xa0;
    bytes[19] = n;
    Address::new(bytes)
}

/// The three ledger owners the sample creates, in creation order.
pub fn sample_owners() -> [Address; 3] {
    [sample_address(3), sample_address(1), sample_address(2)]
}

fn sample_batch(id: u64, tok_type_id: u32, qty: u64) -> Batch {
    Batch {
        id,
        minted_timestamp: Timestamp::new(1_600_000_000 + id * 60),
        tok_type_id,
        minted_qty: qty,
        burned_qty: 0,
        meta_keys: vec!["project".into(), "vintage".into()],
        meta_values: vec![format!("P-{id}"), "2019".into()],
        originator_fee: 10 * id,
        originator_ccy_fee_bips: 25,
        originator: sample_address(9),
    }
}

fn sample_token(st_id: u64, tok_type_id: u32, batch_id: u64, qty: u64) -> Token {
    Token {
        st_id,
        tok_type_id,
        batch_id,
        minted_qty: qty,
        current_qty: qty,
        ft_price: 0,
        ft_last_mark_price: 0,
        ft_ledger_owner: Address::ZERO,
        ft_pl: 0,
    }
}

/// Populate `ledger` with a small but complete state: two currency types,
/// two token types (one of them a future), global fees plus one per-owner
/// override, four whitelisted addresses, three ledger owners, an entity,
/// three batches, six tokens (one held globally), and one partial burn.
pub async fn seed_sample(ledger: &NullLedger) -> Result<(), RemoteError> {
    let usd = ledger.add_currency_type("USD", "cents", 2).await?;
    let eth = ledger.add_currency_type("ETH", "wei", 18).await?;
    let corsia = ledger
        .add_token_type("CORSIA", SettlementType::Spot, &FutureParams::default(), Address::ZERO)
        .await?;
    let future = ledger
        .add_token_type(
            "ETH_FUT",
            SettlementType::Future,
            &FutureParams {
                expiry_timestamp: 1_700_000_000,
                underlyer_type_id: 1,
                ref_ccy_id: usd,
                init_margin_bips: 1_000,
                var_margin_bips: 500,
                contract_size: 1_000,
                fee_per_contract: 300,
            },
            Address::ZERO,
        )
        .await?;

    ledger
        .set_fee(
            FeeKey::global(FeeSubject::Currency, usd),
            &FeeSchedule {
                fee_fixed: 100,
                fee_perc_bips: 30,
                ..Default::default()
            },
        )
        .await?;
    ledger
        .set_fee(
            FeeKey::global(FeeSubject::Token, corsia),
            &FeeSchedule {
                fee_min: 5,
                fee_max: 500,
                ccy_per_million: 200,
                ..Default::default()
            },
        )
        .await?;

    let owners = sample_owners();
    let mut whitelist = owners.to_vec();
    whitelist.push(sample_address(9));
    ledger.whitelist_many(&whitelist).await?;

    ledger
        .create_entity(&Entity {
            id: 1,
            fee_owner: sample_address(9),
        })
        .await?;
    for owner in &owners[..2] {
        ledger
            .set_account_entity(&AccountEntity {
                address: *owner,
                entity_id: 1,
            })
            .await?;
    }

    let mut entries: Vec<LedgerEntry> = owners.iter().map(|o| LedgerEntry::empty(*o)).collect();
    entries[0].ccy_balances = vec![
        CcyBalance {
            ccy_type_id: usd,
            balance: 100_000,
            reserved: 0,
        },
        CcyBalance {
            ccy_type_id: eth,
            balance: 5,
            reserved: 1,
        },
    ];
    entries[1].ccy_balances = vec![CcyBalance {
        ccy_type_id: usd,
        balance: 250,
        reserved: 50,
    }];
    for (entry, qty) in entries.iter_mut().zip([1_025, 1_015, 1_000]) {
        entry.spot_sum_qty = qty;
        entry.spot_sum_qty_minted = qty;
    }
    ledger.create_ledger_entries(&entries).await?;

    ledger
        .set_fee(
            FeeKey::owned(FeeSubject::Token, corsia, owners[1]),
            &FeeSchedule {
                fee_fixed: 7,
                ccy_mirror_fee: true,
                ..Default::default()
            },
        )
        .await?;

    ledger
        .load_batches(&[
            sample_batch(1, corsia, 3_000),
            sample_batch(2, corsia, 1_000),
            sample_batch(3, future, 40),
        ])
        .await?;

    let holdings: [(Option<Address>, Token); 6] = [
        (Some(owners[0]), sample_token(1, corsia, 1, 1_000)),
        (Some(owners[1]), sample_token(2, corsia, 1, 1_000)),
        (None, sample_token(3, corsia, 1, 1_000)),
        (Some(owners[2]), sample_token(4, corsia, 2, 1_000)),
        (Some(owners[0]), sample_token(5, future, 3, 25)),
        (Some(owners[1]), sample_token(6, future, 3, 15)),
    ];
    for (owner, token) in &holdings {
        ledger.add_token(*owner, token).await?;
    }

    ledger
        .set_totals(&TokenTotals {
            base_id: 1,
            max_token_id: 6,
            total_minted_qty: 5_040,
            total_burned_qty: 0,
        })
        .await?;

    ledger.burn(2, 400)?;
    Ok(())
}
