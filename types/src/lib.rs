//! Fundamental types for ledger migration.
//!
//! Every record the remote ledger service holds and the migration engine
//! transports lives here: currency and token type definitions, fee schedules,
//! issuance batches, ledger entries and their tokens, entities, and the
//! aggregate counters. The engine never changes what these records mean; it
//! only moves them between contract instances.

pub mod address;
pub mod batch;
pub mod currency;
pub mod entity;
pub mod error;
pub mod fee;
pub mod hash;
pub mod ledger;
pub mod network;
pub mod time;
pub mod token;
pub mod totals;

pub use address::Address;
pub use batch::Batch;
pub use currency::CurrencyType;
pub use entity::{AccountEntity, Entity};
pub use error::TypesError;
pub use fee::{FeeKey, FeeOwner, FeeSchedule, FeeScheduleEntry, FeeSubject};
pub use hash::LedgerHash;
pub use ledger::{CcyBalance, LedgerEntry};
pub use network::NetworkId;
pub use time::Timestamp;
pub use token::{FutureParams, SettlementType, Token, TokenType};
pub use totals::{Frontier, TokenTotals};
