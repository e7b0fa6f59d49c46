//! Fee schedules and the keys they are stored under.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Address;

/// What a fee schedule applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeSubject {
    Currency,
    Token,
}

impl FeeSubject {
    /// Stable numeric code, used when folding into a fingerprint.
    pub fn code(&self) -> u8 {
        match self {
            Self::Currency => 1,
            Self::Token => 2,
        }
    }
}

/// Whose fee schedule this is: the contract-wide default or one owner's override.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeOwner {
    Global,
    Owner(Address),
}

impl FeeOwner {
    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }

    /// The owner address, or `Address::ZERO` for the global schedule.
    pub fn address(&self) -> Address {
        match self {
            Self::Global => Address::ZERO,
            Self::Owner(addr) => *addr,
        }
    }
}

/// The storage key of one fee schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeKey {
    pub subject: FeeSubject,
    pub subject_id: u32,
    pub owner: FeeOwner,
}

impl FeeKey {
    pub fn global(subject: FeeSubject, subject_id: u32) -> Self {
        Self {
            subject,
            subject_id,
            owner: FeeOwner::Global,
        }
    }

    pub fn owned(subject: FeeSubject, subject_id: u32, owner: Address) -> Self {
        Self {
            subject,
            subject_id,
            owner: FeeOwner::Owner(owner),
        }
    }
}

impl fmt::Display for FeeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subject = match self.subject {
            FeeSubject::Currency => "ccy",
            FeeSubject::Token => "tok",
        };
        match self.owner {
            FeeOwner::Global => write!(f, "{subject}:{}:global", self.subject_id),
            FeeOwner::Owner(addr) => write!(f, "{subject}:{}:{addr}", self.subject_id),
        }
    }
}

/// Fixed/percentage/min/max fee parameters for a currency or token type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    #[serde(rename = "fee_fixed")]
    pub fee_fixed: u64,
    #[serde(rename = "fee_percBips")]
    pub fee_perc_bips: u32,
    #[serde(rename = "fee_min")]
    pub fee_min: u64,
    #[serde(rename = "fee_max")]
    pub fee_max: u64,
    #[serde(rename = "ccy_perMillion")]
    pub ccy_per_million: u64,
    #[serde(rename = "ccy_mirrorFee")]
    pub ccy_mirror_fee: bool,
}

impl FeeSchedule {
    /// A schedule is null (not worth transporting) when every numeric field
    /// is zero and the mirror flag is off.
    pub fn is_null(&self) -> bool {
        self.fee_fixed == 0
            && self.fee_perc_bips == 0
            && self.fee_min == 0
            && self.fee_max == 0
            && self.ccy_per_million == 0
            && !self.ccy_mirror_fee
    }
}

/// A fee schedule together with the key it is stored under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeScheduleEntry {
    pub key: FeeKey,
    pub fee: FeeSchedule,
}
