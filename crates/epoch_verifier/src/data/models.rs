//! Typed epoch records and their parsing from loosely-typed JSON.
//!
//! Every amount is a `BigUint`. Raw records are validated field by field;
//! nothing is coerced, and the only defaults are the three optional
//! `EpochInfo` aggregates that the backend omits for early epochs.

use crate::data::amount;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Opaque user or proposal identifier. Never parsed.
pub type Address = String;

/// Key of the donor inside a raw allocation record.
pub const DONOR_KEY: &str = "donor";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
    Budget,
    Allocation,
    Reward,
    EpochInfo,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Budget => write!(f, "budgets"),
            RecordKind::Allocation => write!(f, "allocations"),
            RecordKind::Reward => write!(f, "rewards"),
            RecordKind::EpochInfo => write!(f, "epoch_info"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldIssue {
    #[error("missing")]
    Missing,
    #[error("expected an address string, got {0}")]
    NotAnAddress(String),
    #[error("invalid amount {0}")]
    InvalidAmount(String),
}

/// Malformed raw input. Fatal: no context is built from a dataset that fails here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("{kind}: expected a JSON array of records")]
    NotAnArray { kind: RecordKind },
    #[error("{kind}[{index}]: expected a JSON object")]
    NotAnObject { kind: RecordKind, index: usize },
    #[error("{kind}[{index}].{field}: {issue}")]
    Field {
        kind: RecordKind,
        index: usize,
        field: String,
        issue: FieldIssue,
    },
}

/// A record type that can be read from one raw JSON object.
pub trait FromRecord: Sized {
    const KIND: RecordKind;

    /// Parse one object. Errors name the offending field; the caller adds the index.
    fn from_record(record: &Map<String, Value>) -> Result<Self, (String, FieldIssue)>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBudget {
    pub user: Address,
    #[serde(with = "amount")]
    pub budget: BigUint,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDonation {
    pub proposal: Address,
    #[serde(with = "amount")]
    pub amount: BigUint,
}

/// One user's donations for the epoch. `donations` is empty for a user who
/// kept their whole budget.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub user: Address,
    pub donations: Vec<UserDonation>,
}

impl Allocation {
    pub fn total(&self) -> BigUint {
        self.donations.iter().map(|d| &d.amount).sum()
    }
}

/// Reward published for one proposal that passed the threshold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub proposal: Address,
    #[serde(with = "amount")]
    pub allocated: BigUint,
    #[serde(with = "amount")]
    pub matched: BigUint,
}

/// Epoch-wide aggregates as reported by the protocol.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochInfo {
    #[serde(with = "amount")]
    pub individual_rewards: BigUint,
    #[serde(with = "amount")]
    pub matched_rewards: BigUint,
    #[serde(with = "amount")]
    pub patrons_rewards: BigUint,
    #[serde(with = "amount")]
    pub staking_proceeds: BigUint,
    #[serde(with = "amount")]
    pub total_effective_deposit: BigUint,
    #[serde(with = "amount")]
    pub total_rewards: BigUint,
    #[serde(with = "amount")]
    pub total_withdrawals: BigUint,
}

/// The four raw datasets for one epoch, as handed over by a data source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawEpochData {
    pub budgets: Value,
    pub allocations: Value,
    pub rewards: Value,
    pub epoch_info: Value,
}

impl FromRecord for UserBudget {
    const KIND: RecordKind = RecordKind::Budget;

    fn from_record(record: &Map<String, Value>) -> Result<Self, (String, FieldIssue)> {
        Ok(Self {
            user: required_address(record, "user")?,
            budget: required_amount(record, "budget")?,
        })
    }
}

impl FromRecord for Allocation {
    const KIND: RecordKind = RecordKind::Allocation;

    fn from_record(record: &Map<String, Value>) -> Result<Self, (String, FieldIssue)> {
        let user = required_address(record, DONOR_KEY)?;
        let donations = record
            .iter()
            .filter(|(key, _)| key.as_str() != DONOR_KEY)
            .map(|(proposal, value)| {
                parse_amount(value)
                    .map(|amount| UserDonation {
                        proposal: proposal.clone(),
                        amount,
                    })
                    .map_err(|issue| (proposal.clone(), issue))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { user, donations })
    }
}

impl FromRecord for Reward {
    const KIND: RecordKind = RecordKind::Reward;

    fn from_record(record: &Map<String, Value>) -> Result<Self, (String, FieldIssue)> {
        Ok(Self {
            proposal: required_address(record, "address")?,
            allocated: required_amount(record, "allocated")?,
            matched: required_amount(record, "matched")?,
        })
    }
}

impl FromRecord for EpochInfo {
    const KIND: RecordKind = RecordKind::EpochInfo;

    fn from_record(record: &Map<String, Value>) -> Result<Self, (String, FieldIssue)> {
        Ok(Self {
            staking_proceeds: required_amount(record, "staking_proceeds")?,
            total_effective_deposit: required_amount(record, "total_effective_deposit")?,
            total_rewards: required_amount(record, "total_rewards")?,
            individual_rewards: required_amount(record, "individual_rewards")?,
            total_withdrawals: optional_amount(record, "total_withdrawals")?,
            patrons_rewards: optional_amount(record, "patrons_rewards")?,
            matched_rewards: optional_amount(record, "matched_rewards")?,
        })
    }
}

/// Parse a JSON array of records of one kind.
pub fn parse_records<T: FromRecord>(value: &Value) -> Result<Vec<T>, ParseError> {
    let Value::Array(items) = value else {
        return Err(ParseError::NotAnArray { kind: T::KIND });
    };
    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_at::<T>(item, index))
        .collect()
}

/// Parse a single record (used for the one `EpochInfo` object per epoch).
pub fn parse_record<T: FromRecord>(value: &Value) -> Result<T, ParseError> {
    parse_at(value, 0)
}

fn parse_at<T: FromRecord>(value: &Value, index: usize) -> Result<T, ParseError> {
    let Value::Object(record) = value else {
        return Err(ParseError::NotAnObject {
            kind: T::KIND,
            index,
        });
    };
    T::from_record(record).map_err(|(field, issue)| ParseError::Field {
        kind: T::KIND,
        index,
        field,
        issue,
    })
}

/// Amounts are decimal strings or non-negative JSON integers. Integers above
/// `u64::MAX` must arrive as strings.
pub fn parse_amount(value: &Value) -> Result<BigUint, FieldIssue> {
    match value {
        Value::String(s) => {
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(FieldIssue::InvalidAmount(s.clone()));
            }
            s.parse::<BigUint>()
                .map_err(|_| FieldIssue::InvalidAmount(s.clone()))
        }
        Value::Number(n) => n
            .as_u64()
            .map(BigUint::from)
            .ok_or_else(|| FieldIssue::InvalidAmount(n.to_string())),
        other => Err(FieldIssue::InvalidAmount(other.to_string())),
    }
}

fn required_address(
    record: &Map<String, Value>,
    field: &str,
) -> Result<Address, (String, FieldIssue)> {
    match record.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(other) => Err((field.to_string(), FieldIssue::NotAnAddress(other.to_string()))),
        None => Err((field.to_string(), FieldIssue::Missing)),
    }
}

fn required_amount(
    record: &Map<String, Value>,
    field: &str,
) -> Result<BigUint, (String, FieldIssue)> {
    let value = record
        .get(field)
        .ok_or_else(|| (field.to_string(), FieldIssue::Missing))?;
    parse_amount(value).map_err(|issue| (field.to_string(), issue))
}

fn optional_amount(
    record: &Map<String, Value>,
    field: &str,
) -> Result<BigUint, (String, FieldIssue)> {
    match record.get(field) {
        None | Some(Value::Null) => Ok(BigUint::default()),
        Some(value) => parse_amount(value).map_err(|issue| (field.to_string(), issue)),
    }
}
