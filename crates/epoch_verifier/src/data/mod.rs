//! Epoch data model, raw-record parsing, and the indexed verification context.

pub(crate) mod amount;
mod context;
mod models;

pub use context::{Context, ContextError};
pub use models::{
    parse_amount, parse_record, parse_records, Address, Allocation, EpochInfo, FieldIssue,
    FromRecord, ParseError, RawEpochData, RecordKind, Reward, UserBudget, UserDonation,
    DONOR_KEY,
};
