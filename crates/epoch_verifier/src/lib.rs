//! epoch_verifier: independent auditor for quadratic-funding epoch rewards.
//!
//! Loads one epoch's budgets, allocations, rewards and epoch aggregates,
//! recomputes what the protocol should have paid, and checks the published
//! numbers against a fixed catalogue of rules. Read-only; every rule is a
//! pure function of the epoch [`Context`].

pub mod config;
pub mod data;
pub mod source;
pub mod verify;

pub use config::{ConfigError, RuleParams, VerifierConfig};
pub use data::{Context, ContextError, RawEpochData};
pub use source::{Cache, DataSource, HttpConfig, HttpSource, JsonDirSource, SourceError};
pub use verify::{
    report_digest, ReportData, Runner, VerificationReport, VerificationResult, RULES,
};
