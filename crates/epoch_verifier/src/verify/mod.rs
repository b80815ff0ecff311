//! Assertion primitives, the rule catalogue, the runner, and report digests.

pub mod assert;
mod budgets;
mod digest;
mod donations;
mod runner;

pub use assert::{
    assert_all, assert_eq, assert_eq_signed, Element, ElementFailure, FailureDetail,
    VerificationResult,
};
pub use budgets::{
    budgets_are_equal_to_individual_rewards, compare_user_budgets_vs_their_allocations,
};
pub use digest::{
    check_digest, normalize_for_hash, report_digest, DigestCheck, DigestError, ReportData,
};
pub use donations::{
    verify_matched_funds, verify_matching_fund_from_epoch_info, verify_projects_below_threshold,
    verify_rewards_vs_user_donations, verify_total_withdrawals, verify_user_donations_vs_rewards,
};
pub use runner::{Rule, RuleOutcome, Runner, VerificationReport, RULES};
