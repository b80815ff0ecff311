//! Runs the rule catalogue against one context and aggregates the outcomes.

use crate::data::Context;
use crate::verify::assert::VerificationResult;
use crate::verify::budgets::{
    budgets_are_equal_to_individual_rewards, compare_user_budgets_vs_their_allocations,
};
use crate::verify::donations::{
    verify_matched_funds, verify_matching_fund_from_epoch_info, verify_projects_below_threshold,
    verify_rewards_vs_user_donations, verify_total_withdrawals, verify_user_donations_vs_rewards,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// A rule is a pure function of the context.
pub type Rule = fn(&Context) -> VerificationResult;

/// The fixed rule catalogue, in report order.
pub const RULES: [(&str, Rule); 8] = [
    (
        "compareUserBudgetsVsTheirAllocations",
        compare_user_budgets_vs_their_allocations,
    ),
    (
        "budgetsAreEqualToIndividualRewards",
        budgets_are_equal_to_individual_rewards,
    ),
    (
        "verifyProjectsBelowThreshold",
        verify_projects_below_threshold,
    ),
    (
        "verifyUserDonationsVsRewards",
        verify_user_donations_vs_rewards,
    ),
    (
        "verifyRewardsVsUserDonations",
        verify_rewards_vs_user_donations,
    ),
    ("verifyMatchedFunds", verify_matched_funds),
    (
        "verifyMatchingFundFromEpochInfo",
        verify_matching_fund_from_epoch_info,
    ),
    ("verifyTotalWithdrawals", verify_total_withdrawals),
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub rule: String,
    pub result: VerificationResult,
}

/// Aggregate result of one run. Outcomes are always in catalogue order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub epoch: u64,
    pub outcomes: Vec<RuleOutcome>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_passed())
    }

    pub fn rule_count(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !o.result.is_passed())
            .count()
    }

    pub fn failed_rules(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.outcomes.iter().filter(|o| !o.result.is_passed())
    }

    pub fn summary(&self) -> String {
        if self.passed() {
            format!(
                "epoch {}: all {} invariants held",
                self.epoch,
                self.rule_count()
            )
        } else {
            format!(
                "epoch {}: {} of {} rules failed",
                self.epoch,
                self.failed_count(),
                self.rule_count()
            )
        }
    }
}

#[derive(Clone, Debug)]
pub struct Runner {
    rules: Vec<(&'static str, Rule)>,
    parallel: bool,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// Runner over the full catalogue, sequential.
    pub fn new() -> Self {
        Self {
            rules: RULES.to_vec(),
            parallel: false,
        }
    }

    /// Runner over a subset of rules, e.g. for a focused re-check.
    pub fn with_rules(rules: Vec<(&'static str, Rule)>) -> Self {
        Self {
            rules,
            parallel: false,
        }
    }

    /// Evaluate rules on the rayon pool. Results keep catalogue order.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn run(&self, context: &Context) -> VerificationReport {
        let evaluate = |(name, rule): &(&'static str, Rule)| {
            let result = rule(context);
            debug!(rule = %name, passed = result.is_passed(), "rule evaluated");
            RuleOutcome {
                rule: name.to_string(),
                result,
            }
        };
        let outcomes: Vec<RuleOutcome> = if self.parallel {
            self.rules.par_iter().map(evaluate).collect()
        } else {
            self.rules.iter().map(evaluate).collect()
        };

        let report = VerificationReport {
            epoch: context.epoch(),
            outcomes,
        };
        for outcome in report.failed_rules() {
            warn!(
                rule = %outcome.rule,
                failures = outcome.result.failures().len(),
                "rule failed"
            );
        }
        info!(
            epoch = report.epoch,
            rules = report.rule_count(),
            failed = report.failed_count(),
            "verification complete"
        );
        report
    }
}
