//! Budget rules: nobody over-allocates, and budgets add up to the
//! epoch's individual rewards.

use crate::data::Context;
use crate::verify::assert::{assert_all, assert_eq, VerificationResult};
use num_bigint::BigUint;

/// Every user's donations sum to at most their budget. A user without a
/// budget record has a budget of zero.
pub fn compare_user_budgets_vs_their_allocations(context: &Context) -> VerificationResult {
    let zero = BigUint::default();
    let sums = context
        .allocations()
        .iter()
        .map(|allocation| (&allocation.user, allocation.total()));

    assert_all(sums, |(user, sum)| {
        let budget = context.budgets().get(*user).unwrap_or(&zero);
        VerificationResult::ensure(sum <= budget, || {
            format!("allocated {sum} exceeds budget {budget}")
        })
    })
}

/// Summed budgets match `individual_rewards`, rounded down within the
/// budget tolerance.
pub fn budgets_are_equal_to_individual_rewards(context: &Context) -> VerificationResult {
    assert_eq(
        &context.total_budgets(),
        &context.epoch_info().individual_rewards,
        context.params().budget_tolerance(),
        true,
    )
    .labelled("sum(budgets)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleParams;
    use crate::data::{Allocation, EpochInfo, UserBudget, UserDonation};
    use crate::verify::assert::FailureDetail;

    fn budget(user: &str, amount: u64) -> UserBudget {
        UserBudget {
            user: user.into(),
            budget: BigUint::from(amount),
        }
    }

    fn allocation(user: &str, donations: &[(&str, u64)]) -> Allocation {
        Allocation {
            user: user.into(),
            donations: donations
                .iter()
                .map(|(p, a)| UserDonation {
                    proposal: (*p).into(),
                    amount: BigUint::from(*a),
                })
                .collect(),
        }
    }

    fn context(
        budgets: Vec<UserBudget>,
        allocations: Vec<Allocation>,
        individual_rewards: u64,
    ) -> Context {
        let info = EpochInfo {
            individual_rewards: BigUint::from(individual_rewards),
            ..Default::default()
        };
        Context::new(1, budgets, allocations, vec![], info, RuleParams::default()).unwrap()
    }

    #[test]
    fn within_budget_passes() {
        let ctx = context(
            vec![budget("0xA", 1000)],
            vec![allocation("0xA", &[("P1", 600), ("P2", 400)])],
            1000,
        );
        assert!(compare_user_budgets_vs_their_allocations(&ctx).is_passed());
    }

    #[test]
    fn over_allocation_fails_citing_user() {
        let ctx = context(
            vec![budget("0xA", 100), budget("0xB", 100)],
            vec![
                allocation("0xA", &[("P1", 100), ("P2", 50)]),
                allocation("0xB", &[("P1", 100)]),
            ],
            200,
        );
        let result = compare_user_budgets_vs_their_allocations(&ctx);
        assert_eq!(result.failures().len(), 1);
        assert_eq!(result.failures()[0].element, "0xA");
        assert_eq!(
            result.failures()[0].detail,
            FailureDetail::Predicate {
                message: "allocated 150 exceeds budget 100".into()
            }
        );
    }

    #[test]
    fn missing_budget_counts_as_zero() {
        let ctx = context(vec![], vec![allocation("0xA", &[("P1", 1)])], 0);
        assert!(!compare_user_budgets_vs_their_allocations(&ctx).is_passed());
        let empty = context(vec![], vec![allocation("0xA", &[])], 0);
        assert!(compare_user_budgets_vs_their_allocations(&empty).is_passed());
    }

    #[test]
    fn budgets_vs_individual_rewards_tolerance() {
        let budgets = vec![budget("0xA", 600), budget("0xB", 400)];
        for (rewards, passes) in [(1000, true), (1500, true), (1501, false), (999, false)] {
            let ctx = context(budgets.clone(), vec![], rewards);
            assert_eq!(
                budgets_are_equal_to_individual_rewards(&ctx).is_passed(),
                passes,
                "individual_rewards = {rewards}"
            );
        }
    }
}
