//! Donation, threshold and reward rules.
//!
//! A proposal is eligible when its summed donations are strictly greater than
//! `total / (proposals_no * 2)`. Only eligible proposals may carry a reward;
//! their matched share is `matched_rewards * donations / eligible_total`.

use crate::data::{Address, Context};
use crate::verify::assert::{assert_all, assert_eq, assert_eq_signed, VerificationResult};
use num_bigint::{BigInt, BigUint};
use std::collections::BTreeMap;

fn threshold(context: &Context) -> BigUint {
    let total: BigUint = context.individual_donations_by_proposals().values().sum();
    total / (BigUint::from(context.params().proposals_no()) * 2u32)
}

/// Donation totals of the proposals strictly above the threshold.
fn projects_above_threshold(context: &Context) -> BTreeMap<&Address, &BigUint> {
    let threshold = threshold(context);
    context
        .individual_donations_by_proposals()
        .iter()
        .filter(|(_, total)| **total > threshold)
        .collect()
}

/// Proposals at or below the threshold get no reward at all.
pub fn verify_projects_below_threshold(context: &Context) -> VerificationResult {
    let threshold = threshold(context);
    let rewards = context.rewards_by_project();
    let below = context
        .individual_donations_by_proposals()
        .iter()
        .filter(|(_, total)| **total <= threshold);

    assert_all(below, |(proposal, _)| {
        if rewards.contains_key(*proposal) {
            VerificationResult::unexpected(format!(
                "reward for proposal below threshold {threshold}"
            ))
        } else {
            VerificationResult::Passed
        }
    })
}

/// Each eligible proposal's donation total matches its published `allocated`.
/// The donation total is the measured side here, so a published `allocated`
/// below it fails; [`verify_rewards_vs_user_donations`] bounds it from above.
pub fn verify_user_donations_vs_rewards(context: &Context) -> VerificationResult {
    let rewards = context.rewards_by_project();
    let tolerance = context.params().reward_tolerance();

    assert_all(projects_above_threshold(context), |(proposal, donated)| {
        match rewards.get(*proposal) {
            Some(reward) => assert_eq(donated, &reward.allocated, tolerance, true),
            None => VerificationResult::missing("reward for proposal above threshold"),
        }
    })
}

/// Each published reward traces back to an eligible proposal's donation total.
pub fn verify_rewards_vs_user_donations(context: &Context) -> VerificationResult {
    let eligible = projects_above_threshold(context);
    let tolerance = context.params().reward_tolerance();

    assert_all(context.rewards_by_project(), |(proposal, reward)| {
        match eligible.get(*proposal) {
            Some(donated) => assert_eq(&reward.allocated, donated, tolerance, true),
            None => VerificationResult::missing("donations above threshold for rewarded proposal"),
        }
    })
}

/// Each eligible proposal's published `matched` equals its proportional share
/// of the matching pool, rounded down.
pub fn verify_matched_funds(context: &Context) -> VerificationResult {
    let eligible = projects_above_threshold(context);
    let rewards = context.rewards_by_project();
    let tolerance = context.params().reward_tolerance();
    let matching_fund = &context.epoch_info().matched_rewards;
    let eligible_total: BigUint = eligible.values().copied().sum();

    assert_all(eligible.iter(), |(proposal, donated)| {
        // eligible_total > 0 whenever the map is non-empty
        let expected = matching_fund * **donated / &eligible_total;
        match rewards.get(**proposal) {
            Some(reward) => assert_eq(&reward.matched, &expected, tolerance, true),
            None => VerificationResult::missing("reward for proposal above threshold"),
        }
    })
}

/// `total_rewards - individual_rewards + patrons_rewards == matched_rewards`, exactly.
pub fn verify_matching_fund_from_epoch_info(context: &Context) -> VerificationResult {
    let info = context.epoch_info();
    let derived = BigInt::from(info.total_rewards.clone())
        - BigInt::from(info.individual_rewards.clone())
        + BigInt::from(info.patrons_rewards.clone());

    assert_eq_signed(
        &derived,
        &BigInt::from(info.matched_rewards.clone()),
        0,
        false,
    )
    .labelled("total_rewards - individual_rewards + patrons_rewards")
}

/// End-to-end conservation: what users keep plus what proposals receive
/// equals the epoch's total withdrawals.
pub fn verify_total_withdrawals(context: &Context) -> VerificationResult {
    let allocations = context.allocations_by_user();
    let patrons = BigInt::from(context.epoch_info().patrons_rewards.clone());

    let total_budgets = BigInt::from(context.total_budgets());
    let total_allocated: BigUint = allocations
        .values()
        .flat_map(|donations| donations.iter().map(|d| &d.amount))
        .sum();
    let unclaimed_and_patrons_budget: BigUint = context
        .budgets()
        .iter()
        .filter(|(user, _)| !allocations.contains_key(*user))
        .map(|(_, budget)| budget)
        .sum();

    let unclaimed = BigInt::from(unclaimed_and_patrons_budget) - &patrons;
    let claimed = total_budgets - BigInt::from(total_allocated) - unclaimed - &patrons;
    let rewards_sum: BigUint = context
        .rewards()
        .iter()
        .map(|reward| &reward.allocated + &reward.matched)
        .sum();

    assert_eq_signed(
        &(claimed + BigInt::from(rewards_sum)),
        &BigInt::from(context.epoch_info().total_withdrawals.clone()),
        0,
        false,
    )
    .labelled("claimed + sum(rewards)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleParams;
    use crate::data::{Allocation, EpochInfo, Reward, UserBudget, UserDonation};
    use crate::verify::assert::FailureDetail;

    fn n(v: u64) -> BigUint {
        BigUint::from(v)
    }

    fn budget(user: &str, amount: u64) -> UserBudget {
        UserBudget {
            user: user.into(),
            budget: n(amount),
        }
    }

    fn allocation(user: &str, donations: &[(&str, u64)]) -> Allocation {
        Allocation {
            user: user.into(),
            donations: donations
                .iter()
                .map(|(p, a)| UserDonation {
                    proposal: (*p).into(),
                    amount: n(*a),
                })
                .collect(),
        }
    }

    fn reward(proposal: &str, allocated: u64, matched: u64) -> Reward {
        Reward {
            proposal: proposal.into(),
            allocated: n(allocated),
            matched: n(matched),
        }
    }

    fn build(
        budgets: Vec<UserBudget>,
        allocations: Vec<Allocation>,
        rewards: Vec<Reward>,
        info: EpochInfo,
    ) -> Context {
        Context::new(7, budgets, allocations, rewards, info, RuleParams::default()).unwrap()
    }

    fn info(matched_rewards: u64) -> EpochInfo {
        EpochInfo {
            matched_rewards: n(matched_rewards),
            ..Default::default()
        }
    }

    /// One user, budget 1000, donations {P1: 600, P2: 400}.
    fn single_user(rewards: Vec<Reward>, matched_rewards: u64) -> Context {
        build(
            vec![budget("0xA", 1000)],
            vec![allocation("0xA", &[("P1", 600), ("P2", 400)])],
            rewards,
            info(matched_rewards),
        )
    }

    #[test]
    fn threshold_is_floor_of_total_over_twice_proposals() {
        let ctx = single_user(vec![], 0);
        assert_eq!(threshold(&ctx), n(20));
        let above = projects_above_threshold(&ctx);
        assert_eq!(above.len(), 2);
    }

    #[test]
    fn proposal_exactly_at_threshold_is_below() {
        // total = 4798 + 102 = 4900, threshold = 4900 / 48 = 102
        let ctx = build(
            vec![],
            vec![allocation("0xA", &[("BIG", 4798), ("EDGE", 102)])],
            vec![reward("EDGE", 102, 0)],
            info(0),
        );
        assert_eq!(threshold(&ctx), n(102));
        assert!(!projects_above_threshold(&ctx).contains_key(&"EDGE".to_string()));
        let result = verify_projects_below_threshold(&ctx);
        assert_eq!(result.failures().len(), 1);
        assert_eq!(result.failures()[0].element, "EDGE");
        assert!(matches!(
            result.failures()[0].detail,
            FailureDetail::UnexpectedReference { .. }
        ));
    }

    #[test]
    fn below_threshold_without_reward_passes() {
        let ctx = build(
            vec![],
            vec![allocation("0xA", &[("BIG", 4798), ("EDGE", 102)])],
            vec![reward("BIG", 4798, 0)],
            info(0),
        );
        assert!(verify_projects_below_threshold(&ctx).is_passed());
    }

    #[test]
    fn end_to_end_single_user() {
        // matched 1000 split 600/400
        let ctx = single_user(vec![reward("P1", 600, 600), reward("P2", 400, 400)], 1000);
        assert!(verify_user_donations_vs_rewards(&ctx).is_passed());
        assert!(verify_rewards_vs_user_donations(&ctx).is_passed());
        assert!(verify_matched_funds(&ctx).is_passed());

        let inflated = single_user(vec![reward("P1", 600, 701), reward("P2", 400, 400)], 1000);
        let result = verify_matched_funds(&inflated);
        assert_eq!(result.failures().len(), 1);
        assert_eq!(result.failures()[0].element, "P1");
    }

    #[test]
    fn matched_funds_proportionality() {
        let ctx = |matched_p1: u64| {
            build(
                vec![],
                vec![allocation("0xA", &[("P1", 300), ("P2", 700)])],
                vec![reward("P1", 300, matched_p1), reward("P2", 700, 700)],
                info(1000),
            )
        };
        assert!(verify_matched_funds(&ctx(300)).is_passed());
        assert!(verify_matched_funds(&ctx(299)).is_passed());
        assert!(!verify_matched_funds(&ctx(450)).is_passed());
        assert!(!verify_matched_funds(&ctx(199)).is_passed());
    }

    #[test]
    fn matched_funds_uses_floor_division() {
        // 1000 * 1 / 3 = 333, 1000 * 2 / 3 = 666
        let ctx = build(
            vec![],
            vec![allocation("0xA", &[("P1", 100), ("P2", 200)])],
            vec![reward("P1", 100, 333), reward("P2", 200, 666)],
            info(1000),
        );
        assert!(verify_matched_funds(&ctx).is_passed());
    }

    #[test]
    fn missing_reward_for_eligible_proposal_is_a_failure() {
        let ctx = single_user(vec![reward("P1", 600, 600)], 1000);
        let result = verify_user_donations_vs_rewards(&ctx);
        assert_eq!(result.failures().len(), 1);
        assert_eq!(result.failures()[0].element, "P2");
        assert!(matches!(
            result.failures()[0].detail,
            FailureDetail::MissingReference { .. }
        ));
        assert!(!verify_matched_funds(&ctx).is_passed());
    }

    #[test]
    fn reward_for_unknown_proposal_is_caught() {
        let ctx = single_user(
            vec![
                reward("P1", 600, 600),
                reward("P2", 400, 400),
                reward("GHOST", 1, 0),
            ],
            1000,
        );
        assert!(verify_user_donations_vs_rewards(&ctx).is_passed());
        let result = verify_rewards_vs_user_donations(&ctx);
        assert_eq!(result.failures().len(), 1);
        assert_eq!(result.failures()[0].element, "GHOST");
    }

    #[test]
    fn allocated_is_bracketed_from_both_sides() {
        let exact = single_user(vec![reward("P1", 600, 600), reward("P2", 400, 400)], 1000);
        assert!(verify_user_donations_vs_rewards(&exact).is_passed());
        assert!(verify_rewards_vs_user_donations(&exact).is_passed());

        // P1 received 600 in donations but publishes 550
        let short = single_user(vec![reward("P1", 550, 600), reward("P2", 400, 400)], 1000);
        let result = verify_user_donations_vs_rewards(&short);
        assert!(!result.is_passed());
        assert_eq!(result.failures()[0].element, "P1");
        assert!(matches!(
            &result.failures()[0].detail,
            FailureDetail::Mismatch { difference, .. } if *difference == BigInt::from(-50)
        ));
        assert!(verify_rewards_vs_user_donations(&short).is_passed());

        let over = single_user(vec![reward("P1", 601, 600), reward("P2", 400, 400)], 1000);
        assert!(verify_user_donations_vs_rewards(&over).is_passed());
        assert!(!verify_rewards_vs_user_donations(&over).is_passed());
    }

    #[test]
    fn matching_fund_identity_is_exact() {
        let mut epoch = EpochInfo {
            total_rewards: n(5000),
            individual_rewards: n(2000),
            matched_rewards: n(3000),
            ..Default::default()
        };
        let ctx = build(vec![], vec![], vec![], epoch.clone());
        assert!(verify_matching_fund_from_epoch_info(&ctx).is_passed());

        epoch.matched_rewards = n(3001);
        let ctx = build(vec![], vec![], vec![], epoch.clone());
        assert!(!verify_matching_fund_from_epoch_info(&ctx).is_passed());

        epoch.patrons_rewards = n(1);
        let ctx = build(vec![], vec![], vec![], epoch);
        assert!(verify_matching_fund_from_epoch_info(&ctx).is_passed());
    }

    fn withdrawals_context(
        budgets: Vec<UserBudget>,
        extra: Vec<Allocation>,
        total_withdrawals: u64,
    ) -> Context {
        let epoch = EpochInfo {
            matched_rewards: n(1000),
            total_withdrawals: n(total_withdrawals),
            ..Default::default()
        };
        let mut allocations = vec![allocation("0xA", &[("P1", 600), ("P2", 300)])];
        allocations.extend(extra);
        build(
            budgets,
            allocations,
            vec![reward("P1", 600, 600), reward("P2", 300, 300)],
            epoch,
        )
    }

    #[test]
    fn total_withdrawals_conservation() {
        // claimed = 1200 - 900 - 200 - 0 = 100, rewards = 1800
        let ctx = withdrawals_context(
            vec![budget("0xA", 1000), budget("0xIDLE", 200)],
            vec![],
            1900,
        );
        assert!(verify_total_withdrawals(&ctx).is_passed());
        let off_by_one = withdrawals_context(vec![budget("0xA", 1000)], vec![], 1901);
        assert!(!verify_total_withdrawals(&off_by_one).is_passed());
    }

    #[test]
    fn budget_without_allocation_record_is_unclaimed() {
        // 0xIDLE has no allocation record, so its budget never counts as withdrawn
        let with_idle = withdrawals_context(
            vec![budget("0xA", 1000), budget("0xIDLE", 200)],
            vec![],
            1900,
        );
        let without_idle = withdrawals_context(vec![budget("0xA", 1000)], vec![], 1900);
        assert!(verify_total_withdrawals(&with_idle).is_passed());
        assert!(verify_total_withdrawals(&without_idle).is_passed());
    }

    #[test]
    fn removing_kept_budget_flips_total_withdrawals() {
        // 0xKEEP allocated nothing but has a record: its whole budget is claimed
        let keep = vec![allocation("0xKEEP", &[])];
        let with_keep = withdrawals_context(
            vec![budget("0xA", 1000), budget("0xKEEP", 200)],
            keep.clone(),
            2100,
        );
        assert!(verify_total_withdrawals(&with_keep).is_passed());
        let removed = withdrawals_context(vec![budget("0xA", 1000)], keep, 2100);
        assert!(!verify_total_withdrawals(&removed).is_passed());
    }

    #[test]
    fn total_withdrawals_with_patrons() {
        // patron budget 200 sits in the unclaimed pool; claimed = 1200 - 900 - 0 - 200 = 100
        let epoch = EpochInfo {
            patrons_rewards: n(200),
            total_withdrawals: n(1900),
            ..Default::default()
        };
        let ctx = build(
            vec![budget("0xA", 1000), budget("0xPATRON", 200)],
            vec![allocation("0xA", &[("P1", 600), ("P2", 300)])],
            vec![reward("P1", 600, 600), reward("P2", 300, 300)],
            epoch,
        );
        assert!(verify_total_withdrawals(&ctx).is_passed());
    }

    #[test]
    fn negative_claimed_is_reported_not_panicking() {
        let epoch = EpochInfo {
            total_withdrawals: n(0),
            ..Default::default()
        };
        let ctx = build(
            vec![],
            vec![allocation("0xA", &[("P1", 10)])],
            vec![],
            epoch,
        );
        let result = verify_total_withdrawals(&ctx);
        match &result.failures()[0].detail {
            FailureDetail::Mismatch { actual, .. } => assert_eq!(*actual, BigInt::from(-10)),
            other => panic!("unexpected detail {other:?}"),
        }
    }
}
