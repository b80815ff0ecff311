//! Immutable, indexed view over one epoch's dataset.

use crate::config::RuleParams;
use crate::data::models::{
    parse_record, parse_records, Address, Allocation, EpochInfo, ParseError, RawEpochData,
    Reward, UserBudget, UserDonation,
};
use num_bigint::BigUint;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("malformed input: {0}")]
    MalformedInput(#[from] ParseError),
    #[error("malformed input: duplicate budget for user {user}")]
    DuplicateBudget { user: Address },
    #[error("malformed input: duplicate reward for proposal {proposal}")]
    DuplicateReward { proposal: Address },
    #[error("malformed input: user {user} donates to proposal {proposal} in more than one record")]
    ConflictingDonation { user: Address, proposal: Address },
}

/// Everything the rules need for one epoch. Built once, never mutated; the
/// derived maps are computed at construction and handed out by reference.
///
/// All maps are ordered so that iterating them (and therefore every report)
/// is deterministic.
#[derive(Clone, Debug)]
pub struct Context {
    epoch: u64,
    params: RuleParams,
    budgets: BTreeMap<Address, BigUint>,
    allocations: Vec<Allocation>,
    rewards: Vec<Reward>,
    epoch_info: EpochInfo,
    allocations_by_user: BTreeMap<Address, Vec<UserDonation>>,
    individual_donations_by_proposals: BTreeMap<Address, BigUint>,
    rewards_by_project: BTreeMap<Address, Reward>,
}

impl Context {
    /// Parse raw datasets and build the context. Any malformed record aborts.
    pub fn from_raw(
        epoch: u64,
        raw: &RawEpochData,
        params: RuleParams,
    ) -> Result<Self, ContextError> {
        let budgets: Vec<UserBudget> = parse_records(&raw.budgets)?;
        let allocations: Vec<Allocation> = parse_records(&raw.allocations)?;
        let rewards: Vec<Reward> = parse_records(&raw.rewards)?;
        let epoch_info: EpochInfo = parse_record(&raw.epoch_info)?;
        Self::new(epoch, budgets, allocations, rewards, epoch_info, params)
    }

    pub fn new(
        epoch: u64,
        budgets: Vec<UserBudget>,
        allocations: Vec<Allocation>,
        rewards: Vec<Reward>,
        epoch_info: EpochInfo,
        params: RuleParams,
    ) -> Result<Self, ContextError> {
        let mut budget_map = BTreeMap::new();
        for UserBudget { user, budget } in budgets {
            match budget_map.entry(user) {
                Entry::Vacant(slot) => {
                    slot.insert(budget);
                }
                Entry::Occupied(slot) => {
                    return Err(ContextError::DuplicateBudget {
                        user: slot.key().clone(),
                    })
                }
            }
        }

        let allocations = merge_allocations(allocations)?;
        let allocations_by_user: BTreeMap<Address, Vec<UserDonation>> = allocations
            .iter()
            .map(|a| (a.user.clone(), a.donations.clone()))
            .collect();

        let mut individual_donations_by_proposals: BTreeMap<Address, BigUint> = BTreeMap::new();
        for donation in allocations.iter().flat_map(|a| &a.donations) {
            *individual_donations_by_proposals
                .entry(donation.proposal.clone())
                .or_default() += &donation.amount;
        }

        let mut rewards_by_project = BTreeMap::new();
        for reward in &rewards {
            if rewards_by_project
                .insert(reward.proposal.clone(), reward.clone())
                .is_some()
            {
                return Err(ContextError::DuplicateReward {
                    proposal: reward.proposal.clone(),
                });
            }
        }

        debug!(
            epoch,
            budgets = budget_map.len(),
            allocations = allocations.len(),
            proposals = individual_donations_by_proposals.len(),
            rewards = rewards.len(),
            "context built"
        );

        Ok(Self {
            epoch,
            params,
            budgets: budget_map,
            allocations,
            rewards,
            epoch_info,
            allocations_by_user,
            individual_donations_by_proposals,
            rewards_by_project,
        })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn params(&self) -> &RuleParams {
        &self.params
    }

    pub fn budgets(&self) -> &BTreeMap<Address, BigUint> {
        &self.budgets
    }

    pub fn allocations(&self) -> &[Allocation] {
        &self.allocations
    }

    pub fn rewards(&self) -> &[Reward] {
        &self.rewards
    }

    pub fn epoch_info(&self) -> &EpochInfo {
        &self.epoch_info
    }

    /// Each allocating user's donations. Users with a budget but no allocation
    /// record have no entry.
    pub fn allocations_by_user(&self) -> &BTreeMap<Address, Vec<UserDonation>> {
        &self.allocations_by_user
    }

    /// Sum of every user's donations per proposal.
    pub fn individual_donations_by_proposals(&self) -> &BTreeMap<Address, BigUint> {
        &self.individual_donations_by_proposals
    }

    /// Published rewards by proposal. Absent means no reward.
    pub fn rewards_by_project(&self) -> &BTreeMap<Address, Reward> {
        &self.rewards_by_project
    }

    pub fn total_budgets(&self) -> BigUint {
        self.budgets.values().sum()
    }
}

/// Fold repeated donor records into one allocation per user, keeping first-seen order.
fn merge_allocations(allocations: Vec<Allocation>) -> Result<Vec<Allocation>, ContextError> {
    let mut merged: Vec<Allocation> = Vec::with_capacity(allocations.len());
    let mut position: BTreeMap<Address, usize> = BTreeMap::new();
    let mut seen: BTreeSet<(Address, Address)> = BTreeSet::new();

    for allocation in allocations {
        for donation in &allocation.donations {
            if !seen.insert((allocation.user.clone(), donation.proposal.clone())) {
                return Err(ContextError::ConflictingDonation {
                    user: allocation.user.clone(),
                    proposal: donation.proposal.clone(),
                });
            }
        }
        let existing = position.get(&allocation.user).copied();
        match existing {
            Some(i) => merged[i].donations.extend(allocation.donations),
            None => {
                position.insert(allocation.user.clone(), merged.len());
                merged.push(allocation);
            }
        }
    }
    Ok(merged)
}
