//! Verifier configuration: protocol-instance parameters and data source defaults.
//!
//! Load from: env `EPOCH_VERIFIER_CONFIG_PATH`, or `./config/epoch_verifier.json`,
//! or `./epoch_verifier.json`. Defaults reproduce the production protocol
//! instance (24 proposals, 500 / 100 base-unit tolerances).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "EPOCH_VERIFIER_CONFIG_PATH";

/// Number of fundable proposals in the protocol instance.
pub const PROPOSALS_NO: u64 = 24;
/// Allowed drift between summed budgets and `individual_rewards`.
pub const BUDGET_TOLERANCE: u64 = 500;
/// Allowed drift on per-proposal allocated/matched amounts.
pub const REWARD_TOLERANCE: u64 = 100;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Parameters the rules read from the context.
/// Deserialization goes through [`RuleParams::new`], so a saved value is validated too.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRuleParams")]
pub struct RuleParams {
    proposals_no: u64,
    budget_tolerance: u64,
    reward_tolerance: u64,
}

#[derive(Deserialize)]
struct RawRuleParams {
    proposals_no: u64,
    budget_tolerance: u64,
    reward_tolerance: u64,
}

impl TryFrom<RawRuleParams> for RuleParams {
    type Error = ConfigError;

    fn try_from(raw: RawRuleParams) -> Result<Self, Self::Error> {
        RuleParams::new(raw.proposals_no, raw.budget_tolerance, raw.reward_tolerance)
    }
}

impl RuleParams {
    pub fn new(
        proposals_no: u64,
        budget_tolerance: u64,
        reward_tolerance: u64,
    ) -> Result<Self, ConfigError> {
        if proposals_no == 0 {
            return Err(ConfigError::Invalid("proposals_no must be positive".into()));
        }
        Ok(Self {
            proposals_no,
            budget_tolerance,
            reward_tolerance,
        })
    }

    pub fn proposals_no(&self) -> u64 {
        self.proposals_no
    }

    pub fn budget_tolerance(&self) -> u64 {
        self.budget_tolerance
    }

    pub fn reward_tolerance(&self) -> u64 {
        self.reward_tolerance
    }
}

impl Default for RuleParams {
    fn default() -> Self {
        Self {
            proposals_no: PROPOSALS_NO,
            budget_tolerance: BUDGET_TOLERANCE,
            reward_tolerance: REWARD_TOLERANCE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    pub proposals_no: u64,
    pub budget_tolerance: u64,
    pub reward_tolerance: u64,
    /// Backend API base URL for the HTTP data source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    /// Evaluate rules on the rayon pool instead of sequentially.
    pub parallel: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            proposals_no: PROPOSALS_NO,
            budget_tolerance: BUDGET_TOLERANCE,
            reward_tolerance: REWARD_TOLERANCE,
            api_url: None,
            parallel: false,
        }
    }
}

impl VerifierConfig {
    /// Load config from path. Unlike a missing file, a malformed one is an error.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.rule_params()?;
        Ok(config)
    }

    /// Load config: env EPOCH_VERIFIER_CONFIG_PATH, then ./config/epoch_verifier.json,
    /// then ./epoch_verifier.json, else defaults.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let p = Path::new(&path);
            if p.exists() {
                return Self::load_from_path(p);
            }
        }
        for candidate in [
            Path::new("./config/epoch_verifier.json"),
            Path::new("./epoch_verifier.json"),
        ] {
            if candidate.exists() {
                return Self::load_from_path(candidate);
            }
        }
        Ok(Self::default())
    }

    pub fn rule_params(&self) -> Result<RuleParams, ConfigError> {
        RuleParams::new(
            self.proposals_no,
            self.budget_tolerance,
            self.reward_tolerance,
        )
    }
}
