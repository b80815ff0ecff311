//! Integration tests over saved epoch exports in `testdata/<epoch>/`.

use epoch_verifier::data::{parse_record, EpochInfo};
use epoch_verifier::source::{DataSource, JsonDirSource};
use epoch_verifier::verify::{FailureDetail, RULES};
use epoch_verifier::{
    report_digest, Context, ContextError, RawEpochData, RuleParams, Runner, VerificationReport,
};
use num_bigint::{BigInt, BigUint};
use std::path::{Path, PathBuf};

const P1: &str = "0x1f1f1f1f1f1f1f1f1f1f1f1f1f1f1f1f1f1f1f1f";

fn testdata() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../testdata")
}

fn load_fixture<T: serde::de::DeserializeOwned>(path: &str) -> T {
    let full = testdata().join(path);
    let s =
        std::fs::read_to_string(&full).unwrap_or_else(|e| panic!("read {}: {}", full.display(), e));
    serde_json::from_str(&s).unwrap_or_else(|e| panic!("parse {}: {}", path, e))
}

fn raw_epoch(epoch: u64) -> RawEpochData {
    JsonDirSource::new(testdata())
        .fetch_epoch(epoch)
        .unwrap_or_else(|e| panic!("epoch {epoch}: {e}"))
}

fn verify(epoch: u64) -> VerificationReport {
    let context = Context::from_raw(epoch, &raw_epoch(epoch), RuleParams::default()).unwrap();
    Runner::new().run(&context)
}

#[test]
fn integration_epoch_info_beyond_u64() {
    let raw: serde_json::Value = load_fixture("1/epoch_info.json");
    let info: EpochInfo = parse_record(&raw).unwrap();
    assert_eq!(
        info.total_rewards,
        "19000000000000000000".parse::<BigUint>().unwrap()
    );
    assert!(info.total_rewards > BigUint::from(u64::MAX));
    assert_eq!(info.patrons_rewards, BigUint::default());
}

#[test]
fn integration_consistent_epoch_passes() {
    let report = verify(1);
    assert_eq!(report.rule_count(), RULES.len());
    for outcome in &report.outcomes {
        assert!(outcome.result.is_passed(), "{}: {:?}", outcome.rule, outcome.result);
    }
    assert_eq!(report.summary(), "epoch 1: all 8 invariants held");
}

#[test]
fn integration_short_matched_reward_is_flagged() {
    let report = verify(2);
    let failed: Vec<_> = report.failed_rules().map(|o| o.rule.as_str()).collect();
    assert_eq!(failed, vec!["verifyMatchedFunds"]);

    let failures = report.failed_rules().next().unwrap().result.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].element, P1);
    match &failures[0].detail {
        FailureDetail::Mismatch {
            difference,
            tolerance,
            rounded_down,
            ..
        } => {
            assert_eq!(*difference, BigInt::from(150));
            assert_eq!(*tolerance, 100);
            assert!(*rounded_down);
        }
        other => panic!("unexpected detail {other:?}"),
    }
}

#[test]
fn integration_digest_reproducible() {
    let context = Context::from_raw(2, &raw_epoch(2), RuleParams::default()).unwrap();
    let sequential = Runner::new().run(&context);
    let parallel = Runner::new().parallel(true).run(&context);
    assert_eq!(
        report_digest(&sequential).unwrap(),
        report_digest(&parallel).unwrap()
    );
    assert_ne!(
        report_digest(&sequential).unwrap(),
        report_digest(&verify(1)).unwrap()
    );
}

#[test]
fn integration_exported_epoch_verifies_identically() {
    let tmp = tempfile::tempdir().unwrap();
    JsonDirSource::write_epoch(tmp.path(), 1, &raw_epoch(1)).unwrap();
    let raw = JsonDirSource::new(tmp.path()).fetch_epoch(1).unwrap();
    let context = Context::from_raw(1, &raw, RuleParams::default()).unwrap();
    assert_eq!(Runner::new().run(&context), verify(1));
}

#[test]
fn integration_malformed_budget_aborts() {
    let mut raw = raw_epoch(1);
    raw.budgets[0]["budget"] = serde_json::json!("-5");
    let err = Context::from_raw(1, &raw, RuleParams::default()).unwrap_err();
    assert!(matches!(err, ContextError::MalformedInput(_)));
    assert!(err.to_string().contains("budgets[0].budget"));
}

#[test]
fn integration_zero_proposals_rejected() {
    assert!(RuleParams::new(0, 500, 100).is_err());
}
