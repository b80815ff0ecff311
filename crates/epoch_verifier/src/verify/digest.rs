//! Report envelope and SHA-256 digest over the normalized report JSON.

use crate::verify::runner::VerificationReport;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DigestError {
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Report plus its digest and generation time. The timestamp is not part of
/// the digest, so re-running the same epoch reproduces the same hash.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportData {
    pub report: VerificationReport,
    pub digest_sha256: String,
    pub generated_utc_rfc3339: String,
}

impl ReportData {
    pub fn new(report: VerificationReport) -> Result<Self, DigestError> {
        let digest_sha256 = report_digest(&report)?;
        let generated_utc_rfc3339 = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        Ok(Self {
            report,
            digest_sha256,
            generated_utc_rfc3339,
        })
    }
}

/// Normalize JSON for hashing: sort keys and no whitespace.
pub fn normalize_for_hash(value: &serde_json::Value) -> Result<String, DigestError> {
    let sorted = sort_json_keys(value);
    Ok(serde_json::to_string(&sorted)?)
}

fn sort_json_keys(v: &serde_json::Value) -> serde_json::Value {
    match v {
        serde_json::Value::Object(m) => {
            let out: std::collections::BTreeMap<String, serde_json::Value> = m
                .iter()
                .map(|(k, v)| (k.clone(), sort_json_keys(v)))
                .collect();
            serde_json::Value::Object(serde_json::Map::from_iter(out))
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(sort_json_keys).collect())
        }
        other => other.clone(),
    }
}

/// Compute SHA-256 over the normalized report JSON.
pub fn report_digest(report: &VerificationReport) -> Result<String, DigestError> {
    let json = serde_json::to_value(report)?;
    let normalized = normalize_for_hash(&json)?;
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DigestCheck {
    pub digest: String,
    pub expected: Option<String>,
    pub matches: bool,
}

/// Compare a report against expected `.sha256` file content.
pub fn check_digest(
    report: &VerificationReport,
    expected_hex: Option<&str>,
) -> Result<DigestCheck, DigestError> {
    let digest = report_digest(report)?;
    let expected = expected_hex.map(|e| e.trim().to_lowercase());
    let matches = expected.as_deref() == Some(digest.as_str());
    Ok(DigestCheck {
        digest,
        expected,
        matches,
    })
}
