//! Assertion primitives shared by every rule.
//!
//! `assert_eq` is a tolerance-aware numeric equality; `assert_all` runs a
//! per-element check over a whole collection and keeps every failure.

use crate::data::amount;
use num_bigint::{BigInt, BigUint, Sign};
use serde::{Deserialize, Serialize};

/// Outcome of one check: a pass, or a failure with enough detail to report
/// without re-running it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationResult {
    Passed,
    Failed {
        description: String,
        failures: Vec<ElementFailure>,
    },
}

/// One failing element, identified by `element`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementFailure {
    pub element: String,
    pub detail: FailureDetail,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureDetail {
    /// A boolean property does not hold.
    Predicate { message: String },
    /// Numeric comparison outside tolerance. `difference` is `expected - actual`.
    Mismatch {
        #[serde(with = "amount::signed")]
        actual: BigInt,
        #[serde(with = "amount::signed")]
        expected: BigInt,
        #[serde(with = "amount::signed")]
        difference: BigInt,
        tolerance: u64,
        rounded_down: bool,
    },
    /// A record the check needs is absent.
    MissingReference { reference: String },
    /// A record is present where none may exist.
    UnexpectedReference { reference: String },
}

impl VerificationResult {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    pub fn failures(&self) -> &[ElementFailure] {
        match self {
            Self::Passed => &[],
            Self::Failed { failures, .. } => failures,
        }
    }

    /// Single-element failure; the element is named later via [`labelled`](Self::labelled).
    pub fn fail(description: impl Into<String>, detail: FailureDetail) -> Self {
        Self::Failed {
            description: description.into(),
            failures: vec![ElementFailure {
                element: String::new(),
                detail,
            }],
        }
    }

    /// Pass if `condition` holds, else a predicate failure carrying `message()`.
    pub fn ensure(condition: bool, message: impl FnOnce() -> String) -> Self {
        if condition {
            Self::Passed
        } else {
            let message = message();
            Self::fail(message.clone(), FailureDetail::Predicate { message })
        }
    }

    pub fn missing(reference: impl Into<String>) -> Self {
        let reference = reference.into();
        Self::fail(
            format!("missing {reference}"),
            FailureDetail::MissingReference { reference },
        )
    }

    pub fn unexpected(reference: impl Into<String>) -> Self {
        let reference = reference.into();
        Self::fail(
            format!("unexpected {reference}"),
            FailureDetail::UnexpectedReference { reference },
        )
    }

    /// Name every failing element `label`.
    pub fn labelled(self, label: &str) -> Self {
        match self {
            Self::Passed => Self::Passed,
            Self::Failed {
                description,
                failures,
            } => Self::Failed {
                description,
                failures: failures
                    .into_iter()
                    .map(|f| ElementFailure {
                        element: label.to_string(),
                        detail: f.detail,
                    })
                    .collect(),
            },
        }
    }
}

impl From<bool> for VerificationResult {
    fn from(holds: bool) -> Self {
        Self::ensure(holds, || "predicate does not hold".to_string())
    }
}

/// How an element of a checked collection identifies itself in a failure.
pub trait Element {
    fn label(&self) -> String;
}

impl Element for str {
    fn label(&self) -> String {
        self.to_string()
    }
}

impl Element for String {
    fn label(&self) -> String {
        self.clone()
    }
}

impl<T: Element + ?Sized> Element for &T {
    fn label(&self) -> String {
        (**self).label()
    }
}

/// Pairs are labelled by their key.
impl<K: Element, V> Element for (K, V) {
    fn label(&self) -> String {
        self.0.label()
    }
}

/// Tolerance-aware equality of unsigned amounts. See [`assert_eq_signed`].
pub fn assert_eq(
    actual: &BigUint,
    expected: &BigUint,
    tolerance: u64,
    rounded_down: bool,
) -> VerificationResult {
    assert_eq_signed(
        &BigInt::from(actual.clone()),
        &BigInt::from(expected.clone()),
        tolerance,
        rounded_down,
    )
}

/// Tolerance-aware equality.
///
/// - `tolerance == 0`: exact.
/// - `rounded_down`: floor division biases `actual` low, so passes iff
///   `0 <= expected - actual <= tolerance`.
/// - otherwise: passes iff `|expected - actual| <= tolerance`.
pub fn assert_eq_signed(
    actual: &BigInt,
    expected: &BigInt,
    tolerance: u64,
    rounded_down: bool,
) -> VerificationResult {
    let difference = expected - actual;
    let within = if tolerance == 0 {
        difference.sign() == Sign::NoSign
    } else if rounded_down {
        difference.sign() != Sign::Minus && difference <= BigInt::from(tolerance)
    } else {
        *difference.magnitude() <= BigUint::from(tolerance)
    };
    if within {
        return VerificationResult::Passed;
    }
    let description = if tolerance == 0 {
        format!("expected {expected}, got {actual}")
    } else {
        format!(
            "expected {expected}, got {actual} (difference {difference}, tolerance {tolerance})"
        )
    };
    VerificationResult::fail(
        description,
        FailureDetail::Mismatch {
            actual: actual.clone(),
            expected: expected.clone(),
            difference,
            tolerance,
            rounded_down,
        },
    )
}

/// Check `predicate` for every item, without short-circuiting. Passes iff
/// every item passes; otherwise the result lists each failing item by label.
pub fn assert_all<I, T, R, F>(items: I, mut predicate: F) -> VerificationResult
where
    I: IntoIterator<Item = T>,
    T: Element,
    R: Into<VerificationResult>,
    F: FnMut(&T) -> R,
{
    let mut total = 0usize;
    let mut failed = 0usize;
    let mut failures = Vec::new();
    for item in items {
        total += 1;
        if let VerificationResult::Failed {
            failures: inner, ..
        } = predicate(&item).into()
        {
            failed += 1;
            let label = item.label();
            failures.extend(inner.into_iter().map(|f| ElementFailure {
                element: label.clone(),
                detail: f.detail,
            }));
        }
    }
    if failed == 0 {
        VerificationResult::Passed
    } else {
        VerificationResult::Failed {
            description: format!("{failed} of {total} elements failed"),
            failures,
        }
    }
}
