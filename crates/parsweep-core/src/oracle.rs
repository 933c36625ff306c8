//! Correctness oracle: byte comparison of workload output files
//!
//! Two policies decide what a candidate is compared against:
//!
//! - [`ValidationPolicy::PerRunBaseline`]: the sequential baseline's output from
//!   the same sweep. A mismatch is reported but never stops the sweep.
//! - [`ValidationPolicy::CachedReference`]: a reference file produced once per
//!   (target, test case) by a sequential run and reused by every variant of that
//!   case. A mismatch aborts the remaining variants of that test case.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Outcome of validating one variant's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    /// No reference was available.
    #[default]
    Unknown,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPolicy {
    #[default]
    PerRunBaseline,
    CachedReference,
}

impl ValidationPolicy {
    /// Whether a failed comparison stops the rest of the test case.
    pub fn aborts_on_mismatch(&self) -> bool {
        matches!(self, Self::CachedReference)
    }
}

/// Detailed comparison result; `Fail` carries both files' contents for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Pass,
    Fail { expected: String, actual: String },
    Unknown,
}

impl Comparison {
    pub fn verdict(&self) -> Verdict {
        match self {
            Self::Pass => Verdict::Pass,
            Self::Fail { .. } => Verdict::Fail,
            Self::Unknown => Verdict::Unknown,
        }
    }
}

/// Compare `candidate` against `reference` byte for byte.
///
/// A missing reference yields `Unknown`. A missing or unreadable candidate is a
/// failure: the variant was expected to write output and did not.
pub fn compare(candidate: &Path, reference: &Path) -> Comparison {
    let expected = match fs::read(reference) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Comparison::Unknown,
        Err(e) => {
            tracing::debug!(path = %reference.display(), error = %e, "reference unreadable");
            return Comparison::Unknown;
        }
    };
    let actual = match fs::read(candidate) {
        Ok(bytes) => bytes,
        Err(e) => {
            return Comparison::Fail {
                expected: String::from_utf8_lossy(&expected).into_owned(),
                actual: format!("<unreadable {}: {e}>", candidate.display()),
            };
        }
    };

    if actual == expected {
        Comparison::Pass
    } else {
        Comparison::Fail {
            expected: String::from_utf8_lossy(&expected).into_owned(),
            actual: String::from_utf8_lossy(&actual).into_owned(),
        }
    }
}
