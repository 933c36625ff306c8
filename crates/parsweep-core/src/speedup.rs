//! Speedup of a variant relative to its sequential baseline

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::aggregate::AggregateResult;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Speedup {
    /// The baseline itself, always 1.0.
    Baseline,
    /// `baseline_mean / variant_mean`.
    Ratio(f64),
    /// No baseline, or a variant mean that cannot divide.
    Undefined,
}

impl Speedup {
    /// Speedup of `variant` given the baseline aggregate of the same
    /// (target, case, layout), if it produced one.
    pub fn compute(
        baseline: Option<&AggregateResult>,
        variant: &AggregateResult,
        is_baseline: bool,
    ) -> Self {
        if is_baseline {
            return Self::Baseline;
        }
        match baseline {
            Some(b) if variant.mean > 0.0 && b.mean.is_finite() => {
                Self::Ratio(b.mean / variant.mean)
            }
            _ => Self::Undefined,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Baseline => Some(1.0),
            Self::Ratio(r) => Some(*r),
            Self::Undefined => None,
        }
    }
}

impl fmt::Display for Speedup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(v) => write!(f, "{v:.2}x"),
            None => write!(f, "n/a"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agg(mean: f64) -> AggregateResult {
        AggregateResult { mean, successes: 1, attempts: 1 }
    }

    #[test]
    fn ratio_of_means() {
        let s = Speedup::compute(Some(&agg(100.0)), &agg(25.0), false);
        assert_eq!(s, Speedup::Ratio(4.0));
        assert_eq!(s.to_string(), "4.00x");
    }

    #[test]
    fn baseline_is_one() {
        let s = Speedup::compute(None, &agg(100.0), true);
        assert_eq!(s.value(), Some(1.0));
        assert_eq!(s.to_string(), "1.00x");
    }

    #[test]
    fn missing_baseline_is_undefined() {
        let s = Speedup::compute(None, &agg(10.0), false);
        assert_eq!(s, Speedup::Undefined);
        assert_eq!(s.to_string(), "n/a");
    }

    #[test]
    fn zero_variant_mean_is_undefined() {
        assert_eq!(Speedup::compute(Some(&agg(10.0)), &agg(0.0), false), Speedup::Undefined);
    }

    #[test]
    fn slowdown_is_below_one() {
        let s = Speedup::compute(Some(&agg(10.0)), &agg(40.0), false);
        assert_eq!(s.to_string(), "0.25x");
    }
}
