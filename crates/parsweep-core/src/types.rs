//! Core domain types: problem shapes, test cases, variants and work items

use serde::{Deserialize, Serialize};
use std::fmt;

/// Size key of one problem instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProblemShape {
    /// A `rows x cols` matrix convolved with a `kernel x kernel` filter.
    Grid { rows: usize, cols: usize, kernel: usize },
    /// Two decimal operands with the given digit counts.
    Operands { lhs_digits: usize, rhs_digits: usize },
}

impl ProblemShape {
    /// Primary size column, e.g. `1000x1000` or `10000`.
    pub fn size_label(&self) -> String {
        match self {
            Self::Grid { rows, cols, .. } => format!("{rows}x{cols}"),
            Self::Operands { lhs_digits, .. } => lhs_digits.to_string(),
        }
    }

    /// Secondary shape column, e.g. `5x5` or `100000`.
    pub fn shape_label(&self) -> String {
        match self {
            Self::Grid { kernel, .. } => format!("{kernel}x{kernel}"),
            Self::Operands { rhs_digits, .. } => rhs_digits.to_string(),
        }
    }

    /// Default column headers for the two key columns.
    pub fn headers(&self) -> (&'static str, &'static str) {
        match self {
            Self::Grid { .. } => ("Matrix Size", "Kernel"),
            Self::Operands { .. } => ("N1 Digits", "N2 Digits"),
        }
    }

    /// Check the shape describes something a generator can produce.
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            Self::Grid { rows, cols, kernel } => {
                if rows == 0 || cols == 0 {
                    return Err(format!("grid {rows}x{cols} has an empty dimension"));
                }
                if kernel == 0 || kernel % 2 == 0 {
                    return Err(format!("kernel size {kernel} must be odd"));
                }
                Ok(())
            }
            Self::Operands { lhs_digits, rhs_digits } => {
                if lhs_digits == 0 || rhs_digits == 0 {
                    return Err("operands need at least one digit".to_string());
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for ProblemShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grid { rows, cols, kernel } => {
                write!(f, "{rows}x{cols} (kernel {kernel}x{kernel})")
            }
            Self::Operands { lhs_digits, rhs_digits } => {
                write!(f, "N1={lhs_digits}, N2={rhs_digits} digits")
            }
        }
    }
}

/// One declared problem instance and the parallelism degrees to sweep on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Display name; defaults to the shape description.
    #[serde(default)]
    pub name: Option<String>,
    pub shape: ProblemShape,
    /// Thread/process counts. `0` requests the sequential baseline again.
    #[serde(default)]
    pub degrees: Vec<u32>,
    /// Per-case strategy list, overriding the sweep-level one.
    #[serde(default)]
    pub strategies: Option<Vec<String>>,
}

impl TestCase {
    pub fn new(shape: ProblemShape, degrees: impl Into<Vec<u32>>) -> Self {
        Self { name: None, shape, degrees: degrees.into(), strategies: None }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_strategies<I, S>(mut self, strategies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strategies = Some(strategies.into_iter().map(Into::into).collect());
        self
    }

    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.shape.to_string())
    }
}

/// Sequential or parallel execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Sequential,
    Parallel,
}

impl Mode {
    /// Value passed to flag-style workloads (`-e seq|par`).
    pub fn flag(&self) -> &'static str {
        match self {
            Self::Sequential => "seq",
            Self::Parallel => "par",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Parallel => write!(f, "parallel"),
        }
    }
}

/// Partitioning strategy tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Sequential baseline, no partitioning.
    None,
    /// In-place sweep sentinel; no named strategy is passed.
    InPlace,
    Named(String),
}

impl Strategy {
    /// The strategy name handed to the workload, if any.
    pub fn argument(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::None | Self::InPlace => None,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "-"),
            Self::InPlace => write!(f, "in-place"),
            Self::Named(name) => write!(f, "{name}"),
        }
    }
}

/// One execution configuration of one target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variant {
    pub target: String,
    pub mode: Mode,
    pub degree: Option<u32>,
    pub strategy: Strategy,
    pub layout: Option<String>,
}

impl Variant {
    pub fn baseline(target: impl Into<String>, layout: Option<String>) -> Self {
        Self {
            target: target.into(),
            mode: Mode::Sequential,
            degree: None,
            strategy: Strategy::None,
            layout,
        }
    }

    pub fn parallel(
        target: impl Into<String>,
        degree: u32,
        strategy: Strategy,
        layout: Option<String>,
    ) -> Self {
        Self { target: target.into(), mode: Mode::Parallel, degree: Some(degree), strategy, layout }
    }

    pub fn is_baseline(&self) -> bool {
        self.mode == Mode::Sequential
    }

    /// Short console label, e.g. `Sequential`, `4t hori`, `8 threads`.
    pub fn short_label(&self) -> String {
        match (self.degree, &self.strategy) {
            (None, _) => "Sequential".to_string(),
            (Some(degree), Strategy::Named(name)) => {
                let abbrev: String = name.chars().take(4).collect();
                format!("{degree}t {abbrev}")
            }
            (Some(degree), _) => format!("{degree} threads"),
        }
    }

    /// Degree column text; `-` for the baseline.
    pub fn degree_label(&self) -> String {
        self.degree.map_or_else(|| "-".to_string(), |d| d.to_string())
    }
}

/// One (test case, variant) pair scheduled for measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    /// Index into the sweep's declared test cases.
    pub case_index: usize,
    pub case: TestCase,
    pub variant: Variant,
}

impl WorkItem {
    /// Stable identifier used in logs and warn-once keys.
    pub fn key(&self) -> String {
        let layout = self.variant.layout.as_deref().unwrap_or("-");
        format!(
            "{}/case{}/{}/{}/{}/{}",
            self.variant.target,
            self.case_index,
            layout,
            self.variant.mode.flag(),
            self.variant.degree_label(),
            self.variant.strategy
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_labels() {
        let shape = ProblemShape::Grid { rows: 1000, cols: 10, kernel: 5 };
        assert_eq!(shape.size_label(), "1000x10");
        assert_eq!(shape.shape_label(), "5x5");
        assert_eq!(shape.to_string(), "1000x10 (kernel 5x5)");
    }

    #[test]
    fn operand_labels() {
        let shape = ProblemShape::Operands { lhs_digits: 100, rhs_digits: 100_000 };
        assert_eq!(shape.size_label(), "100");
        assert_eq!(shape.shape_label(), "100000");
        assert_eq!(shape.headers(), ("N1 Digits", "N2 Digits"));
    }

    #[test]
    fn even_kernel_is_rejected() {
        let shape = ProblemShape::Grid { rows: 10, cols: 10, kernel: 4 };
        assert!(shape.validate().unwrap_err().contains("must be odd"));
        assert!(ProblemShape::Grid { rows: 10, cols: 10, kernel: 3 }.validate().is_ok());
    }

    #[test]
    fn short_labels_match_console_format() {
        let par = Variant::parallel("cpp", 4, Strategy::Named("horizontal".into()), None);
        assert_eq!(par.short_label(), "4t hori");
        let in_place = Variant::parallel("cpp", 8, Strategy::InPlace, None);
        assert_eq!(in_place.short_label(), "8 threads");
        assert_eq!(Variant::baseline("cpp", None).short_label(), "Sequential");
    }

    #[test]
    fn strategy_argument_only_for_named() {
        assert_eq!(Strategy::Named("block".into()).argument(), Some("block"));
        assert_eq!(Strategy::InPlace.argument(), None);
        assert_eq!(Strategy::None.to_string(), "-");
        assert_eq!(Strategy::InPlace.to_string(), "in-place");
    }

    #[test]
    fn shape_deserializes_from_tagged_toml() {
        let case: TestCase = toml::from_str(
            "shape = { kind = \"grid\", rows = 10, cols = 20, kernel = 3 }\ndegrees = [2, 4]",
        )
        .unwrap();
        assert_eq!(case.shape, ProblemShape::Grid { rows: 10, cols: 20, kernel: 3 });
        assert_eq!(case.degrees, vec![2, 4]);
        assert!(case.strategies.is_none());
    }
}
