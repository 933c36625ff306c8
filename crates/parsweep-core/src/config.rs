//! Sweep configuration types and the built-in sweep catalogue
//!
//! A [`SweepCatalog`] holds every sweep the CLI can select by name. The built-in
//! catalogue mirrors the convolution and big-number benchmark suites; additional
//! sweeps can be loaded from TOML:
//!
//! ```toml
//! [[sweep]]
//! name = "smoke"
//! title = "Smoke Convolution"
//! strategies = ["horizontal"]
//!
//! [[sweep.targets]]
//! name = "cpp"
//! label = "C++"
//! command = ["./cpp/build/convolution"]
//! marker = "Convolution time"
//!
//! [[sweep.cases]]
//! shape = { kind = "grid", rows = 10, cols = 10, kernel = 3 }
//! degrees = [2, 4]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SweepError};
use crate::oracle::ValidationPolicy;
use crate::types::{ProblemShape, TestCase};

/// Default per-invocation timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Marker printed by the convolution workloads.
pub const CONVOLUTION_MARKER: &str = "Convolution time";

/// How a target expects its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentStyle {
    /// `-i <input> [-m <layout>] -e seq|par [--inplace] [-t N] [-s S] -o <output>`
    #[default]
    Flags,
    /// `<strategy|sequential> <input...> <output>`
    Positional,
}

/// Unit of the integer durations a target prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    #[default]
    Millis,
    Micros,
}

impl TimeUnit {
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Millis => "ms",
            Self::Micros => "µs",
        }
    }
}

/// Compile step run by the build gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStep {
    pub command: Vec<String>,
    /// Skip the build when this artifact already exists.
    #[serde(default)]
    pub skip_if_exists: Option<PathBuf>,
}

/// One execution target (toolchain/binary family).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    /// Short identifier used in file names, e.g. `cpp`.
    pub name: String,
    /// Report heading, e.g. `C++`.
    pub label: String,
    /// Program and leading arguments.
    pub command: Vec<String>,
    /// Prefix for parallel runs; `{degree}` is substituted.
    #[serde(default)]
    pub parallel_launcher: Vec<String>,
    #[serde(default)]
    pub arguments: ArgumentStyle,
    /// Memory layouts swept with `-m`; empty means the flag is never passed.
    #[serde(default)]
    pub layouts: Vec<String>,
    #[serde(default)]
    pub build: Option<BuildStep>,
    /// Marker preceding the duration; `None` means stdout is a bare duration.
    #[serde(default)]
    pub marker: Option<String>,
    #[serde(default)]
    pub unit: TimeUnit,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl TargetSpec {
    /// Flag-style target printing the convolution marker.
    pub fn flags(name: &str, label: &str, command: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            command: command.iter().map(ToString::to_string).collect(),
            parallel_launcher: Vec::new(),
            arguments: ArgumentStyle::Flags,
            layouts: Vec::new(),
            build: None,
            marker: Some(CONVOLUTION_MARKER.to_string()),
            unit: TimeUnit::Millis,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    #[must_use]
    pub fn with_build(mut self, command: &[&str], skip_if_exists: Option<&str>) -> Self {
        self.build = Some(BuildStep {
            command: command.iter().map(ToString::to_string).collect(),
            skip_if_exists: skip_if_exists.map(PathBuf::from),
        });
        self
    }

    #[must_use]
    pub fn with_layouts(mut self, layouts: &[&str]) -> Self {
        self.layouts = layouts.iter().map(ToString::to_string).collect();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Layout axis; a single `None` when the target declares no layouts.
    pub fn layout_axis(&self) -> Vec<Option<String>> {
        if self.layouts.is_empty() {
            vec![None]
        } else {
            self.layouts.iter().cloned().map(Some).collect()
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_runs() -> usize {
    1
}

fn default_degree_header() -> String {
    "Threads".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from(".parsweep")
}

/// Where input artifacts come from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum InputSource {
    /// Generated in-process.
    #[default]
    Builtin,
    /// External generator; `{rows}`, `{cols}`, `{kernel}`, `{digits}` and `{path}`
    /// are substituted per artifact.
    Command { argv: Vec<String> },
}

/// One named sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub name: String,
    pub title: String,
    #[serde(default = "default_runs")]
    pub runs: usize,
    /// Strategies crossed with every non-zero degree.
    #[serde(default)]
    pub strategies: Vec<String>,
    /// Fix the strategy to the in-place sentinel.
    #[serde(default)]
    pub in_place: bool,
    #[serde(default)]
    pub validation: ValidationPolicy,
    #[serde(default = "default_degree_header")]
    pub degree_header: String,
    #[serde(default)]
    pub report_path: Option<PathBuf>,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    #[serde(default)]
    pub inputs: InputSource,
    pub targets: Vec<TargetSpec>,
    pub cases: Vec<TestCase>,
}

impl SweepConfig {
    /// Report location relative to the run root.
    pub fn report_path(&self) -> PathBuf {
        self.report_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("results_{}.md", self.name)))
    }

    /// Strategies applicable to `case`.
    pub fn strategies_for<'a>(&'a self, case: &'a TestCase) -> &'a [String] {
        case.strategies.as_deref().unwrap_or(&self.strategies)
    }

    pub fn target(&self, name: &str) -> Option<&TargetSpec> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// Reject configurations the orchestrator cannot run.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(SweepError::Config(format!("sweep '{}': {msg}", self.name)));

        if self.runs == 0 {
            return fail("runs must be at least 1".to_string());
        }
        if self.targets.is_empty() {
            return fail("no targets declared".to_string());
        }
        for (i, target) in self.targets.iter().enumerate() {
            if target.command.is_empty() {
                return fail(format!("target '{}' has an empty command", target.name));
            }
            if self.targets[..i].iter().any(|t| t.name == target.name) {
                return fail(format!("duplicate target '{}'", target.name));
            }
            if target.timeout_secs == 0 {
                return fail(format!("target '{}' has a zero timeout", target.name));
            }
        }
        for case in &self.cases {
            if let Err(msg) = case.shape.validate() {
                return fail(format!("case '{}': {msg}", case.display_name()));
            }
            let has_parallel = case.degrees.iter().any(|&d| d > 0);
            if has_parallel && !self.in_place && self.strategies_for(case).is_empty() {
                return fail(format!(
                    "case '{}' declares parallel degrees but no strategies",
                    case.display_name()
                ));
            }
        }
        Ok(())
    }

    /// Key column headers, taken from the first declared case.
    pub fn key_headers(&self) -> (&'static str, &'static str) {
        self.cases.first().map_or(("Size", "Shape"), |c| c.shape.headers())
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    sweep: Vec<SweepConfig>,
}

/// Named collection of sweeps.
#[derive(Debug, Clone, Default)]
pub struct SweepCatalog {
    sweeps: Vec<SweepConfig>,
}

impl SweepCatalog {
    /// Sweeps shipped with the tool.
    pub fn builtin() -> Self {
        Self { sweeps: vec![lab1(), lab2(), layouts(), bignum()] }
    }

    /// Parse a catalogue from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: CatalogFile =
            toml::from_str(raw).map_err(|e| SweepError::Config(e.to_string()))?;
        for sweep in &file.sweep {
            sweep.validate()?;
        }
        Ok(Self { sweeps: file.sweep })
    }

    /// Load a catalogue from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| SweepError::io(path, e))?;
        Self::from_toml_str(&raw)
    }

    /// Add `other`'s sweeps, replacing same-named ones.
    pub fn merge(&mut self, other: SweepCatalog) {
        for sweep in other.sweeps {
            if let Some(existing) = self.sweeps.iter_mut().find(|s| s.name == sweep.name) {
                *existing = sweep;
            } else {
                self.sweeps.push(sweep);
            }
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.sweeps.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sweeps(&self) -> &[SweepConfig] {
        &self.sweeps
    }

    pub fn get(&self, name: &str) -> Result<&SweepConfig> {
        self.sweeps.iter().find(|s| s.name == name).ok_or_else(|| SweepError::UnknownSweep {
            name: name.to_string(),
            available: self.names().join(", "),
        })
    }
}

fn grid(rows: usize, cols: usize, kernel: usize, degrees: &[u32]) -> TestCase {
    TestCase::new(ProblemShape::Grid { rows, cols, kernel }, degrees)
}

fn convolution_targets() -> Vec<TargetSpec> {
    vec![
        TargetSpec::flags("cpp", "C++", &["./cpp/build/convolution"])
            .with_build(&["make", "-C", "cpp"], None),
        TargetSpec::flags("java", "Java", &["java", "-cp", "./java/build", "Convolution"])
            .with_build(&["make", "-C", "java"], None),
    ]
}

fn convolution_strategies() -> Vec<String> {
    ["horizontal", "vertical", "block"].iter().map(ToString::to_string).collect()
}

fn lab1() -> SweepConfig {
    SweepConfig {
        name: "lab1".to_string(),
        title: "Lab 1 - Standard Convolution".to_string(),
        runs: 1,
        strategies: convolution_strategies(),
        in_place: false,
        validation: ValidationPolicy::PerRunBaseline,
        degree_header: default_degree_header(),
        report_path: Some(PathBuf::from("results_lab1.md")),
        data_dir: default_data_dir(),
        scratch_dir: default_scratch_dir(),
        inputs: InputSource::Builtin,
        targets: convolution_targets(),
        cases: vec![
            grid(10, 10, 3, &[4]),
            grid(1000, 1000, 5, &[1, 2, 4, 8, 16]),
            grid(10, 10_000, 5, &[2, 4, 8, 16]),
            grid(10_000, 10, 5, &[2, 4, 8, 16]),
        ],
    }
}

fn lab2() -> SweepConfig {
    SweepConfig {
        name: "lab2".to_string(),
        title: "Lab 2 - In-Place Convolution".to_string(),
        runs: 1,
        strategies: Vec::new(),
        in_place: true,
        validation: ValidationPolicy::PerRunBaseline,
        degree_header: default_degree_header(),
        report_path: Some(PathBuf::from("results_lab2.md")),
        data_dir: default_data_dir(),
        scratch_dir: default_scratch_dir(),
        inputs: InputSource::Builtin,
        targets: convolution_targets(),
        cases: vec![
            grid(10, 10, 3, &[0, 2]),
            grid(1000, 1000, 3, &[0, 2, 4, 8, 16]),
            grid(10_000, 10_000, 3, &[0, 2, 4, 8, 16]),
        ],
    }
}

fn layouts() -> SweepConfig {
    let cpp = TargetSpec::flags("cpp", "C++", &["./cpp/build/convolution"])
        .with_build(&["make", "-C", "cpp"], Some("./cpp/build/convolution"))
        .with_layouts(&["static", "vector"]);
    let java = TargetSpec::flags("java", "Java", &["java", "-cp", "./java/build", "Convolution"])
        .with_build(&["make", "-C", "java"], None);
    let odin = TargetSpec::flags("odin", "Odin", &["./odin/build/convolution"])
        .with_build(&["make", "-C", "odin"], Some("./odin/build/convolution"));

    SweepConfig {
        name: "layouts".to_string(),
        title: "Convolution".to_string(),
        runs: 10,
        strategies: convolution_strategies(),
        in_place: false,
        validation: ValidationPolicy::PerRunBaseline,
        degree_header: default_degree_header(),
        report_path: Some(PathBuf::from("results.md")),
        data_dir: default_data_dir(),
        scratch_dir: default_scratch_dir(),
        inputs: InputSource::Builtin,
        targets: vec![cpp, java, odin],
        cases: vec![
            grid(10, 10, 3, &[4]),
            grid(1000, 1000, 5, &[1, 2, 4, 8, 16]),
            grid(10, 10_000, 5, &[2, 4, 8, 16]),
            grid(10_000, 10, 5, &[2, 4, 8, 16]),
            grid(10_000, 10_000, 5, &[2, 4, 8, 16]),
        ],
    }
}

fn bignum() -> SweepConfig {
    let operands = |lhs_digits, rhs_digits| ProblemShape::Operands { lhs_digits, rhs_digits };
    let target = TargetSpec {
        name: "mpi".to_string(),
        label: "MPI".to_string(),
        command: vec!["./main".to_string()],
        parallel_launcher: ["mpirun", "-np", "{degree}", "--oversubscribe"]
            .iter()
            .map(ToString::to_string)
            .collect(),
        arguments: ArgumentStyle::Positional,
        layouts: Vec::new(),
        build: None,
        marker: None,
        unit: TimeUnit::Micros,
        timeout_secs: DEFAULT_TIMEOUT_SECS,
    };

    SweepConfig {
        name: "bignum".to_string(),
        title: "Big Number Addition".to_string(),
        runs: 10,
        strategies: Vec::new(),
        in_place: false,
        validation: ValidationPolicy::CachedReference,
        degree_header: "Processes".to_string(),
        report_path: Some(PathBuf::from("benchmark_results.md")),
        data_dir: default_data_dir(),
        scratch_dir: default_scratch_dir(),
        inputs: InputSource::Builtin,
        targets: vec![target],
        cases: vec![
            TestCase::new(operands(16, 16), [5])
                .named("Varianta 1 - Test 1: N1=N2=16 digits")
                .with_strategies(["mpi1", "mpi1opt"]),
            TestCase::new(operands(10_000, 10_000), [5, 9, 17])
                .named("Varianta 1 - Test 2: N1=N2=10000 digits")
                .with_strategies(["mpi1", "mpi1opt"]),
            TestCase::new(operands(100, 100_000), [5, 9, 17])
                .named("Varianta 1 - Test 3: N1=100, N2=100000 (unequal)")
                .with_strategies(["mpi1", "mpi1opt"]),
            TestCase::new(operands(16, 16), [4])
                .named("Varianta 2 - Test 1: N1=N2=16 digits")
                .with_strategies(["mpi2"]),
            TestCase::new(operands(1000, 1000), [4, 8, 16])
                .named("Varianta 2 - Test 2: N1=N2=1000 digits")
                .with_strategies(["mpi2"]),
            TestCase::new(operands(100, 100_000), [4, 8, 16])
                .named("Varianta 2 - Test 3: N1=100, N2=100000 (unequal)")
                .with_strategies(["mpi2"]),
        ],
    }
}
