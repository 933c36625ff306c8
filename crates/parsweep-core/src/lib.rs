//! Experiment orchestration and measurement aggregation for benchmark sweeps
//!
//! This crate expands a declared sweep into work items, runs each external
//! workload under a timeout, averages repeated measurements, validates outputs
//! against a baseline or cached reference, and renders per-target comparison
//! tables with speedups.

pub mod aggregate;
pub mod build_gate;
pub mod config;
pub mod error;
pub mod executor;
pub mod matrix;
pub mod oracle;
pub mod orchestrator;
pub mod provision;
pub mod report;
pub mod speedup;
pub mod types;

pub use aggregate::{AggregateResult, RepetitionAggregator};
pub use build_gate::{run_build_gate, BuildStatus};
pub use config::*;
pub use error::*;
pub use executor::{
    CapturedRun, DurationContract, Executor, Invocation, Measurement, ProcessExecutor,
};
pub use matrix::build_matrix;
pub use oracle::{compare, Comparison, ValidationPolicy, Verdict};
pub use orchestrator::{Mismatch, NullObserver, SweepObserver, SweepOutcome, SweepRunner};
pub use provision::{BuiltinGenerator, GeneratedInputs, InputProvisioner};
pub use report::{suppress_repeated_keys, ReportDocument, ReportRow, TargetTable};
pub use speedup::Speedup;
pub use types::*;
