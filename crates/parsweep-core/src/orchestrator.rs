//! Sweep orchestration: provision, run, validate, compute speedups, collect rows
//!
//! One external process runs at a time. The runner emits progress to a
//! [`SweepObserver`] and returns the finished [`ReportDocument`]; rendering and
//! console output are left to the caller.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::aggregate::{AggregateResult, RepetitionAggregator};
use crate::config::{SweepConfig, TargetSpec};
use crate::error::{Result, SweepError};
use crate::executor::{DurationContract, Executor, Invocation, ProcessExecutor};
use crate::matrix::build_matrix;
use crate::oracle::{compare, Comparison, ValidationPolicy};
use crate::provision::{GeneratedInputs, InputProvisioner};
use crate::report::{ReportDocument, ReportRow};
use crate::speedup::Speedup;
use crate::types::{Strategy, TestCase, Variant, WorkItem};

/// Progress callbacks. Every method defaults to a no-op.
#[allow(unused_variables)]
pub trait SweepObserver {
    /// `total` work items are about to run.
    fn sweep_started(&mut self, config: &SweepConfig, total: usize) {}
    fn sweep_finished(&mut self, outcome: &SweepOutcome) {}
    fn case_started(&mut self, target: &TargetSpec, case: &TestCase) {}
    fn reference_ready(&mut self, target: &TargetSpec, path: &Path, generated: bool) {}
    /// The case is skipped for this target; its `skipped` items will not run.
    fn case_unavailable(
        &mut self,
        target: &TargetSpec,
        case: &TestCase,
        error: &SweepError,
        skipped: usize,
    ) {
    }
    fn item_started(&mut self, item: &WorkItem) {}
    fn item_finished(&mut self, item: &WorkItem, row: &ReportRow) {}
    /// Every repetition failed.
    fn item_failed(&mut self, item: &WorkItem) {}
    fn mismatch(&mut self, item: &WorkItem, expected: &str, actual: &str) {}
    /// `skipped` remaining items of the case will not run.
    fn case_aborted(&mut self, item: &WorkItem, skipped: usize) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl SweepObserver for NullObserver {}

/// A FAIL verdict recorded during the sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub item: String,
    pub target: String,
    pub case: String,
}

#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub report: ReportDocument,
    pub mismatches: Vec<Mismatch>,
    /// Test cases cut short by a cached-reference mismatch.
    pub aborted_cases: usize,
    /// Items never run because their case was skipped or aborted.
    pub skipped_items: usize,
}

impl SweepOutcome {
    /// True when a mismatch stopped part of the sweep.
    pub fn validation_failed(&self) -> bool {
        self.aborted_cases > 0
    }
}

/// Runs one sweep end to end.
pub struct SweepRunner<'a, E: Executor, P: InputProvisioner> {
    config: &'a SweepConfig,
    root: PathBuf,
    executor: E,
    provisioner: P,
    runs: Option<usize>,
}

impl<'a> SweepRunner<'a, ProcessExecutor, GeneratedInputs> {
    /// Real processes, inputs from the sweep's configured source.
    pub fn new(config: &'a SweepConfig, root: &Path) -> Self {
        let provisioner = GeneratedInputs::new(root, &config.data_dir, config.inputs.clone());
        Self::with_parts(config, root, ProcessExecutor, provisioner)
    }
}

impl<'a, E: Executor, P: InputProvisioner> SweepRunner<'a, E, P> {
    pub fn with_parts(config: &'a SweepConfig, root: &Path, executor: E, provisioner: P) -> Self {
        Self { config, root: root.to_path_buf(), executor, provisioner, runs: None }
    }

    /// Override the sweep's repetition count.
    #[must_use]
    pub fn with_runs(mut self, runs: Option<usize>) -> Self {
        self.runs = runs;
        self
    }

    pub fn runs(&self) -> usize {
        self.runs.unwrap_or(self.config.runs).max(1)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.root.join(&self.config.scratch_dir).join(&self.config.name)
    }

    pub fn run(&self, observer: &mut dyn SweepObserver) -> Result<SweepOutcome> {
        self.config.validate()?;

        let scratch = self.scratch_dir();
        fs::create_dir_all(&scratch).map_err(|e| SweepError::io(&scratch, e))?;

        let items = build_matrix(self.config);
        info!(sweep = %self.config.name, items = items.len(), runs = self.runs(), "starting sweep");
        observer.sweep_started(self.config, items.len());

        let mut outcome = SweepOutcome {
            report: ReportDocument::for_sweep(self.config, self.runs()),
            mismatches: Vec::new(),
            aborted_cases: 0,
            skipped_items: 0,
        };

        let mut start = 0;
        while start < items.len() {
            let key = (&items[start].variant.target, items[start].case_index);
            let len = items[start..]
                .iter()
                .take_while(|i| (&i.variant.target, i.case_index) == key)
                .count();
            self.run_case(&items[start..start + len], &scratch, observer, &mut outcome);
            start += len;
        }

        if let Err(e) = fs::remove_dir_all(&scratch) {
            debug!(path = %scratch.display(), error = %e, "scratch cleanup failed");
        }
        info!(
            sweep = %self.config.name,
            rows = outcome.report.rows().count(),
            mismatches = outcome.mismatches.len(),
            "sweep finished"
        );
        observer.sweep_finished(&outcome);
        Ok(outcome)
    }

    /// Run every item of one (target, test case) group.
    fn run_case(
        &self,
        items: &[WorkItem],
        scratch: &Path,
        observer: &mut dyn SweepObserver,
        outcome: &mut SweepOutcome,
    ) {
        let Some(first) = items.first() else { return };
        let Some(target) = self.config.target(&first.variant.target) else { return };
        let case = &first.case;

        observer.case_started(target, case);
        info!(target = %target.name, case = %case.display_name(), "test case");

        let prepared = self.provisioner.provision(&case.shape).and_then(|inputs| {
            let reference = match self.config.validation {
                ValidationPolicy::CachedReference => {
                    Some(self.cached_reference(target, &inputs, scratch, observer)?)
                }
                ValidationPolicy::PerRunBaseline => None,
            };
            Ok((inputs, reference))
        });
        let (inputs, cached) = match prepared {
            Ok(p) => p,
            Err(e) => {
                warn!(
                    target = %target.name,
                    case = %case.display_name(),
                    error = %e,
                    "skipping test case"
                );
                observer.case_unavailable(target, case, &e, items.len());
                outcome.skipped_items += items.len();
                return;
            }
        };

        let contract = DurationContract::for_target(target);
        let aggregator = RepetitionAggregator::new(&self.executor, contract, self.runs());
        let variant_out = scratch.join(format!("{}_variant.out", target.name));
        let disposable = scratch.join(format!("{}_scratch.out", target.name));

        let mut baseline: Option<(PathBuf, Option<AggregateResult>)> = None;

        for (pos, item) in items.iter().enumerate() {
            let variant = &item.variant;
            let canonical = if variant.is_baseline() {
                scratch.join(format!(
                    "{}_case{}_{}_baseline.out",
                    target.name,
                    item.case_index,
                    variant.layout.as_deref().unwrap_or("default")
                ))
            } else {
                variant_out.clone()
            };
            let _ = fs::remove_file(&canonical);

            observer.item_started(item);
            let key = item.key();
            let result = aggregator.aggregate(&key, &canonical, &disposable, |out| {
                Invocation::for_variant(target, variant, &inputs, out, &self.root)
            });

            let reference = match (&cached, variant.is_baseline()) {
                (Some(path), _) => Some(path.clone()),
                (None, true) => None,
                (None, false) => baseline.as_ref().map(|(path, _)| path.clone()),
            };
            let baseline_result = baseline.as_ref().and_then(|(_, r)| r.as_ref());

            let Some(aggregate) = result else {
                observer.item_failed(item);
                if variant.is_baseline() {
                    baseline = Some((canonical, None));
                }
                continue;
            };

            let comparison = match &reference {
                Some(path) => compare(&canonical, path),
                None => Comparison::Unknown,
            };
            let speedup = Speedup::compute(baseline_result, &aggregate, variant.is_baseline());
            let row = ReportRow::new(item, &aggregate, speedup, comparison.verdict());
            observer.item_finished(item, &row);
            outcome.report.push(row);

            if variant.is_baseline() {
                baseline = Some((canonical, Some(aggregate)));
            }

            if let Comparison::Fail { expected, actual } = &comparison {
                warn!(item = %key, "output mismatch");
                observer.mismatch(item, expected, actual);
                outcome.mismatches.push(Mismatch {
                    item: key.clone(),
                    target: target.name.clone(),
                    case: case.display_name(),
                });
                if self.config.validation.aborts_on_mismatch() {
                    let skipped = items.len() - pos - 1;
                    warn!(item = %key, skipped, "aborting test case after mismatch");
                    observer.case_aborted(item, skipped);
                    outcome.aborted_cases += 1;
                    outcome.skipped_items += skipped;
                    return;
                }
            }
        }
    }

    /// Reference output for `inputs`, generated once by a sequential run.
    fn cached_reference(
        &self,
        target: &TargetSpec,
        inputs: &[PathBuf],
        scratch: &Path,
        observer: &mut dyn SweepObserver,
    ) -> Result<PathBuf> {
        let stem: Vec<String> = inputs
            .iter()
            .filter_map(|p| p.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .collect();
        let path = scratch.join(format!("{}_{}_reference.txt", stem.join("_"), target.name));
        if path.exists() {
            observer.reference_ready(target, &path, false);
            return Ok(path);
        }

        let strategy = if self.config.in_place { Strategy::InPlace } else { Strategy::None };
        let layout = target.layout_axis().into_iter().next().flatten();
        let variant = Variant { strategy, ..Variant::baseline(&target.name, layout) };
        let invocation = Invocation::for_variant(target, &variant, inputs, &path, &self.root)?;
        info!(target = %target.name, path = %path.display(), "generating reference");
        self.executor.execute(&invocation)?;
        if !path.exists() {
            return Err(SweepError::Provision {
                path,
                reason: "sequential run produced no reference output".to_string(),
            });
        }
        observer.reference_ready(target, &path, true);
        Ok(path)
    }
}
