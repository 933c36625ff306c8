//! Console progress for a running sweep
//!
//! A progress bar tracks work items; status lines are printed above it.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use parsweep_core::{
    ReportRow, SweepConfig, SweepError, SweepObserver, SweepOutcome, TargetSpec, TestCase,
    TimeUnit, WorkItem,
};

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Prints one status line per work item to stdout under a progress bar.
pub struct ConsoleObserver {
    unit: TimeUnit,
    bar: ProgressBar,
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self { unit: TimeUnit::default(), bar: ProgressBar::hidden() }
    }

    /// Print above the bar; works when the bar is hidden too.
    fn line(&self, text: impl AsRef<str>) {
        self.bar.suspend(|| println!("{}", text.as_ref()));
    }
}

impl SweepObserver for ConsoleObserver {
    fn sweep_started(&mut self, _config: &SweepConfig, total: usize) {
        let bar = ProgressBar::new(total as u64);
        if let Ok(bar_style) = ProgressStyle::default_bar().template(BAR_TEMPLATE) {
            bar.set_style(bar_style.progress_chars("#>-"));
        }
        self.bar = bar;
    }

    fn sweep_finished(&mut self, outcome: &SweepOutcome) {
        let rows = outcome.report.rows().count();
        self.bar.finish_with_message(format!("{} {rows} rows measured", style("✓").green()));
    }

    fn case_started(&mut self, target: &TargetSpec, case: &TestCase) {
        self.unit = target.unit;
        let header = style(format!("[{}]", target.label)).bold().cyan();
        self.line("");
        self.line(format!("{header} {}", style(case.display_name()).bold()));
    }

    fn reference_ready(&mut self, _target: &TargetSpec, path: &Path, generated: bool) {
        let verb = if generated { "generated" } else { "reused" };
        self.line(format!("  {} reference {}", style(verb).dim(), path.display()));
    }

    fn case_unavailable(
        &mut self,
        _target: &TargetSpec,
        _case: &TestCase,
        error: &SweepError,
        skipped: usize,
    ) {
        self.line(format!("  {} {error}", style("SKIPPED").yellow().bold()));
        self.bar.inc(skipped as u64);
    }

    fn item_started(&mut self, item: &WorkItem) {
        self.bar.set_message(format!("Running {}", item.key()));
    }

    fn item_finished(&mut self, item: &WorkItem, row: &ReportRow) {
        let partial = if row.successes < row.attempts {
            format!(" ({}/{} runs)", row.successes, row.attempts)
        } else {
            String::new()
        };
        self.line(format!(
            "  {:<16} {:>12.2} {} {:>8}{}",
            label(item),
            row.mean,
            self.unit.suffix(),
            style(row.speedup.to_string()).green(),
            style(partial).yellow()
        ));
        self.bar.inc(1);
    }

    fn item_failed(&mut self, item: &WorkItem) {
        self.line(format!("  {:<16} {}", label(item), style("FAILED").red().bold()));
        self.bar.inc(1);
    }

    fn mismatch(&mut self, item: &WorkItem, expected: &str, actual: &str) {
        self.line(format!("  {:<16} {}", label(item), style("MISMATCH!").red().bold()));
        self.line(style("Expected:").dim().to_string());
        self.line(expected);
        self.line(style("Got:").dim().to_string());
        self.line(actual);
    }

    fn case_aborted(&mut self, _item: &WorkItem, skipped: usize) {
        let status = style("ABORTED").red().bold();
        self.line(format!("  {status} {skipped} remaining variant(s) skipped"));
        self.bar.inc(skipped as u64);
    }
}

fn label(item: &WorkItem) -> String {
    match &item.variant.layout {
        Some(layout) => format!("{} [{layout}]", item.variant.short_label()),
        None => item.variant.short_label(),
    }
}
