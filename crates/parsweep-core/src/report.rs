//! Report rendering: one deduplicated Markdown table per target
//!
//! Rows stay in sweep order. Key cells (size, shape, layout, mode, degree) are
//! blanked when they repeat the previous row *and* every key cell to their left
//! is also unchanged, so a new size or kernel always reprints the full key.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::aggregate::AggregateResult;
use crate::config::{SweepConfig, TimeUnit};
use crate::error::{Result, SweepError};
use crate::oracle::Verdict;
use crate::speedup::Speedup;
use crate::types::{Mode, WorkItem};

/// One measured work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub target: String,
    pub case: String,
    pub size: String,
    pub shape: String,
    pub layout: Option<String>,
    pub mode: Mode,
    pub degree: Option<u32>,
    pub strategy: String,
    pub mean: f64,
    pub speedup: Speedup,
    pub verdict: Verdict,
    pub successes: usize,
    pub attempts: usize,
}

impl ReportRow {
    pub fn new(
        item: &WorkItem,
        aggregate: &AggregateResult,
        speedup: Speedup,
        verdict: Verdict,
    ) -> Self {
        let variant = &item.variant;
        Self {
            target: variant.target.clone(),
            case: item.case.display_name(),
            size: item.case.shape.size_label(),
            shape: item.case.shape.shape_label(),
            layout: variant.layout.clone(),
            mode: variant.mode,
            degree: variant.degree,
            strategy: variant.strategy.to_string(),
            mean: aggregate.mean,
            speedup,
            verdict,
            successes: aggregate.successes,
            attempts: aggregate.attempts,
        }
    }

    fn key_cells(&self, with_layout: bool) -> Vec<String> {
        let mut cells = vec![self.size.clone(), self.shape.clone()];
        if with_layout {
            cells.push(self.layout.clone().unwrap_or_else(|| "-".to_string()));
        }
        cells.push(self.mode.to_string());
        cells.push(self.degree.map_or_else(|| "-".to_string(), |d| d.to_string()));
        cells
    }
}

/// Blank every key cell equal to the previous row's cell whose left-hand key
/// cells are all unchanged too.
pub fn suppress_repeated_keys(rows: &[Vec<String>]) -> Vec<Vec<String>> {
    let mut out = Vec::with_capacity(rows.len());
    let mut prev: Option<&Vec<String>> = None;

    for row in rows {
        let mut rendered = Vec::with_capacity(row.len());
        let mut prefix_same = prev.is_some();
        for (i, cell) in row.iter().enumerate() {
            let same = prefix_same && prev.and_then(|p| p.get(i)) == Some(cell);
            rendered.push(if same { String::new() } else { cell.clone() });
            prefix_same = same;
        }
        out.push(rendered);
        prev = Some(row);
    }

    out
}

/// Rows of one target, in sweep order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetTable {
    pub target: String,
    pub label: String,
    pub unit: TimeUnit,
    pub has_layouts: bool,
    pub rows: Vec<ReportRow>,
}

/// The full persisted report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub title: String,
    pub generated_at: String,
    pub runs: usize,
    pub size_header: String,
    pub shape_header: String,
    pub degree_header: String,
    pub tables: Vec<TargetTable>,
}

impl ReportDocument {
    /// Empty document with one table per target of `config`.
    pub fn for_sweep(config: &SweepConfig, runs: usize) -> Self {
        let (size_header, shape_header) = config.key_headers();
        Self {
            title: config.title.clone(),
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            runs,
            size_header: size_header.to_string(),
            shape_header: shape_header.to_string(),
            degree_header: config.degree_header.clone(),
            tables: config
                .targets
                .iter()
                .map(|t| TargetTable {
                    target: t.name.clone(),
                    label: t.label.clone(),
                    unit: t.unit,
                    has_layouts: !t.layouts.is_empty(),
                    rows: Vec::new(),
                })
                .collect(),
        }
    }

    /// Append `row` to its target's table.
    pub fn push(&mut self, row: ReportRow) {
        if let Some(table) = self.tables.iter_mut().find(|t| t.target == row.target) {
            table.rows.push(row);
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &ReportRow> {
        self.tables.iter().flat_map(|t| t.rows.iter())
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let _ = writeln!(md, "# {} Performance Results", self.title);
        md.push('\n');
        let _ = writeln!(md, "**Generated:** {}", self.generated_at);
        let _ = writeln!(md, "**Runs per test:** {}", self.runs);

        for table in &self.tables {
            md.push('\n');
            let _ = writeln!(md, "## {} Results", table.label);
            md.push('\n');
            self.render_table(&mut md, table);
        }

        md
    }

    fn render_table(&self, md: &mut String, table: &TargetTable) {
        let time_header = format!("Time ({})", table.unit.suffix());
        let mut headers = vec![self.size_header.as_str(), self.shape_header.as_str()];
        if table.has_layouts {
            headers.push("Layout");
        }
        headers.extend(["Mode", self.degree_header.as_str(), "Strategy"]);
        headers.push(time_header.as_str());
        headers.push("Speedup");

        let _ = writeln!(md, "| {} |", headers.join(" | "));
        let rule: Vec<String> =
            headers.iter().map(|h| format!("-{}-", "-".repeat(h.chars().count().max(3)))).collect();
        let _ = writeln!(md, "|{}|", rule.join("|"));

        if table.rows.is_empty() {
            md.push('\n');
            md.push_str("_No successful measurements._\n");
            return;
        }

        let keys: Vec<Vec<String>> =
            table.rows.iter().map(|r| r.key_cells(table.has_layouts)).collect();
        for (row, key) in table.rows.iter().zip(suppress_repeated_keys(&keys)) {
            let mut cells = key;
            cells.push(row.strategy.clone());
            cells.push(format!("{:.2}", row.mean));
            cells.push(row.speedup.to_string());
            let _ = writeln!(md, "| {} |", cells.join(" | "));
        }
    }

    pub fn write_markdown(&self, path: &Path) -> Result<()> {
        write_creating_parents(path, &self.to_markdown())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| SweepError::Serialize(e.to_string()))
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        write_creating_parents(path, &self.to_json()?)
    }
}

fn write_creating_parents(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| SweepError::io(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| SweepError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProblemShape, Strategy, TestCase, Variant};

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn dedup_is_prefix_sensitive() {
        let rows = vec![
            row(&["10x10", "3", "seq"]),
            row(&["10x10", "3", "par"]),
            row(&["10x10", "5", "seq"]),
        ];
        let out = suppress_repeated_keys(&rows);
        assert_eq!(out[0], row(&["10x10", "3", "seq"]));
        assert_eq!(out[1], row(&["", "", "par"]));
        assert_eq!(out[2], row(&["", "5", "seq"]));
    }

    #[test]
    fn changed_left_cell_reprints_everything_right_of_it() {
        let rows = vec![row(&["10x10", "3", "par", "4"]), row(&["1000x1000", "3", "par", "4"])];
        let out = suppress_repeated_keys(&rows);
        assert_eq!(out[1], row(&["1000x1000", "3", "par", "4"]));
    }

    fn item(variant: Variant) -> WorkItem {
        WorkItem {
            case_index: 0,
            case: TestCase::new(ProblemShape::Grid { rows: 10, cols: 10, kernel: 3 }, [4]),
            variant,
        }
    }

    fn agg(mean: f64) -> AggregateResult {
        AggregateResult { mean, successes: 1, attempts: 1 }
    }

    fn document(rows: Vec<ReportRow>) -> ReportDocument {
        ReportDocument {
            title: "Lab 1 - Standard Convolution".into(),
            generated_at: "2026-01-01 00:00:00".into(),
            runs: 1,
            size_header: "Matrix Size".into(),
            shape_header: "Kernel".into(),
            degree_header: "Threads".into(),
            tables: vec![TargetTable {
                target: "cpp".into(),
                label: "C++".into(),
                unit: TimeUnit::Millis,
                has_layouts: false,
                rows,
            }],
        }
    }

    #[test]
    fn markdown_table_layout() {
        let base = ReportRow::new(
            &item(Variant::baseline("cpp", None)),
            &agg(100.0),
            Speedup::Baseline,
            Verdict::Unknown,
        );
        let hori = ReportRow::new(
            &item(Variant::parallel("cpp", 4, Strategy::Named("horizontal".into()), None)),
            &agg(25.0),
            Speedup::Ratio(4.0),
            Verdict::Pass,
        );
        let vert = ReportRow::new(
            &item(Variant::parallel("cpp", 4, Strategy::Named("vertical".into()), None)),
            &agg(50.0),
            Speedup::Undefined,
            Verdict::Fail,
        );
        let md = document(vec![base, hori, vert]).to_markdown();

        assert!(md.starts_with("# Lab 1 - Standard Convolution Performance Results\n"));
        assert!(md.contains("**Runs per test:** 1"));
        assert!(md.contains("## C++ Results"));
        assert!(md.contains(
            "| Matrix Size | Kernel | Mode | Threads | Strategy | Time (ms) | Speedup |"
        ));
        assert!(md.contains("| 10x10 | 3x3 | sequential | - | - | 100.00 | 1.00x |"));
        assert!(md.contains("|  |  | parallel | 4 | horizontal | 25.00 | 4.00x |"));
        assert!(md.contains("|  |  |  |  | vertical | 50.00 | n/a |"));
    }

    #[test]
    fn in_place_rows_name_their_strategy() {
        let seq = Variant { strategy: Strategy::InPlace, ..Variant::baseline("cpp", None) };
        let base = ReportRow::new(&item(seq), &agg(80.0), Speedup::Baseline, Verdict::Unknown);
        let par = ReportRow::new(
            &item(Variant::parallel("cpp", 4, Strategy::InPlace, None)),
            &agg(20.0),
            Speedup::Ratio(4.0),
            Verdict::Pass,
        );
        assert_eq!(base.strategy, "in-place");

        let md = document(vec![base, par]).to_markdown();
        assert!(md.contains("| 10x10 | 3x3 | sequential | - | in-place | 80.00 | 1.00x |"));
        assert!(md.contains("|  |  | parallel | 4 | in-place | 20.00 | 4.00x |"));
    }

    #[test]
    fn empty_table_has_note() {
        let md = document(Vec::new()).to_markdown();
        assert!(md.contains("_No successful measurements._"));
    }

    #[test]
    fn json_includes_verdicts_and_counts() {
        let base = ReportRow::new(
            &item(Variant::baseline("cpp", None)),
            &agg(10.0),
            Speedup::Baseline,
            Verdict::Pass,
        );
        let json = document(vec![base]).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let row = &value["tables"][0]["rows"][0];
        assert_eq!(row["verdict"], "pass");
        assert_eq!(row["successes"], 1);
        assert_eq!(row["speedup"]["kind"], "baseline");
    }

    #[test]
    fn write_markdown_creates_parent_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("reports/out.md");
        document(Vec::new()).write_markdown(&path).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("## C++ Results"));
    }
}
