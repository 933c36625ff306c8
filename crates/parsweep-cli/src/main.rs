//! parsweep command-line driver
//!
//! Selects a sweep by name, builds every target, runs the measurement matrix and
//! writes the Markdown report (plus optional JSON) into the run root.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, ValueEnum};
use console::style;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use parsweep_cli::exit::{
    EXIT_BUILD_FAIL, EXIT_GENERIC_FAIL, EXIT_SUCCESS, EXIT_USAGE, EXIT_VALIDATION_FAIL,
};
use parsweep_cli::progress::ConsoleObserver;
use parsweep_core::{run_build_gate, BuildStatus, SweepCatalog, SweepError, SweepRunner};

#[derive(Parser)]
#[command(name = "parsweep")]
#[command(about = "Run parallel benchmark sweeps and render speedup reports")]
#[command(long_about = r#"
parsweep runs an external workload across a matrix of problem sizes, thread or
process counts and partitioning strategies, averages repeated timings, checks
every output against a sequential reference and writes a Markdown report.

Examples:
  # Standard convolution sweep
  parsweep lab1

  # Ten repetitions per test, workloads under ./labs
  parsweep layouts --runs 10 --root ./labs

  # Sweeps defined in a TOML file
  parsweep --config sweeps.toml smoke --json results.json
"#)]
#[command(version)]
struct Cli {
    /// Sweep to run (see --list)
    sweep: Option<String>,

    /// Additional sweep definitions (TOML)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory workloads run in; relative paths resolve against it
    #[arg(short = 'C', long, value_name = "DIR", default_value = ".")]
    root: PathBuf,

    /// Repetitions per work item
    #[arg(long, value_name = "N")]
    runs: Option<usize>,

    /// Report path, relative to the root (defaults to the sweep's report)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Also write the report rows as JSON, relative to the root
    #[arg(long, value_name = "PATH")]
    json: Option<PathBuf>,

    /// List available sweeps and exit
    #[arg(long)]
    list: bool,

    /// Do not run build commands
    #[arg(long)]
    skip_build: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Pretty,
    Compact,
    Json,
}

fn main() {
    let cli = Cli::parse();
    setup_logging(&cli.log_level, cli.log_format);

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("Sweep failed: {e}");
            eprintln!("{} {e:#}", style("error:").red().bold());
            EXIT_GENERIC_FAIL
        }
    };
    std::process::exit(code);
}

/// Setup logging; `RUST_LOG` wins over `--log-level`. Logs go to stderr.
fn setup_logging(level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = match format {
        LogFormat::Json => {
            subscriber.json().with_timer(tracing_subscriber::fmt::time::uptime()).try_init()
        }
        LogFormat::Compact => subscriber.compact().try_init(),
        LogFormat::Pretty => subscriber.pretty().try_init(),
    };
    if let Err(e) = installed {
        eprintln!("failed to install logger: {e}");
    }
}

fn run(cli: Cli) -> Result<i32> {
    let mut catalog = SweepCatalog::builtin();
    if let Some(path) = &cli.config {
        let extra = SweepCatalog::load(path)
            .with_context(|| format!("Failed to load sweeps from {}", path.display()))?;
        catalog.merge(extra);
    }

    if cli.list {
        for sweep in catalog.sweeps() {
            println!("{:<12} {}", style(&sweep.name).bold(), sweep.title);
        }
        return Ok(EXIT_SUCCESS);
    }

    let Some(name) = cli.sweep.as_deref() else {
        let mut cmd = Cli::command();
        eprintln!("{}", cmd.render_usage());
        eprintln!("Available sweeps: {}", catalog.names().join(", "));
        return Ok(EXIT_USAGE);
    };
    let config = match catalog.get(name) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {e}", style("error:").red().bold());
            return Ok(EXIT_USAGE);
        }
    };
    if cli.runs == Some(0) {
        eprintln!("{} --runs must be at least 1", style("error:").red().bold());
        return Ok(EXIT_USAGE);
    }

    let root = std::fs::canonicalize(&cli.root)
        .with_context(|| format!("Run root {} is not accessible", cli.root.display()))?;

    println!("{}", style(format!("{} Benchmark", config.title)).bold().cyan());
    println!("Root: {}", root.display());

    if cli.skip_build {
        info!("build gate skipped");
    } else {
        println!("{}", style("Building...").bold());
        match run_build_gate(&config.targets, &root) {
            Ok(statuses) => {
                for (target, status) in statuses {
                    match status {
                        BuildStatus::Built => {
                            println!("  {target}: {}", style("built").green());
                        }
                        BuildStatus::UpToDate => {
                            println!("  {target}: {}", style("up to date").green());
                        }
                        BuildStatus::NoBuildStep => {}
                    }
                }
            }
            Err(SweepError::Build { target, diagnostic }) => {
                eprintln!("{} build failed for '{target}'", style("error:").red().bold());
                eprintln!("{diagnostic}");
                return Ok(EXIT_BUILD_FAIL);
            }
            Err(other) => return Err(other.into()),
        }
    }

    let runner = SweepRunner::new(config, &root).with_runs(cli.runs);
    let mut observer = ConsoleObserver::new();
    let outcome = runner.run(&mut observer).context("Sweep aborted")?;

    let report_path = resolve(&root, cli.output.as_deref().unwrap_or(&config.report_path()));
    outcome
        .report
        .write_markdown(&report_path)
        .with_context(|| format!("Failed to write report to {}", report_path.display()))?;
    println!();
    println!("{} {}", style("Results saved to:").green().bold(), report_path.display());

    if let Some(json) = cli.json.as_deref().map(|p| resolve(&root, p)) {
        outcome
            .report
            .write_json(&json)
            .with_context(|| format!("Failed to write JSON to {}", json.display()))?;
        println!("{} {}", style("JSON saved to:").green().bold(), json.display());
    }

    if !outcome.mismatches.is_empty() {
        println!(
            "{} {} output mismatch(es)",
            style("warning:").yellow().bold(),
            outcome.mismatches.len()
        );
        for m in &outcome.mismatches {
            println!("  {} ({})", m.item, m.case);
        }
    }

    if outcome.validation_failed() {
        return Ok(EXIT_VALIDATION_FAIL);
    }
    Ok(EXIT_SUCCESS)
}

/// Relative paths are taken relative to the run root.
fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
