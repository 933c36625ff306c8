//! Run executor: one external process per invocation
//!
//! The executor spawns exactly one workload process, drains its output on
//! helper threads, waits for it under a timeout and hands the captured stdout
//! to a [`DurationContract`] to extract a single [`Measurement`].

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::{ArgumentStyle, TargetSpec};
use crate::error::{Result, SweepError};
use crate::types::{Mode, Strategy, Variant};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Fully resolved process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: PathBuf,
    pub timeout: Duration,
}

impl Invocation {
    /// Build the argument vector for `variant` of `target`.
    ///
    /// Fails when neither the launcher nor the target command names a program.
    pub fn for_variant(
        target: &TargetSpec,
        variant: &Variant,
        inputs: &[PathBuf],
        output: &Path,
        current_dir: &Path,
    ) -> Result<Self> {
        let mut argv: Vec<String> = Vec::new();

        if variant.mode == Mode::Parallel {
            let degree = variant.degree.unwrap_or(0).to_string();
            argv.extend(target.parallel_launcher.iter().map(|a| a.replace("{degree}", &degree)));
        }
        argv.extend(target.command.iter().cloned());

        match target.arguments {
            ArgumentStyle::Flags => {
                for input in inputs {
                    argv.push("-i".to_string());
                    argv.push(input.display().to_string());
                }
                if let Some(layout) = &variant.layout {
                    argv.push("-m".to_string());
                    argv.push(layout.clone());
                }
                argv.push("-e".to_string());
                argv.push(variant.mode.flag().to_string());
                if variant.strategy == Strategy::InPlace {
                    argv.push("--inplace".to_string());
                }
                if variant.mode == Mode::Parallel {
                    if let Some(degree) = variant.degree {
                        argv.push("-t".to_string());
                        argv.push(degree.to_string());
                    }
                    if let Some(strategy) = variant.strategy.argument() {
                        argv.push("-s".to_string());
                        argv.push(strategy.to_string());
                    }
                }
                argv.push("-o".to_string());
                argv.push(output.display().to_string());
            }
            ArgumentStyle::Positional => {
                argv.push(variant.strategy.argument().unwrap_or("sequential").to_string());
                argv.extend(inputs.iter().map(|p| p.display().to_string()));
                argv.push(output.display().to_string());
            }
        }

        let Some((program, args)) = argv.split_first() else {
            let reason = format!("target '{}' has an empty command", target.name);
            return Err(SweepError::Config(reason));
        };
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            current_dir: current_dir.to_path_buf(),
            timeout: target.timeout(),
        })
    }

    /// Shell-like rendering for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured output of a process that exited successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedRun {
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Runs invocations.
pub trait Executor {
    /// Run to completion. Spawn errors, timeouts and non-zero exits are errors.
    fn execute(&self, invocation: &Invocation) -> Result<CapturedRun>;
}

/// Executes invocations as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl Executor for ProcessExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<CapturedRun> {
        debug!(command = %invocation.command_line(), "spawning workload");
        let started = Instant::now();
        let deadline = started + invocation.timeout;

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.current_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SweepError::Spawn { program: invocation.program.clone(), source })?;

        let stdout_rx = spawn_drain(child.stdout.take());
        let stderr_rx = spawn_drain(child.stderr.take());
        let timed_out = || SweepError::Timeout {
            program: invocation.program.clone(),
            after: invocation.timeout,
        };

        let status = match wait_with_timeout(&mut child, invocation.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => return Err(timed_out()),
            Err(source) => {
                return Err(SweepError::Spawn { program: invocation.program.clone(), source });
            }
        };

        // A background grandchild can keep the pipes open after the child exits.
        // Readers still running at the deadline are left detached.
        let stdout = collect_until(&stdout_rx, deadline).ok_or_else(timed_out)?;
        let stderr = collect_until(&stderr_rx, deadline).ok_or_else(timed_out)?;

        if status.success() {
            Ok(CapturedRun { stdout, stderr, elapsed: started.elapsed() })
        } else {
            Err(SweepError::NonZeroExit {
                program: invocation.program.clone(),
                status: status.to_string(),
                stderr,
            })
        }
    }
}

/// Poll until exit or timeout. `Ok(None)` means the child was killed for exceeding it.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {}
            Err(e) => {
                terminate_and_reap(child);
                return Err(e);
            }
        }
        if started.elapsed() >= timeout {
            terminate_and_reap(child);
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn terminate_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn drain(mut stream: impl Read) -> String {
    let mut bytes = Vec::new();
    let _ = stream.read_to_end(&mut bytes);
    String::from_utf8_lossy(&bytes).into_owned()
}

fn spawn_drain<R: Read + Send + 'static>(stream: Option<R>) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    if let Some(stream) = stream {
        thread::spawn(move || {
            let _ = tx.send(drain(stream));
        });
    }
    rx
}

/// Output of one reader, or `None` if it has not reached EOF by `deadline`.
fn collect_until(rx: &Receiver<String>, deadline: Instant) -> Option<String> {
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(text) => Some(text),
        Err(RecvTimeoutError::Disconnected) => Some(String::new()),
        Err(RecvTimeoutError::Timeout) => None,
    }
}

/// One successfully parsed duration, in the target's unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Measurement(pub u64);

/// Where the duration lives in a workload's stdout.
///
/// With a marker, the first line containing it is used: the text after the first
/// colon following the marker is trimmed and its first whitespace-delimited field
/// parsed as an unsigned integer. Without a marker, the first non-empty line's first
/// field is the duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationContract {
    marker: Option<String>,
}

impl DurationContract {
    pub fn marker(marker: impl Into<String>) -> Self {
        Self { marker: Some(marker.into()) }
    }

    pub fn bare() -> Self {
        Self { marker: None }
    }

    pub fn for_target(target: &TargetSpec) -> Self {
        Self { marker: target.marker.clone() }
    }

    pub fn extract(&self, stdout: &str) -> Result<Measurement> {
        match &self.marker {
            Some(marker) => {
                let line = stdout
                    .lines()
                    .find(|l| l.contains(marker.as_str()))
                    .ok_or_else(|| SweepError::MarkerMissing { marker: marker.clone() })?;
                let at = line.find(marker.as_str()).unwrap_or(0);
                let value = line[at..]
                    .split_once(':')
                    .map(|(_, rest)| rest)
                    .ok_or_else(|| malformed(line))?;
                parse_first_field(value).ok_or_else(|| malformed(line))
            }
            None => {
                let line = stdout
                    .lines()
                    .find(|l| !l.trim().is_empty())
                    .ok_or_else(|| SweepError::MarkerMissing { marker: "<bare duration>".into() })?;
                parse_first_field(line).ok_or_else(|| malformed(line))
            }
        }
    }
}

fn parse_first_field(text: &str) -> Option<Measurement> {
    text.split_whitespace().next()?.parse::<u64>().ok().map(Measurement)
}

fn malformed(line: &str) -> SweepError {
    SweepError::MalformedDuration { line: line.trim().to_string() }
}

/// Run once and parse the duration.
pub fn measure<E: Executor + ?Sized>(
    executor: &E,
    contract: &DurationContract,
    invocation: &Invocation,
) -> Result<Measurement> {
    let run = executor.execute(invocation)?;
    contract.extract(&run.stdout)
}
