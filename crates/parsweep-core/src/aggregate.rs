//! Repetition aggregator: N runs of one work item reduced to a mean
//!
//! Repetition 0 writes to the item's canonical output path so the oracle can
//! check it; later repetitions write to a disposable path. Failures are not
//! retried. The first repetition's failure is logged at WARN, later ones only at
//! DEBUG so a flaky workload does not flood the console.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::Result;
use crate::executor::{measure, DurationContract, Executor, Invocation, Measurement};

/// Mean of the successful repetitions of one work item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub mean: f64,
    pub successes: usize,
    pub attempts: usize,
}

impl AggregateResult {
    /// Arithmetic mean of `samples`; `None` when empty.
    pub fn from_samples(samples: &[Measurement], attempts: usize) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let total: f64 = samples.iter().map(|m| m.0 as f64).sum();
        Some(Self { mean: total / samples.len() as f64, successes: samples.len(), attempts })
    }

    /// True when some repetitions were dropped.
    pub fn is_partial(&self) -> bool {
        self.successes < self.attempts
    }
}

pub struct RepetitionAggregator<'a, E: Executor + ?Sized> {
    executor: &'a E,
    contract: DurationContract,
    runs: usize,
}

impl<'a, E: Executor + ?Sized> RepetitionAggregator<'a, E> {
    pub fn new(executor: &'a E, contract: DurationContract, runs: usize) -> Self {
        Self { executor, contract, runs: runs.max(1) }
    }

    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Run `build(output)` `runs` times and average the parsed durations.
    ///
    /// `key` identifies the item in log lines. Returns `None` when every
    /// repetition failed.
    pub fn aggregate<F>(
        &self,
        key: &str,
        canonical: &Path,
        disposable: &Path,
        build: F,
    ) -> Option<AggregateResult>
    where
        F: Fn(&Path) -> Result<Invocation>,
    {
        let mut samples = Vec::with_capacity(self.runs);

        for rep in 0..self.runs {
            let output = if rep == 0 { canonical } else { disposable };
            let measured =
                build(output).and_then(|inv| measure(self.executor, &self.contract, &inv));
            match measured {
                Ok(m) => {
                    debug!(item = key, rep, duration = m.0, "repetition finished");
                    samples.push(m);
                }
                Err(e) if rep == 0 || !e.is_degradable() => {
                    warn!(item = key, error = %e, "repetition failed");
                }
                Err(e) => {
                    debug!(item = key, rep, error = %e, "(rate-limited) repetition failed");
                }
            }
        }

        let result = AggregateResult::from_samples(&samples, self.runs);
        if let Some(r) = &result {
            if r.is_partial() {
                debug!(item = key, successes = r.successes, attempts = r.attempts, "partial mean");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SweepError;
    use crate::executor::CapturedRun;
    use std::cell::RefCell;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tracing_subscriber::fmt::MakeWriter;

    /// Replays canned stdout per call and records the output paths it saw.
    struct Scripted {
        outputs: Vec<Option<&'static str>>,
        seen: RefCell<Vec<String>>,
    }

    impl Scripted {
        fn new(outputs: Vec<Option<&'static str>>) -> Self {
            Self { outputs, seen: RefCell::new(Vec::new()) }
        }
    }

    impl Executor for Scripted {
        fn execute(&self, invocation: &Invocation) -> Result<CapturedRun> {
            let mut seen = self.seen.borrow_mut();
            let idx = seen.len();
            seen.push(invocation.args.last().cloned().unwrap_or_default());
            match self.outputs.get(idx).copied().flatten() {
                Some(stdout) => {
                    Ok(CapturedRun { stdout: stdout.to_string(), ..Default::default() })
                }
                None => Err(SweepError::NonZeroExit {
                    program: invocation.program.clone(),
                    status: "exit status: 1".into(),
                    stderr: String::new(),
                }),
            }
        }
    }

    fn invocation(output: &Path) -> Result<Invocation> {
        Ok(Invocation {
            program: "conv".into(),
            args: vec![output.display().to_string()],
            current_dir: PathBuf::from("."),
            timeout: Duration::from_secs(1),
        })
    }

    fn aggregate(exec: &Scripted, runs: usize) -> Option<AggregateResult> {
        let contract = DurationContract::marker("Convolution time");
        RepetitionAggregator::new(exec, contract, runs).aggregate(
            "cpp/case0",
            Path::new("canonical.out"),
            Path::new("scratch.out"),
            invocation,
        )
    }

    /// In-memory sink for formatted log lines.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn captured_logs(f: impl FnOnce()) -> Vec<String> {
        let buffer = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buffer.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .without_time()
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap().lines().map(str::to_string).collect()
    }

    #[test]
    fn mean_of_all_successes() {
        let exec = Scripted::new(vec![
            Some("Convolution time: 10 ms"),
            Some("Convolution time: 20 ms"),
            Some("Convolution time: 30 ms"),
        ]);
        let r = aggregate(&exec, 3).unwrap();
        assert_eq!(r.mean, 20.0);
        assert_eq!((r.successes, r.attempts), (3, 3));
        assert!(!r.is_partial());
    }

    #[test]
    fn failed_repetitions_are_excluded() {
        let exec = Scripted::new(vec![
            Some("Convolution time: 10 ms"),
            None,
            Some("no marker here"),
            Some("Convolution time: 30 ms"),
        ]);
        let r = aggregate(&exec, 4).unwrap();
        assert_eq!(r.mean, 20.0);
        assert_eq!(r.successes, 2);
        assert!(r.is_partial());
    }

    #[test]
    fn all_failures_yield_none() {
        let exec = Scripted::new(vec![None, Some("garbage")]);
        assert!(aggregate(&exec, 2).is_none());
        assert_eq!(exec.seen.borrow().len(), 2);
    }

    #[test]
    fn only_first_repetition_uses_canonical_path() {
        let exec = Scripted::new(vec![Some("Convolution time: 1"); 3]);
        aggregate(&exec, 3).unwrap();
        assert_eq!(*exec.seen.borrow(), vec!["canonical.out", "scratch.out", "scratch.out"]);
    }

    #[test]
    fn zero_runs_is_clamped_to_one() {
        let exec = Scripted::new(vec![Some("Convolution time: 5")]);
        let r = aggregate(&exec, 0).unwrap();
        assert_eq!(r.attempts, 1);
        assert_eq!(r.mean, 5.0);
    }

    #[test]
    fn only_first_repetition_failure_is_warned() {
        let exec = Scripted::new(vec![None, None, None]);
        let logs = captured_logs(|| assert!(aggregate(&exec, 3).is_none()));

        let warned: Vec<_> = logs.iter().filter(|l| l.contains("WARN")).collect();
        assert_eq!(warned.len(), 1, "{logs:#?}");
        assert!(warned[0].contains("repetition failed"));
        assert!(!warned[0].contains("(rate-limited)"));

        let quiet: Vec<_> = logs.iter().filter(|l| l.contains("(rate-limited)")).collect();
        assert_eq!(quiet.len(), 2, "{logs:#?}");
        assert!(quiet.iter().all(|l| l.contains("DEBUG")));
    }

    #[test]
    fn later_repetition_failure_is_not_warned() {
        let exec = Scripted::new(vec![Some("Convolution time: 4"), None]);
        let logs = captured_logs(|| assert_eq!(aggregate(&exec, 2).unwrap().mean, 4.0));

        assert!(logs.iter().all(|l| !l.contains("WARN")), "{logs:#?}");
        assert!(logs.iter().any(|l| l.contains("DEBUG") && l.contains("(rate-limited)")));
    }
}
