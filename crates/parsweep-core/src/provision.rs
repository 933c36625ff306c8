//! Input provisioning: make sure every test case's input files exist
//!
//! Inputs are an append-only cache keyed by file name. A file that already
//! exists is reused as-is, whatever produced it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

use crate::config::InputSource;
use crate::error::{Result, SweepError};
use crate::types::ProblemShape;

/// Supplies the input paths for a problem shape, creating them when missing.
pub trait InputProvisioner {
    fn provision(&self, shape: &ProblemShape) -> Result<Vec<PathBuf>>;
}

/// Artifact file names for `shape`, relative to the data directory.
pub fn artifact_names(shape: &ProblemShape) -> Vec<String> {
    match *shape {
        ProblemShape::Grid { rows, cols, kernel } => {
            vec![format!("test_{rows}x{cols}_{kernel}.txt")]
        }
        ProblemShape::Operands { lhs_digits, rhs_digits } => {
            vec![format!("N1_{lhs_digits}.txt"), format!("N2_{rhs_digits}.txt")]
        }
    }
}

/// What a single artifact file must contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Artifact {
    Grid { rows: usize, cols: usize, kernel: usize },
    Number { digits: usize },
}

fn artifacts(shape: &ProblemShape) -> Vec<Artifact> {
    match *shape {
        ProblemShape::Grid { rows, cols, kernel } => vec![Artifact::Grid { rows, cols, kernel }],
        ProblemShape::Operands { lhs_digits, rhs_digits } => {
            vec![Artifact::Number { digits: lhs_digits }, Artifact::Number { digits: rhs_digits }]
        }
    }
}

/// In-process generator backed by `rand`.
#[derive(Debug, Clone, Default)]
pub struct BuiltinGenerator {
    seed: Option<u64>,
}

impl BuiltinGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic output for a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed.unwrap_or_else(rand::random))
    }

    /// `rows cols kernel` header, `rows` lines of `cols` values in 0..=100, then a
    /// `kernel x kernel` identity kernel.
    pub fn write_grid(
        &self,
        out: &mut impl Write,
        rows: usize,
        cols: usize,
        kernel: usize,
    ) -> std::io::Result<()> {
        let mut rng = self.rng();
        writeln!(out, "{rows} {cols} {kernel}")?;
        for _ in 0..rows {
            for c in 0..cols {
                if c > 0 {
                    out.write_all(b" ")?;
                }
                write!(out, "{}", rng.random_range(0..=100u32))?;
            }
            out.write_all(b"\n")?;
        }
        let center = kernel / 2;
        for i in 0..kernel {
            let row: Vec<&str> =
                (0..kernel).map(|j| if i == center && j == center { "1" } else { "0" }).collect();
            writeln!(out, "{}", row.join(" "))?;
        }
        Ok(())
    }

    /// Digit count on the first line, then the digits with a non-zero leading digit.
    pub fn write_number(&self, out: &mut impl Write, digits: usize) -> std::io::Result<()> {
        let mut rng = self.rng();
        writeln!(out, "{digits}")?;
        let mut number = String::with_capacity(digits);
        for i in 0..digits {
            let d: u8 = if i == 0 { rng.random_range(1..=9) } else { rng.random_range(0..=9) };
            number.push(char::from(b'0' + d));
        }
        out.write_all(number.as_bytes())
    }

    fn generate(&self, artifact: Artifact, path: &Path) -> Result<()> {
        let tmp = path.with_extension("tmp");
        let file = File::create(&tmp).map_err(|e| SweepError::io(&tmp, e))?;
        let mut out = BufWriter::new(file);
        let written = match artifact {
            Artifact::Grid { rows, cols, kernel } => self.write_grid(&mut out, rows, cols, kernel),
            Artifact::Number { digits } => self.write_number(&mut out, digits),
        };
        written.and_then(|()| out.flush()).map_err(|e| SweepError::io(&tmp, e))?;
        drop(out);
        fs::rename(&tmp, path).map_err(|e| SweepError::io(path, e))
    }
}

/// Provisions inputs under a data directory from the configured source.
#[derive(Debug, Clone)]
pub struct GeneratedInputs {
    root: PathBuf,
    data_dir: PathBuf,
    source: InputSource,
    builtin: BuiltinGenerator,
}

impl GeneratedInputs {
    /// `data_dir` is resolved against `root`, which is also the external
    /// generator's working directory.
    pub fn new(root: &Path, data_dir: &Path, source: InputSource) -> Self {
        Self {
            root: root.to_path_buf(),
            data_dir: root.join(data_dir),
            source,
            builtin: BuiltinGenerator::new(),
        }
    }

    #[must_use]
    pub fn with_generator(mut self, builtin: BuiltinGenerator) -> Self {
        self.builtin = builtin;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn run_external(&self, argv: &[String], artifact: Artifact, path: &Path) -> Result<()> {
        let (rows, cols, kernel, digits) = match artifact {
            Artifact::Grid { rows, cols, kernel } => (rows, cols, kernel, 0),
            Artifact::Number { digits } => (0, 0, 0, digits),
        };
        let path_str = path.display().to_string();
        let args: Vec<String> = argv
            .iter()
            .map(|a| {
                a.replace("{rows}", &rows.to_string())
                    .replace("{cols}", &cols.to_string())
                    .replace("{kernel}", &kernel.to_string())
                    .replace("{digits}", &digits.to_string())
                    .replace("{path}", &path_str)
            })
            .collect();
        let Some((program, rest)) = args.split_first() else {
            return Err(SweepError::Provision {
                path: path.to_path_buf(),
                reason: "empty generator command".to_string(),
            });
        };

        debug!(command = %args.join(" "), "running input generator");
        let output = Command::new(program)
            .args(rest)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| SweepError::Provision {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(SweepError::Provision {
                path: path.to_path_buf(),
                reason: format!(
                    "generator exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        if !path.exists() {
            return Err(SweepError::Provision {
                path: path.to_path_buf(),
                reason: "generator did not create the file".to_string(),
            });
        }
        Ok(())
    }
}

impl InputProvisioner for GeneratedInputs {
    fn provision(&self, shape: &ProblemShape) -> Result<Vec<PathBuf>> {
        if let Err(reason) = shape.validate() {
            return Err(SweepError::Provision { path: self.data_dir.clone(), reason });
        }
        fs::create_dir_all(&self.data_dir).map_err(|e| SweepError::io(&self.data_dir, e))?;

        let mut paths = Vec::new();
        for (name, artifact) in artifact_names(shape).into_iter().zip(artifacts(shape)) {
            let path = self.data_dir.join(name);
            if path.exists() {
                debug!(path = %path.display(), "reusing input");
            } else {
                info!(path = %path.display(), "generating input");
                match &self.source {
                    InputSource::Builtin => self.builtin.generate(artifact, &path)?,
                    InputSource::Command { argv } => self.run_external(argv, artifact, &path)?,
                }
            }
            paths.push(path);
        }
        Ok(paths)
    }
}
