//! Build gate: compile every target before the first measurement

use std::path::Path;
use std::process::{Command, Stdio};
use tracing::info;

use crate::config::TargetSpec;
use crate::error::{Result, SweepError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    /// The build command ran and exited 0.
    Built,
    /// `skip_if_exists` artifact was already present.
    UpToDate,
    /// The target declares no build step.
    NoBuildStep,
}

/// Run each target's build step in order from `root`. The first failure aborts.
pub fn run_build_gate(targets: &[TargetSpec], root: &Path) -> Result<Vec<(String, BuildStatus)>> {
    let mut statuses = Vec::with_capacity(targets.len());
    for target in targets {
        let status = build_target(target, root)?;
        statuses.push((target.name.clone(), status));
    }
    Ok(statuses)
}

pub fn build_target(target: &TargetSpec, root: &Path) -> Result<BuildStatus> {
    let Some(step) = &target.build else {
        return Ok(BuildStatus::NoBuildStep);
    };
    if let Some(artifact) = &step.skip_if_exists {
        if root.join(artifact).exists() {
            info!(
                target = %target.name,
                artifact = %artifact.display(),
                "build skipped, artifact present"
            );
            return Ok(BuildStatus::UpToDate);
        }
    }

    let failed = |diagnostic: String| SweepError::Build { target: target.name.clone(), diagnostic };
    let Some((program, args)) = step.command.split_first() else {
        return Err(failed("empty build command".to_string()));
    };

    info!(target = %target.name, command = %step.command.join(" "), "building");
    let output = Command::new(program)
        .args(args)
        .current_dir(root)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| failed(format!("failed to run '{program}': {e}")))?;

    if output.status.success() {
        return Ok(BuildStatus::Built);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let diagnostic = if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    } else {
        stderr.trim().to_string()
    };
    Err(failed(diagnostic))
}
