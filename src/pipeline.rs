//! Sequential pipeline executor.
//!
//! Composite workflows run each phase unit as a subprocess of the same
//! build (the binaries sit next to the running executable), so any phase
//! can also be rerun independently by hand. Execution stops at the first
//! non-zero exit.

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{error, info};

use crate::config::Config;

/// Phase binaries for each multi-phase pipeline.
pub const PLAN_BUILD_TEST: &[&str] = &["adw_plan", "adw_build", "adw_test"];
pub const PLAN_BUILD_REVIEW: &[&str] = &["adw_plan", "adw_build", "adw_review"];
pub const PLAN_BUILD_TEST_REVIEW: &[&str] = &["adw_plan", "adw_build", "adw_test", "adw_review"];
pub const SDLC: &[&str] = &["adw_plan", "adw_build", "adw_test", "adw_review", "adw_document"];

/// Locate a sibling binary of the current executable.
pub fn sibling_binary(name: &str) -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to resolve current executable")?;
    let dir = exe
        .parent()
        .context("Executable has no parent directory")?;

    let candidate = dir.join(name);
    if candidate.is_file() {
        return Ok(candidate);
    }
    // Test binaries live one level down in deps/; look beside their parent.
    if let Some(parent) = dir.parent() {
        let candidate = parent.join(name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    bail!("Phase binary '{name}' not found next to {}", exe.display())
}

/// Run one phase unit to completion, returning its exit code.
pub async fn run_phase(config: &Config, binary: &str, args: &[&str]) -> Result<i32> {
    let path = sibling_binary(binary)?;
    info!("Running phase: {binary} {}", args.join(" "));

    let status = Command::new(&path)
        .args(args)
        .current_dir(&config.root)
        .status()
        .await
        .with_context(|| format!("Failed to spawn phase binary {}", path.display()))?;
    Ok(status.code().unwrap_or(-1))
}

/// Run a sequence of phase units, stopping on the first failure.
///
/// The first phase receives `(issue_number, adw_id)`; subsequent phases
/// receive `adw_id` only and load their state from disk.
pub async fn run_pipeline(
    config: &Config,
    phases: &[&str],
    issue_number: &str,
    adw_id: &str,
) -> Result<()> {
    for (i, phase) in phases.iter().enumerate() {
        let exit_code = if i == 0 {
            run_phase(config, phase, &[issue_number, adw_id]).await?
        } else {
            run_phase(config, phase, &[adw_id]).await?
        };

        if exit_code != 0 {
            error!("Pipeline failed at phase: {phase} (exit code {exit_code})");
            bail!("Pipeline failed at phase {phase} with exit code {exit_code}");
        }
    }

    info!("Pipeline completed successfully");
    Ok(())
}
