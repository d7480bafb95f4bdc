//! Shared workflow operations used across phase units: classification,
//! planning, implementation, uniform failure reporting, and the e2e
//! screenshot capture.

use anyhow::{Context, Result, anyhow, bail};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::agent::{AgentResponse, AgentRunner, AgentTemplateRequest};
use crate::config::Config;
use crate::template::{IssueClass, SlashCommand};
use crate::tracker::Tracker;
use crate::tracker::models::Issue;

pub const AGENT_OPS: &str = "ops";
pub const AGENT_PLANNER: &str = "sdlc_planner";
pub const AGENT_IMPLEMENTOR: &str = "sdlc_implementor";
pub const AGENT_CLASSIFIER: &str = "issue_classifier";
pub const AGENT_PLAN_FINDER: &str = "plan_finder";

const E2E_TIMEOUT: Duration = Duration::from_secs(300);

/// Mandated prefix on every tracker comment:
/// `<adw-id>_<agent-name>[_<session-id>]: <message>`.
pub fn format_issue_message(
    adw_id: &str,
    agent_name: &str,
    message: &str,
    session_id: Option<&str>,
) -> String {
    match session_id {
        Some(session) => format!("{adw_id}_{agent_name}_{session}: {message}"),
        None => format!("{adw_id}_{agent_name}: {message}"),
    }
}

/// Uniform failure handling: on `Err`, post `❌ <prefix>: <detail>` to the
/// issue and propagate. Phase binaries turn the propagated error into a
/// non-zero exit.
pub async fn check_error<T>(
    result: Result<T>,
    tracker: &Tracker,
    issue_number: &str,
    adw_id: &str,
    agent_name: &str,
    error_prefix: &str,
) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) => {
            error!("{error_prefix}: {err:#}");
            let body = format_issue_message(
                adw_id,
                agent_name,
                &format!("❌ {error_prefix}: {err}"),
                None,
            );
            tracker
                .post_comment(issue_number, &body)
                .await
                .context("Failed to post failure comment")?;
            Err(err.context(error_prefix.to_string()))
        }
    }
}

fn ensure_success(response: AgentResponse) -> Result<AgentResponse> {
    if response.success {
        Ok(response)
    } else {
        Err(anyhow!("{}", response.output))
    }
}

/// Classify an issue into `/chore`, `/bug`, or `/feature`.
///
/// The classifier sometimes answers verbosely; after an exact-token check we
/// fall back to a case-insensitive substring search before giving up.
pub async fn classify_issue(
    runner: &AgentRunner,
    issue: &Issue,
    adw_id: &str,
) -> Result<IssueClass> {
    let issue_json = serde_json::to_string_pretty(issue)?;
    let request = AgentTemplateRequest::new(
        AGENT_CLASSIFIER,
        SlashCommand::ClassifyIssue,
        vec![issue_json],
        adw_id,
    );

    let response = ensure_success(runner.execute_template(request).await?)?;
    let token = response.output.trim().trim_matches('`');

    if token == "0" {
        bail!("No command selected: {}", response.output);
    }
    if let Ok(class) = token.parse::<IssueClass>() {
        return Ok(class);
    }

    let raw = response.output.to_lowercase();
    for class in IssueClass::ALL {
        if raw.contains(class.as_str()) || raw.contains(class.branch_type()) {
            warn!(
                "Classifier returned verbose output, extracted '{class}' from: {}",
                crate::util::truncate(&response.output, 120)
            );
            return Ok(class);
        }
    }

    bail!("Invalid command selected: {}", response.output)
}

/// Build the implementation plan using the class-named template.
pub async fn build_plan(
    runner: &AgentRunner,
    issue: &Issue,
    issue_class: IssueClass,
    adw_id: &str,
    image_paths: Vec<PathBuf>,
) -> Result<AgentResponse> {
    let mut request = AgentTemplateRequest::new(
        AGENT_PLANNER,
        issue_class.plan_command(),
        vec![issue.summary_line()],
        adw_id,
    );
    request.image_paths = image_paths;

    ensure_success(runner.execute_template(request).await?)
}

/// Locate the plan file the planner just produced. A path is accepted only
/// when it contains a separator; `"0"` means the finder saw none.
pub async fn find_plan_file(
    runner: &AgentRunner,
    plan_output: &str,
    adw_id: &str,
) -> Result<String> {
    let request = AgentTemplateRequest::new(
        AGENT_PLAN_FINDER,
        SlashCommand::FindPlanFile,
        vec![plan_output.to_string()],
        adw_id,
    );

    let response = ensure_success(runner.execute_template(request).await?)?;
    let file_path = response.output.trim().to_string();

    if file_path == "0" {
        bail!("No plan file found in output");
    }
    if !file_path.is_empty() && file_path.contains('/') {
        Ok(file_path)
    } else {
        bail!("Invalid file path response: {file_path}")
    }
}

/// Implement a plan (file path or inline plan text) via `/implement`.
pub async fn implement_plan(
    runner: &AgentRunner,
    plan: &str,
    adw_id: &str,
) -> Result<AgentResponse> {
    let request = AgentTemplateRequest::new(
        AGENT_IMPLEMENTOR,
        SlashCommand::Implement,
        vec![plan.to_string()],
        adw_id,
    );

    ensure_success(runner.execute_template(request).await?)
}

/// Run the browser-automation suite and collect screenshot paths.
///
/// Screenshots are gathered from `test-results/` regardless of the suite's
/// exit status; e2e failures never block the review.
pub async fn run_e2e_screenshots(config: &Config) -> Vec<PathBuf> {
    let results_dir = config.e2e_results_dir();

    // Clear stale captures so we only report this run's screenshots.
    if results_dir.is_dir() {
        for entry in WalkDir::new(&results_dir).into_iter().flatten() {
            if entry.path().extension().is_some_and(|e| e == "png") {
                let _ = std::fs::remove_file(entry.path());
            }
        }
    }

    info!("Running e2e tests for screenshots...");
    let mut cmd = Command::new("npx");
    cmd.args(["playwright", "test", "--reporter=list"])
        .current_dir(&config.frontend_dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    match tokio::time::timeout(E2E_TIMEOUT, cmd.status()).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!("e2e execution failed: {e}"),
        Err(_) => warn!("e2e tests timed out after {}s", E2E_TIMEOUT.as_secs()),
    }

    let mut screenshots: Vec<PathBuf> = WalkDir::new(&results_dir)
        .into_iter()
        .flatten()
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "png"))
        .map(|e| e.path().to_path_buf())
        .collect();
    screenshots.sort();
    info!("Collected {} screenshot(s) from e2e tests", screenshots.len());
    screenshots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_prefix_without_session() {
        assert_eq!(
            format_issue_message("abc12345", "ops", "✅ Starting plan phase", None),
            "abc12345_ops: ✅ Starting plan phase"
        );
    }

    #[test]
    fn message_prefix_with_session() {
        assert_eq!(
            format_issue_message("abc12345", "sdlc_planner", "done", Some("sess-9")),
            "abc12345_sdlc_planner_sess-9: done"
        );
    }

    #[test]
    fn ensure_success_passes_through_and_fails() {
        let ok = AgentResponse {
            output: "fine".into(),
            success: true,
            session_id: None,
        };
        assert!(ensure_success(ok).is_ok());

        let bad = AgentResponse {
            output: "agent exploded".into(),
            success: false,
            session_id: None,
        };
        let err = ensure_success(bad).unwrap_err();
        assert!(err.to_string().contains("agent exploded"));
    }
}
