//! Review phase: capture e2e screenshots once, then run `/review` with a
//! blocker-resolution loop. Bounded at three attempts; approval advances to
//! DOCUMENT.

use anyhow::{Result, bail};
use std::path::PathBuf;
use tracing::{info, warn};

use super::PhaseContext;
use crate::agent::AgentTemplateRequest;
use crate::ops::{
    self, AGENT_IMPLEMENTOR, AGENT_OPS, format_issue_message, implement_plan,
};
use crate::state::{Phase, ReviewIssue, ReviewReport, Severity};
use crate::template::SlashCommand;
use crate::util::parse_json_lenient;

pub const MAX_REVIEW_RETRY_ATTEMPTS: u32 = 3;
pub const AGENT_REVIEWER: &str = "sdlc_reviewer";

fn severity_from(value: &serde_json::Value) -> Severity {
    match value.as_str() {
        Some("blocker") => Severity::Blocker,
        Some("warning") => Severity::Warning,
        _ => Severity::Suggestion,
    }
}

/// Interpret `/review` output: a JSON object when the agent cooperates,
/// otherwise a conservative blocker heuristic over the raw text.
pub fn parse_review_response(output: &str, attempt: u32) -> ReviewReport {
    if let Some(parsed) = parse_json_lenient(output) {
        if parsed.is_object() {
            let issues: Vec<ReviewIssue> = parsed["issues"]
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .map(|item| ReviewIssue {
                            file: item["file"].as_str().unwrap_or("unknown").to_string(),
                            line: item["line"].as_u64().map(|l| l as u32),
                            severity: severity_from(&item["severity"]),
                            description: item["description"].as_str().unwrap_or("").to_string(),
                        })
                        .collect()
                })
                .unwrap_or_default();
            let screenshots = parsed["screenshots"]
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            return ReviewReport {
                approved: parsed["approved"].as_bool().unwrap_or(issues.is_empty()),
                issues,
                screenshots,
                summary: parsed["summary"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| crate::util::truncate(output, 200)),
                attempt,
            };
        }
    }

    let raw = output.to_lowercase();
    let has_blockers =
        raw.contains("blocker") && (!raw.contains("approved") || raw.contains("not approved"));
    ReviewReport {
        approved: !has_blockers,
        issues: Vec::new(),
        screenshots: Vec::new(),
        summary: crate::util::truncate(output, 500),
        attempt,
    }
}

async fn run_review(
    ctx: &PhaseContext,
    adw_id: &str,
    plan_file: &str,
    attempt: u32,
) -> Result<ReviewReport> {
    let request = AgentTemplateRequest::new(
        &format!("{AGENT_REVIEWER}_attempt_{attempt}"),
        SlashCommand::Review,
        vec![plan_file.to_string()],
        adw_id,
    );
    let response = ctx.runner.execute_template(request).await?;

    if !response.success {
        return Ok(ReviewReport {
            approved: false,
            issues: vec![ReviewIssue {
                file: "unknown".to_string(),
                line: None,
                severity: Severity::Blocker,
                description: response.output.clone(),
            }],
            screenshots: Vec::new(),
            summary: format!("Review failed: {}", response.output),
            attempt,
        });
    }
    Ok(parse_review_response(&response.output, attempt))
}

/// Set-union of the captured e2e screenshots into a review report,
/// preserving first-seen order.
fn merge_screenshots(report: &mut ReviewReport, e2e_screenshots: &[PathBuf]) {
    for path in e2e_screenshots {
        let path = path.to_string_lossy().to_string();
        if !report.screenshots.contains(&path) {
            report.screenshots.push(path);
        }
    }
}

pub async fn run(ctx: &PhaseContext, adw_id: &str) -> Result<()> {
    info!("ADW Review Phase - ID: {adw_id}");

    let mut state = ctx.store.load_required(adw_id)?;
    let Some(plan_file) = state.plan_file.clone() else {
        bail!("No plan file in state. Run plan phase first.");
    };
    let issue_number = state.issue_number.clone();

    ctx.tracker
        .post_comment(
            &issue_number,
            &format_issue_message(adw_id, AGENT_OPS, "✅ Starting review phase", None),
        )
        .await?;

    // One screenshot capture feeds every attempt.
    let e2e_screenshots = ops::run_e2e_screenshots(&ctx.config).await;

    for attempt in 1..=MAX_REVIEW_RETRY_ATTEMPTS {
        info!("=== Review attempt {attempt}/{MAX_REVIEW_RETRY_ATTEMPTS} ===");
        ctx.tracker
            .post_comment(
                &issue_number,
                &format_issue_message(
                    adw_id,
                    AGENT_REVIEWER,
                    &format!("🔍 Running review (attempt {attempt})"),
                    None,
                ),
            )
            .await?;

        let mut report = run_review(ctx, adw_id, &plan_file, attempt).await?;
        merge_screenshots(&mut report, &e2e_screenshots);
        let approved = report.approved;
        let screenshots: Vec<PathBuf> = report.screenshots.iter().map(PathBuf::from).collect();
        let blocker_digest = report
            .blockers()
            .map(|b| {
                format!(
                    "- [{}:{}] {}",
                    b.file,
                    b.line.map(|l| l.to_string()).unwrap_or_else(|| "?".into()),
                    b.description
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let blocker_count = report.blockers().count();

        state.review_results.push(report);
        ctx.store.save(&mut state)?;

        if approved {
            info!("Review approved!");
            let comment = format_issue_message(adw_id, AGENT_REVIEWER, "✅ Review approved", None);
            if screenshots.is_empty() {
                ctx.tracker.post_comment(&issue_number, &comment).await?;
            } else {
                ctx.tracker
                    .post_review_comment_with_screenshots(&issue_number, &comment, &screenshots)
                    .await?;
            }
            ctx.store.advance(&mut state, Phase::Document)?;
            return Ok(());
        }

        warn!("Review found {blocker_count} blockers");

        if attempt >= MAX_REVIEW_RETRY_ATTEMPTS {
            break;
        }

        // Fix blockers, then re-review.
        info!("Attempting to resolve blockers...");
        ctx.tracker
            .post_comment(
                &issue_number,
                &format_issue_message(adw_id, AGENT_IMPLEMENTOR, "🔧 Fixing review blockers", None),
            )
            .await?;

        let fix = implement_plan(
            &ctx.runner,
            &format!("Fix these review blockers:\n{blocker_digest}"),
            adw_id,
        )
        .await;
        if fix.is_ok() {
            if let Err(e) = crate::vcs::commit(&ctx.runner, AGENT_REVIEWER, adw_id).await {
                warn!("Could not commit review fix: {e}");
            }
        }
    }

    let error = format!("Review blockers after {MAX_REVIEW_RETRY_ATTEMPTS} attempts");
    ctx.store.mark_error(&mut state, &error)?;

    let failure_comment = format_issue_message(
        adw_id,
        AGENT_REVIEWER,
        &format!("❌ Review blockers not resolved after {MAX_REVIEW_RETRY_ATTEMPTS} attempts"),
        None,
    );
    let last_screenshots: Vec<PathBuf> = state
        .review_results
        .last()
        .map(|r| r.screenshots.iter().map(PathBuf::from).collect())
        .unwrap_or_default();
    if last_screenshots.is_empty() {
        ctx.tracker
            .post_comment(&issue_number, &failure_comment)
            .await?;
    } else {
        ctx.tracker
            .post_review_comment_with_screenshots(&issue_number, &failure_comment, &last_screenshots)
            .await?;
    }
    bail!(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_review_parses_issues_and_screenshots() {
        let output = r#"{
            "approved": false,
            "issues": [
                {"file": "x", "severity": "blocker", "description": "d"},
                {"file": "y", "line": 10, "severity": "warning", "description": "w"}
            ],
            "screenshots": ["a.png"],
            "summary": "s"
        }"#;
        let report = parse_review_response(output, 1);
        assert!(!report.approved);
        assert_eq!(report.issues.len(), 2);
        assert_eq!(report.blockers().count(), 1);
        assert_eq!(report.issues[1].line, Some(10));
        assert_eq!(report.screenshots, vec!["a.png"]);
        assert_eq!(report.summary, "s");
    }

    #[test]
    fn approval_defaults_to_no_issues() {
        let report = parse_review_response(r#"{"issues": [], "summary": "clean"}"#, 1);
        assert!(report.approved);
    }

    #[test]
    fn heuristic_detects_blockers_in_prose() {
        let report = parse_review_response("Found one blocker in the auth flow.", 2);
        assert!(!report.approved);
        assert_eq!(report.attempt, 2);
    }

    #[test]
    fn heuristic_approves_blocker_free_prose() {
        let report = parse_review_response("Looks great, approved.", 1);
        assert!(report.approved);
    }

    #[test]
    fn not_approved_wording_overrides_approved_mention() {
        let report = parse_review_response("blocker found, not approved", 1);
        assert!(!report.approved);
    }

    #[test]
    fn screenshot_merge_is_a_set_union() {
        let mut report = parse_review_response(r#"{"screenshots": ["a.png"], "summary": ""}"#, 1);
        merge_screenshots(
            &mut report,
            &[PathBuf::from("a.png"), PathBuf::from("b.png")],
        );
        assert_eq!(report.screenshots, vec!["a.png", "b.png"]);
    }

    #[test]
    fn unknown_severity_degrades_to_suggestion() {
        let output = r#"{"approved": false, "issues": [{"file": "x", "severity": "catastrophic", "description": "d"}], "summary": "s"}"#;
        let report = parse_review_response(output, 1);
        assert_eq!(report.issues[0].severity, Severity::Suggestion);
        assert_eq!(report.blockers().count(), 0);
    }
}
