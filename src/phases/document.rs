//! Document phase: run `/document <plan-file>`. Failure here is a warning,
//! not a pipeline stop; the workflow advances to PR regardless.

use anyhow::{Result, bail};
use tracing::{info, warn};

use super::PhaseContext;
use crate::agent::AgentTemplateRequest;
use crate::ops::{AGENT_OPS, format_issue_message};
use crate::state::{DocumentationReport, Phase};
use crate::template::SlashCommand;
use crate::util::parse_json_lenient;

pub const AGENT_DOCUMENTER: &str = "sdlc_documenter";

/// Interpret `/document` output into a report; unstructured output becomes
/// a bare summary.
pub fn parse_documentation_response(output: &str) -> DocumentationReport {
    if let Some(parsed) = parse_json_lenient(output) {
        if parsed.is_object() {
            return DocumentationReport {
                files_created: parsed["files_created"]
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default(),
                summary: parsed["summary"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| crate::util::truncate(output, 200)),
            };
        }
    }
    DocumentationReport {
        files_created: Vec::new(),
        summary: crate::util::truncate(output, 500),
    }
}

pub async fn run(ctx: &PhaseContext, adw_id: &str) -> Result<()> {
    info!("ADW Document Phase - ID: {adw_id}");

    let mut state = ctx.store.load_required(adw_id)?;
    let Some(plan_file) = state.plan_file.clone() else {
        bail!("No plan file in state.");
    };
    let issue_number = state.issue_number.clone();

    ctx.tracker
        .post_comment(
            &issue_number,
            &format_issue_message(adw_id, AGENT_OPS, "✅ Starting documentation phase", None),
        )
        .await?;

    info!("=== Generating documentation ===");
    let request = AgentTemplateRequest::new(
        AGENT_DOCUMENTER,
        SlashCommand::Document,
        vec![plan_file],
        adw_id,
    );
    let response = ctx.runner.execute_template(request).await?;

    if !response.success {
        warn!("Documentation generation failed: {}", response.output);
        ctx.tracker
            .post_comment(
                &issue_number,
                &format_issue_message(
                    adw_id,
                    AGENT_DOCUMENTER,
                    &format!(
                        "⚠️ Documentation failed: {}",
                        crate::util::truncate(&response.output, 200)
                    ),
                    None,
                ),
            )
            .await?;
        // Non-fatal: the pipeline continues to PR.
        ctx.store.advance(&mut state, Phase::Pr)?;
        return Ok(());
    }

    state.documentation = Some(parse_documentation_response(&response.output));
    ctx.store.save(&mut state)?;

    if let Err(e) = crate::vcs::commit(&ctx.runner, AGENT_DOCUMENTER, adw_id).await {
        warn!("Could not commit docs: {e}");
    }

    ctx.store.advance(&mut state, Phase::Pr)?;

    info!("Documentation phase completed");
    ctx.tracker
        .post_comment(
            &issue_number,
            &format_issue_message(adw_id, AGENT_DOCUMENTER, "✅ Documentation generated", None),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_documentation_parses_files_and_summary() {
        let output = r#"{"files_created": ["docs/feature.md"], "summary": "Documented the toggle"}"#;
        let report = parse_documentation_response(output);
        assert_eq!(report.files_created, vec!["docs/feature.md"]);
        assert_eq!(report.summary, "Documented the toggle");
    }

    #[test]
    fn prose_documentation_becomes_bare_summary() {
        let report = parse_documentation_response("Wrote a page about the toggle.");
        assert!(report.files_created.is_empty());
        assert_eq!(report.summary, "Wrote a page about the toggle.");
    }
}
