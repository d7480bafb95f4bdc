//! Build phase: implement the plan, then commit. Requires a prior plan
//! phase (`plan_file` set). Advances to TEST.

use anyhow::{Context, Result};
use tracing::info;

use super::PhaseContext;
use crate::ops::{AGENT_IMPLEMENTOR, AGENT_OPS, check_error, format_issue_message, implement_plan};
use crate::state::Phase;

pub async fn run(ctx: &PhaseContext, adw_id: &str) -> Result<()> {
    info!("ADW Build Phase - ID: {adw_id}");

    let mut state = ctx.store.load_required(adw_id).context("Run plan phase first")?;

    let plan_file = match state.plan_file.clone() {
        Some(plan_file) => plan_file,
        None => {
            ctx.store.mark_error(&mut state, "No plan file in state")?;
            anyhow::bail!("No plan file in state. Run plan phase first.");
        }
    };

    let issue_number = state.issue_number.clone();

    ctx.tracker
        .post_comment(
            &issue_number,
            &format_issue_message(adw_id, AGENT_OPS, "✅ Starting build phase", None),
        )
        .await?;

    // Implement
    info!("=== Implementing solution from {plan_file} ===");
    ctx.tracker
        .post_comment(
            &issue_number,
            &format_issue_message(adw_id, AGENT_IMPLEMENTOR, "✅ Implementing solution", None),
        )
        .await?;

    check_error(
        implement_plan(&ctx.runner, &plan_file, adw_id).await,
        &ctx.tracker,
        &issue_number,
        adw_id,
        AGENT_IMPLEMENTOR,
        "Error implementing solution",
    )
    .await?;

    ctx.tracker
        .post_comment(
            &issue_number,
            &format_issue_message(adw_id, AGENT_IMPLEMENTOR, "✅ Solution implemented", None),
        )
        .await?;

    // Commit
    info!("=== Committing implementation ===");
    check_error(
        crate::vcs::commit(&ctx.runner, AGENT_IMPLEMENTOR, adw_id).await,
        &ctx.tracker,
        &issue_number,
        adw_id,
        AGENT_IMPLEMENTOR,
        "Error committing implementation",
    )
    .await?;

    ctx.store.advance(&mut state, Phase::Test)?;

    info!("Build phase completed for issue #{issue_number}");
    ctx.tracker
        .post_comment(
            &issue_number,
            &format_issue_message(adw_id, AGENT_OPS, "✅ Build phase completed", None),
        )
        .await?;
    Ok(())
}
