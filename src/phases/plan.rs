//! Plan phase: classify → branch → download images → plan → locate plan
//! file → commit. Advances to BUILD.

use anyhow::Result;
use tracing::info;

use super::PhaseContext;
use crate::agent::download_issue_images;
use crate::ops::{
    self, AGENT_OPS, AGENT_PLANNER, check_error, classify_issue, format_issue_message,
};
use crate::state::{Phase, Workflow};
use crate::vcs;

pub async fn run(ctx: &PhaseContext, issue_number: &str, adw_id: &str) -> Result<()> {
    info!("ADW Plan Phase - ID: {adw_id}");

    let mut state = match ctx.store.load(adw_id)? {
        Some(state) => state,
        None => ctx.store.create(adw_id, issue_number, Workflow::PlanBuild)?,
    };

    let issue = ctx.tracker.fetch_issue(issue_number).await?;

    ctx.tracker
        .post_comment(
            issue_number,
            &format_issue_message(adw_id, AGENT_OPS, "✅ Starting plan phase", None),
        )
        .await?;
    ctx.tracker.mark_issue_in_progress(issue_number).await;

    // Classify
    let issue_class = check_error(
        classify_issue(&ctx.runner, &issue, adw_id).await,
        &ctx.tracker,
        issue_number,
        adw_id,
        AGENT_OPS,
        "Error classifying issue",
    )
    .await?;

    state.issue_class = Some(issue_class);
    ctx.store.advance(&mut state, Phase::Branch)?;

    info!("Issue classified as: {issue_class}");
    ctx.tracker
        .post_comment(
            issue_number,
            &format_issue_message(
                adw_id,
                AGENT_OPS,
                &format!("✅ Issue classified as: {issue_class}"),
                None,
            ),
        )
        .await?;

    // Branch
    let branch_name = check_error(
        vcs::create_branch(&ctx.runner, &issue, issue_class, adw_id).await,
        &ctx.tracker,
        issue_number,
        adw_id,
        AGENT_OPS,
        "Error creating branch",
    )
    .await?;

    state.branch_name = Some(branch_name.clone());
    ctx.store.advance(&mut state, Phase::Plan)?;

    info!("Working on branch: {branch_name}");
    ctx.tracker
        .post_comment(
            issue_number,
            &format_issue_message(
                adw_id,
                AGENT_OPS,
                &format!("✅ Working on branch: {branch_name}"),
                None,
            ),
        )
        .await?;

    // Download referenced images so the planner can read them.
    let image_urls = issue.extract_image_urls();
    let image_paths = if image_urls.is_empty() {
        Vec::new()
    } else {
        info!("Found {} images in issue, downloading...", image_urls.len());
        let paths = download_issue_images(&ctx.config, &image_urls, adw_id).await;
        info!("Downloaded {} images", paths.len());
        paths
    };

    // Plan
    info!("=== Building implementation plan ===");
    ctx.tracker
        .post_comment(
            issue_number,
            &format_issue_message(adw_id, AGENT_PLANNER, "✅ Building implementation plan", None),
        )
        .await?;

    let plan_response = check_error(
        ops::build_plan(&ctx.runner, &issue, issue_class, adw_id, image_paths).await,
        &ctx.tracker,
        issue_number,
        adw_id,
        AGENT_PLANNER,
        "Error building plan",
    )
    .await?;

    ctx.tracker
        .post_comment(
            issue_number,
            &format_issue_message(adw_id, AGENT_PLANNER, "✅ Implementation plan created", None),
        )
        .await?;

    // Locate the plan file
    let plan_file = check_error(
        ops::find_plan_file(&ctx.runner, &plan_response.output, adw_id).await,
        &ctx.tracker,
        issue_number,
        adw_id,
        AGENT_OPS,
        "Error finding plan file",
    )
    .await?;

    state.plan_file = Some(plan_file.clone());
    ctx.store.save(&mut state)?;

    info!("Plan file: {plan_file}");
    ctx.tracker
        .post_comment(
            issue_number,
            &format_issue_message(
                adw_id,
                AGENT_OPS,
                &format!("✅ Plan file created: {plan_file}"),
                None,
            ),
        )
        .await?;

    // Commit the plan
    info!("=== Committing plan ===");
    check_error(
        vcs::commit(&ctx.runner, AGENT_PLANNER, adw_id).await,
        &ctx.tracker,
        issue_number,
        adw_id,
        AGENT_PLANNER,
        "Error committing plan",
    )
    .await?;

    ctx.store.advance(&mut state, Phase::Build)?;

    info!("Plan phase completed for issue #{issue_number}");
    ctx.tracker
        .post_comment(
            issue_number,
            &format_issue_message(adw_id, AGENT_OPS, "✅ Plan phase completed", None),
        )
        .await?;
    Ok(())
}
