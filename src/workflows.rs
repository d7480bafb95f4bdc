//! Composite workflows with logic beyond phase chaining: the single-process
//! plan-and-build flow and the full SDLC (pipeline plus PR).

use anyhow::Result;
use tracing::info;

use crate::agent::download_issue_images;
use crate::config::Config;
use crate::ops::{
    self, AGENT_IMPLEMENTOR, AGENT_OPS, AGENT_PLANNER, check_error, classify_issue,
    format_issue_message,
};
use crate::phases::PhaseContext;
use crate::pipeline;
use crate::state::{Phase, Workflow};
use crate::vcs;

/// Plan & build in one process: classify → branch → plan → implement → PR.
pub async fn run_plan_build(ctx: &PhaseContext, issue_number: &str, adw_id: &str) -> Result<()> {
    info!("ADW Plan & Build - ID: {adw_id}");

    let mut state = ctx
        .store
        .create(adw_id, issue_number, Workflow::PlanBuild)?;

    let issue = ctx.tracker.fetch_issue(issue_number).await?;
    ctx.tracker
        .post_comment(
            issue_number,
            &format_issue_message(adw_id, AGENT_OPS, "✅ Starting ADW workflow", None),
        )
        .await?;

    // Classify the issue
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

    // Create the working branch
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

    // Download issue images
    let image_urls = issue.extract_image_urls();
    let image_paths = if image_urls.is_empty() {
        Vec::new()
    } else {
        info!("Found {} images in issue, downloading...", image_urls.len());
        download_issue_images(&ctx.config, &image_urls, adw_id).await
    };

    // Build the implementation plan
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
    info!("=== Finding plan file ===");
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
    ctx.tracker
        .post_comment(
            issue_number,
            &format_issue_message(adw_id, AGENT_PLANNER, "✅ Committing plan", None),
        )
        .await?;
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

    // Implement the plan
    info!("=== Implementing solution ===");
    ctx.tracker
        .post_comment(
            issue_number,
            &format_issue_message(adw_id, AGENT_IMPLEMENTOR, "✅ Implementing solution", None),
        )
        .await?;
    check_error(
        ops::implement_plan(&ctx.runner, &plan_file, adw_id).await,
        &ctx.tracker,
        issue_number,
        adw_id,
        AGENT_IMPLEMENTOR,
        "Error implementing solution",
    )
    .await?;

    ctx.tracker
        .post_comment(
            issue_number,
            &format_issue_message(adw_id, AGENT_IMPLEMENTOR, "✅ Solution implemented", None),
        )
        .await?;

    // Commit the implementation
    info!("=== Committing implementation ===");
    ctx.tracker
        .post_comment(
            issue_number,
            &format_issue_message(adw_id, AGENT_IMPLEMENTOR, "✅ Committing implementation", None),
        )
        .await?;
    check_error(
        vcs::commit(&ctx.runner, AGENT_IMPLEMENTOR, adw_id).await,
        &ctx.tracker,
        issue_number,
        adw_id,
        AGENT_IMPLEMENTOR,
        "Error committing implementation",
    )
    .await?;

    ctx.store.advance(&mut state, Phase::Pr)?;

    // Create pull request
    info!("=== Creating pull request ===");
    ctx.tracker
        .post_comment(
            issue_number,
            &format_issue_message(adw_id, AGENT_OPS, "✅ Creating pull request", None),
        )
        .await?;

    let pr_url = check_error(
        vcs::open_pull_request(&ctx.runner, adw_id).await,
        &ctx.tracker,
        issue_number,
        adw_id,
        AGENT_OPS,
        "Error creating pull request",
    )
    .await?;

    state.pr_url = Some(pr_url.clone());
    ctx.store.advance(&mut state, Phase::Pr)?;

    ctx.tracker
        .post_comment(
            issue_number,
            &format_issue_message(
                adw_id,
                AGENT_OPS,
                &format!("✅ Pull request created: {pr_url}"),
                None,
            ),
        )
        .await?;

    info!("ADW workflow completed successfully for issue #{issue_number}");
    ctx.tracker
        .post_comment(
            issue_number,
            &format_issue_message(adw_id, AGENT_OPS, "✅ ADW workflow completed successfully", None),
        )
        .await?;
    Ok(())
}

/// Full SDLC: plan → build → test → review → document as subprocesses,
/// then a pull request once every phase has succeeded.
pub async fn run_sdlc(config: &Config, issue_number: &str, adw_id: &str) -> Result<()> {
    info!("ADW Full SDLC - ID: {adw_id}");

    let ctx = PhaseContext::new(config.clone())?;

    // Pre-create state with the SDLC workflow kind so phases inherit it.
    ctx.store.create(adw_id, issue_number, Workflow::Sdlc)?;

    pipeline::run_pipeline(config, pipeline::SDLC, issue_number, adw_id).await?;

    info!("=== Creating pull request ===");
    ctx.tracker
        .post_comment(
            issue_number,
            &format_issue_message(adw_id, AGENT_OPS, "✅ Creating pull request", None),
        )
        .await?;

    let pr_url = check_error(
        vcs::open_pull_request(&ctx.runner, adw_id).await,
        &ctx.tracker,
        issue_number,
        adw_id,
        AGENT_OPS,
        "Error creating PR",
    )
    .await?;

    // The phases mutated state on disk; reload before recording the PR.
    if let Some(mut state) = ctx.store.load(adw_id)? {
        state.pr_url = Some(pr_url.clone());
        ctx.store.save(&mut state)?;
    }

    info!("Full SDLC completed. PR: {pr_url}");
    ctx.tracker
        .post_comment(
            issue_number,
            &format_issue_message(
                adw_id,
                AGENT_OPS,
                &format!("✅ SDLC complete — PR: {pr_url}"),
                None,
            ),
        )
        .await?;
    Ok(())
}
