//! Version-control operations, delegated to the coding agent.
//!
//! Branch naming, commit-message authoring, and PR narrative are cognitive
//! tasks; the orchestrator invokes them as templates and extracts the
//! trimmed textual result.

use anyhow::{Result, bail};
use tracing::info;

use crate::agent::{AgentRunner, AgentTemplateRequest};
use crate::template::{IssueClass, SlashCommand};
use crate::tracker::models::Issue;

pub const AGENT_BRANCH_GENERATOR: &str = "branch_generator";
pub const AGENT_PR_CREATOR: &str = "pr_creator";

/// Generate and create a git branch for the issue. Returns the branch name.
pub async fn create_branch(
    runner: &AgentRunner,
    issue: &Issue,
    issue_class: IssueClass,
    adw_id: &str,
) -> Result<String> {
    let request = AgentTemplateRequest::new(
        AGENT_BRANCH_GENERATOR,
        SlashCommand::GenerateBranchName,
        vec![
            issue_class.branch_type().to_string(),
            issue.summary_line(),
        ],
        adw_id,
    );

    let response = runner.execute_template(request).await?;
    if !response.success {
        bail!("{}", response.output);
    }

    let branch_name = response.output.trim().to_string();
    info!("Created branch: {branch_name}");
    Ok(branch_name)
}

/// Create a git commit with a properly formatted message. The error carries
/// the agent's output; "nothing to commit" is for the caller to judge.
pub async fn commit(runner: &AgentRunner, agent_name: &str, adw_id: &str) -> Result<String> {
    let request = AgentTemplateRequest::new(
        &format!("{agent_name}_committer"),
        SlashCommand::Commit,
        Vec::new(),
        adw_id,
    );

    let response = runner.execute_template(request).await?;
    if !response.success {
        bail!("{}", response.output);
    }

    let commit_message = response.output.trim().to_string();
    info!("Created commit: {commit_message}");
    Ok(commit_message)
}

/// Open a pull request for the implemented changes. Returns the PR URL.
pub async fn open_pull_request(runner: &AgentRunner, adw_id: &str) -> Result<String> {
    let request = AgentTemplateRequest::new(
        AGENT_PR_CREATOR,
        SlashCommand::PullRequest,
        Vec::new(),
        adw_id,
    );

    let response = runner.execute_template(request).await?;
    if !response.success {
        bail!("{}", response.output);
    }

    let pr_url = response.output.trim().to_string();
    info!("Created pull request: {pr_url}");
    Ok(pr_url)
}
