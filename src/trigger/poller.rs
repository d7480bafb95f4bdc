//! Polling trigger: every cycle, list open issues and launch workflows for
//! new issues or keyword comments.
//!
//! The poller intentionally serializes: a launched workflow runs to
//! completion inside the cycle, and an issue is only remembered as
//! processed when that launch exits cleanly. SIGINT/SIGTERM set a shared
//! flag honored between units of work, so a spawn is never interrupted
//! mid-flight.

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::pipeline::sibling_binary;
use crate::router::{self, DEFAULT_WORKFLOW, WORKFLOW_KEYWORDS};
use crate::state::Workflow;
use crate::tracker::Tracker;

pub const POLL_INTERVAL: Duration = Duration::from_secs(20);

struct PollerState {
    processed_issues: HashSet<i64>,
    last_comment_by_issue: HashMap<i64, String>,
}

fn install_signal_handlers() -> Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown..."),
            _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown..."),
        }
        flag.store(true, Ordering::SeqCst);
    });
    Ok(shutdown)
}

/// Decide whether an issue needs a workflow. New issues without comments
/// get the default; otherwise the newest comment must carry a keyword we
/// have not already acted on.
async fn should_process(
    tracker: &Tracker,
    issue_number: i64,
    state: &mut PollerState,
) -> Option<Workflow> {
    let comments = match tracker.fetch_issue_comments(issue_number).await {
        Ok(comments) => comments,
        Err(e) => {
            error!("Failed to fetch comments for issue #{issue_number}: {e}");
            return None;
        }
    };

    if comments.is_empty() {
        info!("Issue #{issue_number} has no comments - marking for processing");
        return Some(DEFAULT_WORKFLOW);
    }

    let latest = comments.last()?;
    if state
        .last_comment_by_issue
        .get(&issue_number)
        .is_some_and(|seen| *seen == latest.id)
    {
        return None;
    }

    let workflow = router::route_keyword(&latest.body)?;
    info!(
        "Issue #{issue_number} - comment matches '{}' → {}",
        latest.body.trim(),
        router::workflow_binary(workflow)
    );
    state
        .last_comment_by_issue
        .insert(issue_number, latest.id.clone());
    Some(workflow)
}

/// Launch the composite binary for an issue and wait for it. Returns true
/// only on a clean exit.
async fn launch_workflow(config: &Config, workflow: Workflow, issue_number: i64) -> bool {
    let binary = router::workflow_binary(workflow);
    let path = match sibling_binary(binary) {
        Ok(path) => path,
        Err(e) => {
            error!("Cannot locate workflow binary: {e}");
            return false;
        }
    };

    info!("Triggering {binary} for issue #{issue_number}");
    let status = Command::new(path)
        .arg(issue_number.to_string())
        .current_dir(&config.root)
        .status()
        .await;

    match status {
        Ok(status) if status.success() => {
            info!("Successfully triggered {binary} for issue #{issue_number}");
            true
        }
        Ok(status) => {
            error!(
                "Failed to trigger {binary} for issue #{issue_number} (exit {:?})",
                status.code()
            );
            false
        }
        Err(e) => {
            error!("Exception while triggering workflow for issue #{issue_number}: {e}");
            false
        }
    }
}

async fn run_cycle(
    config: &Config,
    tracker: &Tracker,
    state: &mut PollerState,
    shutdown: &AtomicBool,
) {
    let started = Instant::now();
    info!("Starting issue check cycle");

    let issues = match tracker.fetch_open_issues().await {
        Ok(issues) => issues,
        Err(e) => {
            error!("Failed to fetch issues: {e}");
            return;
        }
    };
    if issues.is_empty() {
        info!("No open issues found");
        return;
    }

    let mut qualifying = Vec::new();
    for issue in &issues {
        if state.processed_issues.contains(&issue.number) {
            continue;
        }
        if let Some(workflow) = should_process(tracker, issue.number, state).await {
            qualifying.push((issue.number, workflow));
        }
    }

    if qualifying.is_empty() {
        info!("No new qualifying issues found");
    } else {
        info!("Found {} new qualifying issues", qualifying.len());
        for (issue_number, workflow) in qualifying {
            if shutdown.load(Ordering::SeqCst) {
                info!("Shutdown requested, stopping issue processing");
                break;
            }
            if launch_workflow(config, workflow, issue_number).await {
                state.processed_issues.insert(issue_number);
            } else {
                warn!("Failed to process issue #{issue_number}, will retry in next cycle");
            }
        }
    }

    info!(
        "Check cycle completed in {:.2} seconds ({} processed this session)",
        started.elapsed().as_secs_f64(),
        state.processed_issues.len()
    );
}

/// Run the polling loop until a shutdown signal arrives.
pub async fn run(config: Config) -> Result<()> {
    let tracker = Tracker::new(&config)?;
    info!("Starting ADW polling trigger");
    info!("Repository: {}", tracker.repo());
    info!("Polling interval: {} seconds", POLL_INTERVAL.as_secs());
    info!(
        "Supported workflows: {:?}",
        WORKFLOW_KEYWORDS.iter().map(|(kw, _)| *kw).collect::<Vec<_>>()
    );

    let shutdown = install_signal_handlers()?;
    let mut state = PollerState {
        processed_issues: HashSet::new(),
        last_comment_by_issue: HashMap::new(),
    };

    while !shutdown.load(Ordering::SeqCst) {
        run_cycle(&config, &tracker, &mut state, &shutdown).await;

        // Sleep in short steps so a signal ends the wait promptly.
        for _ in 0..POLL_INTERVAL.as_secs() {
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    info!("Shutdown complete");
    Ok(())
}
