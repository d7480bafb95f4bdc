//! Plan → build → test → review composite, chained as phase subprocesses.

use anyhow::Result;
use clap::Parser;

use adw::config::Config;
use adw::pipeline;

#[derive(Parser)]
#[command(
    name = "adw_plan_build_test_review",
    about = "ADW plan, build, test, and review workflow"
)]
struct Cli {
    /// Tracker issue number
    issue_number: String,
    /// Workflow id; generated when omitted
    adw_id: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let adw_id = cli.adw_id.unwrap_or_else(adw::util::make_adw_id);
    adw::logging::init_console();
    tracing::info!("ADW Plan → Build → Test → Review - ID: {adw_id}");

    if let Err(e) = run(&cli.issue_number, &adw_id).await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(issue_number: &str, adw_id: &str) -> Result<()> {
    let config = Config::from_env()?;
    pipeline::run_pipeline(&config, pipeline::PLAN_BUILD_TEST_REVIEW, issue_number, adw_id).await
}
