//! Plan phase unit: classify issue, create branch, generate plan, commit.

use anyhow::Result;
use clap::Parser;

use adw::config::Config;
use adw::phases::{self, PhaseContext};

#[derive(Parser)]
#[command(name = "adw_plan", about = "ADW plan phase")]
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
    if let Err(e) = run(&cli.issue_number, &adw_id).await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(issue_number: &str, adw_id: &str) -> Result<()> {
    let config = Config::from_env()?;
    let _guard = adw::logging::init(&config, adw_id, "adw_plan")?;
    let ctx = PhaseContext::new(config)?;
    phases::plan::run(&ctx, issue_number, adw_id).await
}
