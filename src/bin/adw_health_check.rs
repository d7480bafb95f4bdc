//! Health probe: verify collaborators are installed, authenticated, and
//! reachable. Optionally posts the report to a tracker issue.

use anyhow::Result;
use clap::Parser;

use adw::config::Config;
use adw::health;
use adw::tracker::Tracker;

#[derive(Parser)]
#[command(name = "adw_health_check", about = "ADW system health check")]
struct Cli {
    /// Optional issue number to post results to
    issue_number: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match run(cli.issue_number.as_deref()).await {
        Ok(healthy) => std::process::exit(if healthy { 0 } else { 1 }),
        Err(e) => {
            eprintln!("{e:#}");
            std::process::exit(1);
        }
    }
}

async fn run(issue_number: Option<&str>) -> Result<bool> {
    let config = Config::from_env()?;
    println!("Running ADW System Health Check...\n");

    let report = health::run_health_check(&config).await;
    let rendered = health::render_report(&report);
    println!("{rendered}");

    if let Some(issue_number) = issue_number {
        let tracker = Tracker::new(&config)?;
        tracker.post_comment(issue_number, &rendered).await?;
    }
    Ok(report.success)
}
