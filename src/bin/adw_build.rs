//! Build phase unit: implement the plan from state, commit.

use anyhow::Result;
use clap::Parser;

use adw::config::Config;
use adw::phases::{self, PhaseContext};

#[derive(Parser)]
#[command(name = "adw_build", about = "ADW build phase")]
struct Cli {
    /// Workflow id from a prior plan phase
    adw_id: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(&cli.adw_id).await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(adw_id: &str) -> Result<()> {
    let config = Config::from_env()?;
    let _guard = adw::logging::init(&config, adw_id, "adw_build")?;
    let ctx = PhaseContext::new(config)?;
    phases::build::run(&ctx, adw_id).await
}
