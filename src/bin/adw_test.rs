//! Test phase unit: run tests with the auto-resolution retry loop.

use anyhow::Result;
use clap::Parser;

use adw::config::Config;
use adw::phases::{self, PhaseContext};

#[derive(Parser)]
#[command(name = "adw_test", about = "ADW test phase")]
struct Cli {
    /// Workflow id from prior plan/build phases
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
    let _guard = adw::logging::init(&config, adw_id, "adw_test")?;
    let ctx = PhaseContext::new(config)?;
    phases::test::run(&ctx, adw_id).await
}
