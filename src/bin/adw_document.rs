//! Document phase unit: generate feature documentation.

use anyhow::Result;
use clap::Parser;

use adw::config::Config;
use adw::phases::{self, PhaseContext};

#[derive(Parser)]
#[command(name = "adw_document", about = "ADW documentation phase")]
struct Cli {
    /// Workflow id from prior phases
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
    let _guard = adw::logging::init(&config, adw_id, "adw_document")?;
    let ctx = PhaseContext::new(config)?;
    phases::document::run(&ctx, adw_id).await
}
