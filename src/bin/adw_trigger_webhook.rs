//! Webhook trigger: HTTP endpoint receiving tracker issue events and
//! launching ADW workflows as detached children.

use anyhow::Result;

use adw::config::Config;
use adw::trigger::webhook;

#[tokio::main]
async fn main() {
    adw::logging::init_console();
    if let Err(e) = run().await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = Config::from_env()?;
    tracing::info!("Starting ADW webhook trigger on port {}", config.port);
    webhook::serve(config).await
}
