//! Polling trigger: watch open issues every 20 seconds and launch ADW
//! workflows for new issues or keyword comments. SIGINT/SIGTERM finish the
//! current cycle, then exit.

use anyhow::Result;

use adw::config::Config;
use adw::trigger::poller;

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
    poller::run(config).await
}
