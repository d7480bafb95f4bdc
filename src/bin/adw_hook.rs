//! Guardrail hook dispatcher, invoked by the coding agent at lifecycle
//! points with a JSON payload on stdin.
//!
//! Exit 0 allows the tool; exit 2 blocks it with the reason on stderr.

use std::io::Read as _;

use clap::Parser;

use adw::config::Config;
use adw::hooks::HookEvent;

#[derive(Parser)]
#[command(name = "adw_hook", about = "ADW guardrail hook")]
struct Cli {
    /// Lifecycle event: pre_tool_use, post_tool_use, user_prompt_submit,
    /// pre_compact, or stop
    event: String,
}

fn main() {
    let cli = Cli::parse();
    let event: HookEvent = match cli.event.parse() {
        Ok(event) => event,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            std::process::exit(1);
        }
    };

    let mut raw_input = String::new();
    let _ = std::io::stdin().read_to_string(&mut raw_input);

    std::process::exit(adw::hooks::run_hook(&config, event, &raw_input));
}
