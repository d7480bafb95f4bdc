//! Runtime configuration and path layout.
//!
//! Every on-disk path the orchestrator touches derives from `Config`, so
//! tests can point the whole system at a temporary root while the layout
//! under that root stays fixed:
//!
//! ```text
//! agents/<adw-id>/adw_state.json
//! agents/<adw-id>/images/
//! agents/<adw-id>/<agent-name>/prompts/<command>.txt
//! agents/<adw-id>/<agent-name>/raw_output.jsonl
//! agents/<adw-id>/<trigger>/execution.log
//! logs/<session-id>/
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const DEFAULT_CLAUDE_PATH: &str = "claude";
pub const DEFAULT_PORT: u16 = 8001;
pub const DEFAULT_FRONTEND_DIR: &str = "frontend";

#[derive(Debug, Clone)]
pub struct Config {
    /// Project root; all state and log paths hang off this.
    pub root: PathBuf,
    /// Path to the coding-agent binary (`CLAUDE_CODE_PATH`).
    pub claude_path: String,
    /// Optional tracker PAT (`GITHUB_PAT`), forwarded to gh and the agent.
    pub github_pat: Option<String>,
    /// Webhook receiver port (`PORT`).
    pub port: u16,
    /// Directory holding the browser-automation suite, relative to root.
    pub frontend_dir: PathBuf,
}

impl Config {
    /// Resolve configuration from the environment. Loads `.env` first;
    /// the root comes from `ADW_ROOT` or the current directory.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let root = match std::env::var_os("ADW_ROOT") {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir().context("Failed to get current directory")?,
        };
        Ok(Self::with_root(root))
    }

    /// Build a configuration rooted at an explicit directory.
    pub fn with_root(root: PathBuf) -> Self {
        let claude_path =
            std::env::var("CLAUDE_CODE_PATH").unwrap_or_else(|_| DEFAULT_CLAUDE_PATH.to_string());
        let github_pat = std::env::var("GITHUB_PAT").ok().filter(|v| !v.is_empty());
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let frontend_dir = root.join(DEFAULT_FRONTEND_DIR);

        Self {
            root,
            claude_path,
            github_pat,
            port,
            frontend_dir,
        }
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.root.join("agents")
    }

    /// `agents/<adw-id>/`
    pub fn workflow_dir(&self, adw_id: &str) -> PathBuf {
        self.agents_dir().join(adw_id)
    }

    /// `agents/<adw-id>/adw_state.json`
    pub fn state_path(&self, adw_id: &str) -> PathBuf {
        self.workflow_dir(adw_id).join("adw_state.json")
    }

    /// `agents/<adw-id>/images/`
    pub fn images_dir(&self, adw_id: &str) -> PathBuf {
        self.workflow_dir(adw_id).join("images")
    }

    /// `agents/<adw-id>/<agent-name>/`
    pub fn agent_dir(&self, adw_id: &str, agent_name: &str) -> PathBuf {
        self.workflow_dir(adw_id).join(agent_name)
    }

    /// `agents/<adw-id>/<trigger>/`, the per-run execution logs.
    pub fn trigger_log_dir(&self, adw_id: &str, trigger: &str) -> PathBuf {
        self.workflow_dir(adw_id).join(trigger)
    }

    /// `logs/`, the per-session guardrail hook logs.
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// `logs/<session-id>/`
    pub fn session_log_dir(&self, session_id: &str) -> PathBuf {
        self.logs_dir().join(session_id)
    }

    /// Results directory scanned for e2e screenshots.
    pub fn e2e_results_dir(&self) -> PathBuf {
        self.frontend_dir.join("test-results")
    }
}

/// Ensure a directory exists, creating parents as needed.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            root: PathBuf::from("/work"),
            claude_path: "claude".into(),
            github_pat: None,
            port: DEFAULT_PORT,
            frontend_dir: PathBuf::from("/work/frontend"),
        }
    }

    #[test]
    fn state_path_follows_layout_contract() {
        let config = test_config();
        assert_eq!(
            config.state_path("abc12345"),
            PathBuf::from("/work/agents/abc12345/adw_state.json")
        );
    }

    #[test]
    fn agent_dir_nests_under_workflow() {
        let config = test_config();
        assert_eq!(
            config.agent_dir("abc12345", "sdlc_planner"),
            PathBuf::from("/work/agents/abc12345/sdlc_planner")
        );
    }

    #[test]
    fn session_logs_live_outside_agents() {
        let config = test_config();
        assert_eq!(
            config.session_log_dir("sess-1"),
            PathBuf::from("/work/logs/sess-1")
        );
    }
}
