//! Health probe: verify the external collaborators are installed,
//! authenticated, and reachable before trusting a workflow to them.

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::config::Config;
use crate::tracker;

const CLAUDE_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of a single check.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

impl CheckResult {
    fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Structured report over all checks.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub success: bool,
    pub timestamp: String,
    pub checks: BTreeMap<String, CheckResult>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

fn check_env_vars(config: &Config) -> CheckResult {
    let mut result = CheckResult::ok().with_detail("claude_code_path", &config.claude_path);

    let mut missing_optional = Vec::new();
    if std::env::var("ANTHROPIC_API_KEY").is_err() {
        missing_optional.push("ANTHROPIC_API_KEY (only needed without an OAuth session)");
    }
    if config.github_pat.is_none() {
        missing_optional.push("GITHUB_PAT (only needed when gh auth uses another account)");
    }
    if !missing_optional.is_empty() {
        result.warning = Some(format!("Missing optional: {}", missing_optional.join(", ")));
    }
    result
}

fn check_git_repo(config: &Config) -> CheckResult {
    match tracker::repo_identity(&config.root) {
        Ok(repo) => CheckResult::ok().with_detail("repo_path", repo),
        Err(e) => CheckResult::fail(e.to_string()),
    }
}

async fn check_github_cli(config: &Config) -> CheckResult {
    let installed = Command::new("gh")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match installed {
        Ok(status) if status.success() => {}
        _ => return CheckResult::fail("GitHub CLI (gh) is not installed"),
    }

    let mut cmd = Command::new("gh");
    if let Some(pat) = &config.github_pat {
        cmd.env("GH_TOKEN", pat);
    }
    let auth = cmd
        .args(["auth", "status"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match auth {
        Ok(status) if status.success() => {
            CheckResult::ok().with_detail("authenticated", "true")
        }
        _ => CheckResult::fail("GitHub CLI not authenticated"),
    }
}

async fn check_node() -> CheckResult {
    async fn version_of(binary: &str) -> Option<String> {
        let output = Command::new(binary).arg("--version").output().await.ok()?;
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    let node = version_of("node").await;
    let npm = version_of("npm").await;
    match (node, npm) {
        (Some(node), Some(npm)) => CheckResult::ok()
            .with_detail("node_version", node)
            .with_detail("npm_version", npm),
        (Some(node), None) => {
            CheckResult::fail("Node.js found but npm is missing").with_detail("node_version", node)
        }
        _ => CheckResult::fail("Node.js is not installed. Required for the e2e tooling."),
    }
}

/// One-shot trivial prompt through the agent CLI, parsed from stream-json.
async fn check_claude_code(config: &Config) -> CheckResult {
    let version = Command::new(&config.claude_path)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match version {
        Ok(status) if status.success() => {}
        _ => {
            return CheckResult::fail(format!(
                "Claude Code CLI not found at '{}'. Install it or set CLAUDE_CODE_PATH.",
                config.claude_path
            ));
        }
    }

    let mut cmd = Command::new(&config.claude_path);
    cmd.args([
        "-p",
        "What is 2+2? Just respond with the number, nothing else.",
        "--model",
        "haiku",
        "--output-format",
        "stream-json",
        "--verbose",
        "--dangerously-skip-permissions",
    ]);
    // Allow nested execution under an outer agent session.
    cmd.env_remove("CLAUDECODE");
    if let Some(pat) = &config.github_pat {
        cmd.env("GH_TOKEN", pat);
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    let output = match tokio::time::timeout(CLAUDE_PROBE_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return CheckResult::fail(format!("Claude Code test error: {e}")),
        Err(_) => {
            return CheckResult::fail(format!(
                "Claude Code test timed out after {} seconds",
                CLAUDE_PROBE_TIMEOUT.as_secs()
            ));
        }
    };
    if !output.status.success() {
        return CheckResult::fail(format!(
            "Claude Code test failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let response_text = stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .find(|msg| msg["type"] == "result")
        .map(|msg| msg["result"].as_str().unwrap_or("").to_string());

    match response_text {
        Some(text) => CheckResult::ok()
            .with_detail("test_passed", text.contains('4').to_string())
            .with_detail("response", crate::util::truncate(&text, 100)),
        None => CheckResult::fail("Claude Code produced no result record"),
    }
}

/// Run every check and fold the outcome into one report.
pub async fn run_health_check(config: &Config) -> HealthReport {
    let mut report = HealthReport {
        success: true,
        timestamp: Utc::now().to_rfc3339(),
        checks: BTreeMap::new(),
        warnings: Vec::new(),
        errors: Vec::new(),
    };

    let checks: Vec<(&str, CheckResult)> = vec![
        ("environment", check_env_vars(config)),
        ("git_repository", check_git_repo(config)),
        ("github_cli", check_github_cli(config).await),
        ("nodejs", check_node().await),
        ("claude_code", check_claude_code(config).await),
    ];

    for (name, check) in checks {
        if !check.success {
            report.success = false;
            if let Some(error) = &check.error {
                report.errors.push(error.clone());
            }
        }
        if let Some(warning) = &check.warning {
            report.warnings.push(warning.clone());
        }
        report.checks.insert(name.to_string(), check);
    }
    report
}

/// Plain-text rendering for stdout and tracker comments.
pub fn render_report(report: &HealthReport) -> String {
    let mut out = String::new();
    let status = if report.success { "HEALTHY" } else { "UNHEALTHY" };
    out.push_str(&format!(
        "[{}] Overall Status: {status}\n",
        if report.success { "PASS" } else { "FAIL" }
    ));

    for (name, check) in &report.checks {
        let icon = if check.success { "ok" } else { "FAIL" };
        out.push_str(&format!("  [{icon}] {name}\n"));
    }
    if !report.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for warning in &report.warnings {
            out.push_str(&format!("- {warning}\n"));
        }
    }
    if !report.errors.is_empty() {
        out.push_str("\nErrors:\n");
        for error in &report.errors {
            out.push_str(&format!("- {error}\n"));
        }
    }
    out
}
