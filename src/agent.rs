//! Coding-agent invocation layer.
//!
//! Spawns the headless agent as a child process, streams its line-delimited
//! structured output to `raw_output.jsonl`, and distills a typed response.
//! The runner never retries; retry policy belongs to the phases.

use regex::Regex;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{Config, ensure_dir};
use crate::errors::AgentError;
use crate::stream::{self, ContentBlock, ResultRecord, StreamEvent};
use crate::template::{Model, SlashCommand};

/// Host env marker set when already running under the agent; must never be
/// forwarded or nested invocations refuse to start.
const NESTED_MARKER: &str = "CLAUDECODE";

/// Fully-specified prompt execution request.
#[derive(Debug, Clone)]
pub struct AgentPromptRequest {
    pub prompt: String,
    pub adw_id: String,
    pub agent_name: String,
    pub model: Model,
    pub image_paths: Vec<PathBuf>,
    pub dangerously_skip_permissions: bool,
    pub output_file: PathBuf,
}

/// Distilled agent response.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub output: String,
    pub success: bool,
    pub session_id: Option<String>,
}

/// Template execution request: `<command> <arg1> <arg2> …`.
#[derive(Debug, Clone)]
pub struct AgentTemplateRequest {
    pub agent_name: String,
    pub command: SlashCommand,
    pub args: Vec<String>,
    pub adw_id: String,
    pub image_paths: Vec<PathBuf>,
    /// Overrides the command's recommended model when set.
    pub model: Option<Model>,
}

impl AgentTemplateRequest {
    pub fn new(agent_name: &str, command: SlashCommand, args: Vec<String>, adw_id: &str) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            command,
            args,
            adw_id: adw_id.to_string(),
            image_paths: Vec::new(),
            model: None,
        }
    }
}

static SLASH_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(/\w+)").expect("valid slash prefix regex"));

pub struct AgentRunner {
    config: Config,
}

impl AgentRunner {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Check the agent CLI responds to `--version`.
    pub async fn check_installed(&self) -> Result<(), AgentError> {
        let status = Command::new(&self.config.claude_path)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|_| AgentError::NotInstalled {
                path: self.config.claude_path.clone(),
            })?;
        if !status.success() {
            return Err(AgentError::NotInstalled {
                path: self.config.claude_path.clone(),
            });
        }
        Ok(())
    }

    /// Only a fixed set of host variables pass through to the agent; the
    /// nested-execution marker is dropped by construction.
    fn subprocess_env(&self) -> Vec<(String, String)> {
        let mut env = Vec::new();
        for key in ["PATH", "HOME", "USER", "SHELL", "TERM", "ANTHROPIC_API_KEY"] {
            if let Ok(value) = std::env::var(key) {
                env.push((key.to_string(), value));
            }
        }
        env.push(("CLAUDE_CODE_PATH".to_string(), self.config.claude_path.clone()));
        env.push((
            "CLAUDE_BASH_MAINTAIN_PROJECT_WORKING_DIR".to_string(),
            std::env::var("CLAUDE_BASH_MAINTAIN_PROJECT_WORKING_DIR")
                .unwrap_or_else(|_| "true".to_string()),
        ));
        if let Some(pat) = &self.config.github_pat {
            env.push(("GITHUB_PAT".to_string(), pat.clone()));
            env.push(("GH_TOKEN".to_string(), pat.clone()));
        }
        debug_assert!(env.iter().all(|(k, _)| k != NESTED_MARKER));
        env
    }

    /// Persist a slash-command prompt for reproducibility before spawning.
    fn save_prompt(&self, prompt: &str, adw_id: &str, agent_name: &str) {
        let Some(cap) = SLASH_PREFIX_RE.captures(prompt) else {
            return;
        };
        let command_name = &cap[1][1..];

        let prompt_dir = self.config.agent_dir(adw_id, agent_name).join("prompts");
        if let Err(e) = ensure_dir(&prompt_dir) {
            warn!("Could not create prompt directory: {e}");
            return;
        }
        let prompt_file = prompt_dir.join(format!("{command_name}.txt"));
        match std::fs::write(&prompt_file, prompt) {
            Ok(()) => info!("Saved prompt to: {}", prompt_file.display()),
            Err(e) => warn!("Could not save prompt: {e}"),
        }
    }

    /// Execute a slash-command template.
    pub async fn execute_template(
        &self,
        request: AgentTemplateRequest,
    ) -> Result<AgentResponse, AgentError> {
        let mut prompt = request.command.as_str().to_string();
        for arg in &request.args {
            prompt.push(' ');
            prompt.push_str(arg);
        }

        let output_dir = self.config.agent_dir(&request.adw_id, &request.agent_name);
        ensure_dir(&output_dir)?;

        self.prompt(AgentPromptRequest {
            prompt,
            adw_id: request.adw_id,
            agent_name: request.agent_name,
            model: request.model.unwrap_or_else(|| request.command.model()),
            image_paths: request.image_paths,
            dangerously_skip_permissions: true,
            output_file: output_dir.join("raw_output.jsonl"),
        })
        .await
    }

    /// Execute a raw prompt, streaming output to `request.output_file`.
    pub async fn prompt(&self, request: AgentPromptRequest) -> Result<AgentResponse, AgentError> {
        self.check_installed().await?;
        self.save_prompt(&request.prompt, &request.adw_id, &request.agent_name);

        if let Some(parent) = request.output_file.parent() {
            ensure_dir(parent)?;
        }

        let mut prompt = request.prompt.clone();
        let existing_images: Vec<&PathBuf> = request
            .image_paths
            .iter()
            .filter(|p| p.is_file())
            .collect();
        if !existing_images.is_empty() {
            prompt.push_str("\n\nReference images (use Read tool to view):");
            for path in &existing_images {
                let absolute = path
                    .canonicalize()
                    .unwrap_or_else(|_| path.to_path_buf());
                prompt.push_str(&format!("\n- {}", absolute.display()));
            }
        }

        let mut cmd = Command::new(&self.config.claude_path);
        cmd.arg("-p")
            .arg(&prompt)
            .arg("--model")
            .arg(request.model.as_str())
            .arg("--output-format")
            .arg("stream-json")
            .arg("--verbose");
        if request.dangerously_skip_permissions {
            cmd.arg("--dangerously-skip-permissions");
        }
        cmd.env_clear();
        cmd.envs(self.subprocess_env());
        cmd.current_dir(&self.config.root);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(AgentError::SpawnFailed)?;

        let mut output_file = std::fs::File::create(&request.output_file).map_err(|source| {
            AgentError::OutputWriteFailed {
                path: request.output_file.clone(),
                source,
            }
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Other(anyhow::anyhow!("child stdout not captured")))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| AgentError::Other(anyhow::anyhow!("child stderr not captured")))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut last_result: Option<ResultRecord> = None;
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|source| AgentError::OutputReadFailed {
                path: request.output_file.clone(),
                source,
            })?
        {
            if line.trim().is_empty() {
                continue;
            }
            writeln!(output_file, "{line}").map_err(|source| AgentError::OutputWriteFailed {
                path: request.output_file.clone(),
                source,
            })?;

            match serde_json::from_str::<StreamEvent>(&line) {
                Ok(StreamEvent::Result(record)) => last_result = Some(record),
                Ok(StreamEvent::Assistant { message }) => {
                    for block in &message.content {
                        if let ContentBlock::ToolUse { name, input, .. } = block {
                            debug!("{}", stream::describe_tool_use(name, input));
                        }
                    }
                }
                Ok(_) | Err(_) => {}
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|source| AgentError::Other(source.into()))?;
        let stderr_text = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let error_msg = format!("Claude Code error: {}", stderr_text.trim());
            warn!("{error_msg}");
            return Ok(AgentResponse {
                output: error_msg,
                success: false,
                session_id: None,
            });
        }

        info!("Output saved to: {}", request.output_file.display());
        let (messages, _) = stream::parse_output_file(&request.output_file)?;
        let json_path = stream::write_aggregate(&request.output_file, &messages)?;
        debug!("Created JSON file: {}", json_path.display());

        match last_result {
            Some(record) => Ok(AgentResponse {
                output: record.result,
                success: !record.is_error,
                session_id: record.session_id,
            }),
            None => {
                // Exit code zero without a terminal record: hand back the
                // raw stream so callers can still inspect it.
                let raw = std::fs::read_to_string(&request.output_file).map_err(|source| {
                    AgentError::OutputReadFailed {
                        path: request.output_file.clone(),
                        source,
                    }
                })?;
                Ok(AgentResponse {
                    output: raw,
                    success: true,
                    session_id: None,
                })
            }
        }
    }
}

/// Download issue images into `agents/<adw-id>/images/`. Best-effort: a
/// direct HTTP fetch first, then the tracker CLI for protected URLs; any
/// failure just skips that image.
pub async fn download_issue_images(
    config: &Config,
    image_urls: &[String],
    adw_id: &str,
) -> Vec<PathBuf> {
    let image_dir = config.images_dir(adw_id);
    if let Err(e) = ensure_dir(&image_dir) {
        warn!("Could not create image directory: {e}");
        return Vec::new();
    }

    let client = reqwest::Client::builder()
        .user_agent("ADW-Agent/1.0")
        .timeout(std::time::Duration::from_secs(30))
        .build();
    let client = match client {
        Ok(client) => client,
        Err(e) => {
            warn!("Could not build HTTP client: {e}");
            return Vec::new();
        }
    };

    let mut saved = Vec::new();
    for (i, url) in image_urls.iter().enumerate() {
        let ext = url
            .split('?')
            .next()
            .and_then(|u| Path::new(u).extension())
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_else(|| ".png".to_string());
        let dest = image_dir.join(format!("issue_image_{i}{ext}"));

        match fetch_image(&client, url).await {
            Ok(bytes) => {
                if std::fs::write(&dest, &bytes).is_ok() {
                    info!("Downloaded image: {}", dest.display());
                    saved.push(dest);
                }
            }
            Err(e) => {
                warn!("Direct download failed for {url}: {e}");
                if let Some(bytes) = fetch_image_via_gh(config, url).await {
                    if std::fs::write(&dest, &bytes).is_ok() {
                        info!("Downloaded image via gh: {}", dest.display());
                        saved.push(dest);
                    }
                } else {
                    warn!("gh api download also failed for {url}");
                }
            }
        }
    }
    saved
}

async fn fetch_image(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, reqwest::Error> {
    let resp = client.get(url).send().await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}

async fn fetch_image_via_gh(config: &Config, url: &str) -> Option<Vec<u8>> {
    let mut cmd = Command::new("gh");
    if let Some(pat) = &config.github_pat {
        cmd.env("GH_TOKEN", pat);
    }
    let output = cmd
        .args(["api", url, "--method", "GET"])
        .output()
        .await
        .ok()?;
    if output.status.success() && !output.stdout.is_empty() {
        Some(output.stdout)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner_in(dir: &tempfile::TempDir) -> AgentRunner {
        AgentRunner::new(&Config::with_root(dir.path().to_path_buf()))
    }

    #[test]
    fn save_prompt_persists_slash_commands() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_in(&dir);

        runner.save_prompt("/classify_issue {\"number\": 1}", "abc12345", "issue_classifier");

        let prompt_file = dir
            .path()
            .join("agents/abc12345/issue_classifier/prompts/classify_issue.txt");
        let saved = std::fs::read_to_string(prompt_file).unwrap();
        assert_eq!(saved, "/classify_issue {\"number\": 1}");
    }

    #[test]
    fn save_prompt_ignores_plain_prompts() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_in(&dir);

        runner.save_prompt("just a question", "abc12345", "ops");
        assert!(!dir.path().join("agents/abc12345/ops/prompts").exists());
    }

    #[test]
    fn subprocess_env_is_a_denylist() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_in(&dir);

        // SAFETY: test-only env mutation, no concurrent readers of this key.
        unsafe { std::env::set_var("ADW_TEST_SECRET", "leaky") };
        let env = runner.subprocess_env();
        assert!(env.iter().all(|(k, _)| k != "ADW_TEST_SECRET"));
        assert!(env.iter().all(|(k, _)| k != NESTED_MARKER));
        assert!(env.iter().any(|(k, _)| k == "CLAUDE_CODE_PATH"));
        assert!(
            env.iter()
                .any(|(k, v)| k == "CLAUDE_BASH_MAINTAIN_PROJECT_WORKING_DIR" && v == "true")
        );
        unsafe { std::env::remove_var("ADW_TEST_SECRET") };
    }
}
