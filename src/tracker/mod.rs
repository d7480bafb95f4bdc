//! Typed gateway over the GitHub CLI.
//!
//! Every operation shells out to `gh` and parses its `--json` output into
//! the models in [`models`]. Repository identity comes from the local git
//! remote, so the gateway works from any checkout without extra
//! configuration.

pub mod models;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::TrackerError;
use models::{Issue, IssueComment, IssueSummary};

const SCREENSHOTS_BRANCH: &str = "screenshots";

/// Extract `owner/repo` from a git remote URL. Supports both the SSH and
/// HTTPS shapes, with or without a trailing `.git`.
pub fn parse_owner_repo(url: &str) -> Result<String, TrackerError> {
    let path = if let Some(rest) = url.strip_prefix("git@github.com:") {
        Some(rest)
    } else {
        url.strip_prefix("https://github.com/")
    };

    let path = path.ok_or_else(|| TrackerError::BadRemoteUrl {
        url: url.to_string(),
    })?;
    let path = path.strip_suffix(".git").unwrap_or(path).trim_end_matches('/');

    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
        Ok(format!("{}/{}", parts[0], parts[1]))
    } else {
        Err(TrackerError::BadRemoteUrl {
            url: url.to_string(),
        })
    }
}

/// Read the `origin` remote of the repository at `root` and return its
/// `owner/repo` slug.
pub fn repo_identity(root: &Path) -> Result<String, TrackerError> {
    let repo =
        git2::Repository::discover(root).map_err(|e| TrackerError::NoRemote(e.to_string()))?;
    let remote = repo
        .find_remote("origin")
        .map_err(|e| TrackerError::NoRemote(e.to_string()))?;
    let url = remote
        .url()
        .ok_or_else(|| TrackerError::NoRemote("origin has no URL".to_string()))?;
    parse_owner_repo(url)
}

pub struct Tracker {
    repo: String,
    github_pat: Option<String>,
}

impl Tracker {
    /// Resolve the gateway against the repository at the configured root.
    pub fn new(config: &Config) -> Result<Self, TrackerError> {
        Ok(Self {
            repo: repo_identity(&config.root)?,
            github_pat: config.github_pat.clone(),
        })
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    fn gh(&self) -> Command {
        let mut cmd = Command::new("gh");
        if let Some(pat) = &self.github_pat {
            cmd.env("GH_TOKEN", pat);
        }
        cmd
    }

    async fn run_gh(&self, operation: &str, args: &[&str]) -> Result<String, TrackerError> {
        let output = self
            .gh()
            .args(args)
            .output()
            .await
            .map_err(TrackerError::GhNotInstalled)?;

        if !output.status.success() {
            return Err(TrackerError::CommandFailed {
                operation: operation.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Same as `run_gh`, but with a JSON payload piped to stdin (`--input -`).
    async fn run_gh_with_input(
        &self,
        operation: &str,
        args: &[&str],
        input: &str,
    ) -> Result<String, TrackerError> {
        let mut child = self
            .gh()
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(TrackerError::GhNotInstalled)?;

        let io_err = |e: std::io::Error| TrackerError::CommandFailed {
            operation: operation.to_string(),
            stderr: e.to_string(),
        };
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes()).await.map_err(io_err)?;
        }

        let output = child.wait_with_output().await.map_err(io_err)?;
        if !output.status.success() {
            return Err(TrackerError::CommandFailed {
                operation: operation.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Fetch a full issue record.
    pub async fn fetch_issue(&self, issue_number: &str) -> Result<Issue, TrackerError> {
        let stdout = self
            .run_gh(
                "issue view",
                &[
                    "issue",
                    "view",
                    issue_number,
                    "-R",
                    &self.repo,
                    "--json",
                    "number,title,body,state,author,assignees,labels,milestone,comments,createdAt,updatedAt,closedAt,url",
                ],
            )
            .await?;
        serde_json::from_str(&stdout).map_err(|source| TrackerError::ParseFailed {
            operation: "issue view".to_string(),
            source,
        })
    }

    /// List all open issues (up to 1000).
    pub async fn fetch_open_issues(&self) -> Result<Vec<IssueSummary>, TrackerError> {
        let stdout = self
            .run_gh(
                "issue list",
                &[
                    "issue",
                    "list",
                    "--repo",
                    &self.repo,
                    "--state",
                    "open",
                    "--json",
                    "number,title,body,labels,createdAt,updatedAt",
                    "--limit",
                    "1000",
                ],
            )
            .await?;
        serde_json::from_str(&stdout).map_err(|source| TrackerError::ParseFailed {
            operation: "issue list".to_string(),
            source,
        })
    }

    /// Fetch comments on an issue, sorted by creation time ascending.
    pub async fn fetch_issue_comments(
        &self,
        issue_number: i64,
    ) -> Result<Vec<IssueComment>, TrackerError> {
        #[derive(serde::Deserialize)]
        struct CommentsOnly {
            #[serde(default)]
            comments: Vec<IssueComment>,
        }

        let stdout = self
            .run_gh(
                "issue comments",
                &[
                    "issue",
                    "view",
                    &issue_number.to_string(),
                    "--repo",
                    &self.repo,
                    "--json",
                    "comments",
                ],
            )
            .await?;
        let mut parsed: CommentsOnly =
            serde_json::from_str(&stdout).map_err(|source| TrackerError::ParseFailed {
                operation: "issue comments".to_string(),
                source,
            })?;
        parsed.comments.sort_by_key(|c| c.created_at);
        Ok(parsed.comments)
    }

    /// Post a comment to an issue. Failures propagate; callers treat a
    /// failed progress comment as fatal.
    pub async fn post_comment(&self, issue_number: &str, body: &str) -> Result<(), TrackerError> {
        self.run_gh(
            "issue comment",
            &[
                "issue",
                "comment",
                issue_number,
                "-R",
                &self.repo,
                "--body",
                body,
            ],
        )
        .await?;
        info!("Posted comment to issue #{issue_number}");
        Ok(())
    }

    /// Best-effort: add the `in_progress` label and self-assign the issue.
    pub async fn mark_issue_in_progress(&self, issue_number: &str) {
        if let Err(e) = self
            .run_gh(
                "issue edit",
                &[
                    "issue",
                    "edit",
                    issue_number,
                    "-R",
                    &self.repo,
                    "--add-label",
                    "in_progress",
                ],
            )
            .await
        {
            warn!("Could not add 'in_progress' label: {e}");
        }
        if let Err(e) = self
            .run_gh(
                "issue edit",
                &[
                    "issue",
                    "edit",
                    issue_number,
                    "-R",
                    &self.repo,
                    "--add-assignee",
                    "@me",
                ],
            )
            .await
        {
            warn!("Could not self-assign issue #{issue_number}: {e}");
        }
    }

    /// Create the screenshots branch from the default branch head.
    async fn create_screenshots_branch(&self) -> Result<(), TrackerError> {
        let stdout = self
            .run_gh(
                "ref lookup",
                &["api", &format!("repos/{}/git/ref/heads/main", self.repo)],
            )
            .await?;
        let parsed: serde_json::Value =
            serde_json::from_str(&stdout).map_err(|source| TrackerError::ParseFailed {
                operation: "ref lookup".to_string(),
                source,
            })?;
        let sha = parsed["object"]["sha"]
            .as_str()
            .ok_or_else(|| TrackerError::CommandFailed {
                operation: "ref lookup".to_string(),
                stderr: "no object.sha in ref response".to_string(),
            })?;

        let payload = serde_json::json!({
            "ref": format!("refs/heads/{SCREENSHOTS_BRANCH}"),
            "sha": sha,
        });
        self.run_gh_with_input(
            "ref create",
            &[
                "api",
                &format!("repos/{}/git/refs", self.repo),
                "--method",
                "POST",
                "--input",
                "-",
            ],
            &payload.to_string(),
        )
        .await?;
        info!("Created '{SCREENSHOTS_BRANCH}' branch");
        Ok(())
    }

    /// Upload a screenshot to `screenshots/issue-<n>/<file>` on the
    /// screenshots branch via the contents API. Returns the hosted URL, or
    /// `None` on any failure; callers degrade to text-only comments.
    pub async fn upload_screenshot(&self, file_path: &Path, issue_number: &str) -> Option<String> {
        let bytes = match std::fs::read(file_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Screenshot file not readable: {}: {e}", file_path.display());
                return None;
            }
        };
        let filename = file_path.file_name()?.to_string_lossy().to_string();
        let upload_path = format!("screenshots/issue-{issue_number}/{filename}");
        let payload = serde_json::json!({
            "message": format!("Upload screenshot {filename} for issue #{issue_number}"),
            "content": BASE64.encode(&bytes),
            "branch": SCREENSHOTS_BRANCH,
        })
        .to_string();
        let api_path = format!("repos/{}/contents/{upload_path}", self.repo);
        let args = ["api", api_path.as_str(), "--method", "PUT", "--input", "-"];

        let attempt = self
            .run_gh_with_input("screenshot upload", &args, &payload)
            .await;
        let stdout = match attempt {
            Ok(stdout) => stdout,
            Err(TrackerError::CommandFailed { stderr, .. })
                if stderr.contains("Reference does not exist") || stderr.contains("Not Found") =>
            {
                // Branch missing: bootstrap it, then retry once.
                if let Err(e) = self.create_screenshots_branch().await {
                    warn!("Screenshots branch creation failed: {e}");
                    return None;
                }
                match self
                    .run_gh_with_input("screenshot upload", &args, &payload)
                    .await
                {
                    Ok(stdout) => stdout,
                    Err(e) => {
                        warn!("Screenshot upload failed after branch create: {e}");
                        return None;
                    }
                }
            }
            Err(e) => {
                warn!("Screenshot upload failed: {e}");
                return None;
            }
        };

        let parsed: serde_json::Value = serde_json::from_str(&stdout).ok()?;
        let url = parsed["content"]["download_url"].as_str()?.to_string();
        info!("Uploaded screenshot: {url}");
        Some(url)
    }

    /// Post a review comment with uploaded screenshots embedded under a
    /// `### Screenshots` heading. Falls back to the bare comment when no
    /// upload succeeds.
    pub async fn post_review_comment_with_screenshots(
        &self,
        issue_number: &str,
        body: &str,
        screenshot_paths: &[std::path::PathBuf],
    ) -> Result<(), TrackerError> {
        let mut parts = Vec::new();
        for path in screenshot_paths {
            if let Some(url) = self.upload_screenshot(path, issue_number).await {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "screenshot".to_string());
                parts.push(format!("![{name}]({url})"));
            }
        }

        let full = if parts.is_empty() {
            body.to_string()
        } else {
            format!("{body}\n\n### Screenshots\n{}", parts.join("\n"))
        };
        self.post_comment(issue_number, &full).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ssh_remote_shape() {
        assert_eq!(
            parse_owner_repo("git@github.com:acme/widget.git").unwrap(),
            "acme/widget"
        );
    }

    #[test]
    fn parses_https_remote_shape() {
        assert_eq!(
            parse_owner_repo("https://github.com/acme/widget").unwrap(),
            "acme/widget"
        );
        assert_eq!(
            parse_owner_repo("https://github.com/acme/widget.git").unwrap(),
            "acme/widget"
        );
    }

    #[test]
    fn rejects_non_github_urls() {
        assert!(parse_owner_repo("https://gitlab.com/acme/widget").is_err());
        assert!(parse_owner_repo("https://github.com/just-owner").is_err());
    }
}
