//! Typed views of tracker issues as returned by the gh CLI `--json` flags.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueAuthor {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueLabel {
    pub id: String,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueComment {
    pub id: String,
    pub author: IssueAuthor,
    pub body: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Full issue record from `gh issue view`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub number: i64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub state: String,
    pub author: IssueAuthor,
    #[serde(default)]
    pub assignees: Vec<IssueAuthor>,
    #[serde(default)]
    pub labels: Vec<IssueLabel>,
    #[serde(default)]
    pub milestone: Option<serde_json::Value>,
    #[serde(default)]
    pub comments: Vec<IssueComment>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "closedAt", default)]
    pub closed_at: Option<DateTime<Utc>>,
    pub url: String,
}

/// Simplified issue from `gh issue list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueSummary {
    pub number: i64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub labels: Vec<IssueLabel>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

static HTML_IMG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<img[^>]+src=["']([^"']+)["']"#).expect("valid html img regex")
});
static MARKDOWN_IMG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\(([^)]+)\)").expect("valid markdown img regex"));

impl Issue {
    /// Extract image URLs from the issue body, both HTML `<img src>` tags
    /// and Markdown `![alt](url)` images. Purely lexical; duplicates are
    /// dropped while preserving first-seen order.
    pub fn extract_image_urls(&self) -> Vec<String> {
        extract_image_urls(&self.body)
    }

    /// `<title>: <body>`, the form planning templates take as input.
    pub fn summary_line(&self) -> String {
        format!("{}: {}", self.title, self.body)
    }
}

pub fn extract_image_urls(body: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut urls = Vec::new();

    let captures = HTML_IMG_RE
        .captures_iter(body)
        .chain(MARKDOWN_IMG_RE.captures_iter(body));
    for cap in captures {
        if let Some(url) = cap.get(1) {
            let url = url.as_str().to_string();
            if seen.insert(url.clone()) {
                urls.push(url);
            }
        }
    }
    urls
}
