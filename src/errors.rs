//! Typed error hierarchy for the ADW orchestrator.
//!
//! Three enums cover the three external seams:
//! - `AgentError`: spawning and capturing the coding-agent subprocess
//! - `TrackerError`: the issue-tracker CLI and repository identity
//! - `StateError`: the durable per-workflow state record
//!
//! Phase-level control flow uses `anyhow` on top of these.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the coding-agent invocation layer.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Claude Code CLI is not installed. Expected at: {path}")]
    NotInstalled { path: String },

    #[error("Failed to spawn agent process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Failed to write agent output at {path}: {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read agent output at {path}: {source}")]
    OutputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the issue-tracker gateway.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("GitHub CLI (gh) is not installed")]
    GhNotInstalled(#[source] std::io::Error),

    #[error("gh {operation} failed: {stderr}")]
    CommandFailed { operation: String, stderr: String },

    #[error("Failed to parse gh {operation} output: {source}")]
    ParseFailed {
        operation: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("No git remote 'origin' found: {0}")]
    NoRemote(String),

    #[error("Could not extract owner/repo from remote URL: {url}")]
    BadRemoteUrl { url: String },
}

/// Errors from the workflow state store.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("No state found for ADW ID: {adw_id}")]
    NotFound { adw_id: String },

    #[error("Failed to access state file at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid state file at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
