//! Events from the coding agent's stream-json output format.
//!
//! The agent emits one JSON object per line; the final `result` record
//! carries the session id, error flag, and result text. Lines are written
//! verbatim to `raw_output.jsonl` and parsed lazily; callers only look at
//! what they need.

use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::errors::AgentError;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "system")]
    System {
        #[serde(default)]
        subtype: String,
    },

    #[serde(rename = "assistant")]
    Assistant {
        #[serde(default)]
        message: AssistantMessage,
    },

    #[serde(rename = "user")]
    User {},

    #[serde(rename = "result")]
    Result(ResultRecord),
}

#[derive(Debug, Default, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "tool_use")]
    ToolUse {
        name: String,
        input: Value,
        #[serde(default)]
        id: String,
    },

    #[serde(rename = "text")]
    Text { text: String },

    #[serde(other)]
    Other,
}

/// The terminal record of a stream-json run.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultRecord {
    #[serde(default)]
    pub subtype: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Extract a short human-readable description from a tool-use event, used
/// for execution-log progress lines.
pub fn describe_tool_use(name: &str, input: &Value) -> String {
    let path_of = |key: &str| {
        input
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or("file")
            .to_string()
    };
    match name {
        "Read" => format!("Reading: {}", path_of("file_path")),
        "Write" => format!("Creating: {}", path_of("file_path")),
        "Edit" => format!("Editing: {}", path_of("file_path")),
        "Bash" => {
            let cmd = input
                .get("command")
                .and_then(|v| v.as_str())
                .map(|s| crate::util::truncate(s, 60))
                .unwrap_or_else(|| "command".to_string());
            format!("Running: {cmd}")
        }
        _ => name.to_string(),
    }
}

/// Parse a saved jsonl output file into all messages plus the last `result`
/// record, if any.
pub fn parse_output_file(path: &Path) -> Result<(Vec<Value>, Option<ResultRecord>), AgentError> {
    let content = std::fs::read_to_string(path).map_err(|source| AgentError::OutputReadFailed {
        path: path.to_path_buf(),
        source,
    })?;

    let messages: Vec<Value> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();

    let result = messages
        .iter()
        .rev()
        .find(|m| m.get("type").and_then(|t| t.as_str()) == Some("result"))
        .and_then(|m| serde_json::from_value(m.clone()).ok());

    Ok((messages, result))
}

/// Write the companion `raw_output.json` aggregating all parsed messages as
/// one JSON array. Returns the companion path.
pub fn write_aggregate(jsonl_path: &Path, messages: &[Value]) -> Result<PathBuf, AgentError> {
    let json_path = jsonl_path.with_extension("json");
    let body =
        serde_json::to_string_pretty(messages).map_err(|e| AgentError::Other(e.into()))?;
    std::fs::write(&json_path, body).map_err(|source| AgentError::OutputWriteFailed {
        path: json_path.clone(),
        source,
    })?;
    Ok(json_path)
}
