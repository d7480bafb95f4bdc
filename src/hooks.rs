//! Guardrail hooks invoked by the coding agent around tool use.
//!
//! Protocol: the agent pipes a JSON payload on stdin; exit 0 allows the
//! tool, exit 2 blocks it with the reason on stderr. Everything is logged
//! to `logs/<session-id>/`, and log-write failures are swallowed; the
//! only signal a hook may ever send the agent is the documented exit code.

use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use std::io::Write as _;
use std::path::Path;
use std::sync::LazyLock;

use crate::config::Config;

pub const EXIT_ALLOW: i32 = 0;
pub const EXIT_BLOCK: i32 = 2;

/// Lifecycle points the agent calls back on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    PreToolUse,
    PostToolUse,
    UserPromptSubmit,
    PreCompact,
    Stop,
}

impl HookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::PreCompact => "PreCompact",
            Self::Stop => "Stop",
        }
    }
}

impl std::str::FromStr for HookEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre_tool_use" => Ok(Self::PreToolUse),
            "post_tool_use" => Ok(Self::PostToolUse),
            "user_prompt_submit" => Ok(Self::UserPromptSubmit),
            "pre_compact" => Ok(Self::PreCompact),
            "stop" => Ok(Self::Stop),
            other => Err(format!("Unknown hook event: {other}")),
        }
    }
}

/// Payload the agent supplies on stdin. Fields vary by event; everything
/// is optional so a malformed payload still gets logged.
#[derive(Debug, Default, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: Value,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub transcript_path: Option<String>,
}

impl HookInput {
    /// Parse stdin JSON; an empty payload on failure.
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_default()
    }

    fn session_id(&self) -> String {
        self.session_id
            .clone()
            .or_else(|| std::env::var("CLAUDE_SESSION_ID").ok())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

// Commands that must never run: recursive+force rm against the filesystem
// root, the home directory, or the current directory, in both flag orders.
static DANGEROUS_RM_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"rm\s+.*-[a-zA-Z]*r[a-zA-Z]*f[a-zA-Z]*\s+/\s*$",
        r"rm\s+.*-[a-zA-Z]*r[a-zA-Z]*f[a-zA-Z]*\s+~",
        r"rm\s+.*-[a-zA-Z]*r[a-zA-Z]*f[a-zA-Z]*\s+\.\s*$",
        r"rm\s+.*-[a-zA-Z]*f[a-zA-Z]*r[a-zA-Z]*\s+/\s*$",
        r"rm\s+.*-[a-zA-Z]*f[a-zA-Z]*r[a-zA-Z]*\s+~",
        r"rm\s+.*-[a-zA-Z]*f[a-zA-Z]*r[a-zA-Z]*\s+\.\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid rm pattern"))
    .collect()
});

static ENV_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|/)\.env($|\.local$|\.production$|\.staging$)").expect("valid dotenv pattern")
});

/// Reason string if the bash command is destructive, else `None`.
pub fn check_dangerous_bash(command: &str) -> Option<String> {
    DANGEROUS_RM_PATTERNS
        .iter()
        .any(|re| re.is_match(command))
        .then(|| format!("Blocked: destructive rm command: {command}"))
}

/// Reason string if the tool touches a dotenv file, else `None`.
pub fn check_env_file_access(tool_name: &str, tool_input: &Value) -> Option<String> {
    match tool_name {
        "Bash" => {
            let command = tool_input["command"].as_str().unwrap_or("");
            ENV_FILE_RE
                .is_match(command)
                .then(|| format!("Blocked: .env file access in command: {command}"))
        }
        "Read" | "Write" | "Edit" => {
            let file_path = tool_input["file_path"].as_str().unwrap_or("");
            (!file_path.is_empty() && ENV_FILE_RE.is_match(file_path))
                .then(|| format!("Blocked: direct .env file access: {file_path}"))
        }
        _ => None,
    }
}

/// Append a timestamped record to a session log file. Best-effort by
/// contract: any failure is swallowed.
fn log_event(config: &Config, session_id: &str, filename: &str, mut record: Value) {
    let log_dir = config.session_log_dir(session_id);
    if std::fs::create_dir_all(&log_dir).is_err() {
        return;
    }
    if let Some(map) = record.as_object_mut() {
        map.insert(
            "timestamp".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
    }

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(filename))
    else {
        return;
    };
    let _ = writeln!(file, "{record}");
}

/// Run a hook against a raw stdin payload. Returns the process exit code
/// and writes any block reason to stderr.
pub fn run_hook(config: &Config, event: HookEvent, raw_input: &str) -> i32 {
    let input = HookInput::parse(raw_input);
    let session_id = input.session_id();

    match event {
        HookEvent::PreToolUse => {
            log_event(
                config,
                &session_id,
                "pre_tool_use.jsonl",
                json!({
                    "event": event.as_str(),
                    "tool_name": input.tool_name,
                    "tool_input": input.tool_input,
                }),
            );

            let reason = match input.tool_name.as_str() {
                "Bash" => {
                    let command = input.tool_input["command"].as_str().unwrap_or("");
                    check_dangerous_bash(command)
                        .or_else(|| check_env_file_access(&input.tool_name, &input.tool_input))
                }
                "Read" | "Write" | "Edit" => {
                    check_env_file_access(&input.tool_name, &input.tool_input)
                }
                _ => None,
            };

            if let Some(reason) = reason {
                eprintln!("{reason}");
                return EXIT_BLOCK;
            }
            EXIT_ALLOW
        }
        HookEvent::PostToolUse => {
            log_event(
                config,
                &session_id,
                "tool_use.jsonl",
                json!({
                    "event": event.as_str(),
                    "tool_name": input.tool_name,
                    "tool_input": input.tool_input,
                }),
            );
            EXIT_ALLOW
        }
        HookEvent::UserPromptSubmit => {
            log_event(
                config,
                &session_id,
                "events.jsonl",
                json!({
                    "event": event.as_str(),
                    "prompt": input.prompt,
                }),
            );
            EXIT_ALLOW
        }
        HookEvent::PreCompact => {
            log_event(
                config,
                &session_id,
                "events.jsonl",
                json!({"event": event.as_str()}),
            );
            EXIT_ALLOW
        }
        HookEvent::Stop => {
            log_event(
                config,
                &session_id,
                "events.jsonl",
                json!({"event": event.as_str()}),
            );
            // Archive the transcript for post-session analysis.
            if let Some(transcript) = &input.transcript_path {
                let src = Path::new(transcript);
                if src.exists() {
                    let log_dir = config.session_log_dir(&session_id);
                    if std::fs::create_dir_all(&log_dir).is_ok() {
                        let _ = std::fs::copy(src, log_dir.join("chat.jsonl"));
                    }
                }
            }
            EXIT_ALLOW
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &tempfile::TempDir) -> Config {
        Config::with_root(dir.path().to_path_buf())
    }

    #[test]
    fn rm_rf_variants_are_blocked() {
        for cmd in [
            "rm -rf /",
            "rm -rf ~",
            "rm -rf .",
            "rm -fr /",
            "rm -fr ~/projects",
            "rm -fr .",
            "rm --force -rf /",
        ] {
            assert!(check_dangerous_bash(cmd).is_some(), "should block: {cmd}");
        }
    }

    #[test]
    fn ordinary_rm_is_allowed() {
        for cmd in ["rm file.txt", "rm -rf build/", "rm -r src/old", "ls -la"] {
            assert!(check_dangerous_bash(cmd).is_none(), "should allow: {cmd}");
        }
    }

    #[test]
    fn dotenv_variants_are_blocked_for_file_tools() {
        for path in [".env", ".env.local", ".env.production", "config/.env.staging"] {
            let input = json!({"file_path": path});
            assert!(
                check_env_file_access("Read", &input).is_some(),
                "should block: {path}"
            );
        }
    }

    #[test]
    fn env_lookalikes_are_allowed() {
        for path in [".envrc", "src/env.rs", ".environment"] {
            let input = json!({"file_path": path});
            assert!(
                check_env_file_access("Write", &input).is_none(),
                "should allow: {path}"
            );
        }
    }

    #[test]
    fn bash_dotenv_access_is_blocked() {
        let input = json!({"command": "cat .env"});
        assert!(check_env_file_access("Bash", &input).is_some());
        let input = json!({"command": "cat README.md"});
        assert!(check_env_file_access("Bash", &input).is_none());
    }

    #[test]
    fn pre_tool_use_blocks_and_logs() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);

        let payload = json!({
            "session_id": "sess-1",
            "tool_name": "Bash",
            "tool_input": {"command": "rm -rf /"},
        })
        .to_string();
        let code = run_hook(&config, HookEvent::PreToolUse, &payload);
        assert_eq!(code, EXIT_BLOCK);

        let log = std::fs::read_to_string(dir.path().join("logs/sess-1/pre_tool_use.jsonl")).unwrap();
        let record: Value = serde_json::from_str(log.lines().next().unwrap()).unwrap();
        assert_eq!(record["event"], "PreToolUse");
        assert_eq!(record["tool_input"]["command"], "rm -rf /");
        assert!(record["timestamp"].is_string());
    }

    #[test]
    fn pre_tool_use_allows_safe_commands() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);

        let payload = json!({
            "session_id": "sess-2",
            "tool_name": "Bash",
            "tool_input": {"command": "cargo build"},
        })
        .to_string();
        assert_eq!(run_hook(&config, HookEvent::PreToolUse, &payload), EXIT_ALLOW);
        assert!(dir.path().join("logs/sess-2/pre_tool_use.jsonl").exists());
    }

    #[test]
    fn stop_archives_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);

        let transcript = dir.path().join("transcript.jsonl");
        std::fs::write(&transcript, "{\"role\":\"user\"}\n").unwrap();

        let payload = json!({
            "session_id": "sess-3",
            "transcript_path": transcript.to_string_lossy(),
        })
        .to_string();
        assert_eq!(run_hook(&config, HookEvent::Stop, &payload), EXIT_ALLOW);
        assert!(dir.path().join("logs/sess-3/chat.jsonl").exists());
        assert!(dir.path().join("logs/sess-3/events.jsonl").exists());
    }

    #[test]
    fn malformed_payload_still_logs_under_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);

        // SAFETY: test-only env mutation; no other test reads this key.
        unsafe { std::env::remove_var("CLAUDE_SESSION_ID") };
        assert_eq!(
            run_hook(&config, HookEvent::PostToolUse, "not json at all"),
            EXIT_ALLOW
        );
        assert!(dir.path().join("logs/unknown/tool_use.jsonl").exists());
    }
}
