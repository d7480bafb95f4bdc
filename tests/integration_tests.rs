//! Integration tests for the ADW binaries.
//!
//! These exercise the subprocess-facing contracts: guardrail hook exit
//! codes and session logs, phase-unit boundary behavior with missing or
//! partial state, and the positional CLIs.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn hook() -> Command {
    cargo_bin_cmd!("adw_hook")
}

/// A temp project root with a git repo and an origin remote, so the
/// tracker gateway can resolve repository identity without touching gh.
fn create_temp_root() -> TempDir {
    let dir = TempDir::new().unwrap();
    let repo = git2::Repository::init(dir.path()).unwrap();
    repo.remote("origin", "https://github.com/acme/widget.git")
        .unwrap();
    dir
}

// =============================================================================
// Guardrail hook tests
// =============================================================================

mod hook_guardrails {
    use super::*;

    #[test]
    fn destructive_rm_is_blocked_with_exit_2() {
        let dir = create_temp_root();

        hook()
            .arg("pre_tool_use")
            .env("ADW_ROOT", dir.path())
            .env_remove("CLAUDE_SESSION_ID")
            .write_stdin(
                r#"{"session_id":"sess-1","tool_name":"Bash","tool_input":{"command":"rm -rf /"}}"#,
            )
            .assert()
            .code(2)
            .stderr(predicate::str::contains(
                "Blocked: destructive rm command: rm -rf /",
            ));

        let log_path = dir.path().join("logs/sess-1/pre_tool_use.jsonl");
        let log = std::fs::read_to_string(log_path).unwrap();
        assert!(log.contains("\"tool_name\":\"Bash\""));
    }

    #[test]
    fn dotenv_read_is_blocked() {
        let dir = create_temp_root();

        hook()
            .arg("pre_tool_use")
            .env("ADW_ROOT", dir.path())
            .write_stdin(
                r#"{"session_id":"sess-2","tool_name":"Read","tool_input":{"file_path":".env.production"}}"#,
            )
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Blocked: direct .env file access"));
    }

    #[test]
    fn safe_commands_are_allowed() {
        let dir = create_temp_root();

        hook()
            .arg("pre_tool_use")
            .env("ADW_ROOT", dir.path())
            .write_stdin(
                r#"{"session_id":"sess-3","tool_name":"Bash","tool_input":{"command":"cargo test"}}"#,
            )
            .assert()
            .success();

        assert!(dir.path().join("logs/sess-3/pre_tool_use.jsonl").exists());
    }

    #[test]
    fn post_tool_use_appends_to_tool_use_log() {
        let dir = create_temp_root();

        hook()
            .arg("post_tool_use")
            .env("ADW_ROOT", dir.path())
            .write_stdin(
                r#"{"session_id":"sess-4","tool_name":"Edit","tool_input":{"file_path":"src/lib.rs"}}"#,
            )
            .assert()
            .success();

        let log =
            std::fs::read_to_string(dir.path().join("logs/sess-4/tool_use.jsonl")).unwrap();
        assert!(log.contains("\"event\":\"PostToolUse\""));
        assert!(log.contains("src/lib.rs"));
    }

    #[test]
    fn stop_archives_transcript_as_chat_jsonl() {
        let dir = create_temp_root();
        let transcript = dir.path().join("transcript.jsonl");
        std::fs::write(&transcript, "{\"role\":\"user\"}\n").unwrap();

        hook()
            .arg("stop")
            .env("ADW_ROOT", dir.path())
            .write_stdin(format!(
                r#"{{"session_id":"sess-5","transcript_path":"{}"}}"#,
                transcript.display()
            ))
            .assert()
            .success();

        assert!(dir.path().join("logs/sess-5/chat.jsonl").exists());
    }

    #[test]
    fn unknown_event_is_an_error() {
        hook()
            .arg("mid_flight")
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Unknown hook event"));
    }

    #[test]
    fn hook_never_blocks_on_malformed_payloads() {
        let dir = create_temp_root();

        hook()
            .arg("pre_tool_use")
            .env("ADW_ROOT", dir.path())
            .write_stdin("this is not json")
            .assert()
            .success();
    }
}

// =============================================================================
// Phase boundary tests
// =============================================================================

mod phase_boundaries {
    use super::*;
    use adw::config::Config;
    use adw::state::{StateStore, Workflow};

    #[test]
    fn build_aborts_without_prior_state() {
        let dir = create_temp_root();

        cargo_bin_cmd!("adw_build")
            .arg("feedbeef")
            .env("ADW_ROOT", dir.path())
            .assert()
            .code(1)
            .stderr(predicate::str::contains("No state found"));
    }

    #[test]
    fn build_aborts_when_plan_file_is_unset() {
        let dir = create_temp_root();
        let config = Config::with_root(dir.path().to_path_buf());
        let store = StateStore::new(&config);
        store.create("feedbeef", "12", Workflow::PlanBuild).unwrap();

        cargo_bin_cmd!("adw_build")
            .arg("feedbeef")
            .env("ADW_ROOT", dir.path())
            .assert()
            .code(1)
            .stderr(predicate::str::contains("No plan file in state"));

        // The failure is recorded durably.
        let state = store.load("feedbeef").unwrap().unwrap();
        assert_eq!(state.error.as_deref(), Some("No plan file in state"));
    }

    #[test]
    fn review_aborts_when_plan_file_is_unset() {
        let dir = create_temp_root();
        let config = Config::with_root(dir.path().to_path_buf());
        let store = StateStore::new(&config);
        store.create("cafebabe", "12", Workflow::Sdlc).unwrap();

        cargo_bin_cmd!("adw_review")
            .arg("cafebabe")
            .env("ADW_ROOT", dir.path())
            .assert()
            .code(1)
            .stderr(predicate::str::contains("No plan file in state"));
    }

    #[test]
    fn phase_units_write_execution_logs_under_the_trigger_dir() {
        let dir = create_temp_root();

        cargo_bin_cmd!("adw_build")
            .arg("feedbeef")
            .env("ADW_ROOT", dir.path())
            .assert()
            .code(1);

        assert!(
            dir.path()
                .join("agents/feedbeef/adw_build/execution.log")
                .exists()
        );
    }
}

// =============================================================================
// CLI basics
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn phase_units_document_their_arguments() {
        cargo_bin_cmd!("adw_plan")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("issue_number"));

        cargo_bin_cmd!("adw_test").arg("--help").assert().success();
        cargo_bin_cmd!("adw_sdlc").arg("--help").assert().success();
    }

    #[test]
    fn missing_positional_arguments_fail_fast() {
        cargo_bin_cmd!("adw_build").assert().failure();
        cargo_bin_cmd!("adw_plan").assert().failure();
    }
}
