//! Durable per-workflow state, persisted between phases.
//!
//! One record per workflow instance at `agents/<adw-id>/adw_state.json`.
//! Phase units are the only writers and run one at a time per workflow id,
//! so operations are plain synchronous file IO with no locking.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::errors::StateError;
use crate::template::IssueClass;

/// Workflow kinds, i.e. which phase list an instance runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Workflow {
    PlanBuild,
    PlanBuildTest,
    PlanBuildReview,
    PlanBuildTestReview,
    Sdlc,
    Patch,
}

impl Workflow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlanBuild => "plan_build",
            Self::PlanBuildTest => "plan_build_test",
            Self::PlanBuildReview => "plan_build_review",
            Self::PlanBuildTestReview => "plan_build_test_review",
            Self::Sdlc => "sdlc",
            Self::Patch => "patch",
        }
    }
}

/// Phases of the delivery pipeline, in nominal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Classify,
    Branch,
    Plan,
    Build,
    Test,
    Review,
    Document,
    Pr,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classify => "classify",
            Self::Branch => "branch",
            Self::Plan => "plan",
            Self::Build => "build",
            Self::Test => "test",
            Self::Review => "review",
            Self::Document => "document",
            Self::Pr => "pr",
        }
    }
}

/// Result of a single test suite run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteResult {
    pub suite: String,
    pub passed: bool,
    pub output: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// One attempt of the test phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub all_passed: bool,
    pub results: Vec<SuiteResult>,
    #[serde(default = "default_attempt")]
    pub attempt: u32,
}

/// Severity of a review finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Blocker,
    Warning,
    Suggestion,
}

/// A single finding from the review template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewIssue {
    pub file: String,
    #[serde(default)]
    pub line: Option<u32>,
    pub severity: Severity,
    pub description: String,
}

/// One attempt of the review phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewReport {
    pub approved: bool,
    #[serde(default)]
    pub issues: Vec<ReviewIssue>,
    #[serde(default)]
    pub screenshots: Vec<String>,
    pub summary: String,
    #[serde(default = "default_attempt")]
    pub attempt: u32,
}

impl ReviewReport {
    pub fn blockers(&self) -> impl Iterator<Item = &ReviewIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Blocker)
    }
}

/// Result of the documentation phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentationReport {
    #[serde(default)]
    pub files_created: Vec<String>,
    pub summary: String,
}

fn default_attempt() -> u32 {
    1
}

/// The durable workflow record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub adw_id: String,
    pub issue_number: String,
    pub workflow: Workflow,
    #[serde(default)]
    pub issue_class: Option<IssueClass>,
    #[serde(default)]
    pub branch_name: Option<String>,
    #[serde(default)]
    pub plan_file: Option<String>,
    pub current_phase: Phase,
    #[serde(default)]
    pub completed_phases: Vec<Phase>,
    #[serde(default)]
    pub test_results: Vec<TestReport>,
    #[serde(default)]
    pub review_results: Vec<ReviewReport>,
    #[serde(default)]
    pub documentation: Option<DocumentationReport>,
    #[serde(default)]
    pub pr_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl WorkflowState {
    pub fn new(adw_id: &str, issue_number: &str, workflow: Workflow) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            adw_id: adw_id.to_string(),
            issue_number: issue_number.to_string(),
            workflow,
            issue_class: None,
            branch_name: None,
            plan_file: None,
            current_phase: Phase::Classify,
            completed_phases: Vec::new(),
            test_results: Vec::new(),
            review_results: Vec::new(),
            documentation: None,
            pr_url: None,
            error: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Reads and writes workflow records under `agents/`.
pub struct StateStore {
    config: Config,
}

impl StateStore {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Create a fresh record and persist it.
    pub fn create(
        &self,
        adw_id: &str,
        issue_number: &str,
        workflow: Workflow,
    ) -> Result<WorkflowState, StateError> {
        let mut state = WorkflowState::new(adw_id, issue_number, workflow);
        self.save(&mut state)?;
        Ok(state)
    }

    /// Load a record from disk. `Ok(None)` if it has never been created.
    pub fn load(&self, adw_id: &str) -> Result<Option<WorkflowState>, StateError> {
        let path = self.config.state_path(adw_id);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StateError::Io { path, source }),
        };
        let state =
            serde_json::from_str(&content).map_err(|source| StateError::Corrupt { path, source })?;
        Ok(Some(state))
    }

    /// Load a record that must already exist.
    pub fn load_required(&self, adw_id: &str) -> Result<WorkflowState, StateError> {
        self.load(adw_id)?.ok_or_else(|| StateError::NotFound {
            adw_id: adw_id.to_string(),
        })
    }

    /// Persist the record, refreshing `updated_at`.
    pub fn save(&self, state: &mut WorkflowState) -> Result<(), StateError> {
        let path = self.config.state_path(&state.adw_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StateError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        state.updated_at = Utc::now().to_rfc3339();

        let body = serde_json::to_string_pretty(state).map_err(|source| StateError::Corrupt {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, body).map_err(|source| StateError::Io { path, source })?;
        Ok(())
    }

    /// Mark the current phase completed and move to the next one.
    pub fn advance(&self, state: &mut WorkflowState, next: Phase) -> Result<(), StateError> {
        if !state.completed_phases.contains(&state.current_phase) {
            state.completed_phases.push(state.current_phase);
        }
        state.current_phase = next;
        self.save(state)
    }

    /// Record a failure in the state.
    pub fn mark_error(&self, state: &mut WorkflowState, error: &str) -> Result<(), StateError> {
        state.error = Some(error.to_string());
        self.save(state)
    }
}
