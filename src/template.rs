//! Slash-command templates understood by the coding agent.
//!
//! Commands are a closed enum so the model mapping is validated at compile
//! time instead of living in a string-keyed table.

use serde::{Deserialize, Serialize};

/// Model tier requested from the agent per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    Sonnet,
    Opus,
}

impl Model {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sonnet => "sonnet",
            Self::Opus => "opus",
        }
    }
}

/// Every prompt template the orchestrator invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlashCommand {
    // Issue-class planning templates
    Chore,
    Bug,
    Feature,
    // Workflow templates
    ClassifyIssue,
    FindPlanFile,
    GenerateBranchName,
    Commit,
    PullRequest,
    Implement,
    // SDLC phase templates
    Test,
    ResolveFailedTest,
    Review,
    Document,
    Patch,
}

impl SlashCommand {
    /// The literal slash command, e.g. `/classify_issue`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chore => "/chore",
            Self::Bug => "/bug",
            Self::Feature => "/feature",
            Self::ClassifyIssue => "/classify_issue",
            Self::FindPlanFile => "/find_plan_file",
            Self::GenerateBranchName => "/generate_branch_name",
            Self::Commit => "/commit",
            Self::PullRequest => "/pull_request",
            Self::Implement => "/implement",
            Self::Test => "/test",
            Self::ResolveFailedTest => "/resolve_failed_test",
            Self::Review => "/review",
            Self::Document => "/document",
            Self::Patch => "/patch",
        }
    }

    /// Command name without the leading slash, used for prompt file names.
    pub fn name(&self) -> &'static str {
        &self.as_str()[1..]
    }

    /// Recommended model: opus for heavy cognitive work, sonnet for routine.
    pub fn model(&self) -> Model {
        match self {
            Self::Implement
            | Self::Review
            | Self::Feature
            | Self::Bug
            | Self::Chore
            | Self::Patch
            | Self::ResolveFailedTest => Model::Opus,
            Self::ClassifyIssue
            | Self::FindPlanFile
            | Self::GenerateBranchName
            | Self::Commit
            | Self::PullRequest
            | Self::Test
            | Self::Document => Model::Sonnet,
        }
    }
}

impl std::fmt::Display for SlashCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Issue classification, stored in workflow state as the planning command
/// it selects (`/chore`, `/bug`, `/feature`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueClass {
    #[serde(rename = "/chore")]
    Chore,
    #[serde(rename = "/bug")]
    Bug,
    #[serde(rename = "/feature")]
    Feature,
}

impl IssueClass {
    pub const ALL: [IssueClass; 3] = [Self::Chore, Self::Bug, Self::Feature];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chore => "/chore",
            Self::Bug => "/bug",
            Self::Feature => "/feature",
        }
    }

    /// The branch-type token handed to `/generate_branch_name`.
    pub fn branch_type(&self) -> &'static str {
        &self.as_str()[1..]
    }

    /// The planning template this class selects.
    pub fn plan_command(&self) -> SlashCommand {
        match self {
            Self::Chore => SlashCommand::Chore,
            Self::Bug => SlashCommand::Bug,
            Self::Feature => SlashCommand::Feature,
        }
    }
}

impl std::fmt::Display for IssueClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for IssueClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "/chore" => Ok(Self::Chore),
            "/bug" => Ok(Self::Bug),
            "/feature" => Ok(Self::Feature),
            other => Err(format!("Invalid issue class: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heavy_commands_map_to_opus() {
        assert_eq!(SlashCommand::Implement.model(), Model::Opus);
        assert_eq!(SlashCommand::Review.model(), Model::Opus);
        assert_eq!(SlashCommand::ResolveFailedTest.model(), Model::Opus);
        assert_eq!(SlashCommand::Patch.model(), Model::Opus);
    }

    #[test]
    fn routine_commands_map_to_sonnet() {
        assert_eq!(SlashCommand::ClassifyIssue.model(), Model::Sonnet);
        assert_eq!(SlashCommand::Commit.model(), Model::Sonnet);
        assert_eq!(SlashCommand::Test.model(), Model::Sonnet);
        assert_eq!(SlashCommand::Document.model(), Model::Sonnet);
    }

    #[test]
    fn command_name_strips_slash() {
        assert_eq!(SlashCommand::GenerateBranchName.name(), "generate_branch_name");
    }

    #[test]
    fn issue_class_serializes_as_slash_command() {
        let json = serde_json::to_string(&IssueClass::Feature).unwrap();
        assert_eq!(json, "\"/feature\"");
        let back: IssueClass = serde_json::from_str("\"/bug\"").unwrap();
        assert_eq!(back, IssueClass::Bug);
    }

    #[test]
    fn issue_class_parses_from_token() {
        assert_eq!("/chore".parse::<IssueClass>().unwrap(), IssueClass::Chore);
        assert!("chore".parse::<IssueClass>().is_err());
    }
}
