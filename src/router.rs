//! Keyword routing shared by the webhook receiver and the poller.
//!
//! Keywords are tested in descending length order so longer keywords win
//! over their prefixes (`adw_plan_build_test_review` is never shadowed by
//! `adw`).

use crate::state::Workflow;

/// Literal trigger keyword → workflow kind.
pub const WORKFLOW_KEYWORDS: &[(&str, Workflow)] = &[
    ("adw", Workflow::PlanBuild),
    ("adw_plan_build", Workflow::PlanBuild),
    ("adw_sdlc", Workflow::Sdlc),
    ("adw_patch", Workflow::Patch),
    ("adw_plan_build_test", Workflow::PlanBuildTest),
    ("adw_plan_build_review", Workflow::PlanBuildReview),
    ("adw_plan_build_test_review", Workflow::PlanBuildTestReview),
];

/// Workflow launched for issues with no trigger comment at all.
pub const DEFAULT_WORKFLOW: Workflow = Workflow::PlanBuild;

fn keywords_longest_first() -> Vec<(&'static str, Workflow)> {
    let mut keywords: Vec<_> = WORKFLOW_KEYWORDS.to_vec();
    keywords.sort_by_key(|(kw, _)| std::cmp::Reverse(kw.len()));
    keywords
}

/// The composite binary that runs a workflow kind end to end.
pub fn workflow_binary(workflow: Workflow) -> &'static str {
    match workflow {
        Workflow::PlanBuild => "adw_plan_build",
        Workflow::PlanBuildTest => "adw_plan_build_test",
        Workflow::PlanBuildReview => "adw_plan_build_review",
        Workflow::PlanBuildTestReview => "adw_plan_build_test_review",
        Workflow::Sdlc => "adw_sdlc",
        Workflow::Patch => "adw_patch",
    }
}

/// Route a whole comment body: exact keyword or keyword prefix, longest
/// keyword first. Used by the poller on the latest comment.
pub fn route_keyword(body: &str) -> Option<Workflow> {
    let candidate = body.trim().to_lowercase();
    for (keyword, workflow) in keywords_longest_first() {
        if candidate == keyword || candidate.starts_with(keyword) {
            return Some(workflow);
        }
    }
    None
}

/// Route a multi-line comment: an exact-match pass first, then any line
/// that starts with a keyword. This accommodates comments carrying a
/// keyword plus an image or other content.
pub fn route_comment(body: &str) -> Option<(Workflow, String)> {
    let lowered = body.trim().to_lowercase();
    for (keyword, workflow) in keywords_longest_first() {
        if lowered == keyword {
            return Some((workflow, format!("Comment with '{keyword}' command")));
        }
    }

    for line in lowered.lines() {
        let line = line.trim();
        for (keyword, workflow) in keywords_longest_first() {
            if line.starts_with(keyword) {
                return Some((workflow, format!("Comment with '{keyword}' command")));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_keyword_wins_over_prefixes() {
        assert_eq!(
            route_keyword("adw_plan_build_test_review"),
            Some(Workflow::PlanBuildTestReview)
        );
        assert_eq!(
            route_keyword("adw_plan_build_test"),
            Some(Workflow::PlanBuildTest)
        );
        assert_eq!(route_keyword("adw_sdlc"), Some(Workflow::Sdlc));
        assert_eq!(route_keyword("adw"), Some(Workflow::PlanBuild));
    }

    #[test]
    fn prefix_stability_holds_for_every_keyword_pair() {
        for (keyword, workflow) in WORKFLOW_KEYWORDS {
            assert_eq!(route_keyword(keyword), Some(*workflow), "keyword {keyword}");
        }
    }

    #[test]
    fn matching_is_case_insensitive_and_trimmed() {
        assert_eq!(route_keyword("  ADW_SDLC  "), Some(Workflow::Sdlc));
    }

    #[test]
    fn unrelated_comments_do_not_route() {
        assert_eq!(route_keyword("thanks, looks good"), None);
        assert_eq!(route_comment("thanks, looks good"), None);
    }

    #[test]
    fn multiline_comment_routes_by_line_start() {
        let body = "Here is a screenshot:\n![img](https://x/y.png)\nadw_patch please";
        let (workflow, reason) = route_comment(body).unwrap();
        assert_eq!(workflow, Workflow::Patch);
        assert!(reason.contains("adw_patch"));
    }

    #[test]
    fn every_workflow_has_a_composite_binary() {
        assert_eq!(workflow_binary(Workflow::Sdlc), "adw_sdlc");
        assert_eq!(
            workflow_binary(Workflow::PlanBuildTestReview),
            "adw_plan_build_test_review"
        );
    }
}
