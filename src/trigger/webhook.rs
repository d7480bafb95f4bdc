//! GitHub webhook receiver.
//!
//! The tracker expects an answer within ten seconds, so the handler decides
//! routing synchronously, spawns the workflow as a detached child, and
//! returns immediately with the assigned workflow id.

use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::health;
use crate::pipeline::sibling_binary;
use crate::router::{self, DEFAULT_WORKFLOW};
use crate::state::Workflow;
use crate::util::make_adw_id;

pub struct AppState {
    pub config: Config,
}

pub type SharedState = Arc<AppState>;

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub issue: Option<PayloadIssue>,
    #[serde(default)]
    pub comment: Option<PayloadComment>,
}

#[derive(Debug, Deserialize)]
pub struct PayloadIssue {
    pub number: i64,
}

#[derive(Debug, Deserialize)]
pub struct PayloadComment {
    #[serde(default)]
    pub body: String,
}

/// Routing decision for one delivery.
#[derive(Debug, PartialEq)]
pub enum Decision {
    Launch {
        issue_number: i64,
        workflow: Workflow,
        reason: String,
    },
    Ignore {
        reason: String,
    },
}

/// Pure routing over an incoming event; the HTTP handler only adds the
/// subprocess launch on top of this.
pub fn decide(event_type: &str, payload: &WebhookPayload) -> Decision {
    let issue_number = payload.issue.as_ref().map(|i| i.number);

    match (event_type, payload.action.as_str(), issue_number) {
        ("issues", "opened", Some(issue_number)) => Decision::Launch {
            issue_number,
            workflow: DEFAULT_WORKFLOW,
            reason: "New issue opened".to_string(),
        },
        ("issue_comment", "created", Some(issue_number)) => {
            let body = payload
                .comment
                .as_ref()
                .map(|c| c.body.as_str())
                .unwrap_or("");
            match router::route_comment(body) {
                Some((workflow, reason)) => Decision::Launch {
                    issue_number,
                    workflow,
                    reason,
                },
                None => Decision::Ignore {
                    reason: "Comment does not contain a workflow keyword".to_string(),
                },
            }
        }
        (event, action, _) => Decision::Ignore {
            reason: format!("Not a triggering event (event={event}, action={action})"),
        },
    }
}

async fn gh_webhook_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(raw): Json<Value>,
) -> Json<Value> {
    let event_type = headers
        .get("X-GitHub-Event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let payload: WebhookPayload = serde_json::from_value(raw).unwrap_or_default();

    info!(
        "Received webhook: event={event_type}, action={}, issue={:?}",
        payload.action,
        payload.issue.as_ref().map(|i| i.number)
    );

    match decide(event_type, &payload) {
        Decision::Launch {
            issue_number,
            workflow,
            reason,
        } => {
            let adw_id = make_adw_id();
            match launch_workflow(&state.config, workflow, issue_number, &adw_id) {
                Ok(binary) => {
                    info!(
                        "Launched {binary} for issue #{issue_number} with ADW ID: {adw_id} ({reason})"
                    );
                    Json(json!({
                        "status": "accepted",
                        "issue": issue_number,
                        "adw_id": adw_id,
                        "workflow": binary,
                        "message": format!("ADW workflow triggered for issue #{issue_number}"),
                        "reason": reason,
                        "logs": format!("agents/{adw_id}/"),
                    }))
                }
                Err(e) => {
                    warn!("Error launching workflow: {e:#}");
                    Json(json!({
                        "status": "error",
                        "message": "Internal error processing webhook",
                    }))
                }
            }
        }
        Decision::Ignore { reason } => {
            info!("Ignoring webhook: {reason}");
            Json(json!({"status": "ignored", "reason": reason}))
        }
    }
}

/// Spawn the composite workflow binary detached; the handler never waits.
fn launch_workflow(
    config: &Config,
    workflow: Workflow,
    issue_number: i64,
    adw_id: &str,
) -> anyhow::Result<&'static str> {
    let binary = router::workflow_binary(workflow);
    let path = sibling_binary(binary)?;

    tokio::process::Command::new(path)
        .arg(issue_number.to_string())
        .arg(adw_id)
        .current_dir(&config.root)
        .spawn()?;
    Ok(binary)
}

async fn health_handler(State(state): State<SharedState>) -> Json<Value> {
    let report = health::run_health_check(&state.config).await;
    Json(json!({
        "status": if report.success { "healthy" } else { "unhealthy" },
        "service": "adw-webhook-trigger",
        "health_check": {
            "success": report.success,
            "warnings": report.warnings,
            "errors": report.errors,
        },
    }))
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/gh-webhook", post(gh_webhook_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the host runtime shuts the server down.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let port = config.port;
    let app = build_router(Arc::new(AppState { config }));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Webhook endpoint: POST /gh-webhook on port {port}");
    info!("Health check: GET /health");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    fn payload(action: &str, issue: Option<i64>, comment: Option<&str>) -> WebhookPayload {
        WebhookPayload {
            action: action.to_string(),
            issue: issue.map(|number| PayloadIssue { number }),
            comment: comment.map(|body| PayloadComment {
                body: body.to_string(),
            }),
        }
    }

    #[test]
    fn opened_issue_launches_default_workflow() {
        let decision = decide("issues", &payload("opened", Some(7), None));
        assert_eq!(
            decision,
            Decision::Launch {
                issue_number: 7,
                workflow: Workflow::PlanBuild,
                reason: "New issue opened".to_string(),
            }
        );
    }

    #[test]
    fn comment_routes_by_keyword_longest_first() {
        let decision = decide(
            "issue_comment",
            &payload("created", Some(42), Some("adw_plan_build_test_review")),
        );
        match decision {
            Decision::Launch {
                issue_number,
                workflow,
                ..
            } => {
                assert_eq!(issue_number, 42);
                assert_eq!(workflow, Workflow::PlanBuildTestReview);
            }
            other => panic!("Expected launch, got {other:?}"),
        }
    }

    #[test]
    fn non_matching_comment_is_ignored() {
        let decision = decide(
            "issue_comment",
            &payload("created", Some(42), Some("thanks!")),
        );
        assert!(matches!(decision, Decision::Ignore { .. }));
    }

    #[test]
    fn other_events_are_ignored() {
        let decision = decide("pull_request", &payload("opened", Some(1), None));
        match decision {
            Decision::Ignore { reason } => {
                assert!(reason.contains("event=pull_request"));
            }
            other => panic!("Expected ignore, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn webhook_endpoint_ignores_unrelated_events() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(AppState {
            config: Config::with_root(dir.path().to_path_buf()),
        });
        let app = build_router(state);

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/gh-webhook")
            .header("content-type", "application/json")
            .header("X-GitHub-Event", "issues")
            .body(axum::body::Body::from(
                json!({"action": "closed", "issue": {"number": 3}}).to_string(),
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ignored");
    }

    #[tokio::test]
    async fn webhook_endpoint_ignores_keywordless_comments() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(AppState {
            config: Config::with_root(dir.path().to_path_buf()),
        });
        let app = build_router(state);

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/gh-webhook")
            .header("content-type", "application/json")
            .header("X-GitHub-Event", "issue_comment")
            .body(axum::body::Body::from(
                json!({
                    "action": "created",
                    "issue": {"number": 5},
                    "comment": {"body": "nice work"},
                })
                .to_string(),
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ignored");
        assert!(
            parsed["reason"]
                .as_str()
                .unwrap()
                .contains("workflow keyword")
        );
    }
}
