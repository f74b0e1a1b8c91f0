//! Decides what a webhook delivery should do and does it

use axum::http::StatusCode;
use serde_json::json;
use tracing::{Instrument, info, warn};

use crate::AppState;
use crate::config::TargetKind;
use crate::error::Result;
use crate::executor::CommandOutcome;
use crate::response::ApiResponse;
use crate::signature;
use crate::webhook::{PUSH_EVENT, WebhookRequest};

const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// True only for a `push` to exactly `refs/heads/<branch>`.
/// An unset branch never matches.
pub fn matches_target(event: Option<&str>, git_ref: Option<&str>, branch: Option<&str>) -> bool {
    if event != Some(PUSH_EVENT) {
        return false;
    }
    match (git_ref, branch) {
        (Some(git_ref), Some(branch)) => git_ref
            .strip_prefix(BRANCH_REF_PREFIX)
            .is_some_and(|name| name == branch),
        _ => false,
    }
}

/// Handles one delivery for `kind`.
///
/// Authentication failures, ignored events and command results all come
/// back as `Ok`. `Err` is reserved for things with no regular answer
/// (unparseable body, command that could not start or whose task
/// panicked) and goes to
/// [`crate::report::report`].
pub async fn handle_update(
    state: &AppState,
    kind: TargetKind,
    request: &WebhookRequest,
) -> Result<ApiResponse> {
    let path = request.path.as_str();

    if !signature::verify(&request.body, request.signature(), state.config.secret()) {
        warn!("Rejected {} update: signature verification failed", kind);
        return Ok(ApiResponse::new(
            path,
            StatusCode::UNAUTHORIZED,
            false,
            "Unauthorized",
            None,
        ));
    }

    let event = request.event();
    let git_ref = request.git_ref()?;
    info!("Received {:?} event for ref {:?}", event, git_ref);

    let target = state.config.target(kind);
    let branch = state.config.branch_for(target);
    if !matches_target(event, git_ref.as_deref(), branch) {
        let message = format!(
            "Ignoring {} event for {}.",
            event.unwrap_or("unknown"),
            git_ref.as_deref().unwrap_or("no ref")
        );
        info!("{}", message);
        return Ok(ApiResponse::new(path, StatusCode::OK, true, message, None));
    }

    info!("Running command: {}", target.command_line());
    // Detached, so a caller hanging up does not drop (and kill) the deploy
    let executor = state.executor.clone();
    let target = target.clone();
    let deploy_root = state.config.deploy_root.clone();
    let task = tokio::spawn(
        async move {
            executor
                .run(&target.command, &target.args, &deploy_root)
                .await
        }
        .in_current_span(),
    );
    let outcome = task.await??;

    Ok(outcome_response(path, &outcome))
}

fn outcome_response(path: &str, outcome: &CommandOutcome) -> ApiResponse {
    if outcome.success() {
        return ApiResponse::new(
            path,
            StatusCode::OK,
            true,
            "Command executed successfully.",
            None,
        );
    }

    let message = if outcome.timed_out {
        "Command timed out."
    } else {
        "Command failed."
    };
    ApiResponse::new(
        path,
        StatusCode::INTERNAL_SERVER_ERROR,
        false,
        message,
        Some(json!({
            "output": outcome.stdout,
            "errorOutput": outcome.stderr,
        })),
    )
}
