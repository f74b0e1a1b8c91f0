//! Update endpoints for GitHub push events
//!
//! The three handlers differ only in which deployment target they select.

use axum::{
    body,
    extract::{Request, State as AxumState},
};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use crate::SharedState;
use crate::config::TargetKind;
use crate::dispatch::handle_update;
use crate::error::DeployError;
use crate::report::{RequestContext, report};
use crate::response::ApiResponse;
use crate::webhook::WebhookRequest;

/// GitHub caps webhook payloads at 25 MB
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// POST /api/v1/backend
pub async fn backend_update(
    AxumState(state): AxumState<SharedState>,
    request: Request,
) -> ApiResponse {
    run_update(&state, TargetKind::Backend, request).await
}

/// POST /api/v1/frontend
pub async fn frontend_update(
    AxumState(state): AxumState<SharedState>,
    request: Request,
) -> ApiResponse {
    run_update(&state, TargetKind::Frontend, request).await
}

/// POST /api/v1/webhooks
pub async fn webhooks_update(
    AxumState(state): AxumState<SharedState>,
    request: Request,
) -> ApiResponse {
    run_update(&state, TargetKind::Webhooks, request).await
}

/// Reads the body, dispatches, and sends every error through [`report`].
/// This is the only place errors are reported.
async fn run_update(state: &SharedState, kind: TargetKind, request: Request) -> ApiResponse {
    let (parts, body) = request.into_parts();
    let ctx = RequestContext::from_parts(&parts);
    let span = info_span!("update", request_id = %Uuid::now_v7(), deploy_target = kind.name());

    async move {
        let result = match body::to_bytes(body, MAX_BODY_BYTES).await {
            Ok(bytes) => {
                let webhook = WebhookRequest::new(ctx.path.clone(), parts.headers, bytes);
                handle_update(state, kind, &webhook).await
            }
            Err(e) => Err(DeployError::BodyReadFailed(e.to_string())),
        };

        result.unwrap_or_else(|err| report(&err, &ctx))
    }
    .instrument(span)
    .await
}
