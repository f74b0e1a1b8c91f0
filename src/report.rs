//! Last-resort error sink for the update endpoints

use axum::http::{Method, StatusCode, request::Parts};
use axum::extract::ConnectInfo;
use std::net::SocketAddr;
use tracing::error;

use crate::error::DeployError;
use crate::response::ApiResponse;

/// Request details kept around for error records
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub remote_addr: Option<SocketAddr>,
}

impl RequestContext {
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            remote_addr: parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        }
    }
}

/// Logs `err` and turns it into a 500 envelope.
///
/// Called once per failed request, at the handler boundary. The handler
/// returns whatever this produces, so there is never an earlier response
/// to collide with.
pub fn report(err: &DeployError, ctx: &RequestContext) -> ApiResponse {
    let status = StatusCode::INTERNAL_SERVER_ERROR;
    let remote = ctx
        .remote_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string());

    error!(
        "{} - {} - {} - {} - {}",
        status.as_u16(),
        err,
        ctx.path,
        ctx.method,
        remote
    );

    ApiResponse::new(ctx.path.clone(), status, false, err.to_string(), None)
}
