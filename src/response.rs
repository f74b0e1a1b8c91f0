//! The JSON envelope every endpoint answers with

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body shape shared by success and failure responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    pub request: String,
    pub message: String,
    pub payload: Option<Value>,
}

/// An envelope together with the status it is sent with
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub envelope: Envelope,
}

impl ApiResponse {
    pub fn new(
        path: impl Into<String>,
        status: StatusCode,
        success: bool,
        message: impl Into<String>,
        payload: Option<Value>,
    ) -> Self {
        Self {
            status,
            envelope: Envelope {
                success,
                request: path.into(),
                message: message.into(),
                payload,
            },
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}
