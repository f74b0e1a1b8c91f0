//! Webhook request as received from GitHub

use axum::body::Bytes;
use axum::http::HeaderMap;
use serde_json::Value;

use crate::error::Result;

pub const EVENT_HEADER: &str = "x-github-event";
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const PUSH_EVENT: &str = "push";

/// The inbound delivery. `body` is kept exactly as received so the
/// signature can be recomputed over the same bytes.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl WebhookRequest {
    pub fn new(path: impl Into<String>, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            path: path.into(),
            headers,
            body,
        }
    }

    pub fn event(&self) -> Option<&str> {
        self.header(EVENT_HEADER)
    }

    pub fn signature(&self) -> Option<&str> {
        self.header(SIGNATURE_HEADER)
    }

    /// `ref` from the JSON body, e.g. `refs/heads/main`. Events without one
    /// (such as `ping`) and bodies that are not a JSON object give `None`;
    /// a body that is not JSON at all is an error.
    pub fn git_ref(&self) -> Result<Option<String>> {
        let payload: Value = serde_json::from_slice(&self.body)?;
        Ok(payload
            .as_object()
            .and_then(|fields| fields.get("ref"))
            .and_then(Value::as_str)
            .map(String::from))
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};

    fn request(body: &'static [u8]) -> WebhookRequest {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_bytes(b"X-GitHub-Event").unwrap(),
            HeaderValue::from_static("push"),
        );
        WebhookRequest::new("/backend", headers, Bytes::from_static(body))
    }

    #[test]
    fn headers_are_case_insensitive() {
        let req = request(b"{}");
        assert_eq!(req.event(), Some("push"));
        assert_eq!(req.signature(), None);
    }

    #[test]
    fn ref_is_read_from_body() {
        let req = request(br#"{"ref":"refs/heads/main","after":"abc123"}"#);
        assert_eq!(req.git_ref().unwrap().as_deref(), Some("refs/heads/main"));
    }

    #[test]
    fn body_without_ref_yields_none() {
        let req = request(br#"{"zen":"Keep it logically awesome.","hook_id":1}"#);
        assert_eq!(req.git_ref().unwrap(), None);
    }

    #[test]
    fn only_an_object_can_carry_a_ref() {
        assert_eq!(request(br#"["refs/heads/main"]"#).git_ref().unwrap(), None);
        assert_eq!(request(br#""refs/heads/main""#).git_ref().unwrap(), None);
        assert_eq!(request(br#"{"ref":42}"#).git_ref().unwrap(), None);
    }

    #[test]
    fn non_json_body_is_an_error() {
        assert!(request(b"payload=%7B%7D").git_ref().is_err());
    }
}
