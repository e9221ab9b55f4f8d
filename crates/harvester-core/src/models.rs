use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Header map carried by intercepted requests and request templates.
pub type Headers = BTreeMap<String, String>;

/// One extracted record envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: String,
    pub data: serde_json::Value,
    pub captured_at: DateTime<Utc>,
}

impl Record {
    pub fn new(id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            data,
            captured_at: Utc::now(),
        }
    }
}

/// An outgoing request paused by the browser until it is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    /// Interception id used to continue the request.
    pub id: String,
    pub url: String,
    pub method: String,
    pub headers: Headers,
}

/// A response observed on the page. The body is fetched on demand through
/// [`crate::traits::BrowserSession::response_body`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedResponse {
    /// Network request id the body is keyed by.
    pub request_id: String,
    pub url: String,
    pub status: u16,
}

/// URL and headers of the last data request seen outside a graft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTemplate {
    pub url: String,
    pub headers: Headers,
}

impl From<&InterceptedRequest> for RequestTemplate {
    fn from(request: &InterceptedRequest) -> Self {
        Self {
            url: request.url.clone(),
            headers: request.headers.clone(),
        }
    }
}

/// How a paused request is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestDisposition {
    /// Let the request proceed unmodified.
    Continue,
    /// Replace URL and headers before letting it proceed.
    Rewrite(RequestTemplate),
}
