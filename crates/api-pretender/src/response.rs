//! Canned response emission.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::warn;

/// Lowest status code that is written.
pub const MIN_STATUS: u16 = 100;
/// Highest status code that is written (511 Network Authentication Required).
pub const MAX_STATUS: u16 = 511;

/// The status, headers and body a mock answers every request with.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResponsePlan {
    /// `0` means 200.
    #[serde(rename = "responseStatus")]
    pub status: u16,
    #[serde(rename = "responseHeaders", deserialize_with = "crate::config::string_map")]
    pub headers: HashMap<String, String>,
    #[serde(rename = "responseBody", deserialize_with = "crate::config::optional_bytes")]
    pub body: Option<Bytes>,
}

impl ResponsePlan {
    /// Status that will be written, or `None` when the server default is
    /// kept: the configured value is outside `[100, 511]`, or informational
    /// (1xx), which cannot be a final HTTP/1 response.
    pub fn effective_status(&self) -> Option<StatusCode> {
        let status = if self.status == 0 { 200 } else { self.status };
        if !(MIN_STATUS..=MAX_STATUS).contains(&status) {
            return None;
        }
        StatusCode::from_u16(status)
            .ok()
            .filter(|status| !status.is_informational())
    }

    /// Build the HTTP response: headers first, then status, then body.
    pub fn render(&self) -> Response<Full<Bytes>> {
        let body = self.body.clone().unwrap_or_default();
        let mut response = Response::new(Full::new(body));

        for (key, value) in &self.headers {
            match (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().insert(name, value);
                }
                _ => warn!("Skipping invalid response header '{}: {}'", key, value),
            }
        }

        match self.effective_status() {
            Some(status) => *response.status_mut() = status,
            None if (MIN_STATUS..=MAX_STATUS).contains(&self.status) => warn!(
                "Informational response status {} cannot be final, not written",
                self.status
            ),
            None => warn!(
                "Response status {} outside [{}, {}], not written",
                self.status, MIN_STATUS, MAX_STATUS
            ),
        }

        response
    }
}
