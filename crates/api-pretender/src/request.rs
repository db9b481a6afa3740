//! Extraction of the fields the validation engine looks at.

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Body;
use hyper::{HeaderMap, Request};
use std::collections::HashMap;
use std::fmt::Display;

/// Everything the contract checks need from one incoming request.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub method: String,
    /// URL path only, without the query string.
    pub path: String,
    /// Canonical header name to all values joined with `", "`.
    pub headers: HashMap<String, String>,
    /// Query key to all values joined with `", "`.
    pub parameters: HashMap<String, String>,
    /// The full body, or the reason it could not be read.
    pub body: Result<Bytes, String>,
    pub content_type: Option<String>,
}

impl RequestSnapshot {
    /// Consume the request, reading its body exactly once.
    pub async fn capture<B>(req: Request<B>) -> Self
    where
        B: Body,
        B::Error: Display,
    {
        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(e) => Err(e.to_string()),
        };
        Self::from_parts(&parts, body)
    }

    /// Build a snapshot from request parts and an already collected body.
    pub fn from_parts(parts: &hyper::http::request::Parts, body: Result<Bytes, String>) -> Self {
        let content_type = parts
            .headers
            .get(hyper::header::CONTENT_TYPE)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

        Self {
            method: parts.method.as_str().to_string(),
            path: parts.uri.path().to_string(),
            headers: joined_headers(&parts.headers),
            parameters: parse_query(parts.uri.query()),
            body,
            content_type,
        }
    }

    /// Whether the body should be compared as JSON.
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("application/json"))
    }

    /// Look up a header by any casing of its name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&canonical_header_name(name))
            .map(String::as_str)
    }
}

/// Canonical MIME header form: the first letter and every letter after a
/// hyphen upper-cased, the rest lower-cased (`x-test-header` becomes
/// `X-Test-Header`). Names holding characters outside the token set are
/// returned unchanged.
pub fn canonical_header_name(name: &str) -> String {
    let valid = name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b));
    if !valid {
        return name.to_string();
    }

    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}

fn joined_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .keys()
        .map(|name| {
            let values: Vec<_> = headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect();
            (canonical_header_name(name.as_str()), values.join(", "))
        })
        .collect()
}

/// Parse a query string, joining repeated keys' values with `", "` in the
/// order they appear. Pairs that fail to percent-decode are dropped.
pub fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
    let Some(query) = query else {
        return HashMap::new();
    };

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let (Some(key), Some(value)) = (decode_component(key), decode_component(value)) else {
            continue;
        };
        grouped.entry(key).or_default().push(value);
    }

    grouped
        .into_iter()
        .map(|(k, v)| (k, v.join(", ")))
        .collect()
}

fn decode_component(raw: &str) -> Option<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).ok().map(|s| s.into_owned())
}
