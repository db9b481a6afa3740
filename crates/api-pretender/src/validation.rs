//! Request validation against a mock's contract.
//!
//! Checks run in a fixed order (method, path, headers, parameters, payload)
//! and every failing check yields exactly one [`Mismatch`]. The `Display`
//! text of each mismatch is the message downstream tests assert on.

use crate::json::json_structurally_equal;
use crate::request::{canonical_header_name, RequestSnapshot};
use bytes::Bytes;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Expectations applied to every incoming request.
///
/// Empty strings, absent map keys and an absent or empty payload all mean
/// "do not check".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Contract {
    pub method: String,
    pub path: String,
    #[serde(deserialize_with = "crate::config::string_map")]
    pub headers: HashMap<String, String>,
    #[serde(deserialize_with = "crate::config::string_map")]
    pub parameters: HashMap<String, String>,
    #[serde(deserialize_with = "crate::config::optional_bytes")]
    pub payload: Option<Bytes>,
}

/// One failed check.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Mismatch {
    #[error("invalid method, got: '{actual}' expected: '{expected}'")]
    Method { actual: String, expected: String },

    #[error("invalid path, got: '{actual}' expected: '{expected}'")]
    Path { actual: String, expected: String },

    #[error("{}", join_lines(.0))]
    Headers(Vec<ValueMismatch>),

    #[error("{}", join_lines(.0))]
    Parameters(Vec<ValueMismatch>),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("internal validation error: {0}")]
    Internal(String),
}

/// A single header or query parameter whose value differs from the contract.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueMismatch {
    pub key: String,
    /// `"header"` or `"parameter"`.
    pub kind: &'static str,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for ValueMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid {} {}: expected '{}', got '{}'",
            self.key, self.kind, self.expected, self.actual
        )
    }
}

/// Failures of the payload check. Any of them stops the check.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PayloadError {
    #[error("Failed to read request body: {0}")]
    BodyUnreadable(String),

    #[error("Unexpected payload received, got: '{received}', but none was expected")]
    Unexpected { received: String },

    #[error("Expected a request payload, but none was received")]
    Missing,

    #[error("Invalid expected JSON: '{expected}'")]
    InvalidExpectedJson { expected: String },

    #[error("Invalid received JSON: '{received}'")]
    InvalidReceivedJson { received: String },

    #[error("Mismatched JSON payload, got: '{received}', expected: '{expected}'")]
    MismatchedJson { received: String, expected: String },

    #[error("Unexpected payload received, got: '{received}', expected: '{expected}'")]
    MismatchedBytes { received: String, expected: String },
}

fn join_lines<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

impl Contract {
    /// Run every check and collect the failures in check order.
    pub fn check(&self, request: &RequestSnapshot) -> Vec<Mismatch> {
        let mut mismatches = Vec::new();

        if let Some(m) = self.check_method(&request.method) {
            mismatches.push(m);
        }
        if let Some(m) = self.check_path(&request.path) {
            mismatches.push(m);
        }

        let headers = check_values(&request.headers, "header", &self.headers, |k| {
            canonical_header_name(k)
        });
        if !headers.is_empty() {
            mismatches.push(Mismatch::Headers(headers));
        }

        let parameters = check_values(&request.parameters, "parameter", &self.parameters, |k| {
            k.to_string()
        });
        if !parameters.is_empty() {
            mismatches.push(Mismatch::Parameters(parameters));
        }

        if let Err(e) = self.check_payload(request) {
            mismatches.push(e.into());
        }

        mismatches
    }

    pub fn check_method(&self, actual: &str) -> Option<Mismatch> {
        (!self.method.is_empty() && actual != self.method).then(|| Mismatch::Method {
            actual: actual.to_string(),
            expected: self.method.clone(),
        })
    }

    pub fn check_path(&self, actual: &str) -> Option<Mismatch> {
        (!self.path.is_empty() && actual != self.path).then(|| Mismatch::Path {
            actual: actual.to_string(),
            expected: self.path.clone(),
        })
    }

    /// Payload check; see [`PayloadError`] for the outcomes.
    pub fn check_payload(&self, request: &RequestSnapshot) -> Result<(), PayloadError> {
        let body = request
            .body
            .as_ref()
            .map_err(|e| PayloadError::BodyUnreadable(e.clone()))?;
        let expected = self.payload.as_ref().filter(|p| !p.is_empty());

        let expected = match (expected, body.is_empty()) {
            (None, true) => return Ok(()),
            (None, false) => {
                return Err(PayloadError::Unexpected {
                    received: lossy(body),
                })
            }
            (Some(_), true) => return Err(PayloadError::Missing),
            (Some(expected), false) => expected,
        };

        if !request.is_json() {
            if body != expected {
                return Err(PayloadError::MismatchedBytes {
                    received: lossy(body),
                    expected: lossy(expected),
                });
            }
            return Ok(());
        }

        let expected_json: serde_json::Value =
            serde_json::from_slice(expected).map_err(|_| PayloadError::InvalidExpectedJson {
                expected: lossy(expected),
            })?;
        let received_json: serde_json::Value =
            serde_json::from_slice(body).map_err(|_| PayloadError::InvalidReceivedJson {
                received: lossy(body),
            })?;

        if !json_structurally_equal(&expected_json, &received_json) {
            return Err(PayloadError::MismatchedJson {
                received: lossy(body),
                expected: lossy(expected),
            });
        }
        Ok(())
    }
}

/// Compare expected key/value pairs with the actual mapping. A missing actual
/// value counts as the empty string. Keys are visited in sorted order so the
/// report is stable.
fn check_values(
    actual: &HashMap<String, String>,
    kind: &'static str,
    expected: &HashMap<String, String>,
    lookup_key: impl Fn(&str) -> String,
) -> Vec<ValueMismatch> {
    let mut keys: Vec<_> = expected.keys().collect();
    keys.sort();

    keys.into_iter()
        .filter_map(|key| {
            let want = &expected[key];
            let got = actual
                .get(&lookup_key(key))
                .map(String::as_str)
                .unwrap_or("");
            (got != want).then(|| ValueMismatch {
                key: key.clone(),
                kind,
                expected: want.clone(),
                actual: got.to_string(),
            })
        })
        .collect()
}

/// Join the failures of one request into a single report body.
pub fn format_report(mismatches: &[Mismatch]) -> Option<String> {
    (!mismatches.is_empty()).then(|| join_lines(mismatches))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> RequestSnapshot {
        RequestSnapshot {
            method: "GET".to_string(),
            path: "/".to_string(),
            headers: HashMap::new(),
            parameters: HashMap::new(),
            body: Ok(Bytes::new()),
            content_type: None,
        }
    }

    fn with_body(body: &'static str, json: bool) -> RequestSnapshot {
        RequestSnapshot {
            method: "POST".to_string(),
            body: Ok(Bytes::from_static(body.as_bytes())),
            content_type: json.then(|| "application/json".to_string()),
            ..snapshot()
        }
    }

    fn payload_contract(payload: &'static str) -> Contract {
        Contract {
            payload: Some(Bytes::from_static(payload.as_bytes())),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_contract_accepts_any_bodyless_request() {
        let contract = Contract::default();
        let mut request = snapshot();
        request.method = "DELETE".to_string();
        request.path = "/anything".to_string();
        request
            .headers
            .insert("X-Random".to_string(), "value".to_string());
        assert!(contract.check(&request).is_empty());
    }

    #[test]
    fn test_method_mismatch_message() {
        let contract = Contract {
            method: "POST".to_string(),
            ..Default::default()
        };
        let mismatches = contract.check(&snapshot());
        assert_eq!(mismatches.len(), 1);
        assert_eq!(
            mismatches[0].to_string(),
            "invalid method, got: 'GET' expected: 'POST'"
        );
    }

    #[test]
    fn test_method_is_case_sensitive() {
        let contract = Contract {
            method: "get".to_string(),
            ..Default::default()
        };
        assert!(contract.check_method("GET").is_some());
    }

    #[test]
    fn test_path_mismatch_message() {
        let contract = Contract {
            path: "/expected-path".to_string(),
            ..Default::default()
        };
        assert_eq!(
            contract.check_path("/wrong-path").unwrap().to_string(),
            "invalid path, got: '/wrong-path' expected: '/expected-path'"
        );
        assert!(contract.check_path("/expected-path").is_none());
    }

    #[test]
    fn test_header_mismatches_share_one_entry() {
        let contract = Contract {
            headers: [
                ("X-B".to_string(), "2".to_string()),
                ("X-A".to_string(), "1".to_string()),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        let mut request = snapshot();
        request.headers.insert("X-A".to_string(), "wrong".to_string());

        let mismatches = contract.check(&request);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(
            mismatches[0].to_string(),
            "invalid X-A header: expected '1', got 'wrong'\ninvalid X-B header: expected '2', got ''"
        );
    }

    #[test]
    fn test_header_lookup_ignores_expected_key_casing() {
        let contract = Contract {
            headers: [("authorization".to_string(), "Bearer t".to_string())]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let mut request = snapshot();
        request
            .headers
            .insert("Authorization".to_string(), "Bearer t".to_string());
        assert!(contract.check(&request).is_empty());
    }

    #[test]
    fn test_parameter_mismatch_message() {
        let contract = Contract {
            parameters: [("param1".to_string(), "value1".to_string())]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let mut request = snapshot();
        request
            .parameters
            .insert("param1".to_string(), "wrong-value".to_string());
        assert_eq!(
            contract.check(&request)[0].to_string(),
            "invalid param1 parameter: expected 'value1', got 'wrong-value'"
        );
    }

    #[test]
    fn test_unexpected_payload() {
        let err = Contract::default()
            .check_payload(&with_body("mock-payload", false))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unexpected payload received, got: 'mock-payload', but none was expected"
        );
    }

    #[test]
    fn test_empty_expected_payload_counts_as_absent() {
        let contract = payload_contract("");
        assert!(contract.check_payload(&snapshot()).is_ok());
        assert!(matches!(
            contract.check_payload(&with_body("x", false)),
            Err(PayloadError::Unexpected { .. })
        ));
    }

    #[test]
    fn test_no_payload_on_either_side_passes_with_json_content_type() {
        assert!(Contract::default()
            .check_payload(&with_body("", true))
            .is_ok());
        assert!(payload_contract("")
            .check_payload(&with_body("", true))
            .is_ok());
    }

    #[test]
    fn test_missing_payload() {
        let err = payload_contract("expected-payload")
            .check_payload(&snapshot())
            .unwrap_err();
        assert_eq!(err, PayloadError::Missing);
        assert_eq!(
            err.to_string(),
            "Expected a request payload, but none was received"
        );
    }

    #[test]
    fn test_json_payload_structural_match() {
        let contract = payload_contract(r#"{"a":1,"b":[true,null]}"#);
        let request = with_body("{ \"b\": [true, null], \"a\": 1.0 }", true);
        assert!(contract.check_payload(&request).is_ok());
    }

    #[test]
    fn test_json_payload_mismatch_message() {
        let err = payload_contract(r#"{"key":"value"}"#)
            .check_payload(&with_body(r#"{"key":"wrong-value"}"#, true))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"Mismatched JSON payload, got: '{"key":"wrong-value"}', expected: '{"key":"value"}'"#
        );
    }

    #[test]
    fn test_structurally_equal_bodies_differ_without_json_content_type() {
        let err = payload_contract(r#"{"a":1,"b":2}"#)
            .check_payload(&with_body(r#"{"b":2,"a":1}"#, false))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"Unexpected payload received, got: '{"b":2,"a":1}', expected: '{"a":1,"b":2}'"#
        );
    }

    #[test]
    fn test_invalid_expected_json() {
        let err = payload_contract(r#"{"key:"value}"#)
            .check_payload(&with_body(r#"{"key":"value"}"#, true))
            .unwrap_err();
        assert_eq!(err.to_string(), r#"Invalid expected JSON: '{"key:"value}'"#);
    }

    #[test]
    fn test_invalid_received_json() {
        let err = payload_contract(r#"{"key":"value"}"#)
            .check_payload(&with_body(r#"{"key:"wrong-value}"#, true))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"Invalid received JSON: '{"key:"wrong-value}'"#
        );
    }

    #[test]
    fn test_unreadable_body() {
        let mut request = snapshot();
        request.body = Err("connection reset".to_string());
        let err = payload_contract("x").check_payload(&request).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to read request body: connection reset"
        );
    }

    #[test]
    fn test_report_follows_check_order() {
        let contract = Contract {
            method: "POST".to_string(),
            path: "/expected".to_string(),
            payload: Some(Bytes::from_static(b"data")),
            ..Default::default()
        };
        let report = format_report(&contract.check(&snapshot())).unwrap();
        assert_eq!(
            report,
            "invalid method, got: 'GET' expected: 'POST'\n\
             invalid path, got: '/' expected: '/expected'\n\
             Expected a request payload, but none was received"
        );
        assert!(format_report(&[]).is_none());
    }
}
