//! The mock construction record.
//!
//! A [`MockConfig`] can be filled in Rust or loaded from a JSON or YAML
//! document. Field names in documents are camelCase:
//!
//! Header, parameter and response header values may be any scalar; numbers
//! and booleans are kept in their textual form (`id: 42` means `"42"`).
//!
//! ```yaml
//! method: POST
//! path: /api/data
//! headers:
//!   Authorization: Bearer token123
//! parameters:
//!   id: 42
//! payload: '{"key":"value"}'
//! responseStatus: 201
//! responseHeaders:
//!   Content-Type: application/json
//! responseBody: '{"status":"ok"}'
//! ```

use crate::error::MockError;
use crate::handler::CustomHandler;
use crate::reporter::Reporter;
use crate::response::ResponsePlan;
use crate::validation::Contract;
use bytes::Bytes;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Contract, response plan and collaborators of one mock.
#[derive(Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MockConfig {
    #[serde(flatten)]
    pub contract: Contract,
    /// Kept for document compatibility. JSON comparison is decided by the
    /// request's own `Content-Type`, not by this field.
    pub content_type: String,
    #[serde(flatten)]
    pub response: ResponsePlan,
    /// Sink for validation failures; the process log when `None`.
    #[serde(skip)]
    pub reporter: Option<Arc<dyn Reporter>>,
    /// Replaces validation and the response plan when set.
    #[serde(skip)]
    pub custom_handler: Option<Arc<dyn CustomHandler>>,
}

impl MockConfig {
    pub fn from_json_str(s: &str) -> Result<Self, MockError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, MockError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Load from a file; `.yaml`/`.yml` are parsed as YAML, anything else as
    /// JSON.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MockError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }
}

impl fmt::Debug for MockConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockConfig")
            .field("contract", &self.contract)
            .field("content_type", &self.content_type)
            .field("response", &self.response)
            .field("reporter", &self.reporter.is_some())
            .field("custom_handler", &self.custom_handler.is_some())
            .finish()
    }
}

/// Read an optional byte payload given as a string in config documents.
pub(crate) fn optional_bytes<'de, D>(deserializer: D) -> Result<Option<Bytes>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(Bytes::from))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    String(String),
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl From<Scalar> for String {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::String(s) => s,
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::UInt(u) => u.to_string(),
            Scalar::Float(f) => f.to_string(),
        }
    }
}

/// Read a string map whose values may be written as any scalar.
pub(crate) fn string_map<'de, D>(
    deserializer: D,
) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = HashMap::<String, Scalar>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(k, v)| (k, v.into())).collect())
}
