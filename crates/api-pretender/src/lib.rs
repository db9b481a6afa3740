//! API Pretender: a programmable loopback HTTP mock server for test suites.
//!
//! A [`MockServer`] holds an expected request contract (method, path,
//! headers, query parameters, payload) and a canned response. Once started it
//! serves a real `http://127.0.0.1:<port>` endpoint; every incoming request is
//! checked against the contract, discrepancies are handed to a [`Reporter`],
//! and the canned response is always returned.
//!
//! ```no_run
//! use api_pretender::{CapturingReporter, MockServer};
//! use std::sync::Arc;
//!
//! let reporter = Arc::new(CapturingReporter::new());
//! let mut mock = MockServer::new()
//!     .method("POST")
//!     .path("/api/data")
//!     .payload(r#"{"key":"value"}"#)
//!     .response_status(201)
//!     .reporter(reporter.clone());
//!
//! let url = mock.start().unwrap();
//! // ... drive the client under test against `url` ...
//! mock.stop();
//! reporter.assert_clean();
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod json;
pub mod logging;
pub mod reporter;
pub mod request;
pub mod response;
pub mod server;
pub mod validation;

pub use config::MockConfig;
pub use error::MockError;
pub use handler::CustomHandler;
pub use reporter::{CapturingReporter, LogReporter, Reporter, REPORT_PREFIX};
pub use request::RequestSnapshot;
pub use response::ResponsePlan;
pub use server::{MockServer, ServerHandle};
pub use validation::{Contract, Mismatch, PayloadError, ValueMismatch};
