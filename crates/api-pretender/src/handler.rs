//! Per-request dispatch: introspection, validation, reporting and response.

use crate::config::MockConfig;
use crate::reporter::{LogReporter, Reporter, REPORT_PREFIX};
use crate::request::RequestSnapshot;
use crate::validation::{format_report, Mismatch};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use std::any::Any;
use std::convert::Infallible;
use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Caller-supplied replacement for validation and the canned response.
///
/// Implemented for every `Fn(Request<Bytes>) -> Response<Full<Bytes>>`.
pub trait CustomHandler: Send + Sync {
    fn handle(&self, request: Request<Bytes>) -> Response<Full<Bytes>>;
}

impl<F> CustomHandler for F
where
    F: Fn(Request<Bytes>) -> Response<Full<Bytes>> + Send + Sync,
{
    fn handle(&self, request: Request<Bytes>) -> Response<Full<Bytes>> {
        self(request)
    }
}

/// Handle one request against a snapshot of the mock's configuration.
///
/// Never fails: every problem is reported or logged and a response is always
/// produced.
pub async fn handle_request<B>(
    req: Request<B>,
    config: Arc<MockConfig>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Display,
{
    if let Some(handler) = config.custom_handler.clone() {
        return Ok(run_custom_handler(req, handler.as_ref()).await);
    }

    let snapshot = RequestSnapshot::capture(req).await;
    debug!("Validating {} {}", snapshot.method, snapshot.path);

    let mismatches = catch_unwind(AssertUnwindSafe(|| config.contract.check(&snapshot)))
        .unwrap_or_else(|panic| vec![Mismatch::Internal(panic_message(panic.as_ref()))]);

    if let Some(report) = format_report(&mismatches) {
        let reporter: &dyn Reporter = config.reporter.as_deref().unwrap_or(&LogReporter);
        reporter.error_fmt(format_args!("{} {}", REPORT_PREFIX, report));
    }

    Ok(config.response.render())
}

async fn run_custom_handler<B>(
    req: Request<B>,
    handler: &dyn CustomHandler,
) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Display,
{
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Failed to read request body for custom handler: {}", e);
            Bytes::new()
        }
    };

    let request = Request::from_parts(parts, body);
    catch_unwind(AssertUnwindSafe(|| handler.handle(request))).unwrap_or_else(|panic| {
        error!("Custom handler panicked: {}", panic_message(panic.as_ref()));
        let body = Full::new(Bytes::from_static(b"custom handler panicked"));
        let mut response = Response::new(body);
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
