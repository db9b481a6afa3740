//! Sinks for validation reports.
//!
//! The mock only ever talks to a [`Reporter`] through its two methods. When no
//! reporter is attached the [`LogReporter`] is used, which informs without
//! failing anything.

use parking_lot::Mutex;
use std::fmt;
use tracing::info;

/// Tag every report starts with.
pub const REPORT_PREFIX: &str = "GoAPIpretender:";

/// Capability that receives formatted error messages from request handling.
///
/// Implementations are invoked from server worker threads and must tolerate
/// concurrent calls.
pub trait Reporter: Send + Sync {
    /// Record a message that is already fully formatted.
    fn error(&self, msg: &str);

    /// Record a message from format arguments.
    ///
    /// The mock reports through this method. It stands for "fail the test"
    /// on harness-backed reporters.
    fn error_fmt(&self, args: fmt::Arguments<'_>) {
        self.error(&args.to_string());
    }
}

/// Reporter that writes every message to the process log at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn error(&self, msg: &str) {
        info!("{}", msg);
    }
}

/// Test-harness reporter that captures messages for later assertions.
///
/// Handler workers append concurrently; assertions run on the test thread so
/// a panic there fails the test.
#[derive(Debug, Default)]
pub struct CapturingReporter {
    inner: Mutex<Captured>,
}

#[derive(Debug, Default)]
struct Captured {
    errors: Vec<String>,
    failed: bool,
}

impl CapturingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured messages in arrival order.
    pub fn errors(&self) -> Vec<String> {
        self.inner.lock().errors.clone()
    }

    /// Whether `error_fmt` was called at least once.
    pub fn failed(&self) -> bool {
        self.inner.lock().failed
    }

    pub fn contains(&self, expected: &str) -> bool {
        self.inner.lock().errors.iter().any(|e| e == expected)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.errors.clear();
        inner.failed = false;
    }

    /// Panic unless every expected message was captured verbatim.
    pub fn assert_reported(&self, expected: &[&str]) {
        let captured = self.errors();
        for message in expected {
            assert!(
                captured.iter().any(|e| e == message),
                "Expected error message '{message}' not found in captured errors: {captured:?}"
            );
        }
    }

    /// Panic if anything was reported.
    pub fn assert_clean(&self) {
        let captured = self.errors();
        assert!(
            captured.is_empty(),
            "Expected no reported errors, got: {captured:?}"
        );
    }
}

impl Reporter for CapturingReporter {
    fn error(&self, msg: &str) {
        self.inner.lock().errors.push(msg.to_string());
    }

    fn error_fmt(&self, args: fmt::Arguments<'_>) {
        let mut inner = self.inner.lock();
        inner.errors.push(args.to_string());
        inner.failed = true;
    }
}
