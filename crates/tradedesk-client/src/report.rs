//! Developer-facing error reporting
//!
//! In non-production builds every classified error is also handed to an
//! [`ErrorReporter`] (a debug panel, a log sink, a test probe). Reporting is
//! best-effort: a panicking reporter is contained and the original error
//! still reaches the caller.

use serde::Serialize;
use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};
use tracing::warn;

use crate::error::ApiError;

/// One reported failure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub message: String,
    pub status: u16,
    pub endpoint: String,
    pub context: ReportContext,
}

/// Request details attached to a report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportContext {
    pub method: String,
    pub url: String,
    /// Response body or validation diagnostics, when available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorReport {
    pub fn from_error(error: &ApiError, method: &str, endpoint: &str, url: &str) -> Self {
        Self {
            message: error.to_string(),
            status: error.status(),
            endpoint: endpoint.to_string(),
            context: ReportContext {
                method: method.to_string(),
                url: url.to_string(),
                data: error.data(),
            },
        }
    }
}

/// Receiver for classified errors
pub trait ErrorReporter: Send + Sync {
    fn report(&self, report: &ErrorReport);
}

/// Logs every report at warn level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, report: &ErrorReport) {
        warn!(
            status = report.status,
            endpoint = %report.endpoint,
            method = %report.context.method,
            url = %report.context.url,
            "API request failed: {}",
            report.message
        );
    }
}

/// Keeps reports in memory, newest last
#[derive(Debug, Clone, Default)]
pub struct MemoryReporter {
    reports: Arc<Mutex<Vec<ErrorReport>>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<ErrorReport> {
        self.reports.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.clear();
        }
    }
}

impl ErrorReporter for MemoryReporter {
    fn report(&self, report: &ErrorReport) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(report.clone());
        }
    }
}

/// Hand `report` to `reporter`, containing any panic it raises
pub fn report_safely(reporter: &dyn ErrorReporter, report: &ErrorReport) {
    if catch_unwind(AssertUnwindSafe(|| reporter.report(report))).is_err() {
        warn!("Error reporter panicked while reporting {}", report.endpoint);
    }
}
