//! Logging utilities for the CapEx planner.
//!
//! Provides structured logging (pretty or JSON) with trace IDs for
//! correlating HTTP requests with pipeline runs.
//!
//! # Noise Filtering
//!
//! Noisy library modules (hyper, h2, tower_http) are set to `warn` so that
//! pipeline logs stay readable at the configured level.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Default noisy modules that should be filtered to warn level.
pub const NOISY_MODULES: &[&str] = &["hyper", "hyper_util", "h2", "tower_http", "tokio_util"];

/// Header used to propagate trace IDs.
pub const TRACE_HEADER: &str = "X-Trace-Id";

/// Build the default EnvFilter with noise suppression.
fn build_filter(log_level: &str) -> EnvFilter {
    // RUST_LOG wins when set
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let mut directives = String::from(log_level);
    for module in NOISY_MODULES {
        directives.push_str(&format!(",{}=warn", module));
    }

    EnvFilter::new(&directives)
}

/// Initialize logging with the given configuration.
///
/// # Arguments
///
/// * `log_level` - Base log level (trace, debug, info, warn, error)
/// * `log_format` - Output format: "json" for structured JSON, anything else for pretty
pub fn init_logging(log_level: &str, log_format: &str) {
    let filter = build_filter(log_level);
    let subscriber = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);
        let _ = subscriber.with(fmt_layer).try_init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(true)
            .with_file(false)
            .with_line_number(false);
        let _ = subscriber.with(fmt_layer).try_init();
    }

    tracing::info!(
        log_level = %log_level,
        log_format = %log_format,
        noise_filtered = NOISY_MODULES.len(),
        "Logging initialized"
    );
}

/// Initialize compact logging on stderr, leaving stdout for command output.
pub fn init_stderr_logging(log_level: &str) {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();
    let _ = tracing_subscriber::registry()
        .with(build_filter(log_level))
        .with(fmt_layer)
        .try_init();
}

/// Generate a new trace ID for request tracing.
pub fn generate_trace_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Generate a new pipeline run ID.
pub fn generate_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================================
// Request Context
// ============================================================================

/// Trace context for one HTTP request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Trace ID for the request chain
    pub trace_id: String,
    /// Service name
    pub service: String,
}

impl RequestContext {
    /// Create a new request context.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            trace_id: generate_trace_id(),
            service: service.into(),
        }
    }

    /// Create context from HTTP headers, reusing an incoming trace ID.
    pub fn from_headers(headers: &http::HeaderMap, service: impl Into<String>) -> Self {
        let trace_id = headers
            .get(TRACE_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(String::from)
            .unwrap_or_else(generate_trace_id);

        Self {
            trace_id,
            service: service.into(),
        }
    }

    /// Add the trace ID to outgoing headers.
    pub fn to_headers(&self, headers: &mut http::HeaderMap) {
        if let Ok(trace_id) = self.trace_id.parse() {
            headers.insert(TRACE_HEADER, trace_id);
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new("unknown")
    }
}

// ============================================================================
// Run Metrics
// ============================================================================

/// Counters for pipeline runs.
#[derive(Debug, Default, Clone)]
pub struct RunMetrics {
    inner: Arc<RwLock<RunMetricsInner>>,
}

#[derive(Debug, Default)]
struct RunMetricsInner {
    run_count: u64,
    failure_count: u64,
    total_duration_ms: u64,
}

impl RunMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished run.
    pub async fn record_run(&self, duration_ms: u64, success: bool) {
        let mut inner = self.inner.write().await;
        inner.run_count += 1;
        inner.total_duration_ms += duration_ms;
        if !success {
            inner.failure_count += 1;
        }
    }

    /// Get current metrics summary.
    pub async fn summary(&self) -> RunMetricsSummary {
        let inner = self.inner.read().await;
        RunMetricsSummary {
            run_count: inner.run_count,
            failure_count: inner.failure_count,
            avg_duration_ms: if inner.run_count > 0 {
                inner.total_duration_ms / inner.run_count
            } else {
                0
            },
        }
    }
}

/// Metrics summary for reporting.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunMetricsSummary {
    pub run_count: u64,
    pub failure_count: u64,
    pub avg_duration_ms: u64,
}

// ============================================================================
// Logging Macros
// ============================================================================

/// Create a tracing span for one pipeline run.
///
/// # Example
///
/// ```ignore
/// let span = run_span!(run_id, trace_id = %ctx.trace_id);
/// let _enter = span.enter();
/// ```
#[macro_export]
macro_rules! run_span {
    ($run_id:expr) => {
        tracing::info_span!("pipeline_run", run_id = %$run_id)
    };
    ($run_id:expr, $($field:tt)*) => {
        tracing::info_span!("pipeline_run", run_id = %$run_id, $($field)*)
    };
}
