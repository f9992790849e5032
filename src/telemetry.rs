//! Error reporting to a Sentry-compatible store endpoint.
//!
//! Reporting never fails the caller: every attempt is logged and the final
//! failure is swallowed.

use std::backtrace::Backtrace;
use std::future::Future;
use std::pin::Pin;

use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::{debug, error, warn};

use crate::errors::ErrorCategory;
use crate::routing::signature::SIGNATURE_HEADER;
use crate::routing::WebhookRequest;
use crate::{AppError, GlobalConfig};

/// Application name used in tags, client id and server name.
pub const APP_NAME: &str = "excels-autobot";

/// Boxed future returned by [`ErrorReporter::report`].
pub type ReportFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Request context attached to a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    /// HTTP method.
    pub method: String,
    /// Full URL, or the path when the URL is unknown.
    pub url: String,
    /// Headers with credentials redacted.
    pub headers: Vec<(String, String)>,
    /// Raw body text, when the body was utf-8 and non-empty.
    pub body: Option<String>,
}

impl RequestMeta {
    /// Capture `req`, redacting the signature header.
    #[must_use]
    pub fn from_request(req: &WebhookRequest) -> Self {
        let mut headers: Vec<(String, String)> = req
            .headers()
            .map(|(name, value)| {
                let value = if name == SIGNATURE_HEADER {
                    "[redacted]"
                } else {
                    value
                };
                (name.to_owned(), value.to_owned())
            })
            .collect();
        headers.sort();
        Self {
            method: req.method.clone(),
            url: req.url.clone().unwrap_or_else(|| req.path.clone()),
            headers,
            body: req
                .body_text()
                .ok()
                .filter(|text| !text.is_empty())
                .map(str::to_owned),
        }
    }
}

/// One resolved stack frame of a captured backtrace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Demangled symbol, `<unknown>` when unresolved.
    pub function: String,
    /// Source file, when debug info is available.
    pub filename: Option<String>,
    /// Line in `filename`.
    pub lineno: Option<u32>,
}

impl StackFrame {
    fn in_app(&self) -> bool {
        self.function.starts_with("excels_autobot::")
    }

    fn to_json(&self) -> Value {
        json!({
            "function": self.function,
            "filename": self.filename,
            "lineno": self.lineno,
            "in_app": self.in_app(),
        })
    }
}

/// Frames of a rendered [`Backtrace`], innermost first.
///
/// The rendering is `N: symbol` lines, each optionally followed by an
/// `at file:line:col` line. Frames of the capture machinery are dropped.
#[must_use]
pub fn parse_backtrace(rendered: &str) -> Vec<StackFrame> {
    let mut frames: Vec<StackFrame> = Vec::new();
    for line in rendered.lines().map(str::trim) {
        if let Some(location) = line.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                let mut parts = location.rsplitn(3, ':');
                let (_column, lineno, file) = (parts.next(), parts.next(), parts.next());
                if let (Some(file), Some(lineno)) = (file, lineno.and_then(|l| l.parse().ok())) {
                    frame.filename = Some(file.to_owned());
                    frame.lineno = Some(lineno);
                }
            }
        } else if let Some((index, function)) = line.split_once(": ") {
            if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) {
                frames.push(StackFrame {
                    function: function.to_owned(),
                    filename: None,
                    lineno: None,
                });
            }
        }
    }
    frames.retain(|frame| {
        !frame.function.starts_with("std::backtrace")
            && !frame.function.starts_with("excels_autobot::telemetry::")
    });
    frames
}

/// Owned snapshot of a failure, detached from the request lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    /// [`AppError::kind`] of the failure.
    pub kind: &'static str,
    /// Rendered error.
    pub message: String,
    /// Rendered source chain, outermost first.
    pub chain: Vec<String>,
    /// Classification of the failure.
    pub category: ErrorCategory,
    /// Request being handled, when any.
    pub request: Option<RequestMeta>,
    /// Stack at the point the failure was reported, innermost first.
    pub frames: Vec<StackFrame>,
}

impl ErrorReport {
    /// Snapshot `err` and the request it happened in.
    #[must_use]
    pub fn new(err: &AppError, request: Option<RequestMeta>) -> Self {
        let mut chain = vec![err.to_string()];
        let mut source = std::error::Error::source(err);
        while let Some(inner) = source {
            chain.push(inner.to_string());
            source = inner.source();
        }
        Self {
            kind: err.kind(),
            message: err.to_string(),
            chain,
            category: err.category(),
            request,
            frames: parse_backtrace(&Backtrace::force_capture().to_string()),
        }
    }

    fn category_tag(&self) -> &'static str {
        match self.category {
            ErrorCategory::ClientInput => "client_input",
            ErrorCategory::Upstream { outage: true } => "upstream_outage",
            ErrorCategory::Upstream { outage: false } => "upstream_rejected",
            ErrorCategory::Internal => "internal",
        }
    }

    fn level(&self) -> &'static str {
        match self.category {
            ErrorCategory::Upstream { outage: true } => "warning",
            _ => "error",
        }
    }
}

/// Sink for failures that escaped request handling.
pub trait ErrorReporter: Send + Sync {
    /// Deliver `report`. Never fails.
    fn report(&self, report: ErrorReport) -> ReportFuture<'_>;
}

/// Reporter used when telemetry is disabled; only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ErrorReporter for NoopReporter {
    fn report(&self, report: ErrorReport) -> ReportFuture<'_> {
        Box::pin(async move {
            debug!(kind = report.kind, "telemetry disabled, report dropped");
        })
    }
}

/// Posts store events with a bounded number of retries.
#[derive(Clone)]
pub struct SentryReporter {
    http: Client,
    store_url: String,
    auth_header: String,
    retries: u32,
    environment: String,
    release: String,
}

impl std::fmt::Debug for SentryReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentryReporter")
            .field("store_url", &self.store_url)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

impl SentryReporter {
    /// Reporter configured from `[telemetry]`.
    #[must_use]
    pub fn new(config: &GlobalConfig) -> Self {
        let telemetry = &config.telemetry;
        Self {
            http: Client::new(),
            store_url: format!(
                "{}/api/{}/store/",
                telemetry.endpoint.trim_end_matches('/'),
                telemetry.project_id
            ),
            auth_header: format!(
                "Sentry sentry_version=7, sentry_client={APP_NAME}/{}, sentry_key={}",
                env!("CARGO_PKG_VERSION"),
                telemetry.key
            ),
            retries: telemetry.retries,
            environment: config.environment.clone(),
            release: config.release(),
        }
    }

    /// Store event body for `report`.
    #[must_use]
    pub fn event(&self, report: &ErrorReport) -> Value {
        // Sentry lists frames oldest call first.
        let frames: Vec<Value> = report.frames.iter().rev().map(StackFrame::to_json).collect();
        let values: Vec<Value> = report
            .chain
            .iter()
            .enumerate()
            .map(|(depth, text)| {
                if depth == 0 {
                    json!({
                        "type": report.kind,
                        "value": text,
                        "stacktrace": { "frames": frames },
                    })
                } else {
                    json!({ "type": "Source", "value": text })
                }
            })
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let timestamp = Utc::now().timestamp_millis() as f64 / 1000.0;

        let mut event = json!({
            "event_id": uuid::Uuid::new_v4().simple().to_string(),
            "message": format!("{}: {}", report.kind, report.message),
            "exception": { "values": values },
            "tags": { "app": APP_NAME, "category": report.category_tag() },
            "level": report.level(),
            "platform": "other",
            "environment": self.environment,
            "server_name": format!("{APP_NAME}-{}", self.environment),
            "timestamp": timestamp,
            "release": self.release,
            "extra": { "kind": report.kind, "source_chain": report.chain },
        });
        if let (Some(request), Some(object)) = (&report.request, event.as_object_mut()) {
            let headers: Map<String, Value> = request
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), Value::String(value.clone())))
                .collect();
            object.insert(
                "request".into(),
                json!({
                    "method": request.method,
                    "url": request.url,
                    "headers": headers,
                    "data": request.body,
                }),
            );
        }
        event
    }

    async fn send_once(&self, body: &Value) -> std::result::Result<(), String> {
        let response = self
            .http
            .post(&self.store_url)
            .header("X-Sentry-Auth", &self.auth_header)
            .json(body)
            .send()
            .await
            .map_err(|err| err.to_string())?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(format!("status {}: {text}", status.as_u16()))
    }
}

impl ErrorReporter for SentryReporter {
    fn report(&self, report: ErrorReport) -> ReportFuture<'_> {
        Box::pin(async move {
            let body = self.event(&report);
            for attempt in 0..=self.retries {
                match self.send_once(&body).await {
                    Ok(()) => {
                        debug!(kind = report.kind, attempt, "error report delivered");
                        return;
                    }
                    Err(reason) => {
                        warn!(kind = report.kind, attempt, %reason, "error report attempt failed");
                    }
                }
            }
            error!(
                kind = report.kind,
                attempts = self.retries + 1,
                "giving up on error report"
            );
        })
    }
}
