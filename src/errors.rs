//! Error types shared across the application.

use std::fmt::{Display, Formatter};

use slack_morphism::errors::SlackClientError;

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Inbound webhook body is missing, malformed, or carries unusable ids.
    Payload(String),
    /// Event-callback or envelope type this service does not handle.
    UnrecognizedEvent(String),
    /// Block action or options-load request with an unknown `action_id`.
    UnknownAction(String),
    /// A Slack user reached a linked-only flow without a stored link.
    MissingIdentity(String),
    /// An external HTTP API answered with a non-success status.
    Upstream {
        /// Which collaborator failed (`record store`, `telemetry`, ...).
        service: &'static str,
        /// HTTP status, `None` when the request never got a response.
        status: Option<u16>,
        /// Raw response body text (or transport error text).
        body: String,
    },
    /// Slack Web API failure.
    Slack {
        /// HTTP status Slack answered with, `None` when no response arrived.
        status: Option<u16>,
        /// Failed operation and Slack's error text.
        message: String,
    },
    /// Key-value store failure or unreadable stored value.
    Kv(String),
    /// File-system or I/O operation failure.
    Io(String),
}

/// Coarse classification used for telemetry tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The inbound request itself was unusable.
    ClientInput,
    /// A collaborator failed. `outage` distinguishes their 5xx/transport
    /// failures from 4xx answers to a request we built wrong.
    Upstream {
        /// `true` for 5xx or no response at all.
        outage: bool,
    },
    /// Anything local: config, storage, I/O.
    Internal,
}

impl AppError {
    /// Short, stable name of the error kind.
    ///
    /// This is the only detail surfaced in a 500 response body.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "ConfigError",
            Self::Payload(_) => "PayloadError",
            Self::UnrecognizedEvent(_) => "UnrecognizedEvent",
            Self::UnknownAction(_) => "UnknownAction",
            Self::MissingIdentity(_) => "MissingIdentity",
            Self::Upstream { .. } => "UpstreamError",
            Self::Slack { .. } => "SlackError",
            Self::Kv(_) => "KvError",
            Self::Io(_) => "IoError",
        }
    }

    /// Classify the error for reporting.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Payload(_)
            | Self::UnrecognizedEvent(_)
            | Self::UnknownAction(_)
            | Self::MissingIdentity(_) => ErrorCategory::ClientInput,
            Self::Upstream { status, .. } | Self::Slack { status, .. } => {
                ErrorCategory::Upstream {
                    outage: status.map_or(true, |code| code >= 500),
                }
            }
            Self::Config(_) | Self::Kv(_) | Self::Io(_) => ErrorCategory::Internal,
        }
    }

    /// Build an upstream error from a non-success response.
    pub fn upstream(service: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            status: Some(status),
            body: body.into(),
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Payload(msg) => write!(f, "payload: {msg}"),
            Self::UnrecognizedEvent(msg) => write!(f, "unrecognized event: {msg}"),
            Self::UnknownAction(msg) => write!(f, "unknown action: {msg}"),
            Self::MissingIdentity(msg) => write!(f, "missing identity: {msg}"),
            Self::Upstream {
                service,
                status: Some(status),
                body,
            } => write!(f, "{service} responded {status}: {body}"),
            Self::Upstream {
                service,
                status: None,
                body,
            } => write!(f, "{service} unreachable: {body}"),
            Self::Slack { message, .. } => write!(f, "slack: {message}"),
            Self::Kv(msg) => write!(f, "kv: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Wrap a slack-morphism failure of `operation`, keeping the HTTP status.
    ///
    /// API-level rejections (`ok: false`) and undecodable bodies arrive in a
    /// 200 response; connection failures carry no status.
    #[must_use]
    pub fn slack(operation: &str, err: &SlackClientError) -> Self {
        let status = match err {
            SlackClientError::HttpError(http) => Some(http.status_code.as_u16()),
            SlackClientError::RateLimitError(_) => Some(429),
            SlackClientError::ApiError(_)
            | SlackClientError::ProtocolError(_)
            | SlackClientError::SocketModeProtocolError(_) => Some(200),
            SlackClientError::HttpProtocolError(_)
            | SlackClientError::EndOfStream(_)
            | SlackClientError::SystemError(_) => None,
        };
        Self::Slack {
            status,
            message: format!("failed to {operation}: {err}"),
        }
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Kv(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Payload(format!("invalid json: {err}"))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upstream {
            service: "http",
            status: err.status().map(|status| status.as_u16()),
            body: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
