//! Shared capabilities and the HTTP listener.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::clock::{Clock, SystemClock};
use crate::config::{KvBackend, ReportMode};
use crate::persistence::db;
use crate::persistence::kv::{KvStore, MemoryKvStore, SqliteKvStore};
use crate::persistence::user_links::UserLinks;
use crate::records::airtable::AirtableClient;
use crate::records::RecordGateway;
use crate::routing::signature::SignatureVerifier;
use crate::routing::{Handler, PathRouter, WebhookRequest, WebhookResponse};
use crate::slack::client::{ChatApi, SlackService};
use crate::slack::dispatch::Dispatcher;
use crate::slack::webhooks;
use crate::telemetry::{ErrorReport, ErrorReporter, NoopReporter, RequestMeta, SentryReporter};
use crate::{AppError, GlobalConfig, Result};

/// Capability bundle handed to every component.
pub struct AppState {
    /// Global configuration (immutable after startup).
    pub config: Arc<GlobalConfig>,
    /// User links and announcement.
    pub links: UserLinks,
    /// Record-store operations.
    pub records: RecordGateway,
    /// Slack Web API.
    pub chat: Arc<dyn ChatApi>,
    /// Source of "now".
    pub clock: Arc<dyn Clock>,
    /// Error telemetry.
    pub reporter: Arc<dyn ErrorReporter>,
}

impl AppState {
    /// Wire production collaborators from `config`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Kv` if the database cannot be opened, or
    /// `AppError::Config` if the Slack connector or record-store URL is
    /// unusable.
    pub async fn from_config(config: Arc<GlobalConfig>) -> Result<Self> {
        let kv: Arc<dyn KvStore> = match config.kv.backend {
            KvBackend::Sqlite => Arc::new(SqliteKvStore::new(
                db::connect(&config.kv.database_url).await?,
            )),
            KvBackend::Memory => Arc::new(MemoryKvStore::new()),
        };
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let records = RecordGateway::new(
            Arc::new(AirtableClient::new(&config.record_store)?),
            Arc::clone(&clock),
        );
        let reporter: Arc<dyn ErrorReporter> = if config.telemetry.enabled {
            Arc::new(SentryReporter::new(&config))
        } else {
            Arc::new(NoopReporter)
        };

        Ok(Self {
            links: UserLinks::new(kv),
            records,
            chat: Arc::new(SlackService::new(&config.slack)?),
            clock,
            reporter,
            config,
        })
    }
}

/// Top-level request handler: routing plus error reporting.
pub struct WebhookServer {
    router: PathRouter,
    reporter: Arc<dyn ErrorReporter>,
    mode: ReportMode,
}

impl WebhookServer {
    /// Build the route table over `state`.
    #[must_use]
    pub fn new(state: Arc<AppState>) -> Self {
        let verifier = if state.config.slack.verify_signatures {
            SignatureVerifier::new(state.config.slack.signing_secret.clone())
        } else {
            SignatureVerifier::disabled()
        };
        let reporter = Arc::clone(&state.reporter);
        let mode = state.config.telemetry.mode;
        let dispatcher = Arc::new(Dispatcher::new(state));
        Self {
            router: webhooks::build_router(dispatcher, verifier),
            reporter,
            mode,
        }
    }

    /// Answer `req`. Errors become a 500 whose body is the error kind.
    pub async fn handle(&self, req: &WebhookRequest) -> WebhookResponse {
        let err = match self.router.handle(req, 0).await {
            Ok(response) => return response,
            Err(err) => err,
        };

        error!(path = %req.path, kind = err.kind(), %err, "request failed");
        let report = ErrorReport::new(&err, Some(RequestMeta::from_request(req)));
        match self.mode {
            ReportMode::Background => {
                let reporter = Arc::clone(&self.reporter);
                tokio::spawn(async move { reporter.report(report).await });
            }
            ReportMode::Inline => self.reporter.report(report).await,
        }
        WebhookResponse::text(500, err.kind())
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn webhook(
    State(server): State<Arc<WebhookServer>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut req = WebhookRequest::new(method.as_str(), uri.path())
        .with_url(uri.to_string())
        .with_body(body.to_vec());
    for (name, value) in &headers {
        if let Ok(value) = value.to_str() {
            req = req.with_header(name.as_str(), value);
        }
    }

    let response = server.handle(&req).await;
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, response.content_type)],
        response.body,
    )
        .into_response()
}

/// axum router: `/health` plus everything else through [`WebhookServer`].
pub fn app(server: Arc<WebhookServer>) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(webhook)
        .with_state(server)
}

/// Serve webhooks on `config.http_port` until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the listener fails to bind or serve.
pub async fn serve(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let bind = SocketAddr::from(([0, 0, 0, 0], state.config.http_port));
    let server = Arc::new(WebhookServer::new(state));

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind webhook listener on {bind}: {err}")))?;

    info!(%bind, "webhook listener started");

    axum::serve(listener, app(server))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Config(format!("webhook server error: {err}")))?;

    info!("webhook listener shut down");
    Ok(())
}
