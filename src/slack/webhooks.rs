//! Slack webhook endpoints and the route table that mounts them.

use std::sync::Arc;

use tracing::debug;

use crate::models::payload::{EventEnvelope, InteractionPayload, OptionsRequest};
use crate::routing::guard::Guarded;
use crate::routing::signature::SignatureVerifier;
use crate::routing::{Handler, HandlerFuture, PathRouter, WebhookRequest, WebhookResponse};
use crate::{AppError, Result};

use super::dispatch::Dispatcher;

/// Form field carrying the JSON payload of interactive requests.
pub const PAYLOAD_FIELD: &str = "payload";

fn payload_field(req: &WebhookRequest) -> Result<String> {
    req.form_field(PAYLOAD_FIELD)?
        .ok_or_else(|| AppError::Payload("no payload in the request".into()))
}

/// `/slack/interactive`: button, select and modal submissions.
pub struct InteractiveEndpoint {
    dispatcher: Arc<Dispatcher>,
}

impl Handler for InteractiveEndpoint {
    fn handle<'a>(&'a self, req: &'a WebhookRequest, _offset: usize) -> HandlerFuture<'a> {
        Box::pin(async move {
            let payload = InteractionPayload::parse(&payload_field(req)?)?;
            debug!(user = payload.user_id(), "interactive payload received");
            self.dispatcher.interaction(&payload).await?;
            Ok(WebhookResponse::ok())
        })
    }
}

/// `/slack/options-load`: external select suggestions.
pub struct OptionsLoadEndpoint {
    dispatcher: Arc<Dispatcher>,
}

impl Handler for OptionsLoadEndpoint {
    fn handle<'a>(&'a self, req: &'a WebhookRequest, _offset: usize) -> HandlerFuture<'a> {
        Box::pin(async move {
            let request = OptionsRequest::parse(&payload_field(req)?)?;
            let options = self.dispatcher.options(&request).await?;
            debug!(query = %request.value, matches = options.options.len(), "options served");
            WebhookResponse::json(&options)
        })
    }
}

/// `/slack/actions`: Events API callbacks.
pub struct EventsEndpoint {
    dispatcher: Arc<Dispatcher>,
}

impl Handler for EventsEndpoint {
    fn handle<'a>(&'a self, req: &'a WebhookRequest, _offset: usize) -> HandlerFuture<'a> {
        Box::pin(async move {
            let envelope = EventEnvelope::parse(&req.body)?;
            self.dispatcher.event(envelope).await
        })
    }
}

/// Route table of the webhook surface.
///
/// Everything below `/slack` sits behind `verifier`.
#[must_use]
pub fn build_router(dispatcher: Arc<Dispatcher>, verifier: SignatureVerifier) -> PathRouter {
    let slack = PathRouter::new()
        .route(
            "/interactive",
            InteractiveEndpoint {
                dispatcher: Arc::clone(&dispatcher),
            },
        )
        .route(
            "/options-load",
            OptionsLoadEndpoint {
                dispatcher: Arc::clone(&dispatcher),
            },
        )
        .route("/actions", EventsEndpoint { dispatcher });

    PathRouter::new().route("/slack", Guarded::new(verifier, slack))
}
