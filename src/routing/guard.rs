//! Precondition wrapper for handlers.

use tracing::warn;

use super::{Handler, HandlerFuture, WebhookRequest, WebhookResponse};

/// Prefix of the body returned when a precondition fails.
pub const REJECTION_PREFIX: &str = "prerequisites failed: ";

/// Check run before a guarded handler.
pub trait Precondition: Send + Sync {
    /// `Err(message)` rejects the request with that message.
    fn check(&self, req: &WebhookRequest) -> std::result::Result<(), String>;
}

/// Runs a [`Precondition`] before delegating to `inner`.
///
/// Rejections answer `400` and are not treated as errors, so they never
/// reach error reporting.
pub struct Guarded<P, H> {
    precondition: P,
    inner: H,
}

impl<P, H> Guarded<P, H> {
    /// Wrap `inner` behind `precondition`.
    pub fn new(precondition: P, inner: H) -> Self {
        Self {
            precondition,
            inner,
        }
    }
}

impl<P: Precondition, H: Handler> Handler for Guarded<P, H> {
    fn handle<'a>(&'a self, req: &'a WebhookRequest, offset: usize) -> HandlerFuture<'a> {
        Box::pin(async move {
            if let Err(message) = self.precondition.check(req) {
                warn!(path = %req.path, %message, "request rejected by precondition");
                return Ok(WebhookResponse::text(
                    400,
                    format!("{REJECTION_PREFIX}{message}"),
                ));
            }
            self.inner.handle(req, offset).await
        })
    }
}
