//! Minimal prefix router for the Slack webhook surface.
//!
//! Requests are converted from axum into a transport-neutral
//! [`WebhookRequest`] so that routing, the signature guard and the
//! endpoints can be exercised without a listener.

pub mod guard;
pub mod signature;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::{AppError, Result};

/// Body returned when no route matches.
pub const NOT_FOUND_BODY: &str = "ruta no encontrada";

/// Inbound webhook as seen by handlers.
#[derive(Debug, Clone, Default)]
pub struct WebhookRequest {
    /// HTTP method, upper case.
    pub method: String,
    /// Request path without query string.
    pub path: String,
    /// Full request URL when known; used only for error reports.
    pub url: Option<String>,
    headers: HashMap<String, String>,
    /// Raw body bytes. Signature verification needs them unmodified.
    pub body: Vec<u8>,
}

impl WebhookRequest {
    /// Request with no headers and an empty body.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Add a header. Names are case-insensitive.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Replace the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Record the full URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// All headers, lower-cased names.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Body decoded as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Payload` when the body is not valid UTF-8.
    pub fn body_text(&self) -> Result<&str> {
        std::str::from_utf8(&self.body)
            .map_err(|err| AppError::Payload(format!("body is not utf-8: {err}")))
    }

    /// Value of a field in an `application/x-www-form-urlencoded` body.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Payload` when the body is not form-encoded.
    pub fn form_field(&self, name: &str) -> Result<Option<String>> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&self.body)
            .map_err(|err| AppError::Payload(format!("invalid form body: {err}")))?;
        Ok(pairs
            .into_iter()
            .find_map(|(key, value)| (key == name).then_some(value)))
    }
}

/// Outbound response produced by handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
    /// `Content-Type` header value.
    pub content_type: &'static str,
}

impl WebhookResponse {
    /// Empty `200 OK`.
    #[must_use]
    pub fn ok() -> Self {
        Self::text(200, "")
    }

    /// Plain-text response.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            content_type: "text/plain; charset=utf-8",
        }
    }

    /// `200 OK` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Payload` if `value` cannot be serialized.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self {
            status: 200,
            body: serde_json::to_string(value)?,
            content_type: "application/json",
        })
    }

    /// `404` for unmatched paths.
    #[must_use]
    pub fn not_found() -> Self {
        Self::text(404, NOT_FOUND_BODY)
    }
}

/// Boxed future returned by [`Handler::handle`].
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<WebhookResponse>> + Send + 'a>>;

/// Anything that can answer a webhook.
///
/// `offset` is the byte position in `req.path` up to which enclosing
/// routers have already matched.
pub trait Handler: Send + Sync {
    /// Produce a response or a fatal error.
    fn handle<'a>(&'a self, req: &'a WebhookRequest, offset: usize) -> HandlerFuture<'a>;
}

/// Ordered list of `(prefix, handler)`; first match wins.
#[derive(Default)]
pub struct PathRouter {
    routes: Vec<(String, Box<dyn Handler>)>,
}

impl PathRouter {
    /// Router with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route. Earlier routes take precedence.
    #[must_use]
    pub fn route(mut self, prefix: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.routes.push((prefix.into(), Box::new(handler)));
        self
    }

    fn matching(&self, path: &str, offset: usize) -> Option<(usize, &dyn Handler)> {
        let rest = path.get(offset..)?;
        self.routes
            .iter()
            .find(|(prefix, _)| rest.starts_with(prefix.as_str()))
            .map(|(prefix, handler)| (offset + prefix.len(), handler.as_ref()))
    }
}

impl Handler for PathRouter {
    fn handle<'a>(&'a self, req: &'a WebhookRequest, offset: usize) -> HandlerFuture<'a> {
        Box::pin(async move {
            match self.matching(&req.path, offset) {
                Some((next, handler)) => handler.handle(req, next).await,
                None => Ok(WebhookResponse::not_found()),
            }
        })
    }
}
