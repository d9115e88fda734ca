//! Request-scoped logger injection.
//!
//! Every request gets a `request` span parented on the server's logger span.
//! The span is stored in the request extensions as a [`RequestLogger`] and the
//! rest of the stack runs inside it, so handlers log with the request's
//! context without threading a logger through their signatures.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use tower_http::request_id::RequestId;
use tracing::{field, Instrument, Span};

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Logger handle for the request being served.
#[derive(Debug, Clone)]
pub struct RequestLogger {
    request_id: Arc<str>,
    span: Span,
}

impl RequestLogger {
    pub fn new(request_id: impl Into<Arc<str>>, span: Span) -> Self {
        Self {
            request_id: request_id.into(),
            span,
        }
    }

    /// Logger for code running outside the middleware stack.
    pub fn detached() -> Self {
        Self::new("unknown", Span::current())
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Run `f` with the request span entered.
    pub fn in_scope<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.span.in_scope(f)
    }
}

impl<S> FromRequestParts<S> for RequestLogger
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestLogger>()
            .cloned()
            .unwrap_or_else(RequestLogger::detached))
    }
}

/// Attach a [`RequestLogger`] to the request and run the rest of the stack in its span.
pub async fn inject_logger(State(root): State<Span>, mut req: Request, next: Next) -> Response {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .or_else(|| req.headers().get(X_REQUEST_ID).and_then(|v| v.to_str().ok()))
        .unwrap_or("unknown")
        .to_owned();

    let span = tracing::info_span!(
        parent: &root,
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
        remote_addr = field::Empty,
    );
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        span.record("remote_addr", field::display(addr));
    }

    req.extensions_mut()
        .insert(RequestLogger::new(request_id, span.clone()));

    next.run(req).instrument(span).await
}
