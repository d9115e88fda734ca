//! Request dispatcher.
//!
//! Wraps the business port's routes in the shared middleware stack. Layer
//! order (outermost first):
//! 1. `x-request-id` assignment and propagation to the response
//! 2. request logger injection
//! 3. access log
//! 4. panic recovery

use std::sync::Arc;

use axum::{middleware, Router};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, Span};

use crate::http::middleware::{inject_logger, install_backtrace_hook, recover};
use crate::ports::BusinessPort;

/// Build the dispatcher for `port`, logging under `logger`.
pub fn build(port: Arc<dyn BusinessPort>, logger: Span) -> Router {
    install_backtrace_hook();

    port.routes().layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(middleware::from_fn_with_state(logger, inject_logger))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
            .layer(middleware::from_fn(recover)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::StatusCode;
    use axum::routing::get;
    use tower::ServiceExt;

    use crate::http::middleware::{RequestFault, RequestLogger, X_REQUEST_ID};

    struct Probe;

    impl BusinessPort for Probe {
        fn routes(self: Arc<Self>) -> Router {
            Router::new()
                .route("/ok", get(|| async { "ok" }))
                .route(
                    "/whoami",
                    get(|logger: RequestLogger| async move { logger.request_id().to_owned() }),
                )
                .route("/panic", get(explode))
        }
    }

    async fn explode() -> &'static str {
        panic!("handler exploded")
    }

    fn app() -> Router {
        build(Arc::new(Probe), Span::none())
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn assigns_request_id_and_exposes_it_to_handlers() {
        let response = app()
            .oneshot(Request::get("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let header = response
            .headers()
            .get(X_REQUEST_ID)
            .expect("request id propagated")
            .to_str()
            .unwrap()
            .to_owned();
        assert_eq!(body_text(response).await, header);
        assert_ne!(header, "unknown");
    }

    #[tokio::test]
    async fn keeps_inbound_request_id() {
        let response = app()
            .oneshot(
                Request::get("/whoami")
                    .header(X_REQUEST_ID, "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[X_REQUEST_ID], "req-42");
        assert_eq!(body_text(response).await, "req-42");
    }

    #[tokio::test]
    async fn panic_becomes_500_and_router_keeps_working() {
        let app = app();

        let response = app
            .clone()
            .oneshot(Request::get("/panic").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let fault = response.extensions().get::<RequestFault>().cloned();
        assert_eq!(fault.map(|f| f.message().to_owned()).as_deref(), Some("handler exploded"));
        assert!(response.headers().contains_key(X_REQUEST_ID));

        let response = app
            .oneshot(Request::get("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");
    }
}
