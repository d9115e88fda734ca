//! Panic recovery.
//!
//! A panicking handler must cost exactly one request: the panic is caught,
//! logged with its backtrace and the request context, and answered with a
//! bare `500`. The connection and every other request keep going.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;

use crate::observability::metrics;

thread_local! {
    // Filled by the panic hook on the panicking thread and drained by
    // `recover`, which catches the unwind on that same thread.
    static LAST_BACKTRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static BACKTRACE_HOOK: Once = Once::new();

/// Chain a panic hook that records the panicking thread's backtrace.
///
/// Installed once per process; the previous hook still runs.
pub fn install_backtrace_hook() {
    BACKTRACE_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            LAST_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(Backtrace::force_capture()));
            previous(info);
        }));
    });
}

/// A handler panic caught while serving one request.
///
/// Attached to the extensions of the generated `500` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFault {
    message: String,
}

impl RequestFault {
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Convert a panic anywhere downstream into a `500` for this request only.
pub async fn recover(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            let fault = RequestFault {
                message: panic_message(payload.as_ref()),
            };
            let backtrace = LAST_BACKTRACE
                .with(|slot| slot.borrow_mut().take())
                .map(|bt| bt.to_string())
                .unwrap_or_default();

            tracing::error!(
                method = %method,
                path = %path,
                panic = %fault.message,
                backtrace = %backtrace,
                "Request handler panicked"
            );
            metrics::record_request_panic();

            let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
            response.extensions_mut().insert(fault);
            response
        }
    }
}
