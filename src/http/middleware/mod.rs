//! Cross-cutting request middleware.
//!
//! Applied by `http::router`, outermost first:
//! ```text
//! request ID → logger.rs (request span) → access log → recover.rs → routes
//! ```

pub mod logger;
pub mod recover;

pub use logger::{inject_logger, RequestLogger, X_REQUEST_ID};
pub use recover::{install_backtrace_hook, recover, RequestFault};
