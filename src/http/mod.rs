//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted TCP connection
//!     → server.rs (hyper HTTP/1.1 connection, graceful-shutdown watcher)
//!     → router.rs (middleware stack around the business port's routes)
//!     → middleware/ (request ID, request logger, access log, panic recovery)
//!     → business port handler
//!     → Send to client
//! ```

pub mod middleware;
pub mod router;
pub mod server;

pub use middleware::{RequestFault, RequestLogger, X_REQUEST_ID};
pub use server::{HttpServer, Phase, ServeFault, ServeMonitor, ServerError, ShutdownError};
