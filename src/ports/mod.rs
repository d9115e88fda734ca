//! Business ports.
//!
//! The HTTP core never knows what the service does. A port hands the
//! dispatcher its routes; the dispatcher wraps them in the shared middleware
//! and the server adapter serves them.

use std::sync::Arc;

use axum::Router;

pub mod health;

pub use health::HealthPort;

/// Business capability served over HTTP.
///
/// The adapter holds the port by reference and never manages its lifecycle.
pub trait BusinessPort: Send + Sync + 'static {
    /// Routes this port serves. Called once, when the server is constructed.
    fn routes(self: Arc<Self>) -> Router;
}
