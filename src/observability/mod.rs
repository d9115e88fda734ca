//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events and spans)
//!     → metrics.rs (counters, gauges)
//!
//! Per-request context:
//!     http::middleware::logger attaches a request span
//!     → every downstream event carries request_id, method, path
//! ```
//!
//! # Design Decisions
//! - Logging is configured once in main, before the core starts
//! - Request ID flows through every record emitted while serving a request
//! - Metrics are cheap (atomic increments) and exporter-agnostic

pub mod logging;
pub mod metrics;
