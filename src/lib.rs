//! HTTP process skeleton for the mail sender service.
//!
//! Serves a business port's routes over HTTP/1.1 and shuts down gracefully,
//! within a bounded grace period, when the process is asked to terminate.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod ports;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::LifecycleContext;
pub use ports::BusinessPort;
