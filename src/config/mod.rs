//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment (HTTP_PORT, LOG_FORMAT)
//!     → loader.rs (parse, overlay on defaults)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is created once at startup and never mutated
//! - All fields have defaults so an empty environment is a valid one
//! - The loader takes a lookup function; tests never touch the real environment

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::{AppConfig, HttpConfig, LogFormat, LoggingConfig};
pub use validation::ValidationError;
