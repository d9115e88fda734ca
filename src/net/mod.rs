//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, accept, connection limits)
//!     → connection.rs (ID, lifetime tracking, write deadline)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bind failures are fatal and never retried
//! - Bounded accept prevents resource exhaustion
//! - Each connection is tracked so a forced shutdown can report what it closed

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker, WriteTimeout};
pub use listener::{Accept, AcceptBackoff, AcceptError, Accepted, BindError, ConnectionPermit, Listener};
