//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → cancel LifecycleContext
//!
//! Startup (startup.rs):
//!     Build server → Start (non-blocking) → wait for LifecycleContext → Stop(grace)
//!
//! Shutdown (shutdown.rs):
//!     First stop call runs the sequence → later calls share its result
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has a deadline: connections are forced closed when it elapses
//! - Shutdown runs exactly once

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::StopGuard;
pub use signals::LifecycleContext;
pub use startup::{run, ShutdownReport};
