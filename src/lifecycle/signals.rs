//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for SIGTERM and SIGINT
//! - Translate the first one into cancellation of the [`LifecycleContext`]
//!
//! # Design Decisions
//! - The context is created once in `main` and passed explicitly; there is no
//!   process-global shutdown state
//! - Cancellation is one-way: a cancelled context is never reset

use std::io;

use tokio_util::sync::CancellationToken;

/// "Termination requested" token for the whole process.
///
/// Transitions from live to cancelled exactly once.
#[derive(Debug, Clone, Default)]
pub struct LifecycleContext {
    token: CancellationToken,
}

impl LifecycleContext {
    /// Create a live context that is only cancelled through [`LifecycleContext::cancel`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context cancelled by the first SIGTERM or SIGINT.
    ///
    /// Handlers are registered before this returns, so a registration failure
    /// is reported to the caller rather than lost in a background task. Must
    /// be called from within a Tokio runtime.
    pub fn from_signals() -> io::Result<Self> {
        let ctx = Self::new();
        let waiter = TerminationSignals::register()?;
        let token = ctx.token.clone();
        tokio::spawn(async move {
            let name = waiter.recv().await;
            tracing::info!(signal = name, "Termination signal received");
            token.cancel();
        });
        Ok(ctx)
    }

    /// Request termination. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until termination has been requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

#[cfg(unix)]
struct TerminationSignals {
    terminate: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl TerminationSignals {
    fn register() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.interrupt.recv() => "SIGINT",
        }
    }
}

#[cfg(not(unix))]
struct TerminationSignals;

#[cfg(not(unix))]
impl TerminationSignals {
    fn register() -> io::Result<Self> {
        Ok(Self)
    }

    async fn recv(self) -> &'static str {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        "CTRL_C"
    }
}
