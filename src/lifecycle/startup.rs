//! Startup orchestration.
//!
//! # Responsibilities
//! - Build and start the HTTP server for a business port
//! - Wait for termination, recording a serving failure if one is reported
//! - Stop the server within the configured grace period and report how it went
//!
//! # Design Decisions
//! - Fail fast: any startup error is returned before anything is served
//! - No retries anywhere: bind, start and stop each run once
//! - A shutdown timeout is reported, never escalated; exit proceeds regardless
//! - A serving failure is logged and kept for the report; only termination
//!   ends the process

use std::sync::Arc;

use crate::config::AppConfig;
use crate::http::{HttpServer, ServeFault, ServeMonitor, ServerError, ShutdownError};
use crate::lifecycle::LifecycleContext;
use crate::ports::BusinessPort;

/// How the serving period ended.
#[derive(Debug)]
pub struct ShutdownReport {
    /// Result of stopping the server.
    pub stop: Result<(), ShutdownError>,
    /// First serving failure reported before termination was requested.
    pub serve_fault: Option<ServeFault>,
}

impl ShutdownReport {
    /// Termination was requested and every in-flight request drained.
    pub fn is_clean(&self) -> bool {
        self.stop.is_ok() && self.serve_fault.is_none()
    }
}

/// Serve `port` until `ctx` is cancelled, then shut down gracefully.
pub async fn run(
    config: &AppConfig,
    port: Arc<dyn BusinessPort>,
    ctx: &LifecycleContext,
) -> Result<ShutdownReport, ServerError> {
    let logger = tracing::info_span!("http", port = config.http.port);
    let server = HttpServer::new(port, logger, &config.http).await?;
    let mut monitor = server.start()?;

    tracing::info!(address = %server.local_addr(), "Serving until termination is requested");

    let serve_fault = wait_for_termination(&mut monitor, ctx).await;

    let stop = server.stop(config.shutdown_grace).await;
    match &stop {
        Ok(()) => tracing::info!("Server stopped"),
        Err(err) => tracing::warn!(error = %err, "Server stopped without draining cleanly"),
    }

    Ok(ShutdownReport { stop, serve_fault })
}

/// Wait until `ctx` is cancelled, keeping the first fault `monitor` reports meanwhile.
async fn wait_for_termination(
    monitor: &mut ServeMonitor,
    ctx: &LifecycleContext,
) -> Option<ServeFault> {
    let mut serve_fault = None;
    loop {
        tokio::select! {
            _ = ctx.cancelled() => {
                tracing::info!("Termination requested, shutting down");
                return serve_fault;
            }
            Some(fault) = monitor.fault(), if serve_fault.is_none() => {
                tracing::error!(error = %fault, "Serving failed, waiting for termination");
                serve_fault = Some(fault);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::mpsc;

    #[tokio::test]
    async fn fault_is_kept_until_termination() {
        let (tx, rx) = mpsc::channel(1);
        let mut monitor = ServeMonitor::new(rx);
        let ctx = LifecycleContext::new();

        let canceller = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                tx.send(ServeFault::Panicked("accept loop exploded".into()))
                    .await
                    .unwrap();
                tokio::time::sleep(Duration::from_millis(50)).await;
                ctx.cancel();
            })
        };

        let fault = wait_for_termination(&mut monitor, &ctx).await;
        assert!(ctx.is_cancelled(), "returned on the fault instead of waiting");
        assert!(matches!(fault, Some(ServeFault::Panicked(msg)) if msg == "accept loop exploded"));
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn clean_termination_reports_no_fault() {
        let (tx, rx) = mpsc::channel(1);
        let mut monitor = ServeMonitor::new(rx);
        let ctx = LifecycleContext::new();
        drop(tx);

        ctx.cancel();
        assert!(wait_for_termination(&mut monitor, &ctx).await.is_none());
    }
}
