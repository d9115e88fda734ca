//! mailsender
//!
//! Serves the business port over HTTP until SIGINT/SIGTERM, then drains
//! in-flight requests for up to the shutdown grace period and exits.
//!
//! ```text
//!  env ──▶ AppConfig ──▶ logging
//!                │
//!                ▼
//!  SIGINT/SIGTERM ──▶ LifecycleContext ──▶ lifecycle::run
//!                                             │
//!                          HttpServer::new ◀──┤
//!                          start (spawned)  ◀─┤
//!                          stop(grace)      ◀─┘
//! ```

use std::sync::Arc;

use mailsender::config::AppConfig;
use mailsender::lifecycle::{self, LifecycleContext};
use mailsender::observability;
use mailsender::ports::HealthPort;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    observability::logging::init(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.http.port,
        log_format = %config.logging.format,
        "mailsender starting"
    );

    let ctx = LifecycleContext::from_signals()?;

    let report = lifecycle::run(&config, Arc::new(HealthPort), &ctx)
        .await
        .inspect_err(|err| tracing::error!(error = %err, "Startup failed"))?;

    if let Some(fault) = &report.serve_fault {
        tracing::error!(error = %fault, "Serving ended unexpectedly");
    }
    tracing::info!(clean = report.is_clean(), "Shutdown complete");
    Ok(())
}
