//! HTTP server adapter.
//!
//! # Responsibilities
//! - Bind the listener and build the dispatcher for a business port
//! - Serve HTTP/1.1 connections on a spawned accept loop (non-blocking start)
//! - Report unexpected accept-loop failures through a [`ServeMonitor`]
//! - Drain in-flight requests on stop, bounded by a grace deadline
//! - Run the stop sequence exactly once, whoever calls it and however often
//!
//! # Phases
//! ```text
//! Unstarted --start--> Serving --stop--> Stopping --drained/forced--> Stopped
//! Unstarted --stop---> Stopped
//! Serving --listener broken / accept loop panicked--> Faulted --stop--> Stopping
//! ```
//!
//! Accept errors that concern one peer are skipped. Errors that should clear
//! up on their own (descriptor exhaustion and the like) are retried with a
//! backoff. Only a broken listener or a panic ends serving early; that is
//! reported through the [`ServeMonitor`] and the process keeps running.

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::{Extension, Router};
use futures_util::future::{self, BoxFuture, FutureExt};
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tower::Layer;
use tracing::{Instrument, Span};

use crate::config::{validation::validate_http, ConfigError, HttpConfig};
use crate::http::middleware::recover::panic_message;
use crate::http::router;
use crate::lifecycle::shutdown::StopGuard;
use crate::net::{Accept, AcceptBackoff, AcceptError, BindError, ConnectionTracker, Listener, WriteTimeout};
use crate::observability::metrics;
use crate::ports::BusinessPort;

/// Errors from constructing or starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid http configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("server already started")]
    AlreadyStarted,

    #[error("server already stopped")]
    AlreadyStopped,
}

/// Result of a stop that did not drain cleanly. Shared by every `stop` caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShutdownError {
    #[error("grace period of {grace:?} elapsed; forced {open_connections} connection(s) closed")]
    Timeout {
        grace: Duration,
        open_connections: u64,
    },

    #[error("serving task failed during shutdown: {0}")]
    ServeTask(String),
}

impl ShutdownError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ShutdownError::Timeout { .. })
    }
}

/// The accept loop stopped for a reason other than a requested shutdown.
#[derive(Debug, Error)]
pub enum ServeFault {
    /// The listening socket can no longer accept connections.
    #[error("accept loop failed: {0}")]
    Accept(#[source] AcceptError),

    #[error("serving task panicked: {0}")]
    Panicked(String),
}

/// Observable lifecycle phase of an [`HttpServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unstarted,
    Serving,
    /// Serving ended on its own; in-flight requests may still be finishing.
    Faulted,
    Stopping,
    Stopped,
}

enum State {
    Unstarted(Listener),
    Serving(JoinHandle<()>),
    Faulted(JoinHandle<()>),
    Stopping,
    Stopped,
}

impl State {
    fn phase(&self) -> Phase {
        match self {
            State::Unstarted(_) => Phase::Unstarted,
            State::Serving(_) => Phase::Serving,
            State::Faulted(_) => Phase::Faulted,
            State::Stopping => Phase::Stopping,
            State::Stopped => Phase::Stopped,
        }
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Receives unexpected serving failures after [`HttpServer::start`] returned.
#[derive(Debug)]
pub struct ServeMonitor {
    faults: mpsc::Receiver<ServeFault>,
}

impl ServeMonitor {
    pub(crate) fn new(faults: mpsc::Receiver<ServeFault>) -> Self {
        Self { faults }
    }

    /// Wait for the first serving failure.
    ///
    /// Resolves to `None` once serving has ended without one, e.g. after `stop`.
    pub async fn fault(&mut self) -> Option<ServeFault> {
        self.faults.recv().await
    }

    /// Non-blocking check for a serving failure.
    pub fn try_fault(&mut self) -> Option<ServeFault> {
        self.faults.try_recv().ok()
    }
}

/// Marks the server faulted and delivers the fault to the [`ServeMonitor`].
#[derive(Clone)]
struct FaultReporter {
    state: Arc<Mutex<State>>,
    faults: mpsc::Sender<ServeFault>,
}

impl FaultReporter {
    fn report(&self, fault: ServeFault) {
        tracing::error!(error = %fault, "Serving failed, no longer accepting connections");
        metrics::record_serve_fault();

        {
            let mut state = lock(&self.state);
            *state = match std::mem::replace(&mut *state, State::Stopping) {
                State::Serving(task) => State::Faulted(task),
                other => other,
            };
        }
        let _ = self.faults.try_send(fault);
    }
}

/// HTTP server for a business port.
pub struct HttpServer {
    local_addr: SocketAddr,
    router: Router,
    http: http1::Builder,
    write_timeout: Duration,
    span: Span,
    state: Arc<Mutex<State>>,
    shutdown: CancellationToken,
    connections: ConnectionTracker,
    stop_guard: StopGuard<Result<(), ShutdownError>>,
}

impl HttpServer {
    /// Bind the listener and prepare the server. Nothing is served until [`HttpServer::start`].
    ///
    /// `logger` is the span every server and request record is emitted under.
    pub async fn new(
        port: Arc<dyn BusinessPort>,
        logger: Span,
        config: &HttpConfig,
    ) -> Result<Self, ServerError> {
        validate_http(config).map_err(ConfigError::from)?;

        let listener = Listener::bind(config).await?;
        let local_addr = listener.local_addr().map_err(|source| BindError {
            addr: SocketAddr::new(config.host, config.port),
            source,
        })?;

        let router = router::build(port, logger.clone());

        let mut http = http1::Builder::new();
        http.timer(TokioTimer::new())
            .header_read_timeout(config.read_timeout);

        tracing::info!(
            parent: &logger,
            address = %local_addr,
            read_timeout = ?config.read_timeout,
            write_timeout = ?config.write_timeout,
            "HTTP server ready"
        );

        Ok(Self {
            local_addr,
            router,
            http,
            write_timeout: config.write_timeout,
            span: logger,
            state: Arc::new(Mutex::new(State::Unstarted(listener))),
            shutdown: CancellationToken::new(),
            connections: ConnectionTracker::new(),
            stop_guard: StopGuard::new(),
        })
    }

    /// Start serving on a spawned task and return immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<ServeMonitor, ServerError> {
        let mut state = lock(&self.state);
        let listener = match std::mem::replace(&mut *state, State::Stopping) {
            State::Unstarted(listener) => listener,
            other => {
                let err = match &other {
                    State::Serving(_) | State::Faulted(_) => ServerError::AlreadyStarted,
                    _ => ServerError::AlreadyStopped,
                };
                *state = other;
                return Err(err);
            }
        };

        let (faults_tx, faults_rx) = mpsc::channel(1);
        let reporter = FaultReporter {
            state: self.state.clone(),
            faults: faults_tx,
        };
        let accept_loop = AcceptLoop {
            listener,
            router: self.router.clone(),
            http: self.http.clone(),
            write_timeout: self.write_timeout,
            shutdown: self.shutdown.clone(),
            connections: self.connections.clone(),
            faults: reporter.clone(),
        };
        // `state` stays locked until it holds the task; a fault reported
        // before then waits on the lock.
        let task = tokio::spawn(supervise(accept_loop, reporter).instrument(self.span.clone()));
        *state = State::Serving(task);

        tracing::info!(parent: &self.span, address = %self.local_addr, "HTTP server started");
        Ok(ServeMonitor::new(faults_rx))
    }

    /// Stop accepting, drain in-flight requests for up to `grace`, then force
    /// any remaining connections closed.
    ///
    /// Only the first call runs the shutdown; every call returns its result.
    /// Stopping a server that was never started releases the listener and
    /// succeeds.
    pub async fn stop(&self, grace: Duration) -> Result<(), ShutdownError> {
        self.stop_guard.run(|| self.begin_shutdown(grace)).await
    }

    fn begin_shutdown(&self, grace: Duration) -> BoxFuture<'static, Result<(), ShutdownError>> {
        let mut state = lock(&self.state);
        match std::mem::replace(&mut *state, State::Stopping) {
            State::Unstarted(listener) => {
                drop(listener);
                *state = State::Stopped;
                tracing::info!(parent: &self.span, "HTTP server stopped before start");
                future::ready(Ok(())).boxed()
            }
            State::Serving(task) | State::Faulted(task) => {
                drop(state);
                self.shutdown.cancel();
                let drain = drain(task, grace, self.state.clone(), self.connections.clone())
                    .instrument(self.span.clone());
                let handle = tokio::spawn(drain);
                async move {
                    handle
                        .await
                        .unwrap_or_else(|err| Err(ShutdownError::ServeTask(err.to_string())))
                }
                .boxed()
            }
            other => {
                *state = other;
                future::ready(Ok(())).boxed()
            }
        }
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn phase(&self) -> Phase {
        lock(&self.state).phase()
    }

    /// Connections currently open.
    pub fn active_connections(&self) -> u64 {
        self.connections.active_count()
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("local_addr", &self.local_addr)
            .field("phase", &self.phase())
            .field("active_connections", &self.active_connections())
            .finish()
    }
}

/// Wait for the accept loop to drain, aborting it once `grace` elapses.
async fn drain(
    mut task: JoinHandle<()>,
    grace: Duration,
    state: Arc<Mutex<State>>,
    connections: ConnectionTracker,
) -> Result<(), ShutdownError> {
    tracing::info!(
        grace = ?grace,
        in_flight = connections.active_count(),
        "Graceful shutdown started"
    );

    let result = match tokio::time::timeout(grace, &mut task).await {
        Ok(Ok(())) => {
            tracing::info!("Graceful shutdown complete");
            metrics::record_shutdown(metrics::OUTCOME_DRAINED);
            Ok(())
        }
        Ok(Err(err)) => {
            tracing::error!(error = %err, "Serving task failed during shutdown");
            metrics::record_shutdown(metrics::OUTCOME_FAILED);
            Err(ShutdownError::ServeTask(err.to_string()))
        }
        Err(_) => {
            let open_connections = connections.active_count();
            tracing::warn!(
                grace = ?grace,
                open_connections,
                "Grace period elapsed, closing remaining connections"
            );
            // Dropping the accept loop drops its JoinSet, which aborts every connection task.
            task.abort();
            let _ = task.await;
            metrics::record_shutdown(metrics::OUTCOME_TIMED_OUT);
            Err(ShutdownError::Timeout {
                grace,
                open_connections,
            })
        }
    };

    *lock(&state) = State::Stopped;
    result
}

/// Run the accept loop, turning a panic into a reported fault.
async fn supervise<L: Accept>(accept_loop: AcceptLoop<L>, faults: FaultReporter) {
    if let Err(payload) = AssertUnwindSafe(accept_loop.run()).catch_unwind().await {
        faults.report(ServeFault::Panicked(panic_message(payload.as_ref())));
    }
}

struct AcceptLoop<L> {
    listener: L,
    router: Router,
    http: http1::Builder,
    write_timeout: Duration,
    shutdown: CancellationToken,
    connections: ConnectionTracker,
    faults: FaultReporter,
}

impl<L: Accept> AcceptLoop<L> {
    async fn run(self) {
        let AcceptLoop {
            listener,
            router,
            http,
            write_timeout,
            shutdown,
            connections,
            faults,
        } = self;

        let graceful = GracefulShutdown::new();
        let mut tasks = JoinSet::new();
        let mut backoff = AcceptBackoff::new();

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    tracing::debug!("Shutdown requested, no longer accepting connections");
                    break;
                }
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        backoff.reset();
                        let guard = connections.track(permit.id());
                        let span = tracing::debug_span!(
                            "connection",
                            connection_id = %guard.id(),
                            peer_addr = %peer,
                        );

                        let io = TokioIo::new(WriteTimeout::new(stream, write_timeout));
                        let service = Extension(ConnectInfo(peer)).layer(router.clone());
                        let conn = http.serve_connection(io, TowerToHyperService::new(service));
                        let conn = graceful.watch(conn);

                        tasks.spawn(
                            async move {
                                let _permit = permit;
                                let _guard = guard;
                                if let Err(err) = conn.await {
                                    tracing::debug!(error = %err, "Connection closed with error");
                                }
                            }
                            .instrument(span),
                        );
                    }
                    Err(err) if err.is_connection_error() => {
                        tracing::debug!(error = %err, "Peer dropped during accept");
                    }
                    Err(err) if err.is_fatal() => {
                        faults.report(ServeFault::Accept(err));
                        break;
                    }
                    Err(err) => {
                        let delay = backoff.next_delay();
                        tracing::warn!(error = %err, retry_in = ?delay, "Accept failed, retrying");
                        metrics::record_accept_error();
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                },
            }
        }

        drop(listener);
        tracing::info!(
            in_flight = connections.active_count(),
            "Listener closed, draining connections"
        );

        graceful.shutdown().await;
        while tasks.join_next().await.is_some() {}
        tracing::debug!("All connections drained");
    }
}
