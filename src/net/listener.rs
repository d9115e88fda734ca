//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured address, failing fast when it is unavailable
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::config::HttpConfig;
use crate::net::connection::ConnectionId;

/// The listening socket could not be opened.
#[derive(Debug, Error)]
#[error("failed to bind {addr}: {source}")]
pub struct BindError {
    /// Address the bind was attempted on.
    pub addr: SocketAddr,
    /// Underlying OS error (address in use, permission denied, ...).
    #[source]
    pub source: io::Error,
}

impl BindError {
    /// The OS error kind, e.g. `AddrInUse`.
    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}

/// Accepting a connection failed.
#[derive(Debug, Error)]
#[error("failed to accept connection: {0}")]
pub struct AcceptError(#[from] pub io::Error);

impl AcceptError {
    /// Errors that concern a single peer rather than the listening socket.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self.0.kind(),
            io::ErrorKind::ConnectionAborted
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionRefused
        )
    }

    /// The listening socket itself is unusable; retrying cannot succeed.
    ///
    /// Anything that is neither fatal nor a connection error, such as running
    /// out of file descriptors, is expected to clear up and is retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.0.kind(),
            io::ErrorKind::NotConnected | io::ErrorKind::InvalidInput
        )
    }
}

/// Delay between retries of an accept that keeps failing.
///
/// Starts at 5ms and doubles up to one second; reset after every successful accept.
#[derive(Debug, Clone)]
pub struct AcceptBackoff {
    next: Duration,
}

impl AcceptBackoff {
    const INITIAL: Duration = Duration::from_millis(5);
    const MAX: Duration = Duration::from_secs(1);

    pub fn new() -> Self {
        Self {
            next: Self::INITIAL,
        }
    }

    /// Delay before the next retry.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (delay * 2).min(Self::MAX);
        delay
    }

    pub fn reset(&mut self) {
        self.next = Self::INITIAL;
    }
}

impl Default for AcceptBackoff {
    fn default() -> Self {
        Self::new()
    }
}

/// A connection handed out by an [`Accept`] source.
pub type Accepted = (TcpStream, SocketAddr, ConnectionPermit);

/// Source of inbound connections for the accept loop.
pub trait Accept: Send + Sync + 'static {
    fn accept(&self) -> impl Future<Output = Result<Accepted, AcceptError>> + Send;
}

impl Accept for Listener {
    fn accept(&self) -> impl Future<Output = Result<Accepted, AcceptError>> + Send {
        Listener::accept(self)
    }
}

/// A bounded TCP listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections wait in the kernel backlog until a slot becomes available.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
}

impl Listener {
    /// Bind to the configured host and port. No retry is attempted.
    pub async fn bind(config: &HttpConfig) -> Result<Self, BindError> {
        let addr = SocketAddr::new(config.host, config.port);

        let inner = TcpListener::bind(addr)
            .await
            .map_err(|source| BindError { addr, source })?;

        let local_addr = inner
            .local_addr()
            .map_err(|source| BindError { addr, source })?;

        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// Returns the stream, the peer address and a permit that must be held
    /// for the connection's lifetime. Cancel safe.
    pub async fn accept(&self) -> Result<Accepted, AcceptError> {
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| io::Error::other("connection limiter closed"))?;

        let (stream, addr) = self.inner.accept().await?;
        let id = ConnectionId::new();

        tracing::debug!(
            connection_id = %id,
            peer_addr = %addr,
            available_permits = self.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { id, _permit: permit }))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released. This holds even if the
/// connection task is aborted.
#[derive(Debug)]
pub struct ConnectionPermit {
    id: ConnectionId,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl ConnectionPermit {
    /// ID assigned to the accepted connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}
