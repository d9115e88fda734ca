//! Configuration schema definitions.
//!
//! All settings have defaults so the process starts with an empty
//! environment; `loader.rs` overlays the recognised variables.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

/// Root configuration for the service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listener and server settings.
    pub http: HttpConfig,

    /// Log output settings.
    pub logging: LoggingConfig,

    /// How long `stop` waits for in-flight requests before forcing connections closed.
    pub shutdown_grace: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// HTTP listener and server configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Interface to bind. Defaults to all interfaces.
    pub host: IpAddr,

    /// TCP port to bind (`HTTP_PORT`).
    pub port: u16,

    /// Upper bound on receiving a request's headers.
    pub read_timeout: Duration,

    /// Upper bound on a single stalled socket write.
    pub write_timeout: Duration,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            max_connections: 10_000,
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Output format (`LOG_FORMAT`).
    pub format: LogFormat,

    /// Filter directives used when `RUST_LOG` is not set.
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            default_filter: "mailsender=info,tower_http=info".to_string(),
        }
    }
}

/// Log record encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}', expected 'text' or 'json'", other)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => f.write_str("text"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}
