//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Path;
use axum::routing::get;
use axum::Router;
use mailsender::config::HttpConfig;
use mailsender::http::{HttpServer, RequestLogger, ServeMonitor};
use mailsender::ports::BusinessPort;

/// Business port with routes that misbehave on request.
pub struct TestPort;

async fn ok() -> &'static str {
    "ok"
}

async fn sleep(Path(ms): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    "slept"
}

async fn explode() -> &'static str {
    panic!("boom")
}

async fn request_id(logger: RequestLogger) -> String {
    logger.request_id().to_owned()
}

impl BusinessPort for TestPort {
    fn routes(self: Arc<Self>) -> Router {
        Router::new()
            .route("/ok", get(ok))
            .route("/sleep/{ms}", get(sleep))
            .route("/panic", get(explode))
            .route("/request-id", get(request_id))
    }
}

/// Loopback-only config on `port` (0 picks an ephemeral port).
pub fn loopback_config(port: u16) -> HttpConfig {
    HttpConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port,
        ..HttpConfig::default()
    }
}

/// A port that was free a moment ago.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Build a server for [`TestPort`] without starting it.
pub async fn new_server(config: &HttpConfig) -> Arc<HttpServer> {
    let server = HttpServer::new(Arc::new(TestPort), tracing::Span::none(), config)
        .await
        .expect("server should bind");
    Arc::new(server)
}

/// Build and start a server for [`TestPort`] on an ephemeral loopback port.
pub async fn start_server() -> (Arc<HttpServer>, ServeMonitor) {
    let server = new_server(&loopback_config(0)).await;
    let monitor = server.start().expect("server should start");
    (server, monitor)
}

pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{}{}", addr, path)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap()
}

/// Retry connecting until something listens on `addr`.
pub async fn wait_until_listening(addr: SocketAddr) {
    for _ in 0..100 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("nothing listening on {}", addr);
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
