//! HTTP server
//!
//! Binds the router with port discovery and shuts down gracefully on
//! Ctrl+C or cancellation.

use crate::server::routes::{AppState, router};
use crate::util::find_available_port;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Default port for the HTTP server
pub const DEFAULT_HTTP_PORT: u16 = 20390;

/// Configuration for the HTTP server
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Address to bind to (e.g., "127.0.0.1:20390")
    pub bind: SocketAddr,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], DEFAULT_HTTP_PORT)),
        }
    }
}

impl HttpConfig {
    pub fn new(bind: SocketAddr) -> Self {
        Self { bind }
    }

    /// Create config from host and port strings
    pub fn from_host_port(host: &str, port: u16) -> Result<Self, std::net::AddrParseError> {
        let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
        Ok(Self::new(addr))
    }
}

/// Serve until `ct` is cancelled.
///
/// Port discovery is used to find an available port if the configured port is taken.
pub async fn run_server(
    config: HttpConfig,
    state: AppState,
    ct: CancellationToken,
) -> std::io::Result<()> {
    let host = config.bind.ip().to_string();
    let actual_port = find_available_port(&host, config.bind.port()).await?;
    let bind_addr = SocketAddr::new(config.bind.ip(), actual_port);

    let listener = TcpListener::bind(bind_addr).await?;
    info!("accessguard listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

/// Serve until Ctrl+C
pub async fn run_server_blocking(config: HttpConfig, state: AppState) -> std::io::Result<()> {
    let ct = CancellationToken::new();

    let signal_ct = ct.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
        }
        signal_ct.cancel();
    });

    info!("Press Ctrl+C to stop the server");
    run_server(config, state, ct).await
}
