//! HTTP engine of the composed server.
//!
//! # Responsibilities
//! - Build the Axum router over the shared route table
//! - Bind plain and TLS connectors, HTTP/1.1 and HTTP/2 via ALPN
//! - Report bound addresses (ephemeral ports included)
//! - Stop every connector gracefully on teardown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::task::JoinHandle;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::http::routes::{serve_route, RouteTable};
use crate::lifecycle::Shutdown;

/// Grace period for in-flight TLS connections on stop.
const TLS_DRAIN: Duration = Duration::from_secs(1);

struct Connector {
    name: String,
    addr: SocketAddr,
    tls_handle: Option<axum_server::Handle>,
    task: JoinHandle<()>,
}

/// Route table plus the connectors serving it.
pub struct Engine {
    routes: Arc<RouteTable>,
    connectors: Vec<Connector>,
    shutdown: Shutdown,
    log_level: Level,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_log_level(Level::INFO)
    }

    /// Engine whose request tracing honours the `log_level` threshold.
    pub fn with_log_level(log_level: Level) -> Self {
        Self {
            routes: Arc::new(RouteTable::new()),
            connectors: Vec::new(),
            shutdown: Shutdown::new(),
            log_level,
        }
    }

    pub fn log_level(&self) -> Level {
        self.log_level
    }

    /// Per-request events are emitted at INFO; below that only failures are.
    pub fn traces_requests(&self) -> bool {
        Level::INFO <= self.log_level
    }

    pub fn routes(&self) -> Arc<RouteTable> {
        Arc::clone(&self.routes)
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(&self) -> Router {
        let router = Router::new().fallback(serve_route).with_state(self.routes());
        if self.traces_requests() {
            router.layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
        } else {
            router.layer(
                TraceLayer::new_for_http()
                    .on_request(())
                    .on_response(())
                    .on_body_chunk(())
                    .on_eos(()),
            )
        }
    }

    fn bind_std(host: &str, port: u16) -> std::io::Result<std::net::TcpListener> {
        let listener = std::net::TcpListener::bind((host, port))?;
        listener.set_nonblocking(true)?;
        Ok(listener)
    }

    /// Bind a plain HTTP connector. Must be called inside a Tokio runtime.
    pub fn bind_plain(&mut self, name: &str, host: &str, port: u16) -> std::io::Result<SocketAddr> {
        let std_listener = Self::bind_std(host, port)?;
        let addr = std_listener.local_addr()?;
        let listener = tokio::net::TcpListener::from_std(std_listener)?;

        let app = self.build_router();
        let mut shutdown = self.shutdown.subscribe();
        let connector = name.to_string();
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.recv().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(connector = %connector, error = %e, "Connector stopped with error");
            }
        });

        tracing::info!(connector = %name, address = %addr, "Plain connector listening");
        self.connectors.push(Connector {
            name: name.to_string(),
            addr,
            tls_handle: None,
            task,
        });
        Ok(addr)
    }

    /// Bind a TLS connector; the ALPN offer lives in `config`.
    pub fn bind_tls(
        &mut self,
        name: &str,
        host: &str,
        port: u16,
        config: RustlsConfig,
    ) -> std::io::Result<SocketAddr> {
        let std_listener = Self::bind_std(host, port)?;
        let addr = std_listener.local_addr()?;

        let app = self.build_router();
        let handle = axum_server::Handle::new();
        let server = axum_server::from_tcp_rustls(std_listener, config).handle(handle.clone());
        let connector = name.to_string();
        let task = tokio::spawn(async move {
            if let Err(e) = server.serve(app.into_make_service()).await {
                tracing::error!(connector = %connector, error = %e, "Connector stopped with error");
            }
        });

        tracing::info!(connector = %name, address = %addr, "TLS connector listening");
        self.connectors.push(Connector {
            name: name.to_string(),
            addr,
            tls_handle: Some(handle),
            task,
        });
        Ok(addr)
    }

    /// Bound address of a named connector.
    pub fn address(&self, name: &str) -> Option<SocketAddr> {
        self.connectors.iter().find(|c| c.name == name).map(|c| c.addr)
    }

    /// Stop every connector and wait for their tasks.
    pub async fn stop(self) {
        self.shutdown.trigger();
        for connector in &self.connectors {
            if let Some(handle) = &connector.tls_handle {
                handle.graceful_shutdown(Some(TLS_DRAIN));
            }
        }
        for connector in self.connectors {
            if let Err(e) = connector.task.await {
                tracing::warn!(connector = %connector.name, error = %e, "Connector task did not finish cleanly");
            }
        }
        tracing::info!("HTTP engine stopped");
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
