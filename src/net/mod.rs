//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Server side (container connectors):
//!     PEM cert + key → tls.rs (ServerConfig, ALPN list) → axum-server acceptor
//!
//! Client side (live probe):
//!     PEM trust anchors → tls.rs (ClientConfig, ALPN offer) → tokio-rustls connector
//! ```
//!
//! # Design Decisions
//! - One explicit crypto provider, no process-wide default installed
//! - ALPN lists are always given in preference order

pub mod tls;
