//! HTTP engine subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (connector, ALPN picks HTTP/1.1 or HTTP/2)
//!     → routes.rs (lookup in the shared route table)
//!     → static body or 404
//! ```

pub mod routes;
pub mod server;

pub use routes::RouteTable;
pub use server::Engine;
