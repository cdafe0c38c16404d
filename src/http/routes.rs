//! Route table shared by every connector of the engine.
//!
//! Modules publish resources at activation time, possibly after a
//! connector is already listening, so the handler consults the table on
//! every request instead of baking routes into the router.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

/// Path → static body.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: DashMap<String, String>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `body` at `path`, replacing any earlier registration.
    pub fn register(&self, path: impl Into<String>, body: impl Into<String>) {
        let path = path.into();
        tracing::debug!(path = %path, "Route registered");
        self.routes.insert(path, body.into());
    }

    pub fn lookup(&self, path: &str) -> Option<String> {
        self.routes.get(path).map(|body| body.clone())
    }
}

/// Fallback handler serving whatever the table holds for the request path.
pub async fn serve_route(State(routes): State<Arc<RouteTable>>, uri: Uri) -> Response {
    match routes.lookup(uri.path()) {
        Some(body) => (StatusCode::OK, body).into_response(),
        None => {
            tracing::debug!(path = %uri.path(), "No route registered");
            (StatusCode::NOT_FOUND, "No resource registered at this path").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_replaces_earlier_body() {
        let table = RouteTable::new();
        table.register("/greeting", "Hello");
        table.register("/greeting", "Hi");
        assert_eq!(table.lookup("/greeting").as_deref(), Some("Hi"));
        assert!(table.lookup("/other").is_none());
    }

    #[tokio::test]
    async fn handler_maps_missing_paths_to_404() {
        let table = Arc::new(RouteTable::new());
        table.register("/greeting", "Hello");

        let found = serve_route(State(table.clone()), Uri::from_static("/greeting")).await;
        assert_eq!(found.status(), StatusCode::OK);
        let body = axum::body::to_bytes(found.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"Hello");

        let missing = serve_route(State(table), Uri::from_static("/other")).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
