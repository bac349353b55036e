//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the host's own handlers
//! - Wire up middleware (request ID, tracing, proxy interception)
//! - Bind server to listener
//! - Stop accepting on shutdown and drain in-flight requests

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin;
use crate::channel::ChannelRegistry;
use crate::config::AdminConfig;
use crate::http::forwarder::ProxyForwarder;
use crate::http::middleware::proxy_middleware;
use crate::http::request::{request_id_of, MakeRequestUuid, X_REQUEST_ID};
use crate::store::ConfigStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConfigStore>,
    pub channels: Arc<ChannelRegistry>,
    pub forwarder: Arc<ProxyForwarder>,
    pub admin: AdminConfig,
}

/// HTTP server hosting the proxy and the admin surface.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The proxy middleware sits inside the request-ID layers, so every
    /// forwarded request already carries `x-request-id`.
    fn build_router(state: AppState) -> Router {
        let mut router = Router::new().route("/health", get(health));
        if state.admin.enabled {
            router = router.merge(admin::setup_admin_router(state.clone()));
        }

        router
            .fallback(not_found)
            .layer(middleware::from_fn_with_state(state.clone(), proxy_middleware))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        request_id = %request_id_of(request),
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                }),
            )
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
            .with_state(state)
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}
