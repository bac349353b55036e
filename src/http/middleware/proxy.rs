//! Proxy interception middleware.
//! Relays proxy-prefixed requests before they reach the router.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::http::forwarder::Intercept;
use crate::http::server::AppState;

pub async fn proxy_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match state.forwarder.intercept(request).await {
        Intercept::Forwarded(response) => response,
        Intercept::Passthrough(request) => next.run(request).await,
    }
}
