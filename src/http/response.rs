//! Response handling and transformation.
//!
//! # Responsibilities
//! - Turn an upstream response into a response for the original caller
//! - Stream the upstream body through without buffering it
//! - Map relay failures to a fixed, non-sensitive error response
//!
//! # Design Decisions
//! - Status and end-to-end headers are relayed unmodified
//! - Failure details go to the log, never to the caller

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::http::headers::strip_connection_scoped;

/// Body sent to callers when the upstream could not be reached.
pub const PROXY_ERROR_BODY: &str = "Proxy error";

/// Fixed response for relay failures.
pub fn proxy_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))],
        PROXY_ERROR_BODY,
    )
        .into_response()
}

/// Relay an upstream response, streaming its body.
pub fn relay_response(upstream: reqwest::Response, strip_connection_headers: bool) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    if strip_connection_headers {
        strip_connection_scoped(&mut headers);
    }

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_proxy_error_response_is_generic() {
        let response = proxy_error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], PROXY_ERROR_BODY.as_bytes());
    }

    #[tokio::test]
    async fn test_relay_response_keeps_status_and_headers() {
        let upstream: reqwest::Response = axum::http::Response::builder()
            .status(StatusCode::CREATED)
            .header("x-upstream", "yes")
            .header(header::CONNECTION, "close")
            .body("created")
            .unwrap()
            .into();

        let response = relay_response(upstream, true);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-upstream"], "yes");
        assert!(response.headers().get(header::CONNECTION).is_none());

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"created");
    }
}
