//! Request interception and upstream forwarding.
//!
//! # Responsibilities
//! - Recognize proxy-prefixed requests; hand everything else back untouched
//! - Resolve the upstream URL from the store's current `apiBaseUrl`
//! - Relay method, headers, query and body; stream both directions
//! - Turn network failures into a generic 500 for the caller
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → ProxyPrefix::strip (no match → Passthrough)
//!     → resolve_target (remainder + query onto apiBaseUrl)
//!     → reqwest request (body pumped through a bounded channel)
//!     → response::relay_response (status, headers, streamed body)
//! ```
//!
//! # Design Decisions
//! - Stateless per request: no retries, no backoff
//! - Dropping the inbound request future drops the upstream request with it

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use url::Url;

use crate::config::ProxySettings;
use crate::error::{RelayError, RelayResult};
use crate::http::headers::strip_connection_scoped;
use crate::http::request::request_id_of;
use crate::http::response::{proxy_error_response, relay_response};
use crate::observability::metrics;
use crate::routing::ProxyPrefix;
use crate::store::ConfigStore;

/// Chunks buffered between the caller's body and the upstream write.
const BODY_CHANNEL_CAPACITY: usize = 8;

/// Outcome of [`ProxyForwarder::intercept`].
#[derive(Debug)]
pub enum Intercept {
    /// The request carried the proxy prefix and was relayed.
    Forwarded(Response),
    /// Not a proxy request; continue normal routing with it.
    Passthrough(Request<Body>),
}

/// Forwards proxy-prefixed requests to the configured upstream.
#[derive(Debug, Clone)]
pub struct ProxyForwarder {
    prefix: ProxyPrefix,
    store: Arc<ConfigStore>,
    client: reqwest::Client,
    strip_connection_headers: bool,
    request_timeout: Option<Duration>,
}

impl ProxyForwarder {
    pub fn new(settings: &ProxySettings, store: Arc<ConfigStore>) -> Result<Self, reqwest::Error> {
        // Redirects are the caller's business; relay them as-is.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            prefix: ProxyPrefix::new(settings.prefix.clone()),
            store,
            client,
            strip_connection_headers: settings.strip_connection_headers,
            request_timeout: settings.request_timeout(),
        })
    }

    pub fn prefix(&self) -> &ProxyPrefix {
        &self.prefix
    }

    /// Forward `request` if it carries the proxy prefix.
    pub async fn intercept(&self, request: Request<Body>) -> Intercept {
        let Some(remainder) = self.prefix.strip(request.uri().path()) else {
            return Intercept::Passthrough(request);
        };
        let remainder = remainder.to_owned();
        Intercept::Forwarded(self.forward(request, &remainder).await)
    }

    async fn forward(&self, request: Request<Body>, remainder: &str) -> Response {
        let start = Instant::now();
        let request_id = request_id_of(&request);
        let method = request.method().clone();

        let config = self.store.get().await;
        let target = match config
            .api_base()
            .and_then(|base| resolve_target(&base, remainder, request.uri().query()))
        {
            Ok(target) => target,
            Err(e) => {
                tracing::error!(request_id = %request_id, remainder = %remainder, error = %e, "Cannot resolve proxy target");
                metrics::record_upstream_error();
                metrics::record_request(method.as_str(), 500, start);
                return proxy_error_response();
            }
        };

        tracing::debug!(request_id = %request_id, method = %method, target = %target, "Proxying request");

        match self.relay(request, target.clone()).await {
            Ok(response) => {
                tracing::debug!(
                    request_id = %request_id,
                    target = %target,
                    status = response.status().as_u16(),
                    "Upstream responded"
                );
                metrics::record_request(method.as_str(), response.status().as_u16(), start);
                response
            }
            Err(e) => {
                tracing::error!(request_id = %request_id, method = %method, target = %target, error = %e, "Upstream request failed");
                metrics::record_upstream_error();
                metrics::record_request(method.as_str(), 500, start);
                proxy_error_response()
            }
        }
    }

    async fn relay(&self, request: Request<Body>, target: Url) -> RelayResult<Response> {
        let (parts, body) = request.into_parts();

        let mut headers = parts.headers;
        if self.strip_connection_headers {
            strip_connection_scoped(&mut headers);
        }

        let mut outbound = self
            .client
            .request(parts.method.clone(), target.clone())
            .headers(headers);
        if carries_body(&parts.method) {
            outbound = outbound.body(streaming_body(body));
        }
        if let Some(timeout) = self.request_timeout {
            outbound = outbound.timeout(timeout);
        }

        let upstream = outbound
            .send()
            .await
            .map_err(|source| RelayError::UpstreamUnreachable {
                target: target.to_string(),
                source,
            })?;

        Ok(relay_response(upstream, self.strip_connection_headers))
    }
}

/// Whether a body is relayed for this method.
pub fn carries_body(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD)
}

/// Build the upstream URL for a prefix remainder.
///
/// A remainder that is itself an absolute http(s) URL is used directly.
/// Otherwise it is resolved against `base` like a URL reference; an empty
/// remainder resolves to the root of `base`. Every inbound query pair is
/// appended in order, repeated keys included.
pub fn resolve_target(base: &Url, remainder: &str, query: Option<&str>) -> RelayResult<Url> {
    let mut target = match absolute_remainder(remainder) {
        Some(url) => url,
        None if remainder.is_empty() => base.join("/")?,
        None => base.join(remainder)?,
    };

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        let mut pairs = target.query_pairs_mut();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            pairs.append_pair(&key, &value);
        }
    }

    Ok(target)
}

fn absolute_remainder(remainder: &str) -> Option<Url> {
    let candidate = remainder.trim_start_matches('/');
    if !(candidate.starts_with("http://") || candidate.starts_with("https://")) {
        return None;
    }
    Url::parse(candidate).ok().filter(|url| url.has_host())
}

/// Pump the caller's body into a bounded channel that feeds the upstream
/// request. A slow upstream fills the channel and stops the pump reading;
/// a dropped upstream request closes the channel and ends the pump.
fn streaming_body(body: Body) -> reqwest::Body {
    let (tx, mut rx) = mpsc::channel::<Result<Bytes, axum::Error>>(BODY_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut chunks = body.into_data_stream();
        while let Some(chunk) = chunks.next().await {
            let failed = chunk.is_err();
            if tx.send(chunk).await.is_err() || failed {
                break;
            }
        }
    });

    reqwest::Body::wrap_stream(futures_util::stream::poll_fn(move |cx| rx.poll_recv(cx)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://192.168.1.6:3000").unwrap()
    }

    #[test]
    fn test_resolve_relative_remainder() {
        let target = resolve_target(&base(), "/users/7", None).unwrap();
        assert_eq!(target.as_str(), "http://192.168.1.6:3000/users/7");
    }

    #[test]
    fn test_empty_remainder_is_root() {
        let base = Url::parse("http://192.168.1.6:3000/v1/").unwrap();
        assert_eq!(
            resolve_target(&base, "", None).unwrap().as_str(),
            "http://192.168.1.6:3000/"
        );
        assert_eq!(
            resolve_target(&base, "/", None).unwrap().as_str(),
            "http://192.168.1.6:3000/"
        );
    }

    #[test]
    fn test_absolute_remainder_wins() {
        let target =
            resolve_target(&base(), "/https://upstream.example/search", Some("q=abc")).unwrap();
        assert_eq!(target.as_str(), "https://upstream.example/search?q=abc");
    }

    #[test]
    fn test_query_multiplicity_and_order() {
        let target = resolve_target(&base(), "/songs", Some("tag=a&q=x&tag=b&empty=")).unwrap();
        let pairs: Vec<(String, String)> = target.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("tag".to_string(), "a".to_string()),
                ("q".to_string(), "x".to_string()),
                ("tag".to_string(), "b".to_string()),
                ("empty".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_empty_query_adds_nothing() {
        let target = resolve_target(&base(), "/songs", Some("")).unwrap();
        assert_eq!(target.as_str(), "http://192.168.1.6:3000/songs");
    }

    #[test]
    fn test_body_methods() {
        assert!(!carries_body(&Method::GET));
        assert!(!carries_body(&Method::HEAD));
        assert!(carries_body(&Method::POST));
        assert!(carries_body(&Method::PUT));
        assert!(carries_body(&Method::DELETE));
    }
}
