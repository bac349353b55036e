//! Connection-scoped header handling.
//!
//! # Responsibilities
//! - Identify headers that only describe the hop between two peers
//! - Strip them from relayed requests and responses when enabled
//!
//! # Design Decisions
//! - `content-length` is never touched; streamed bodies keep their declared size
//! - Header names listed in `Connection` are treated as connection-scoped too

use axum::http::header::{self, HeaderMap, HeaderName};

/// Headers that describe a single connection, not the message.
pub static CONNECTION_SCOPED: [HeaderName; 8] = [
    header::HOST,
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Returns true if `name` is connection-scoped.
pub fn is_connection_scoped(name: &HeaderName) -> bool {
    CONNECTION_SCOPED.contains(name)
}

/// Remove connection-scoped headers, including any named by `Connection`.
pub fn strip_connection_scoped(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(CONNECTION_SCOPED.iter()) {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_connection_scoped_detection() {
        assert!(is_connection_scoped(&header::CONNECTION));
        assert!(is_connection_scoped(&HeaderName::from_static("keep-alive")));
        assert!(is_connection_scoped(&header::TRANSFER_ENCODING));
        assert!(!is_connection_scoped(&header::CONTENT_TYPE));
        assert!(!is_connection_scoped(&header::AUTHORIZATION));
        assert!(!is_connection_scoped(&header::CONTENT_LENGTH));
    }

    #[test]
    fn test_strip_keeps_end_to_end_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("localhost:5173"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-hop"));
        headers.insert("x-hop", HeaderValue::from_static("1"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.append("x-multi", HeaderValue::from_static("a"));
        headers.append("x-multi", HeaderValue::from_static("b"));

        strip_connection_scoped(&mut headers);

        assert!(headers.get(header::HOST).is_none());
        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get("x-hop").is_none());
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer abc");
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(headers.get_all("x-multi").iter().count(), 2);
    }
}
