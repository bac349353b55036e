//! Admin API for inspecting and changing the live configuration.
//!
//! # Routes
//! - `GET  /admin/status`: version, store health, channel state
//! - `GET  /admin/config`: current configuration
//! - `PUT  /admin/config`: validate, persist and publish a configuration
//! - `POST /admin/config/reload`: re-read the persisted document

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/config", get(get_config).put(put_config))
        .route("/admin/config/reload", post(reload_config))
        .layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use tower::ServiceExt;

    use crate::channel::ChannelRegistry;
    use crate::config::{AdminConfig, ProxySettings};
    use crate::http::{AppState, HttpServer, ProxyForwarder};
    use crate::store::{ConfigStore, Configuration, FileBackend, PersistenceBackend};

    fn app(dir: &tempfile::TempDir, api_key: Option<&str>) -> (axum::Router, Arc<ConfigStore>) {
        let backend = PersistenceBackend::File(FileBackend::new(dir.path().join("config.json")));
        let store = Arc::new(ConfigStore::new(backend));
        let forwarder = ProxyForwarder::new(&ProxySettings::default(), store.clone()).unwrap();
        let state = AppState {
            store: store.clone(),
            channels: Arc::new(ChannelRegistry::default()),
            forwarder: Arc::new(forwarder),
            admin: AdminConfig {
                enabled: true,
                api_key: api_key.map(str::to_string),
            },
        };
        (HttpServer::new(state).router(), store)
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_get_config_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(&dir, None);

        let response = app
            .oneshot(Request::builder().uri("/admin/config").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["apiBaseUrl"], "http://localhost:3000");
    }

    #[tokio::test]
    async fn test_put_config_applies_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let (app, store) = app(&dir, None);

        let update = Configuration {
            api_base_url: "http://192.168.1.6:3000".to_string(),
            ..Configuration::default()
        };
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::PUT)
                    .uri("/admin/config")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(serde_json::to_vec(&update).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.get().await.api_base_url, "http://192.168.1.6:3000");
        let on_disk = std::fs::read_to_string(dir.path().join("config.json")).unwrap();
        assert!(on_disk.contains("192.168.1.6"));
    }

    #[tokio::test]
    async fn test_put_invalid_config_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let (app, store) = app(&dir, None);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::PUT)
                    .uri("/admin/config")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"apiBaseUrl":"not a url","websocketUrl":"http://localhost:3000","fileServerUrl":"http://localhost:5173/videos/"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.get().await.api_base_url, "http://localhost:3000");
    }

    #[tokio::test]
    async fn test_api_key_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(&dir, Some("secret"));

        let denied = app
            .clone()
            .oneshot(Request::builder().uri("/admin/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let allowed = app
            .oneshot(
                Request::builder()
                    .uri("/admin/status")
                    .header(header::AUTHORIZATION, "Bearer secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
        let body = json_body(allowed).await;
        assert_eq!(body["channel"]["state"], "disconnected");
        assert_eq!(body["degraded"], false);
    }
}
