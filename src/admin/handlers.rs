use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::channel::ChannelState;
use crate::error::{ErrorKind, RelayError};
use crate::http::server::AppState;
use crate::store::Configuration;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub host: &'static str,
    pub degraded: bool,
    pub channel: ChannelStatus,
}

#[derive(Debug, Serialize)]
pub struct ChannelStatus {
    pub url: Option<String>,
    pub state: ChannelState,
    pub inbound_messages: usize,
    pub reconnect_attempts: u64,
}

/// Admin-facing wrapper that maps a [`RelayError`] to a status code.
pub struct AdminError(RelayError);

impl From<RelayError> for AdminError {
    fn from(err: RelayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            ErrorKind::InvalidConfig => StatusCode::BAD_REQUEST,
            ErrorKind::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::PersistenceFailure | ErrorKind::UpstreamUnreachable => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let channel = match state.channels.current() {
        Some(handle) => ChannelStatus {
            url: Some(handle.url().to_string()),
            state: handle.state(),
            inbound_messages: handle.message_count(),
            reconnect_attempts: handle.reconnect_attempts(),
        },
        None => ChannelStatus {
            url: None,
            state: ChannelState::Disconnected,
            inbound_messages: 0,
            reconnect_attempts: 0,
        },
    };

    let degraded = state.store.is_degraded();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if degraded { "degraded" } else { "operational" },
        host: state.store.backend().host().as_str(),
        degraded,
        channel,
    })
}

pub async fn get_config(State(state): State<AppState>) -> Json<Configuration> {
    Json(state.store.get().await.as_ref().clone())
}

pub async fn put_config(
    State(state): State<AppState>,
    Json(config): Json<Configuration>,
) -> Result<Json<Configuration>, AdminError> {
    let applied = state.store.set(config).await?;
    tracing::info!(api_base_url = %applied.api_base_url, "Configuration updated via admin API");
    Ok(Json(applied.as_ref().clone()))
}

pub async fn reload_config(State(state): State<AppState>) -> Json<Configuration> {
    Json(state.store.reload().await.as_ref().clone())
}
