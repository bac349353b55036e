//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize the configuration store before anything reads it
//! - Start background tasks (document watcher, channel client)
//! - Bind the listener and begin accepting traffic
//! - Tear down in reverse on shutdown
//!
//! # Design Decisions
//! - Fail fast: bind and client construction errors are fatal
//! - A watcher that cannot start is logged; the relay still serves
//! - Listeners start last (traffic only when the store is ready)

use std::sync::Arc;

use notify::RecommendedWatcher;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::channel::{ChannelRegistry, InboundReceiver};
use crate::config::watcher::{reload_on_change, ConfigWatcher};
use crate::config::RelaySettings;
use crate::http::{AppState, HttpServer, ProxyForwarder};
use crate::lifecycle::{signals, Shutdown};
use crate::store::{ConfigStore, HostContext};

/// Fatal errors while bringing the relay up or serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build upstream HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Bind the configured address and serve until SIGINT/SIGTERM.
pub async fn run(settings: RelaySettings) -> Result<(), StartupError> {
    let address = settings.listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;

    let shutdown = Shutdown::new();
    let signal_task = signals::install(shutdown.clone());

    let result = serve(settings, listener, &shutdown).await;
    signal_task.abort();
    result
}

/// Serve on an already bound listener until `shutdown` fires.
pub async fn serve(
    settings: RelaySettings,
    listener: TcpListener,
    shutdown: &Shutdown,
) -> Result<(), StartupError> {
    // 1. Store
    let store = Arc::new(ConfigStore::for_host(&settings.store));
    let config = store.initialize().await;
    tracing::info!(
        host = store.backend().host().as_str(),
        path = ?store.backend().path(),
        api_base_url = %config.api_base_url,
        degraded = store.is_degraded(),
        "Configuration store ready"
    );

    // 2. Out-of-process edits (server hosts only)
    let _watcher = start_watcher(&settings, &store, shutdown);

    // 3. Channel
    let channels = Arc::new(ChannelRegistry::new(settings.channel.policy()));
    if settings.channel.enabled {
        let handle = channels.connect_from_store(&store).await;
        tokio::spawn(log_inbound(handle.subscribe(), shutdown.subscribe()));
    }

    // 4. Forwarder + server
    let forwarder =
        ProxyForwarder::new(&settings.proxy, store.clone()).map_err(StartupError::HttpClient)?;
    tracing::info!(prefix = %forwarder.prefix().as_str(), "Proxy forwarder ready");

    let server = HttpServer::new(AppState {
        store,
        channels: channels.clone(),
        forwarder: Arc::new(forwarder),
        admin: settings.admin.clone(),
    });

    let result = server.run(listener, shutdown.subscribe()).await;

    // 5. Teardown
    channels.disconnect();
    tracing::info!("Relay stopped");
    result.map_err(StartupError::Serve)
}

fn start_watcher(
    settings: &RelaySettings,
    store: &Arc<ConfigStore>,
    shutdown: &Shutdown,
) -> Option<RecommendedWatcher> {
    if !settings.store.watch || store.backend().host() != HostContext::Server {
        return None;
    }

    let (watcher, changes) = ConfigWatcher::new(store.backend().path());
    match watcher.run() {
        Ok(watcher) => {
            tokio::spawn(reload_on_change(store.clone(), changes, shutdown.subscribe()));
            Some(watcher)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Config watcher unavailable, edits need an explicit reload");
            None
        }
    }
}

async fn log_inbound(
    mut inbound: InboundReceiver,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            payload = inbound.recv() => match payload {
                Some(payload) => tracing::info!(bytes = payload.len(), "Channel message received"),
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}
