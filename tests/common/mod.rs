//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;

use edge_relay::channel::ChannelRegistry;
use edge_relay::config::{AdminConfig, ProxySettings};
use edge_relay::http::{AppState, HttpServer, ProxyForwarder};
use edge_relay::lifecycle::Shutdown;
use edge_relay::resilience::ReconnectPolicy;
use edge_relay::store::{ConfigStore, Configuration, FileBackend, PersistenceBackend};

/// Reserve an ephemeral port that nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Start an upstream that answers every request with a JSON description of
/// what it received. Paths under `/status/<code>` answer with that code.
pub async fn start_echo_upstream() -> SocketAddr {
    serve(Router::new().fallback(echo)).await
}

/// Serve `app` on an ephemeral port for the rest of the test.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let mut header_map = Map::new();
    for name in headers.keys() {
        let values: Vec<Value> = headers
            .get_all(name)
            .iter()
            .map(|v| Value::String(v.to_str().unwrap_or_default().to_string()))
            .collect();
        header_map.insert(name.as_str().to_string(), Value::Array(values));
    }

    let status = uri
        .path()
        .strip_prefix("/status/")
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK);

    (
        status,
        [("x-upstream", "echo")],
        Json(json!({
            "method": method.as_str(),
            "path": uri.path(),
            "query": uri.query(),
            "headers": header_map,
            "body": String::from_utf8_lossy(&body),
        })),
    )
}

/// A relay served on an ephemeral port, backed by a temporary document.
pub struct TestRelay {
    pub addr: SocketAddr,
    pub store: Arc<ConfigStore>,
    pub shutdown: Shutdown,
    _dir: tempfile::TempDir,
}

impl TestRelay {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a relay whose `apiBaseUrl` is `api_base_url`.
pub async fn start_relay(api_base_url: &str) -> TestRelay {
    start_relay_with(api_base_url, ProxySettings::default()).await
}

pub async fn start_relay_with(api_base_url: &str, proxy: ProxySettings) -> TestRelay {
    let dir = tempfile::tempdir().unwrap();
    let backend = PersistenceBackend::File(FileBackend::new(dir.path().join("config.json")));
    let store = Arc::new(ConfigStore::new(backend));
    store
        .set(Configuration {
            api_base_url: api_base_url.to_string(),
            ..Configuration::default()
        })
        .await
        .unwrap();

    let forwarder = ProxyForwarder::new(&proxy, store.clone()).unwrap();
    let server = HttpServer::new(AppState {
        store: store.clone(),
        channels: Arc::new(ChannelRegistry::default()),
        forwarder: Arc::new(forwarder),
        admin: AdminConfig::default(),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestRelay {
        addr,
        store,
        shutdown,
        _dir: dir,
    }
}

/// HTTP client that talks to the relay directly.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Websocket peer for channel tests.
///
/// Greets each connection with `welcome <n>`, echoes text frames, and drops
/// every open connection on [`MockChannelServer::drop_connections`].
pub struct MockChannelServer {
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    drop_tx: broadcast::Sender<()>,
}

impl MockChannelServer {
    pub async fn start() -> Self {
        Self::start_at("127.0.0.1:0".parse().unwrap()).await
    }

    pub async fn start_at(addr: SocketAddr) -> Self {
        let listener = TcpListener::bind(addr).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let (drop_tx, _) = broadcast::channel(4);

        let counter = connections.clone();
        let drops = drop_tx.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let counter = counter.clone();
                let mut drop_rx = drops.subscribe();
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(socket).await else {
                        return;
                    };
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if ws.send(Message::text(format!("welcome {n}"))).await.is_err() {
                        return;
                    }
                    loop {
                        tokio::select! {
                            frame = ws.next() => match frame {
                                Some(Ok(Message::Text(text))) => {
                                    if ws.send(Message::Text(text)).await.is_err() {
                                        return;
                                    }
                                }
                                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                                Some(Ok(_)) => {}
                            },
                            _ = drop_rx.recv() => return,
                        }
                    }
                });
            }
        });

        Self {
            addr,
            connections,
            drop_tx,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Handshakes accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Drop every open connection without a close frame.
    pub fn drop_connections(&self) {
        let _ = self.drop_tx.send(());
    }
}

/// Reconnect policy short enough for tests.
pub fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(200),
        connect_timeout: Duration::from_secs(1),
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn eventually<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
