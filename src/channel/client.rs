//! Resilient websocket client.
//!
//! # Responsibilities
//! - Own exactly one transport at a time
//! - Re-handshake forever after transport loss, with capped backoff
//! - Append inbound payloads to the [`InboundLog`]
//! - Drain queued outbound payloads onto the live transport
//!
//! # Design Decisions
//! - One background task drives the state machine; handles only observe it
//!   and enqueue work
//! - `close()` is the only way out of the loop; it wins every race with a
//!   pending reconnect
//! - Outbound payloads queued during a reconnect go out once connected again

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::channel::inbound::{InboundLog, InboundReceiver, Payload};
use crate::channel::state::ChannelState;
use crate::error::{RelayError, RelayResult};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::resilience::ReconnectPolicy;

type Transport = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Shared {
    url: String,
    state: watch::Sender<ChannelState>,
    inbound: InboundLog,
    outbound: mpsc::UnboundedSender<Payload>,
    ever_connected: AtomicBool,
    reconnect_attempts: AtomicU64,
    shutdown: Shutdown,
}

impl Shared {
    /// Apply a transition if the state machine allows it.
    fn transition(&self, next: ChannelState) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        });
        if changed {
            metrics::record_channel_state(next);
            tracing::debug!(url = %self.url, state = %next, "Channel state changed");
        }
        changed
    }

    fn state(&self) -> ChannelState {
        *self.state.borrow()
    }
}

/// Cheap, cloneable handle to one channel connection.
#[derive(Clone)]
pub struct ChannelHandle {
    shared: Arc<Shared>,
}

impl ChannelHandle {
    /// Create the connection object and start its driver task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ChannelState::Disconnected);
        let shared = Arc::new(Shared {
            url: url.into(),
            state,
            inbound: InboundLog::new(),
            outbound,
            ever_connected: AtomicBool::new(false),
            reconnect_attempts: AtomicU64::new(0),
            shutdown: Shutdown::new(),
        });

        let shutdown_rx = shared.shutdown.subscribe();
        tokio::spawn(drive(shared.clone(), outbound_rx, policy, shutdown_rx));

        Self { shared }
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }

    pub fn state(&self) -> ChannelState {
        self.shared.state()
    }

    /// Watch state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.shared.state.subscribe()
    }

    /// Wait until the channel reaches `target`. Returns false if the channel
    /// closed first.
    pub async fn wait_for(&self, target: ChannelState) -> bool {
        let mut rx = self.watch_state();
        let reached = rx
            .wait_for(|state| *state == target || state.is_terminal())
            .await
            .map(|state| *state == target)
            .unwrap_or(false);
        reached
    }

    /// Queue a payload for the current connection.
    ///
    /// Fails with `NotConnected` if no handshake has ever completed or the
    /// channel is closed. Payloads queued while reconnecting are sent after
    /// the next successful handshake.
    pub fn send(&self, payload: impl Into<Payload>) -> RelayResult<()> {
        if self.state().is_terminal() || !self.shared.ever_connected.load(Ordering::Acquire) {
            return Err(RelayError::NotConnected);
        }
        self.shared
            .outbound
            .send(payload.into())
            .map_err(|_| RelayError::NotConnected)
    }

    /// Receive every payload that arrives from now on.
    pub fn subscribe(&self) -> InboundReceiver {
        self.shared.inbound.subscribe()
    }

    /// History so far plus a receiver for the rest.
    pub fn subscribe_with_history(&self) -> (Vec<Payload>, InboundReceiver) {
        self.shared.inbound.subscribe_with_history()
    }

    /// Every payload received so far, in arrival order.
    pub fn messages(&self) -> Vec<Payload> {
        self.shared.inbound.snapshot()
    }

    pub fn message_count(&self) -> usize {
        self.shared.inbound.len()
    }

    /// Handshake attempts made after a failure or transport loss.
    pub fn reconnect_attempts(&self) -> u64 {
        self.shared.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Move to `Closed` and release the transport. Idempotent.
    pub fn close(&self) {
        if self.shared.transition(ChannelState::Closed) {
            tracing::info!(url = %self.shared.url, "Channel closed");
        }
        self.shared.shutdown.trigger();
    }
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("url", &self.shared.url)
            .field("state", &self.state())
            .field("inbound", &self.shared.inbound)
            .finish()
    }
}

/// How a connected session ended.
enum SessionEnd {
    Dropped,
    Closed,
}

async fn drive(
    shared: Arc<Shared>,
    mut outbound_rx: mpsc::UnboundedReceiver<Payload>,
    policy: ReconnectPolicy,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut backoff = policy.backoff();
    let mut retrying = false;

    loop {
        if retrying {
            if !shared.transition(ChannelState::Reconnecting) {
                break;
            }
            let delay = backoff.next_delay();
            shared.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
            metrics::record_reconnect_attempt();
            tracing::info!(
                url = %shared.url,
                attempt = backoff.attempts(),
                delay_ms = delay.as_millis() as u64,
                "Reconnecting"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => break,
            }
        } else if !shared.transition(ChannelState::Connecting) {
            break;
        }

        let handshake = tokio::time::timeout(policy.connect_timeout, connect_async(shared.url.as_str()));
        let outcome = tokio::select! {
            outcome = handshake => outcome,
            _ = shutdown.recv() => break,
        };

        match outcome {
            Ok(Ok((transport, _response))) => {
                shared.ever_connected.store(true, Ordering::Release);
                if !shared.transition(ChannelState::Connected) {
                    break;
                }
                if backoff.attempts() > 0 {
                    tracing::info!(url = %shared.url, attempts = backoff.attempts(), "Reconnected");
                } else {
                    tracing::info!(url = %shared.url, "Connected");
                }
                backoff.reset();

                match session(&shared, transport, &mut outbound_rx, &mut shutdown).await {
                    SessionEnd::Closed => break,
                    SessionEnd::Dropped => {
                        tracing::warn!(url = %shared.url, "Channel transport lost");
                        retrying = true;
                    }
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(url = %shared.url, error = %e, "Channel handshake failed");
                retrying = true;
            }
            Err(_) => {
                tracing::warn!(
                    url = %shared.url,
                    timeout_ms = policy.connect_timeout.as_millis() as u64,
                    "Channel handshake timed out"
                );
                retrying = true;
            }
        }
    }

    shared.transition(ChannelState::Closed);
    tracing::debug!(url = %shared.url, "Channel driver stopped");
}

async fn session(
    shared: &Shared,
    transport: Transport,
    outbound_rx: &mut mpsc::UnboundedReceiver<Payload>,
    shutdown: &mut broadcast::Receiver<()>,
) -> SessionEnd {
    let (mut sink, mut stream) = transport.split();

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(url = %shared.url, frame = ?frame, "Peer closed channel");
                    return SessionEnd::Dropped;
                }
                Some(Ok(message)) => {
                    if let Some(payload) = Payload::from_message(message) {
                        metrics::record_channel_message("inbound");
                        tracing::trace!(url = %shared.url, bytes = payload.len(), "Message received");
                        shared.inbound.push(payload);
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(url = %shared.url, error = %e, "Channel read failed");
                    return SessionEnd::Dropped;
                }
                None => return SessionEnd::Dropped,
            },
            payload = outbound_rx.recv() => match payload {
                Some(payload) => {
                    if let Err(e) = sink.send(payload.into()).await {
                        tracing::warn!(url = %shared.url, error = %e, "Channel write failed");
                        return SessionEnd::Dropped;
                    }
                    metrics::record_channel_message("outbound");
                }
                None => return SessionEnd::Closed,
            },
            _ = shutdown.recv() => {
                let _ = sink.send(Message::Close(None)).await;
                let _ = sink.close().await;
                return SessionEnd::Closed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::time::Duration;

    fn fast_policy() -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(80),
            connect_timeout: Duration::from_millis(500),
        }
    }

    async fn unused_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("ws://{}", addr)
    }

    #[tokio::test]
    async fn test_send_before_connect_is_not_connected() {
        let handle = ChannelHandle::spawn(unused_url().await, fast_policy());
        let err = handle.send("hello").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotConnected);
        handle.close();
    }

    #[tokio::test]
    async fn test_keeps_retrying_until_closed() {
        let handle = ChannelHandle::spawn(unused_url().await, fast_policy());
        assert!(handle.wait_for(ChannelState::Reconnecting).await);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(handle.reconnect_attempts() >= 2);
        assert_ne!(handle.state(), ChannelState::Closed);

        handle.close();
        assert_eq!(handle.state(), ChannelState::Closed);
        assert!(!handle.wait_for(ChannelState::Connected).await);

        // The driver has stopped: no further attempts are made.
        let attempts = handle.reconnect_attempts();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(handle.reconnect_attempts(), attempts);
    }
}
