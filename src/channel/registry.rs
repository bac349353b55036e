//! Single-connection accessor for the hosting process.

use parking_lot::Mutex;

use crate::channel::client::ChannelHandle;
use crate::channel::inbound::Payload;
use crate::error::{RelayError, RelayResult};
use crate::resilience::ReconnectPolicy;
use crate::store::ConfigStore;

/// Owns at most one live [`ChannelHandle`].
///
/// The host creates one registry and shares it; that makes the connection a
/// singleton for the process without a global.
#[derive(Debug)]
pub struct ChannelRegistry {
    policy: ReconnectPolicy,
    active: Mutex<Option<ChannelHandle>>,
}

impl ChannelRegistry {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            active: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Return the live handle, creating it on first use.
    ///
    /// Once a handle exists, `url` is ignored: a different URL never creates
    /// a second connection.
    pub fn get_client(&self, url: &str) -> ChannelHandle {
        let mut active = self.active.lock();
        if let Some(handle) = active.as_ref().filter(|h| !h.state().is_terminal()) {
            if handle.url() != url {
                tracing::debug!(
                    active = %handle.url(),
                    requested = %url,
                    "Channel already active, ignoring requested URL"
                );
            }
            return handle.clone();
        }

        tracing::info!(url = %url, "Opening channel");
        let handle = ChannelHandle::spawn(url, self.policy);
        *active = Some(handle.clone());
        handle
    }

    /// Read the websocket endpoint from the store once and connect to it.
    pub async fn connect_from_store(&self, store: &ConfigStore) -> ChannelHandle {
        let config = store.get().await;
        self.get_client(&config.websocket_endpoint())
    }

    /// The live handle, without creating one.
    pub fn current(&self) -> Option<ChannelHandle> {
        self.active.lock().clone()
    }

    /// Send on the live connection. Never opens a connection implicitly.
    pub fn send(&self, payload: impl Into<Payload>) -> RelayResult<()> {
        let handle = self.current().ok_or(RelayError::NotConnected)?;
        handle.send(payload)
    }

    /// Close the live connection and forget it, so the next `get_client`
    /// builds a fresh one.
    pub fn disconnect(&self) {
        if let Some(handle) = self.active.lock().take() {
            handle.close();
        }
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}
