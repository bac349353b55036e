//! Connection state machine.
//!
//! ```text
//! Disconnected → Connecting → Connected ⇄ Reconnecting
//!                    │             │           │
//!                    └─────────────┴───────────┴──→ Closed (terminal)
//! ```

use serde::Serialize;

/// Lifecycle state of a channel connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    /// Created, no attempt made yet.
    Disconnected,
    /// First handshake in progress.
    Connecting,
    /// Handshake complete, frames flowing.
    Connected,
    /// Transport lost; waiting out the backoff or re-handshaking.
    Reconnecting,
    /// Explicitly closed. Terminal.
    Closed,
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::Connecting => "connecting",
            ChannelState::Connected => "connected",
            ChannelState::Reconnecting => "reconnecting",
            ChannelState::Closed => "closed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ChannelState::Closed)
    }

    /// Whether the machine may move from `self` to `next`.
    pub fn can_transition_to(&self, next: ChannelState) -> bool {
        use ChannelState::*;
        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Disconnected, Connecting)
            | (Connecting, Connected)
            | (Connecting, Reconnecting)
            | (Connected, Reconnecting)
            | (Reconnecting, Connected)
            | (Reconnecting, Reconnecting) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
