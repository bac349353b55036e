//! Append-only log of inbound payloads with live subscribers.

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// An opaque message carried over the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Bytes),
}

impl Payload {
    /// Convert a received frame. Control frames carry no payload.
    pub fn from_message(message: Message) -> Option<Self> {
        match message {
            Message::Text(text) => Some(Payload::Text(text.as_str().to_owned())),
            Message::Binary(data) => Some(Payload::Binary(data)),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Payload::Text(text) => text.len(),
            Payload::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Payload> for Message {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Text(text) => Message::Text(text.into()),
            Payload::Binary(data) => Message::Binary(data),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Payload::Binary(Bytes::from(data))
    }
}

impl From<Bytes> for Payload {
    fn from(data: Bytes) -> Self {
        Payload::Binary(data)
    }
}

/// Stream of payloads delivered to one subscriber, in arrival order.
pub type InboundReceiver = mpsc::UnboundedReceiver<Payload>;

#[derive(Default)]
struct Inner {
    history: Vec<Payload>,
    subscribers: Vec<mpsc::UnboundedSender<Payload>>,
}

/// Ordered record of everything received on a channel.
///
/// Appending and fan-out happen under one lock, so every subscriber sees the
/// same order and a payload is never delivered twice to the same subscriber.
#[derive(Default)]
pub struct InboundLog {
    inner: Mutex<Inner>,
}

impl InboundLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a payload and fan it out to every live subscriber.
    pub fn push(&self, payload: Payload) {
        let mut inner = self.inner.lock();
        inner
            .subscribers
            .retain(|tx| tx.send(payload.clone()).is_ok());
        inner.history.push(payload);
    }

    /// Receive every payload appended from now on.
    pub fn subscribe(&self) -> InboundReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().subscribers.push(tx);
        rx
    }

    /// Current history plus a receiver for everything after it, with no gap
    /// or overlap between the two.
    pub fn subscribe_with_history(&self) -> (Vec<Payload>, InboundReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        inner.subscribers.push(tx);
        (inner.history.clone(), rx)
    }

    pub fn snapshot(&self) -> Vec<Payload> {
        self.inner.lock().history.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of subscribers still holding their receiver.
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }
}

impl std::fmt::Debug for InboundLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("InboundLog")
            .field("messages", &inner.history.len())
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_out_preserves_order() {
        let log = InboundLog::new();
        let mut a = log.subscribe();
        log.push("one".into());
        let mut b = log.subscribe();
        log.push("two".into());
        log.push(Payload::from(vec![1u8, 2, 3]));

        assert_eq!(a.try_recv().unwrap(), Payload::from("one"));
        assert_eq!(a.try_recv().unwrap(), Payload::from("two"));
        assert_eq!(a.try_recv().unwrap(), Payload::from(vec![1u8, 2, 3]));
        assert!(a.try_recv().is_err());

        assert_eq!(b.try_recv().unwrap(), Payload::from("two"));
        assert_eq!(b.try_recv().unwrap(), Payload::from(vec![1u8, 2, 3]));
        assert!(b.try_recv().is_err());

        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_history_and_subscription_do_not_overlap() {
        let log = InboundLog::new();
        log.push("before".into());
        let (history, mut rx) = log.subscribe_with_history();
        log.push("after".into());

        assert_eq!(history, vec![Payload::from("before")]);
        assert_eq!(rx.try_recv().unwrap(), Payload::from("after"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let log = InboundLog::new();
        let rx = log.subscribe();
        let _kept = log.subscribe();
        assert_eq!(log.subscriber_count(), 2);
        drop(rx);
        log.push("x".into());
        assert_eq!(log.subscriber_count(), 1);
        assert_eq!(log.snapshot(), vec![Payload::from("x")]);
    }

    #[test]
    fn test_message_conversion() {
        assert_eq!(
            Payload::from_message(Message::text("hi")),
            Some(Payload::Text("hi".into()))
        );
        assert_eq!(Payload::from_message(Message::Ping(Bytes::new())), None);
        assert!(matches!(Message::from(Payload::from("hi")), Message::Text(_)));
    }
}
