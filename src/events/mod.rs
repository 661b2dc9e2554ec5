//! Process-wide event bus.
//!
//! Fan-out of decoded webhook events to downstream consumers (the deploy
//! pipeline subscribes to push events). Publishing never blocks on
//! subscribers; a subscriber that falls behind loses the oldest events.

use serde_json::Value;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    GitPush,
}

#[derive(Debug, Clone)]
pub struct BusEvent {
    pub kind: EventKind,
    pub data: Value,
}

pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Broadcast an event. Returns the number of subscribers that received
    /// it; zero subscribers is not an error.
    pub fn publish(&self, kind: EventKind, data: Value) -> usize {
        self.tx.send(BusEvent { kind, data }).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        let delivered = bus.publish(EventKind::GitPush, serde_json::json!({"ref": "refs/heads/main"}));
        assert_eq!(delivered, 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::GitPush);
        assert_eq!(event.data["ref"], "refs/heads/main");
    }

    #[test]
    fn publish_without_subscribers_is_a_noop() {
        let bus = EventBus::new(8);
        assert_eq!(bus.publish(EventKind::GitPush, serde_json::json!({})), 0);
    }
}
