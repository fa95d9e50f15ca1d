use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dto::events::{DartboardStatusEvent, ServerMessage};

/// A message encoded once and shared by every subscriber.
#[derive(Debug, Clone)]
pub struct ServerEvent {
    /// Event name, for logging.
    pub event: &'static str,
    /// JSON text frame.
    pub frame: Arc<str>,
}

impl ServerEvent {
    /// Encode a message as a `{"event", "data"}` frame.
    pub fn encode(message: &ServerMessage) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event: message.name(),
            frame: serde_json::to_string(message)?.into(),
        })
    }
}

/// Fan-out of server events: one channel per lobby plus a global one.
///
/// Sending never blocks. Slow receivers lag and skip messages, and a channel
/// without receivers silently drops them.
pub struct BroadcastHub {
    lobbies: DashMap<Uuid, broadcast::Sender<ServerEvent>>,
    global: broadcast::Sender<ServerEvent>,
    capacity: usize,
}

impl BroadcastHub {
    /// Construct a hub whose channels buffer `capacity` events each.
    pub fn new(capacity: usize) -> Self {
        let (global, _receiver) = broadcast::channel(capacity);
        Self {
            lobbies: DashMap::new(),
            global,
            capacity,
        }
    }

    /// Subscribe to a lobby channel, creating it on first use.
    pub fn subscribe_lobby(&self, lobby_id: Uuid) -> broadcast::Receiver<ServerEvent> {
        self.lobbies
            .entry(lobby_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Subscribe to events addressed to every viewer.
    pub fn subscribe_global(&self) -> broadcast::Receiver<ServerEvent> {
        self.global.subscribe()
    }

    /// Send a message to the viewers of one lobby.
    pub fn publish_lobby(&self, lobby_id: Uuid, message: &ServerMessage) {
        let Some(sender) = self.lobbies.get(&lobby_id).map(|entry| entry.clone()) else {
            debug!(%lobby_id, event = message.name(), "no viewers for lobby");
            return;
        };
        if let Some(event) = encode(message) {
            let delivered = sender.send(event).unwrap_or(0);
            debug!(%lobby_id, event = message.name(), delivered, "lobby event published");
        }
    }

    /// Send a message to every viewer.
    pub fn publish_global(&self, message: &ServerMessage) {
        if let Some(event) = encode(message) {
            let delivered = self.global.send(event).unwrap_or(0);
            debug!(event = message.name(), delivered, "global event published");
        }
    }

    /// Drop the lobby channel. Receivers drain what was sent and then close.
    pub fn close_lobby(&self, lobby_id: Uuid) {
        if self.lobbies.remove(&lobby_id).is_some() {
            debug!(%lobby_id, "lobby channel closed");
        }
    }

    /// Drop the lobby channel if nobody listens anymore.
    pub fn prune_lobby(&self, lobby_id: Uuid) {
        self.lobbies
            .remove_if(&lobby_id, |_, sender| sender.receiver_count() == 0);
    }

    /// Number of open lobby channels.
    pub fn lobby_channels(&self) -> usize {
        self.lobbies.len()
    }
}

fn encode(message: &ServerMessage) -> Option<ServerEvent> {
    ServerEvent::encode(message)
        .inspect_err(|err| warn!(event = message.name(), error = %err, "failed to encode event"))
        .ok()
}

/// Tell every viewer whether the dartboard link is up.
pub fn broadcast_dartboard_status(hub: &BroadcastHub, connected: bool) {
    hub.publish_global(&ServerMessage::DartboardStatus(DartboardStatusEvent {
        connected,
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn lobby_events_reach_only_their_subscribers() {
        let hub = BroadcastHub::new(8);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut rx_a = hub.subscribe_lobby(a);
        let mut rx_b = hub.subscribe_lobby(b);

        hub.publish_lobby(a, &ServerMessage::GameEnded);

        let event = rx_a.recv().await.unwrap();
        assert_eq!(event.event, "game_ended");
        assert_eq!(&*event.frame, r#"{"event":"game_ended"}"#);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn closing_a_lobby_ends_its_streams_after_draining() {
        let hub = BroadcastHub::new(8);
        let lobby = Uuid::new_v4();
        let mut rx = hub.subscribe_lobby(lobby);

        hub.publish_lobby(lobby, &ServerMessage::LobbyDeleted);
        hub.close_lobby(lobby);

        assert_eq!(rx.recv().await.unwrap().event, "lobby_deleted");
        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
        assert_eq!(hub.lobby_channels(), 0);
    }

    #[tokio::test]
    async fn publishing_without_viewers_is_harmless() {
        let hub = BroadcastHub::new(1);
        hub.publish_lobby(Uuid::new_v4(), &ServerMessage::GameEnded);
        broadcast_dartboard_status(&hub, true);

        let lobby = Uuid::new_v4();
        drop(hub.subscribe_lobby(lobby));
        hub.prune_lobby(lobby);
        assert_eq!(hub.lobby_channels(), 0);
    }

    #[tokio::test]
    async fn dartboard_status_goes_global() {
        let hub = BroadcastHub::new(4);
        let mut rx = hub.subscribe_global();
        broadcast_dartboard_status(&hub, false);

        let event = rx.recv().await.unwrap();
        assert_eq!(
            &*event.frame,
            r#"{"event":"dartboard_status","data":{"connected":false}}"#
        );
    }
}
