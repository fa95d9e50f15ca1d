use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::{
    StreamMap,
    wrappers::{BroadcastStream, errors::BroadcastStreamRecvError},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{events::ServerMessage, ws::ViewerInboundMessage},
    state::{SharedState, broadcast::ServerEvent},
};

type LobbyStreams = StreamMap<Uuid, BroadcastStream<ServerEvent>>;

/// Handle the full lifecycle of a viewer WebSocket connection.
///
/// Every viewer receives global events such as `dartboard_status`. Lobby events
/// flow once the viewer sends `join_lobby`, starting with the current lobby and
/// match state.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let viewer = Uuid::new_v4();
    let mut lobbies = LobbyStreams::new();
    let mut global = BroadcastStream::new(state.hub().subscribe_global());
    info!(%viewer, "viewer connected");

    loop {
        tokio::select! {
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ViewerInboundMessage>(text.as_str()) {
                        Ok(message) => {
                            handle_inbound(&state, viewer, message, &mut lobbies, &outbound_tx).await;
                        }
                        Err(err) => warn!(%viewer, error = %err, "failed to parse viewer message"),
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = outbound_tx.send(Message::Pong(payload));
                }
                Some(Ok(Message::Close(frame))) => {
                    let _ = outbound_tx.send(Message::Close(frame));
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(%viewer, error = %err, "websocket error");
                    break;
                }
                None => break,
            },
            Some((lobby_id, event)) = lobbies.next(), if !lobbies.is_empty() => {
                if forward(viewer, Some(lobby_id), event, &outbound_tx).is_err() {
                    break;
                }
            }
            Some(event) = global.next() => {
                if forward(viewer, None, event, &outbound_tx).is_err() {
                    break;
                }
            }
        }
    }

    let joined: Vec<Uuid> = lobbies.keys().copied().collect();
    drop(lobbies);
    for lobby_id in joined {
        state.hub().prune_lobby(lobby_id);
    }
    info!(%viewer, "viewer disconnected");

    finalize(writer_task, outbound_tx).await;
}

async fn handle_inbound(
    state: &SharedState,
    viewer: Uuid,
    message: ViewerInboundMessage,
    lobbies: &mut LobbyStreams,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) {
    match message {
        ViewerInboundMessage::JoinLobby { lobby_id } => {
            // The engine hands out the state and the subscription together, so
            // the stream starts right after the snapshot sent here.
            match state.engine().watch_lobby(lobby_id).await {
                Ok((lobby, receiver)) => {
                    info!(%viewer, %lobby_id, "viewer joined lobby channel");
                    lobbies.insert(lobby_id, BroadcastStream::new(receiver));
                    let game = lobby.game_state.clone();
                    send_direct(outbound_tx, &ServerMessage::LobbyUpdate(lobby));
                    if let Some(game) = game {
                        send_direct(outbound_tx, &ServerMessage::GameUpdate(game));
                    }
                }
                Err(err) => {
                    warn!(%viewer, %lobby_id, error = %err, "viewer asked for an unknown lobby");
                }
            }
        }
        ViewerInboundMessage::LeaveLobby { lobby_id } => {
            if lobbies.remove(&lobby_id).is_some() {
                state.hub().prune_lobby(lobby_id);
                info!(%viewer, %lobby_id, "viewer left lobby channel");
            }
        }
        ViewerInboundMessage::Unknown => {
            debug!(%viewer, "ignoring unknown viewer message");
        }
    }
}

/// Push a hub event to the socket. Fails only when the writer is gone.
fn forward(
    viewer: Uuid,
    lobby_id: Option<Uuid>,
    event: Result<ServerEvent, BroadcastStreamRecvError>,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), ()> {
    match event {
        Ok(event) => {
            debug!(%viewer, ?lobby_id, event = event.event, "forwarding event");
            outbound_tx
                .send(Message::Text(event.frame.to_string().into()))
                .map_err(|_| ())
        }
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(%viewer, ?lobby_id, skipped, "viewer lagging; events skipped");
            Ok(())
        }
    }
}

fn send_direct(outbound_tx: &mpsc::UnboundedSender<Message>, message: &ServerMessage) {
    match ServerEvent::encode(message) {
        Ok(event) => {
            let _ = outbound_tx.send(Message::Text(event.frame.to_string().into()));
        }
        Err(err) => warn!(event = message.name(), error = %err, "failed to encode event"),
    }
}

async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
