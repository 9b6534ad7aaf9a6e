use axum::{
    debug_handler,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message as Frame, WebSocket},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Duration, timeout};
use uuid::Uuid;

use crate::AppState;
use crate::error::AppResult;
use crate::profiles::Profile;
use crate::rooms::registry::{ChatEvent, RoomBus};
use crate::rooms::store::{MessageKind, MessageStore, RoomStore};
use crate::session::CurrentProfile;

/// Bound on the store call so a stalled database cannot wedge a connection.
const PERSIST_TIMEOUT: Duration = Duration::from_secs(5);

/// What clients send. Anything else in the frame is ignored.
#[derive(Debug, Deserialize)]
struct Inbound {
    message: String,
}

/// Upgrades to a live chat session. Identity and membership are settled
/// before the upgrade, so an outsider never reaches the socket loop.
#[debug_handler(state = AppState)]
pub async fn room_ws(
    Path(room_id): Path<Uuid>,
    State(rooms): State<RoomStore>,
    State(messages): State<MessageStore>,
    State(bus): State<RoomBus>,
    CurrentProfile(profile): CurrentProfile,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    rooms.ensure_participant(room_id, profile.id).await?;

    Ok(ws.on_upgrade(async move |stream| {
        run_session(stream, bus, messages, room_id, profile).await;
    }))
}

async fn run_session(
    stream: WebSocket,
    bus: RoomBus,
    messages: MessageStore,
    room_id: Uuid,
    profile: Profile,
) {
    let mut rx = bus.join(room_id);
    tracing::debug!(room = %room_id, profile = %profile.id, "chat session open");

    let (mut sender, mut receiver) = stream.split();

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    let Ok(payload) = serde_json::to_string(&event) else { continue };
                    if sender.send(payload.into()).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(room = %room_id, profile = %profile.id, missed, "chat session lagging");
                }
                Err(RecvError::Closed) => break,
            },
            frame = receiver.next() => match frame {
                Some(Ok(frame)) => {
                    if let Some(trouble) = handle_frame(frame, &messages, &bus, room_id, &profile).await {
                        // Only the connection that sent the doomed message
                        // hears about it.
                        let report = json!({ "error": trouble }).to_string();
                        if sender.send(report.into()).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Err(_)) | None => break,
            },
        }
    }

    // The receiver has to be gone before leave() can collect an empty group.
    drop(rx);
    bus.leave(room_id);
    tracing::debug!(room = %room_id, profile = %profile.id, "chat session closed");
}

/// Handles one inbound frame. Returns a note for the sender when their
/// message could not be saved; malformed and empty frames are dropped with
/// nothing but a log line.
async fn handle_frame(
    frame: Frame,
    messages: &MessageStore,
    bus: &RoomBus,
    room_id: Uuid,
    profile: &Profile,
) -> Option<String> {
    let data = frame.into_data();
    if data.is_empty() {
        return None;
    }
    let inbound: Inbound = match serde_json::from_slice(&data) {
        Ok(inbound) => inbound,
        Err(err) => {
            tracing::debug!(room = %room_id, %err, "dropping malformed chat frame");
            return None;
        }
    };
    if inbound.message.is_empty() {
        return None;
    }

    let saved = timeout(
        PERSIST_TIMEOUT,
        messages.append(room_id, profile.id, &inbound.message, MessageKind::Text),
    )
    .await;

    match saved {
        Ok(Ok(message)) => {
            let delivered = bus.broadcast(
                room_id,
                ChatEvent {
                    id: message.id,
                    message: message.content,
                    sender_id: message.sender_id,
                    sender_username: profile.name.clone(),
                    timestamp: message.timestamp,
                },
            );
            tracing::trace!(room = %room_id, delivered, "chat event fanned out");
            None
        }
        Ok(Err(err)) => {
            tracing::error!(room = %room_id, profile = %profile.id, %err, "failed to save chat message");
            Some("could not save message".to_owned())
        }
        Err(_) => {
            tracing::error!(room = %room_id, profile = %profile.id, "chat message save timed out");
            Some("could not save message".to_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::ProfileStore;
    use crate::test_support::{memory_pool, seed_profile};
    use tokio::sync::broadcast::error::TryRecvError;

    async fn chat_fixtures() -> (MessageStore, RoomBus, Uuid, Profile, Profile) {
        let pool = memory_pool().await;
        let profiles = ProfileStore::new(pool.clone());
        let rooms = RoomStore::new(pool.clone());
        let asha = seed_profile(&profiles, "Asha", "female", 12.97, 77.59).await;
        let dev = seed_profile(&profiles, "Dev", "male", 12.98, 77.60).await;
        let (room, _) = rooms.get_or_create(asha.id, dev.id).await.unwrap();
        (MessageStore::new(pool), RoomBus::new(), room.id, asha, dev)
    }

    #[tokio::test]
    async fn a_frame_is_persisted_and_fanned_out_to_both_sides() {
        let (messages, bus, room_id, asha, _dev) = chat_fixtures().await;
        let mut asha_rx = bus.join(room_id);
        let mut dev_rx = bus.join(room_id);

        let frame = Frame::Text(r#"{"message":"see you at 7?"}"#.into());
        let trouble = handle_frame(frame, &messages, &bus, room_id, &asha).await;
        assert!(trouble.is_none());

        let event = dev_rx.recv().await.unwrap();
        assert_eq!(event.message, "see you at 7?");
        assert_eq!(event.sender_id, asha.id);
        assert_eq!(event.sender_username, "Asha");
        // The sender's own connection hears the same event.
        assert_eq!(asha_rx.recv().await.unwrap(), event);

        let history = messages.history(room_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, event.id);
        assert_eq!(history[0].content, "see you at 7?");
        assert_eq!(history[0].timestamp, event.timestamp);
    }

    #[tokio::test]
    async fn malformed_and_empty_frames_are_dropped() {
        let (messages, bus, room_id, asha, _) = chat_fixtures().await;
        let mut rx = bus.join(room_id);

        for raw in ["not json", "{}", r#"{"message":""}"#, ""] {
            let frame = Frame::Text(raw.into());
            let trouble = handle_frame(frame, &messages, &bus, room_id, &asha).await;
            assert!(trouble.is_none(), "frame {raw:?}");
        }

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert!(messages.history(room_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn a_failed_save_is_reported_to_the_sender_only() {
        let (messages, bus, _, asha, _) = chat_fixtures().await;
        let missing_room = Uuid::now_v7();
        let mut rx = bus.join(missing_room);

        let frame = Frame::Text(r#"{"message":"ghost"}"#.into());
        let trouble = handle_frame(frame, &messages, &bus, missing_room, &asha).await;

        assert_eq!(trouble.as_deref(), Some("could not save message"));
        // Nothing was fanned out.
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn extra_fields_in_a_frame_are_ignored() {
        let (messages, bus, room_id, asha, _) = chat_fixtures().await;

        let frame = Frame::Text(r#"{"message":"hi","client_tag":"abc123"}"#.into());
        let trouble = handle_frame(frame, &messages, &bus, room_id, &asha).await;

        assert!(trouble.is_none());
        assert_eq!(messages.history(room_id).await.unwrap().len(), 1);
    }
}
