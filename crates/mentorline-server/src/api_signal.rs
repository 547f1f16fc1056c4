//! Call signaling relay.
//!
//! Forwards opaque call-setup payloads between the participants sharing a
//! room. Nothing is persisted and nothing is acknowledged.

use crate::AppState;
use axum::{
    extract::{
        ws::{Message as AxumMessage, WebSocket},
        Extension, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// A call has two ends.
pub const MAX_ROOM_PARTICIPANTS: usize = 2;

/// Frames a client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundFrame {
    JoinRoom { room_id: String },
    Offer { room_id: String, payload: Value },
    Answer { room_id: String, payload: Value },
    IceCandidate { room_id: String, payload: Value },
}

/// Frames the relay sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundFrame {
    Joined {
        room_id: String,
        participants: Vec<Uuid>,
    },
    Offer {
        room_id: String,
        from: Uuid,
        payload: Value,
    },
    Answer {
        room_id: String,
        from: Uuid,
        payload: Value,
    },
    IceCandidate {
        room_id: String,
        from: Uuid,
        payload: Value,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("room {0} is full")]
    Full(String),
    #[error("not a participant of room {0}")]
    NotMember(String),
}

type RoomMap = HashMap<String, HashMap<Uuid, mpsc::Sender<String>>>;

/// Room membership: room id -> participant -> outbound channel.
#[derive(Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<RoomMap>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `participant` to `room_id` and returns the members, sorted.
    ///
    /// Rejoining replaces the participant's sender and does not count
    /// against the room limit.
    pub async fn join(
        &self,
        room_id: &str,
        participant: Uuid,
        sender: mpsc::Sender<String>,
    ) -> Result<Vec<Uuid>, RoomError> {
        let mut rooms = self.rooms.write().await;
        let members = rooms.entry(room_id.to_string()).or_default();
        if !members.contains_key(&participant) && members.len() >= MAX_ROOM_PARTICIPANTS {
            return Err(RoomError::Full(room_id.to_string()));
        }
        members.insert(participant, sender);

        let mut participants: Vec<Uuid> = members.keys().copied().collect();
        participants.sort();
        Ok(participants)
    }

    /// Removes `participant` from `room_id`, dropping the room once empty.
    /// Returns whether the participant was a member.
    pub async fn leave(&self, room_id: &str, participant: Uuid) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(members) = rooms.get_mut(room_id) else {
            return false;
        };
        let removed = members.remove(&participant).is_some();
        if members.is_empty() {
            rooms.remove(room_id);
        }
        removed
    }

    /// Delivers `message_json` to every member of `room_id` except `from`.
    /// Returns how many members it was queued for.
    pub async fn forward(
        &self,
        room_id: &str,
        from: Uuid,
        message_json: String,
    ) -> Result<usize, RoomError> {
        let rooms = self.rooms.read().await;
        let members = rooms
            .get(room_id)
            .filter(|members| members.contains_key(&from))
            .ok_or_else(|| RoomError::NotMember(room_id.to_string()))?;

        let mut delivered = 0;
        for (participant, sender) in members.iter().filter(|(id, _)| **id != from) {
            match sender.try_send(message_json.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(
                    room_id = %room_id,
                    participant = %participant,
                    "dropping signaling frame for slow consumer: {}",
                    e
                ),
            }
        }
        Ok(delivered)
    }

    /// Delivers `message_json` to every member of `room_id`.
    pub async fn broadcast(&self, room_id: &str, message_json: String) {
        let rooms = self.rooms.read().await;
        if let Some(members) = rooms.get(room_id) {
            for (participant, sender) in members {
                if let Err(e) = sender.try_send(message_json.clone()) {
                    tracing::warn!(
                        room_id = %room_id,
                        participant = %participant,
                        "dropping signaling frame for slow consumer: {}",
                        e
                    );
                }
            }
        }
    }

    /// Current members of `room_id`, sorted.
    pub async fn participants(&self, room_id: &str) -> Vec<Uuid> {
        let rooms = self.rooms.read().await;
        let mut participants: Vec<Uuid> = rooms
            .get(room_id)
            .map(|members| members.keys().copied().collect())
            .unwrap_or_default();
        participants.sort();
        participants
    }
}

/// Handler for `GET /ws/signal`.
pub async fn signal_handler(
    Extension(state): Extension<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let rooms = state.rooms.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, rooms))
}

fn send_frame(tx: &mpsc::Sender<String>, frame: &OutboundFrame) {
    match serde_json::to_string(frame) {
        Ok(json) => {
            if let Err(e) = tx.try_send(json) {
                tracing::warn!("failed to queue signaling frame: {}", e);
            }
        }
        Err(e) => tracing::error!("failed to serialize signaling frame: {}", e),
    }
}

fn send_ws_error(tx: &mpsc::Sender<String>, message: String) {
    send_frame(tx, &OutboundFrame::Error { message });
}

async fn handle_socket(socket: WebSocket, rooms: RoomRegistry) {
    let participant = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();

    // Bounded so a stalled peer cannot grow memory without limit.
    let (tx, mut rx) = mpsc::channel::<String>(256);

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(AxumMessage::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    let mut current_room: Option<String> = None;

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            AxumMessage::Text(text) => match serde_json::from_str::<InboundFrame>(text.as_str()) {
                Ok(frame) => {
                    handle_frame(&rooms, participant, &tx, &mut current_room, frame).await;
                }
                Err(e) => {
                    tracing::warn!(
                        participant = %participant,
                        "unparseable signaling frame: {}",
                        e
                    );
                    send_ws_error(&tx, "invalid message format".to_string());
                }
            },
            AxumMessage::Close(_) => break,
            _ => {}
        }
    }

    if let Some(room_id) = current_room {
        rooms.leave(&room_id, participant).await;
        tracing::debug!(participant = %participant, room_id = %room_id, "left signaling room");
    }
    send_task.abort();
}

async fn handle_frame(
    rooms: &RoomRegistry,
    participant: Uuid,
    tx: &mpsc::Sender<String>,
    current_room: &mut Option<String>,
    frame: InboundFrame,
) {
    let (room_id, outbound) = match frame {
        InboundFrame::JoinRoom { room_id } => {
            join_room(rooms, participant, tx, current_room, room_id).await;
            return;
        }
        InboundFrame::Offer { room_id, payload } => (
            room_id.clone(),
            OutboundFrame::Offer {
                room_id,
                from: participant,
                payload,
            },
        ),
        InboundFrame::Answer { room_id, payload } => (
            room_id.clone(),
            OutboundFrame::Answer {
                room_id,
                from: participant,
                payload,
            },
        ),
        InboundFrame::IceCandidate { room_id, payload } => (
            room_id.clone(),
            OutboundFrame::IceCandidate {
                room_id,
                from: participant,
                payload,
            },
        ),
    };

    let json = match serde_json::to_string(&outbound) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("failed to serialize signaling frame: {}", e);
            return;
        }
    };
    if let Err(e) = rooms.forward(&room_id, participant, json).await {
        send_ws_error(tx, e.to_string());
    }
}

async fn join_room(
    rooms: &RoomRegistry,
    participant: Uuid,
    tx: &mpsc::Sender<String>,
    current_room: &mut Option<String>,
    room_id: String,
) {
    let participants = match rooms.join(&room_id, participant, tx.clone()).await {
        Ok(participants) => participants,
        Err(e) => {
            send_ws_error(tx, e.to_string());
            return;
        }
    };

    // A connection sits in one room at a time.
    if let Some(previous) = current_room.replace(room_id.clone()) {
        if previous != room_id {
            rooms.leave(&previous, participant).await;
        }
    }

    tracing::debug!(
        participant = %participant,
        room_id = %room_id,
        members = participants.len(),
        "joined signaling room"
    );

    match serde_json::to_string(&OutboundFrame::Joined {
        room_id: room_id.clone(),
        participants,
    }) {
        Ok(json) => rooms.broadcast(&room_id, json).await,
        Err(e) => tracing::error!("failed to serialize signaling frame: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
        mpsc::channel::<String>(8)
    }

    #[test]
    fn inbound_frames_use_kebab_case_tags() {
        let raw = r#"{"type":"ice-candidate","room_id":"query-1","payload":{"c":1}}"#;
        let frame: InboundFrame = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            frame,
            InboundFrame::IceCandidate { ref room_id, .. } if room_id == "query-1"
        ));

        let frame: InboundFrame =
            serde_json::from_str(r#"{"type":"join-room","room_id":"query-1"}"#).unwrap();
        assert!(matches!(frame, InboundFrame::JoinRoom { .. }));

        assert!(serde_json::from_str::<InboundFrame>(r#"{"type":"leave"}"#).is_err());
    }

    #[test]
    fn outbound_error_frame_shape() {
        let json = serde_json::to_value(OutboundFrame::Error {
            message: "nope".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "error", "message": "nope"}));
    }

    #[tokio::test]
    async fn third_participant_is_turned_away() {
        let rooms = RoomRegistry::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        rooms.join("r", a, channel().0).await.unwrap();
        let members = rooms.join("r", b, channel().0).await.unwrap();
        assert_eq!(members.len(), 2);

        assert_eq!(
            rooms.join("r", c, channel().0).await,
            Err(RoomError::Full("r".to_string()))
        );
        // Rejoining is not a third participant.
        assert_eq!(rooms.join("r", a, channel().0).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn forward_skips_the_sender() {
        let rooms = RoomRegistry::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (tx_a, mut rx_a) = channel();
        let (tx_b, mut rx_b) = channel();
        rooms.join("r", a, tx_a).await.unwrap();
        rooms.join("r", b, tx_b).await.unwrap();

        assert_eq!(rooms.forward("r", a, "hello".to_string()).await, Ok(1));
        assert_eq!(rx_b.recv().await.as_deref(), Some("hello"));
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn forward_requires_membership() {
        let rooms = RoomRegistry::new();
        let (a, outsider) = (Uuid::new_v4(), Uuid::new_v4());
        rooms.join("r", a, channel().0).await.unwrap();

        assert_eq!(
            rooms.forward("r", outsider, "x".to_string()).await,
            Err(RoomError::NotMember("r".to_string()))
        );
        assert_eq!(
            rooms.forward("missing", a, "x".to_string()).await,
            Err(RoomError::NotMember("missing".to_string()))
        );
    }

    #[tokio::test]
    async fn empty_rooms_are_dropped() {
        let rooms = RoomRegistry::new();
        let a = Uuid::new_v4();
        rooms.join("r", a, channel().0).await.unwrap();

        assert!(rooms.leave("r", a).await);
        assert!(!rooms.leave("r", a).await);
        assert!(rooms.participants("r").await.is_empty());
        assert!(rooms.rooms.read().await.is_empty());
    }
}
