use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{db::Message, signaling::Participant};

use super::ConnId;

/// Everything a client may send over the socket.
///
/// On the wire: `{"event": "<name>", "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    #[serde(rename = "joinClassroom")]
    JoinClassroom(i64),
    #[serde(rename = "sendMessage")]
    SendMessage { classroom_id: i64, content: String },
    #[serde(rename = "join-room")]
    JoinRoom { room_id: i64 },
    #[serde(rename = "whoami")]
    Whoami { room_id: i64 },
    #[serde(rename = "offer")]
    Offer { room_id: i64, to: ConnId, offer: Value },
    #[serde(rename = "answer")]
    Answer { room_id: i64, to: ConnId, answer: Value },
    #[serde(rename = "ice-candidate")]
    IceCandidate { room_id: i64, to: ConnId, candidate: Value },
    #[serde(rename = "leave-room")]
    LeaveRoom { room_id: i64 },
    #[serde(rename = "kick")]
    Kick { room_id: i64, target: ConnId },
    #[serde(rename = "end-meet")]
    EndMeet { room_id: i64 },
}

/// Everything the server pushes to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    #[serde(rename = "connected")]
    Connected { id: ConnId },
    #[serde(rename = "newMessage")]
    NewMessage(Message),
    #[serde(rename = "room-users")]
    RoomUsers(Vec<Participant>),
    #[serde(rename = "peers")]
    Peers(Vec<ConnId>),
    #[serde(rename = "offer")]
    Offer { from: ConnId, offer: Value },
    #[serde(rename = "answer")]
    Answer { from: ConnId, answer: Value },
    #[serde(rename = "ice-candidate")]
    IceCandidate { from: ConnId, candidate: Value },
    #[serde(rename = "peer-left")]
    PeerLeft { id: ConnId },
    #[serde(rename = "kicked")]
    Kicked,
    #[serde(rename = "meet-ended")]
    MeetEnded,
    #[serde(rename = "error")]
    Error { message: String },
}
