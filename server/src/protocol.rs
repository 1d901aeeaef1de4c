use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Server-assigned identifier of one connection.
pub type ClientId = Uuid;

/// Commands sent from client to relay
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientCommand {
    CreateRoom {
        room_id: String,
        room_name: String,
        max_members: Option<usize>,
    },
    JoinRoom {
        room_id: String,
    },
    LeaveRoom,
    GetRooms,
    GetRoomInfo {
        room_id: String,
    },
    PlayState(PlaybackState),
    PauseState(PlaybackState),
    SeekTime(PlaybackState),
}

const COMMAND_TYPES: &[&str] = &[
    "create-room",
    "join-room",
    "leave-room",
    "get-rooms",
    "get-room-info",
    "play-state",
    "pause-state",
    "seek-time",
];

impl<'de> Deserialize<'de> for ClientCommand {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        CommandFrame::deserialize(deserializer)?
            .into_command()
            .map_err(de::Error::custom)
    }
}

/// Raw `{type, payload}` envelope, before the payload is checked against the type
#[derive(Deserialize)]
struct CommandFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomBody {
    room_id: String,
    room_name: String,
    #[serde(default)]
    max_members: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomIdBody {
    room_id: String,
}

impl CommandFrame {
    fn into_command(self) -> Result<ClientCommand, serde_json::Error> {
        let payload = self.payload;
        let command = match self.kind.as_str() {
            "create-room" => {
                let body: CreateRoomBody = serde_json::from_value(payload)?;
                ClientCommand::CreateRoom {
                    room_id: body.room_id,
                    room_name: body.room_name,
                    max_members: body.max_members,
                }
            }
            "join-room" => {
                let body: RoomIdBody = serde_json::from_value(payload)?;
                ClientCommand::JoinRoom {
                    room_id: body.room_id,
                }
            }
            "leave-room" => {
                expect_no_body(payload)?;
                ClientCommand::LeaveRoom
            }
            "get-rooms" => {
                expect_no_body(payload)?;
                ClientCommand::GetRooms
            }
            "get-room-info" => {
                let body: RoomIdBody = serde_json::from_value(payload)?;
                ClientCommand::GetRoomInfo {
                    room_id: body.room_id,
                }
            }
            "play-state" => ClientCommand::PlayState(serde_json::from_value(payload)?),
            "pause-state" => ClientCommand::PauseState(serde_json::from_value(payload)?),
            "seek-time" => ClientCommand::SeekTime(serde_json::from_value(payload)?),
            other => return Err(de::Error::unknown_variant(other, COMMAND_TYPES)),
        };
        Ok(command)
    }
}

/// Argument-less commands take a missing payload, `null`, or an object
fn expect_no_body(payload: Value) -> Result<(), serde_json::Error> {
    match payload {
        Value::Null | Value::Object(_) => Ok(()),
        other => Err(de::Error::custom(format!(
            "expected an empty payload, got {other}"
        ))),
    }
}

/// Events sent from relay to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    Connected {
        client_id: ClientId,
    },
    RoomCreated {
        room_id: String,
        room: RoomInfo,
    },
    RoomJoined {
        room_id: String,
        room: RoomInfo,
    },
    RoomLeft {
        room_id: String,
    },
    RoomError {
        error: ErrorKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
    },
    RoomsList(Vec<RoomSummary>),
    RoomInfo(RoomInfo),
    UserJoined {
        user_id: ClientId,
        timestamp: u64,
    },
    UserLeft {
        user_id: ClientId,
        timestamp: u64,
    },
    PlayStateUpdate(PlaybackUpdate),
    PauseStateUpdate(PlaybackUpdate),
    SeekTimeUpdate(PlaybackUpdate),
    RoomDeleted {
        room_id: String,
    },
}

/// Playback position reported by a client. Unknown fields ride along untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub current_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlaybackState {
    pub fn at(current_time: f64) -> Self {
        Self {
            current_time,
            duration: None,
            extra: Map::new(),
        }
    }
}

/// A playback state stamped with its origin, as fanned out to the rest of a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackUpdate {
    #[serde(flatten)]
    pub state: PlaybackState,
    pub user_id: ClientId,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackAction {
    Play,
    Pause,
    Seek,
}

impl PlaybackAction {
    pub fn update(self, update: PlaybackUpdate) -> ServerEvent {
        match self {
            PlaybackAction::Play => ServerEvent::PlayStateUpdate(update),
            PlaybackAction::Pause => ServerEvent::PauseStateUpdate(update),
            PlaybackAction::Seek => ServerEvent::SeekTimeUpdate(update),
        }
    }

    pub fn event_name(self) -> &'static str {
        match self {
            PlaybackAction::Play => "play-state",
            PlaybackAction::Pause => "pause-state",
            PlaybackAction::Seek => "seek-time",
        }
    }
}

/// Full room snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub id: String,
    pub name: String,
    pub host_id: ClientId,
    pub members: Vec<ClientId>,
    pub max_members: usize,
    pub created_at: u64,
}

/// Room listing entry; never carries the member list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: String,
    pub name: String,
    pub member_count: usize,
    pub max_members: usize,
    pub host_id: ClientId,
    pub created_at: u64,
}

/// Error codes reported in `room-error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    RoomAlreadyExists,
    RoomNotFound,
    RoomFull,
    AlreadyInRoom,
    NotInRoom,
    InvalidPayload,
}

pub fn current_unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|dur| dur.as_millis() as u64)
        .unwrap_or(0)
}
