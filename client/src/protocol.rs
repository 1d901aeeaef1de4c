use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub type ClientId = Uuid;

/// Commands sent from client to relay (must match server protocol)
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
        #[serde(default, skip_serializing_if = "Option::is_none")]
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
        error: String,
        #[serde(default)]
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub current_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackUpdate {
    #[serde(flatten)]
    pub state: PlaybackState,
    pub user_id: ClientId,
    pub timestamp: u64,
}

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
