//! Error types for room commands and the administrative HTTP surface

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::protocol::{ErrorKind, ServerEvent};

/// Why a room command was refused. Reported to the issuing client only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("room {0} already exists")]
    RoomAlreadyExists(String),

    #[error("room {0} not found")]
    RoomNotFound(String),

    #[error("room {room_id} is full ({capacity} members)")]
    RoomFull { room_id: String, capacity: usize },

    #[error("already in room {current}")]
    AlreadyInRoom { requested: String, current: String },

    #[error("not in a room")]
    NotInRoom,

    #[error("invalid payload: {reason}")]
    InvalidPayload {
        reason: String,
        room_id: Option<String>,
    },
}

impl SessionError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        SessionError::InvalidPayload {
            reason: reason.into(),
            room_id: None,
        }
    }

    pub fn invalid_for(room_id: &str, reason: impl Into<String>) -> Self {
        SessionError::InvalidPayload {
            reason: reason.into(),
            room_id: Some(room_id.to_string()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::RoomAlreadyExists(_) => ErrorKind::RoomAlreadyExists,
            SessionError::RoomNotFound(_) => ErrorKind::RoomNotFound,
            SessionError::RoomFull { .. } => ErrorKind::RoomFull,
            SessionError::AlreadyInRoom { .. } => ErrorKind::AlreadyInRoom,
            SessionError::NotInRoom => ErrorKind::NotInRoom,
            SessionError::InvalidPayload { .. } => ErrorKind::InvalidPayload,
        }
    }

    /// Room the failed command referred to, if any
    pub fn room_id(&self) -> Option<&str> {
        match self {
            SessionError::RoomAlreadyExists(id) | SessionError::RoomNotFound(id) => Some(id),
            SessionError::RoomFull { room_id, .. } => Some(room_id),
            SessionError::AlreadyInRoom { requested, .. } => Some(requested),
            SessionError::NotInRoom => None,
            SessionError::InvalidPayload { room_id, .. } => room_id.as_deref(),
        }
    }

    /// `NotInRoom` is swallowed rather than reported
    pub fn is_silent(&self) -> bool {
        matches!(self, SessionError::NotInRoom)
    }

    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::RoomError {
            error: self.kind(),
            room_id: self.room_id().map(str::to_string),
        }
    }
}

/// Errors returned by the admin routes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("room not found: {0}")]
    RoomNotFound(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingField(_) => StatusCode::BAD_REQUEST,
            ApiError::RoomNotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_client_error() {
            tracing::debug!(error = %self, "Admin request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_room_id() {
        let err = SessionError::RoomFull {
            room_id: "r1".into(),
            capacity: 2,
        };
        assert_eq!(err.kind(), ErrorKind::RoomFull);
        assert_eq!(err.room_id(), Some("r1"));
        assert_eq!(err.to_string(), "room r1 is full (2 members)");
    }

    #[test]
    fn test_already_in_room_reports_requested_room() {
        let err = SessionError::AlreadyInRoom {
            requested: "r2".into(),
            current: "r1".into(),
        };
        assert_eq!(
            err.to_event(),
            ServerEvent::RoomError {
                error: ErrorKind::AlreadyInRoom,
                room_id: Some("r2".into()),
            }
        );
    }

    #[test]
    fn test_only_not_in_room_is_silent() {
        assert!(SessionError::NotInRoom.is_silent());
        assert!(!SessionError::RoomNotFound("r1".into()).is_silent());
        assert!(!SessionError::invalid("bad").is_silent());
    }

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(
            ApiError::MissingField("roomId").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::RoomNotFound("r1".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }
}
