//! Room lifecycle and playback relay
//!
//! The coordinator owns the room registry and the membership index and is the
//! only code that mutates them. Every command runs to completion and returns the
//! events it produced, addressed to concrete clients; delivering them is left to
//! the caller. A client is either unbound (no tracker entry) or bound to exactly
//! one room.

use crate::config::RoomSettings;
use crate::error::SessionError;
use crate::membership::MembershipTracker;
use crate::protocol::{
    ClientCommand, ClientId, PlaybackAction, PlaybackState, PlaybackUpdate, RoomInfo, RoomSummary,
    ServerEvent,
};
use crate::registry::RoomRegistry;
use crate::LOG_TAG;

/// An event addressed to a single client
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: ClientId,
    pub event: ServerEvent,
}

impl Outbound {
    pub fn new(to: ClientId, event: ServerEvent) -> Self {
        Self { to, event }
    }
}

#[derive(Debug, Default)]
pub struct Coordinator {
    registry: RoomRegistry,
    memberships: MembershipTracker,
    settings: RoomSettings,
}

impl Coordinator {
    pub fn new(settings: RoomSettings) -> Self {
        Self {
            registry: RoomRegistry::new(),
            memberships: MembershipTracker::new(),
            settings,
        }
    }

    /// Runs one command and turns any refusal into a `room-error` for the caller.
    pub fn dispatch(&mut self, client_id: ClientId, command: ClientCommand, now: u64) -> Vec<Outbound> {
        match self.apply(client_id, command, now) {
            Ok(outbound) => outbound,
            Err(err) => self.reject(client_id, err),
        }
    }

    pub fn apply(
        &mut self,
        client_id: ClientId,
        command: ClientCommand,
        now: u64,
    ) -> Result<Vec<Outbound>, SessionError> {
        match command {
            ClientCommand::CreateRoom {
                room_id,
                room_name,
                max_members,
            } => self.create_room(client_id, &room_id, &room_name, max_members, now),
            ClientCommand::JoinRoom { room_id } => self.join_room(client_id, &room_id, now),
            ClientCommand::LeaveRoom => self.leave_room(client_id, now),
            ClientCommand::GetRooms => Ok(vec![Outbound::new(
                client_id,
                ServerEvent::RoomsList(self.summaries()),
            )]),
            ClientCommand::GetRoomInfo { room_id } => {
                let info = self.room_info(&room_id)?;
                Ok(vec![Outbound::new(client_id, ServerEvent::RoomInfo(info))])
            }
            ClientCommand::PlayState(state) => {
                self.relay_playback(client_id, PlaybackAction::Play, state, now)
            }
            ClientCommand::PauseState(state) => {
                self.relay_playback(client_id, PlaybackAction::Pause, state, now)
            }
            ClientCommand::SeekTime(state) => {
                self.relay_playback(client_id, PlaybackAction::Seek, state, now)
            }
        }
    }

    /// The reply owed to `client_id` for a refused command. Empty for silent refusals.
    pub fn reject(&self, client_id: ClientId, err: SessionError) -> Vec<Outbound> {
        if err.is_silent() {
            tracing::debug!("{LOG_TAG} Ignoring command from {}: {}", client_id, err);
            return Vec::new();
        }
        tracing::debug!("{LOG_TAG} Rejected command from {}: {}", client_id, err);
        vec![Outbound::new(client_id, err.to_event())]
    }

    pub fn create_room(
        &mut self,
        client_id: ClientId,
        room_id: &str,
        room_name: &str,
        max_members: Option<usize>,
        now: u64,
    ) -> Result<Vec<Outbound>, SessionError> {
        if room_id.trim().is_empty() {
            return Err(SessionError::invalid("roomId must not be empty"));
        }
        if room_name.trim().is_empty() {
            return Err(SessionError::invalid_for(room_id, "roomName must not be empty"));
        }
        let capacity = self
            .settings
            .capacity_for(max_members)
            .ok_or_else(|| SessionError::invalid_for(room_id, "maxMembers must be positive"))?;
        self.ensure_unbound(client_id, room_id)?;

        let room = self
            .registry
            .create_room(room_id, room_name, client_id, capacity, now)?
            .snapshot();
        self.memberships.set_room_for(client_id, room_id);

        Ok(vec![Outbound::new(
            client_id,
            ServerEvent::RoomCreated {
                room_id: room_id.to_string(),
                room,
            },
        )])
    }

    pub fn join_room(
        &mut self,
        client_id: ClientId,
        room_id: &str,
        now: u64,
    ) -> Result<Vec<Outbound>, SessionError> {
        if room_id.trim().is_empty() {
            return Err(SessionError::invalid("roomId must not be empty"));
        }
        let room = self
            .registry
            .get(room_id)
            .ok_or_else(|| SessionError::RoomNotFound(room_id.to_string()))?;
        if room.is_full() {
            return Err(SessionError::RoomFull {
                room_id: room_id.to_string(),
                capacity: room.max_members,
            });
        }
        self.ensure_unbound(client_id, room_id)?;

        let room = self
            .registry
            .get_mut(room_id)
            .ok_or_else(|| SessionError::RoomNotFound(room_id.to_string()))?;
        room.add_member(client_id)?;
        self.memberships.set_room_for(client_id, room_id);

        tracing::info!("{LOG_TAG} Client {} joined room {}", client_id, room_id);

        let mut outbound = vec![Outbound::new(
            client_id,
            ServerEvent::RoomJoined {
                room_id: room_id.to_string(),
                room: room.snapshot(),
            },
        )];
        outbound.extend(room.others(client_id).into_iter().map(|member| {
            Outbound::new(
                member,
                ServerEvent::UserJoined {
                    user_id: client_id,
                    timestamp: now,
                },
            )
        }));
        Ok(outbound)
    }

    pub fn leave_room(&mut self, client_id: ClientId, now: u64) -> Result<Vec<Outbound>, SessionError> {
        let (room_id, mut outbound) = self.detach(client_id, now).ok_or(SessionError::NotInRoom)?;
        tracing::info!("{LOG_TAG} Client {} left room {}", client_id, room_id);
        outbound.push(Outbound::new(client_id, ServerEvent::RoomLeft { room_id }));
        Ok(outbound)
    }

    /// Channel closed. Same as leaving, without the acknowledgement, and a no-op
    /// for clients that already left.
    pub fn disconnect(&mut self, client_id: ClientId, now: u64) -> Vec<Outbound> {
        match self.detach(client_id, now) {
            Some((room_id, outbound)) => {
                tracing::info!(
                    "{LOG_TAG} Client {} dropped from room {} on disconnect",
                    client_id,
                    room_id
                );
                outbound
            }
            None => Vec::new(),
        }
    }

    /// Administrative removal of a room and every binding to it
    pub fn force_delete(&mut self, room_id: &str) -> Result<Vec<Outbound>, SessionError> {
        let room = self
            .registry
            .delete(room_id)
            .ok_or_else(|| SessionError::RoomNotFound(room_id.to_string()))?;

        // Drop every binding to the room, not just those the room still lists
        let bound: Vec<ClientId> = self.memberships.clients_in(room_id).collect();
        for client in bound {
            self.memberships.clear(client);
        }

        let outbound = room
            .members()
            .iter()
            .map(|member| {
                Outbound::new(
                    *member,
                    ServerEvent::RoomDeleted {
                        room_id: room_id.to_string(),
                    },
                )
            })
            .collect();

        tracing::info!(
            "{LOG_TAG} Room {} force-deleted with {} members",
            room_id,
            room.members().len()
        );
        Ok(outbound)
    }

    pub fn room_info(&self, room_id: &str) -> Result<RoomInfo, SessionError> {
        self.registry
            .get(room_id)
            .map(|room| room.snapshot())
            .ok_or_else(|| SessionError::RoomNotFound(room_id.to_string()))
    }

    pub fn summaries(&self) -> Vec<RoomSummary> {
        self.registry.list_all()
    }

    pub fn room_for(&self, client_id: ClientId) -> Option<&str> {
        self.memberships.room_for(client_id)
    }

    pub fn room_count(&self) -> usize {
        self.registry.len()
    }

    /// Checks that registry and tracker agree and every room has a member host.
    pub fn verify_consistency(&self) -> Result<(), String> {
        let mut members_seen = 0;
        for room in self.registry.iter() {
            if room.is_empty() {
                return Err(format!("room {} exists without members", room.id));
            }
            if !room.contains(room.host_id) {
                return Err(format!("host of room {} is not a member", room.id));
            }
            if room.members().len() > room.max_members {
                return Err(format!("room {} is over capacity", room.id));
            }
            for member in room.members() {
                if self.memberships.room_for(*member) != Some(room.id.as_str()) {
                    return Err(format!(
                        "member {} of room {} is not tracked there",
                        member, room.id
                    ));
                }
            }
            members_seen += room.members().len();
        }
        if members_seen != self.memberships.len() {
            return Err(format!(
                "tracker has {} bindings but rooms list {} members",
                self.memberships.len(),
                members_seen
            ));
        }
        Ok(())
    }

    fn ensure_unbound(&self, client_id: ClientId, requested: &str) -> Result<(), SessionError> {
        match self.memberships.room_for(client_id) {
            Some(current) => Err(SessionError::AlreadyInRoom {
                requested: requested.to_string(),
                current: current.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Unbinds a client from its room, deleting the room once empty. Returns the
    /// room and the `user-left` notices for whoever remains.
    fn detach(&mut self, client_id: ClientId, now: u64) -> Option<(String, Vec<Outbound>)> {
        let room_id = self.memberships.clear(client_id)?;

        let Some(room) = self.registry.get_mut(&room_id) else {
            tracing::warn!(
                "{LOG_TAG} Client {} was bound to missing room {}",
                client_id,
                room_id
            );
            return Some((room_id, Vec::new()));
        };

        room.remove_member(client_id);
        if room.is_empty() {
            self.registry.delete(&room_id);
            return Some((room_id, Vec::new()));
        }

        let outbound = room
            .members()
            .iter()
            .map(|member| {
                Outbound::new(
                    *member,
                    ServerEvent::UserLeft {
                        user_id: client_id,
                        timestamp: now,
                    },
                )
            })
            .collect();
        Some((room_id, outbound))
    }

    fn relay_playback(
        &mut self,
        client_id: ClientId,
        action: PlaybackAction,
        mut state: PlaybackState,
        now: u64,
    ) -> Result<Vec<Outbound>, SessionError> {
        let room_id = self
            .memberships
            .room_for(client_id)
            .ok_or(SessionError::NotInRoom)?;

        if !state.current_time.is_finite() || state.current_time < 0.0 {
            return Err(SessionError::invalid_for(
                room_id,
                "currentTime must be a non-negative number",
            ));
        }

        let recipients = self
            .registry
            .get(room_id)
            .map(|room| room.others(client_id))
            .unwrap_or_default();

        // Origin fields are stamped by the relay, never taken from the client.
        state.extra.remove("userId");
        state.extra.remove("timestamp");

        tracing::debug!(
            "{LOG_TAG} Relaying {} at {}ms from {} to {} members of room {}",
            action.event_name(),
            state.current_time,
            client_id,
            recipients.len(),
            room_id
        );

        let event = action.update(PlaybackUpdate {
            state,
            user_id: client_id,
            timestamp: now,
        });
        Ok(recipients
            .into_iter()
            .map(|member| Outbound::new(member, event.clone()))
            .collect())
    }
}
