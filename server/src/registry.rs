use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::error::SessionError;
use crate::protocol::{ClientId, RoomInfo, RoomSummary};
use crate::LOG_TAG;

/// Room state tracked by the relay
#[derive(Debug, Clone)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub host_id: ClientId,
    /// Join order; the first entry is the longest-standing member.
    members: Vec<ClientId>,
    pub max_members: usize,
    pub created_at: u64,
}

impl Room {
    fn new(id: String, name: String, host_id: ClientId, max_members: usize, now: u64) -> Self {
        Self {
            id,
            name,
            host_id,
            members: vec![host_id],
            max_members,
            created_at: now,
        }
    }

    pub fn members(&self) -> &[ClientId] {
        &self.members
    }

    pub fn contains(&self, client_id: ClientId) -> bool {
        self.members.contains(&client_id)
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_members
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Appends a member. Refuses when full; re-adding an existing member is a no-op.
    pub fn add_member(&mut self, client_id: ClientId) -> Result<(), SessionError> {
        if self.contains(client_id) {
            return Ok(());
        }
        if self.is_full() {
            return Err(SessionError::RoomFull {
                room_id: self.id.clone(),
                capacity: self.max_members,
            });
        }
        self.members.push(client_id);
        Ok(())
    }

    /// Removes a member, handing the host role to the earliest remaining
    /// member if the host left. Returns false if the client was not a member.
    pub fn remove_member(&mut self, client_id: ClientId) -> bool {
        let before = self.members.len();
        self.members.retain(|id| *id != client_id);
        if self.members.len() == before {
            return false;
        }

        if self.host_id == client_id {
            if let Some(next) = self.members.first() {
                self.host_id = *next;
                tracing::info!("{LOG_TAG} Host of room {} transferred to {}", self.id, next);
            }
        }
        true
    }

    /// Members other than `client_id`, in join order
    pub fn others(&self, client_id: ClientId) -> Vec<ClientId> {
        self.members
            .iter()
            .copied()
            .filter(|id| *id != client_id)
            .collect()
    }

    pub fn snapshot(&self) -> RoomInfo {
        RoomInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            host_id: self.host_id,
            members: self.members.clone(),
            max_members: self.max_members,
            created_at: self.created_at,
        }
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            member_count: self.members.len(),
            max_members: self.max_members,
            host_id: self.host_id,
            created_at: self.created_at,
        }
    }
}

/// Authoritative map of room id -> Room
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_room(
        &mut self,
        id: &str,
        name: &str,
        host_id: ClientId,
        max_members: usize,
        now: u64,
    ) -> Result<&Room, SessionError> {
        match self.rooms.entry(id.to_string()) {
            Entry::Occupied(_) => Err(SessionError::RoomAlreadyExists(id.to_string())),
            Entry::Vacant(slot) => {
                tracing::info!("{LOG_TAG} Room {} created by client {}", id, host_id);
                Ok(slot.insert(Room::new(
                    id.to_string(),
                    name.to_string(),
                    host_id,
                    max_members,
                    now,
                )))
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Room> {
        self.rooms.get_mut(id)
    }

    pub fn delete(&mut self, id: &str) -> Option<Room> {
        let removed = self.rooms.remove(id);
        if removed.is_some() {
            tracing::info!("{LOG_TAG} Room {} deleted", id);
        }
        removed
    }

    /// Summaries of every room, oldest first
    pub fn list_all(&self) -> Vec<RoomSummary> {
        let mut rooms: Vec<&Room> = self.rooms.values().collect();
        rooms.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        rooms.into_iter().map(Room::summary).collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_create_rejects_duplicate_id() {
        let mut registry = RoomRegistry::new();
        let host = Uuid::new_v4();

        registry.create_room("r1", "Movie Night", host, 10, 1).unwrap();
        let err = registry
            .create_room("r1", "Other", Uuid::new_v4(), 10, 2)
            .unwrap_err();

        assert_eq!(err, SessionError::RoomAlreadyExists("r1".into()));
        assert_eq!(registry.get("r1").unwrap().name, "Movie Night");
    }

    #[test]
    fn test_creator_is_sole_member_and_host() {
        let mut registry = RoomRegistry::new();
        let host = Uuid::new_v4();

        let room = registry.create_room("r1", "Movie Night", host, 10, 1).unwrap();
        assert_eq!(room.members(), &[host]);
        assert_eq!(room.host_id, host);
    }

    #[test]
    fn test_add_member_respects_capacity() {
        let mut registry = RoomRegistry::new();
        let host = Uuid::new_v4();
        registry.create_room("r1", "Movie Night", host, 2, 1).unwrap();
        let room = registry.get_mut("r1").unwrap();

        room.add_member(Uuid::new_v4()).unwrap();
        let err = room.add_member(Uuid::new_v4()).unwrap_err();

        assert!(matches!(err, SessionError::RoomFull { capacity: 2, .. }));
        assert_eq!(room.members().len(), 2);
    }

    #[test]
    fn test_host_migrates_to_earliest_member() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut registry = RoomRegistry::new();
        registry.create_room("r1", "Movie Night", a, 10, 1).unwrap();
        let room = registry.get_mut("r1").unwrap();
        room.add_member(b).unwrap();
        room.add_member(c).unwrap();

        assert!(room.remove_member(a));

        assert_eq!(room.host_id, b);
        assert_eq!(room.members(), &[b, c]);
    }

    #[test]
    fn test_non_host_leaving_keeps_host() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut registry = RoomRegistry::new();
        registry.create_room("r1", "Movie Night", a, 10, 1).unwrap();
        let room = registry.get_mut("r1").unwrap();
        room.add_member(b).unwrap();
        room.add_member(c).unwrap();

        assert!(room.remove_member(b));
        assert!(!room.remove_member(b));

        assert_eq!(room.host_id, a);
        assert_eq!(room.others(a), vec![c]);
    }

    #[test]
    fn test_list_all_is_oldest_first_without_members() {
        let mut registry = RoomRegistry::new();
        registry.create_room("late", "Late", Uuid::new_v4(), 4, 20).unwrap();
        registry.create_room("early", "Early", Uuid::new_v4(), 4, 10).unwrap();

        let list = registry.list_all();
        let ids: Vec<&str> = list.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
        assert_eq!(list[0].member_count, 1);
    }

    #[test]
    fn test_delete() {
        let mut registry = RoomRegistry::new();
        registry.create_room("r1", "Movie Night", Uuid::new_v4(), 4, 1).unwrap();

        assert!(registry.delete("r1").is_some());
        assert!(registry.delete("r1").is_none());
        assert!(registry.is_empty());
    }
}
