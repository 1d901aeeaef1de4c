use std::collections::HashMap;

use crate::protocol::ClientId;

/// Index of which room each client is bound to.
///
/// Mutated only alongside the matching `RoomRegistry` change, so an entry
/// exists exactly when the room lists the client as a member.
#[derive(Debug, Default)]
pub struct MembershipTracker {
    rooms_by_client: HashMap<ClientId, String>,
}

impl MembershipTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_room_for(&mut self, client_id: ClientId, room_id: &str) {
        self.rooms_by_client.insert(client_id, room_id.to_string());
    }

    pub fn room_for(&self, client_id: ClientId) -> Option<&str> {
        self.rooms_by_client.get(&client_id).map(String::as_str)
    }

    pub fn clear(&mut self, client_id: ClientId) -> Option<String> {
        self.rooms_by_client.remove(&client_id)
    }

    pub fn clients_in<'a>(&'a self, room_id: &'a str) -> impl Iterator<Item = ClientId> + 'a {
        self.rooms_by_client
            .iter()
            .filter(move |(_, room)| room.as_str() == room_id)
            .map(|(client, _)| *client)
    }

    pub fn len(&self) -> usize {
        self.rooms_by_client.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms_by_client.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_set_and_clear() {
        let mut tracker = MembershipTracker::new();
        let client = Uuid::new_v4();

        assert_eq!(tracker.room_for(client), None);
        tracker.set_room_for(client, "r1");
        assert_eq!(tracker.room_for(client), Some("r1"));

        assert_eq!(tracker.clear(client), Some("r1".to_string()));
        assert_eq!(tracker.clear(client), None);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_clients_in_room() {
        let mut tracker = MembershipTracker::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        tracker.set_room_for(a, "r1");
        tracker.set_room_for(b, "r2");
        tracker.set_room_for(c, "r1");

        let mut in_r1: Vec<_> = tracker.clients_in("r1").collect();
        in_r1.sort();
        let mut expected = vec![a, c];
        expected.sort();
        assert_eq!(in_r1, expected);
        assert_eq!(tracker.len(), 3);
    }
}
