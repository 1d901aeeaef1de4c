use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::RoomSettings;
use crate::coordinator::{Coordinator, Outbound};
use crate::error::SessionError;
use crate::protocol::{current_unix_millis, ClientCommand, ClientId, RoomSummary, ServerEvent};
use crate::LOG_TAG;

pub type ClientSender = mpsc::UnboundedSender<ServerEvent>;

/// Shared relay state handed to every connection and route.
///
/// Room state sits behind one lock so each command is applied atomically;
/// sends happen after the lock is released.
#[derive(Clone)]
pub struct Hub {
    coordinator: Arc<Mutex<Coordinator>>,
    /// All connected clients: client_id -> outbound queue
    senders: Arc<DashMap<ClientId, ClientSender>>,
}

impl Hub {
    pub fn new(settings: RoomSettings) -> Self {
        Self {
            coordinator: Arc::new(Mutex::new(Coordinator::new(settings))),
            senders: Arc::new(DashMap::new()),
        }
    }

    pub fn add_client(&self, client_id: ClientId, sender: ClientSender) {
        self.senders.insert(client_id, sender);
        tracing::info!("{LOG_TAG} Client {} connected", client_id);
    }

    /// Tears down a connection. Only the first call per client has any effect.
    pub fn remove_client(&self, client_id: ClientId) {
        if self.senders.remove(&client_id).is_none() {
            return;
        }
        let outbound = self
            .coordinator
            .lock()
            .disconnect(client_id, current_unix_millis());
        self.deliver(outbound);
        tracing::info!("{LOG_TAG} Client {} disconnected", client_id);
    }

    pub fn handle_command(&self, client_id: ClientId, command: ClientCommand) {
        let outbound = self
            .coordinator
            .lock()
            .dispatch(client_id, command, current_unix_millis());
        self.deliver(outbound);
    }

    /// Reports a command that could not be applied, e.g. an unparseable frame
    pub fn reject(&self, client_id: ClientId, err: SessionError) {
        let outbound = self.coordinator.lock().reject(client_id, err);
        self.deliver(outbound);
    }

    /// Sends directly to one client, bypassing room state
    pub fn send_to(&self, client_id: ClientId, event: ServerEvent) -> bool {
        match self.senders.get(&client_id) {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    pub fn room_summaries(&self) -> Vec<RoomSummary> {
        self.coordinator.lock().summaries()
    }

    /// Deletes a room on behalf of an operator. Returns how many members were notified.
    pub fn force_delete(&self, room_id: &str) -> Result<usize, SessionError> {
        let outbound = self.coordinator.lock().force_delete(room_id)?;
        let notified = outbound.len();
        self.deliver(outbound);
        Ok(notified)
    }

    pub fn room_for(&self, client_id: ClientId) -> Option<String> {
        self.coordinator.lock().room_for(client_id).map(str::to_string)
    }

    pub fn connection_count(&self) -> usize {
        self.senders.len()
    }

    pub fn verify_consistency(&self) -> Result<(), String> {
        self.coordinator.lock().verify_consistency()
    }

    /// Fire-and-forget: a member whose queue is gone just misses the event.
    fn deliver(&self, outbound: Vec<Outbound>) {
        for Outbound { to, event } in outbound {
            match self.senders.get(&to) {
                Some(tx) => {
                    if tx.send(event).is_err() {
                        tracing::debug!("{LOG_TAG} Dropped event for closed client {}", to);
                    }
                }
                None => tracing::debug!("{LOG_TAG} No channel for client {}", to),
            }
        }
    }
}
