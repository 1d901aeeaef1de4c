use anyhow::{anyhow, Context, Result};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::sleep,
};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use uuid::Uuid;

use crate::constants::KEEPALIVE_INTERVAL_SECS;
use crate::protocol::{ClientCommand, ClientId, PlaybackState, ServerEvent};

/// WebSocket transport to the relay plus the little session state a client
/// needs to survive reconnects: its current id and the room it is bound to.
pub struct SyncClient {
    inner: Arc<SyncClientState>,
}

struct SyncClientState {
    transport: Mutex<Option<Transport>>,
    next_generation: Mutex<u64>,
    room_id: Mutex<Option<String>>,
    client_id: Mutex<Option<ClientId>>,
    stats: Mutex<SyncStats>,
}

/// Outbound queue of the current socket, tagged with the connection it belongs to
struct Transport {
    generation: u64,
    tx: mpsc::UnboundedSender<WsMessage>,
}

/// Teardown shared by the tasks of one connection. Whichever finishes first
/// wakes the others and reports the close.
struct ConnectionEnd {
    generation: u64,
    inner: Arc<SyncClientState>,
    closed: watch::Sender<bool>,
    disconnect: Mutex<Option<oneshot::Sender<()>>>,
}

impl ConnectionEnd {
    fn finish(&self) {
        self.inner.clear_transport(self.generation);
        self.closed.send_replace(true);
        if let Some(tx) = self.disconnect.lock().take() {
            let _ = tx.send(());
        }
    }
}

#[derive(Default, Clone)]
struct SyncStats {
    bytes_out: u64,
    bytes_in: u64,
    messages_out: u64,
    messages_in: u64,
    last_ping_sent: Option<Instant>,
    last_ping_nonce: Option<u64>,
    last_rtt_ms: Option<f32>,
    connected_since: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct SyncStatsSnapshot {
    pub bytes_out: u64,
    pub bytes_in: u64,
    pub messages_out: u64,
    pub messages_in: u64,
    pub last_rtt_ms: Option<f32>,
    pub connected_duration: Option<f32>,
}

impl Default for SyncClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncClient {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SyncClientState {
                transport: Mutex::new(None),
                next_generation: Mutex::new(0),
                room_id: Mutex::new(None),
                client_id: Mutex::new(None),
                stats: Mutex::new(SyncStats::default()),
            }),
        }
    }

    /// Connect to the relay. Returns a receiver that resolves when the socket closes.
    ///
    /// Every parsed event updates the session state before it is handed to
    /// `on_event`; frames that do not parse are logged and dropped.
    pub async fn connect<F>(&self, server_url: &str, on_event: F) -> Result<oneshot::Receiver<()>>
    where
        F: Fn(ServerEvent) + Send + Sync + 'static,
    {
        let (ws_stream, _) = connect_async(server_url)
            .await
            .context("Failed to connect to server")?;

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
        let generation = self.inner.install_transport(tx.clone());
        // A fresh connection gets a fresh id from the relay
        *self.inner.client_id.lock() = None;
        self.inner.mark_connected();

        let (disconnect_tx, disconnect_rx) = oneshot::channel();
        let (closed_tx, closed_rx) = watch::channel(false);
        let end = Arc::new(ConnectionEnd {
            generation,
            inner: Arc::clone(&self.inner),
            closed: closed_tx,
            disconnect: Mutex::new(Some(disconnect_tx)),
        });

        // Sender task
        let send_end = Arc::clone(&end);
        let mut send_closed = closed_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = rx.recv() => {
                        let Some(msg) = msg else { break };
                        let closing = matches!(msg, WsMessage::Close(_));
                        if ws_sender.send(msg).await.is_err() || closing {
                            break;
                        }
                    }
                    _ = send_closed.changed() => break,
                }
            }
            send_end.finish();
        });

        let handler = Arc::new(on_event);
        let recv_inner = Arc::clone(&self.inner);
        let recv_end = Arc::clone(&end);
        tokio::spawn(async move {
            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(WsMessage::Text(text)) => {
                        recv_inner.record_incoming(text.len() as u64);
                        match serde_json::from_str::<ServerEvent>(text.as_str()) {
                            Ok(event) => {
                                recv_inner.observe(&event);
                                handler(event);
                            }
                            Err(e) => tracing::warn!("Ignoring unrecognised frame: {}", e),
                        }
                    }
                    Ok(WsMessage::Pong(payload)) => {
                        recv_inner.handle_ws_pong(&payload);
                    }
                    Ok(WsMessage::Close(_)) => break,
                    Err(e) => {
                        tracing::warn!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            recv_end.finish();
        });

        tokio::spawn(run_keepalive(
            Arc::clone(&self.inner),
            tx,
            closed_rx,
            Duration::from_secs(KEEPALIVE_INTERVAL_SECS),
        ));

        Ok(disconnect_rx)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.transport.lock().is_some()
    }

    /// Id the relay assigned to this connection
    pub fn client_id(&self) -> Option<ClientId> {
        *self.inner.client_id.lock()
    }

    /// Room this client is bound to, kept across reconnects so it can be re-joined
    pub fn last_room(&self) -> Option<String> {
        self.inner.room_id.lock().clone()
    }

    pub fn stats_snapshot(&self) -> SyncStatsSnapshot {
        self.inner.snapshot()
    }

    /// Create a new room
    pub fn create_room(
        &self,
        room_id: String,
        room_name: String,
        max_members: Option<usize>,
    ) -> Result<()> {
        self.send_command(&ClientCommand::CreateRoom {
            room_id,
            room_name,
            max_members,
        })
    }

    /// Join an existing room
    pub fn join_room(&self, room_id: String) -> Result<()> {
        self.send_command(&ClientCommand::JoinRoom { room_id })
    }

    /// Leave current room
    pub fn leave_room(&self) -> Result<()> {
        self.send_command(&ClientCommand::LeaveRoom)
    }

    pub fn get_rooms(&self) -> Result<()> {
        self.send_command(&ClientCommand::GetRooms)
    }

    pub fn get_room_info(&self, room_id: String) -> Result<()> {
        self.send_command(&ClientCommand::GetRoomInfo { room_id })
    }

    /// Announce a local playback change. Returns `false` without sending
    /// when the client is not in a room.
    pub fn send_playback(&self, command: ClientCommand) -> Result<bool> {
        if self.inner.room_id.lock().is_none() {
            return Ok(false);
        }
        self.send_command(&command)?;
        Ok(true)
    }

    /// Close the socket and forget the room so it is not re-joined
    pub fn disconnect(&self) {
        *self.inner.room_id.lock() = None;
        if self.inner.enqueue_ws(WsMessage::Close(None)).is_err() {
            tracing::debug!("Disconnect requested with no open socket");
        }
    }

    /// Apply the session side effects of a relay event
    pub fn observe(&self, event: &ServerEvent) {
        self.inner.observe(event);
    }

    fn send_command(&self, command: &ClientCommand) -> Result<()> {
        let json = serde_json::to_string(command).context("Failed to serialize command")?;
        let tx = self
            .inner
            .transport
            .lock()
            .as_ref()
            .map(|transport| transport.tx.clone())
            .ok_or_else(|| anyhow!("Not connected to sync server"))?;
        self.inner.record_outgoing(json.len() as u64);
        tx.send(WsMessage::Text(json.into()))
            .context("Failed to queue message to socket")?;
        Ok(())
    }
}

impl SyncClientState {
    fn observe(&self, event: &ServerEvent) {
        match event {
            ServerEvent::Connected { client_id } => {
                tracing::info!("Assigned client id {}", client_id);
                *self.client_id.lock() = Some(*client_id);
            }
            ServerEvent::RoomCreated { room_id, .. } | ServerEvent::RoomJoined { room_id, .. } => {
                *self.room_id.lock() = Some(room_id.clone());
            }
            ServerEvent::RoomLeft { room_id } | ServerEvent::RoomDeleted { room_id } => {
                self.forget_room(room_id);
            }
            // A rejoin after reconnect finds the room gone once its last member dropped
            ServerEvent::RoomError {
                error,
                room_id: Some(room_id),
            } if error == "RoomNotFound" => {
                self.forget_room(room_id);
            }
            _ => {}
        }
    }

    fn forget_room(&self, room_id: &str) {
        let mut current = self.room_id.lock();
        if current.as_deref() == Some(room_id) {
            *current = None;
        }
    }

    fn record_outgoing(&self, bytes: u64) {
        let mut stats = self.stats.lock();
        stats.bytes_out += bytes;
        stats.messages_out += 1;
    }

    fn record_incoming(&self, bytes: u64) {
        let mut stats = self.stats.lock();
        stats.bytes_in += bytes;
        stats.messages_in += 1;
    }

    fn handle_ws_pong(&self, payload: &[u8]) {
        self.record_incoming(payload.len() as u64);
        if payload.len() < 8 {
            return;
        }
        let mut nonce_bytes = [0u8; 8];
        nonce_bytes.copy_from_slice(&payload[..8]);
        let nonce = u64::from_le_bytes(nonce_bytes);

        let mut stats = self.stats.lock();
        if stats.last_ping_nonce == Some(nonce) {
            if let Some(sent) = stats.last_ping_sent {
                stats.last_rtt_ms = Some(sent.elapsed().as_secs_f32() * 1000.0);
            }
            stats.last_ping_nonce = None;
            stats.last_ping_sent = None;
        }
    }

    fn send_keepalive(&self, tx: &mpsc::UnboundedSender<WsMessage>) -> Result<(), ()> {
        let nonce = Uuid::new_v4().as_u128() as u64;
        {
            let mut stats = self.stats.lock();
            stats.last_ping_nonce = Some(nonce);
            stats.last_ping_sent = Some(Instant::now());
        }
        let payload = nonce.to_le_bytes().to_vec();
        self.record_outgoing(payload.len() as u64);
        tx.send(WsMessage::Ping(payload.into())).map_err(|_| ())
    }

    fn install_transport(&self, tx: mpsc::UnboundedSender<WsMessage>) -> u64 {
        let generation = {
            let mut next = self.next_generation.lock();
            *next += 1;
            *next
        };
        *self.transport.lock() = Some(Transport { generation, tx });
        generation
    }

    /// Drops the outbound queue if it still belongs to `generation`
    fn clear_transport(&self, generation: u64) {
        {
            let mut transport = self.transport.lock();
            if transport.as_ref().map(|current| current.generation) != Some(generation) {
                return;
            }
            *transport = None;
        }
        let mut stats = self.stats.lock();
        stats.last_ping_nonce = None;
        stats.last_ping_sent = None;
        stats.connected_since = None;
    }

    fn enqueue_ws(&self, message: WsMessage) -> Result<(), ()> {
        match self.transport.lock().as_ref() {
            Some(transport) => transport.tx.send(message).map_err(|_| ()),
            None => Err(()),
        }
    }

    fn mark_connected(&self) {
        self.stats.lock().connected_since = Some(Instant::now());
    }

    fn snapshot(&self) -> SyncStatsSnapshot {
        let stats = self.stats.lock();
        SyncStatsSnapshot {
            bytes_out: stats.bytes_out,
            bytes_in: stats.bytes_in,
            messages_out: stats.messages_out,
            messages_in: stats.messages_in,
            last_rtt_ms: stats.last_rtt_ms,
            connected_duration: stats
                .connected_since
                .map(|inst| inst.elapsed().as_secs_f32()),
        }
    }
}

/// Pings one connection until that connection closes
async fn run_keepalive(
    inner: Arc<SyncClientState>,
    tx: mpsc::UnboundedSender<WsMessage>,
    mut closed: watch::Receiver<bool>,
    interval: Duration,
) {
    loop {
        tokio::select! {
            _ = sleep(interval) => {
                if inner.send_keepalive(&tx).is_err() {
                    break;
                }
            }
            _ = closed.changed() => break,
        }
    }
}
