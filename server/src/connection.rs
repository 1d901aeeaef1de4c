use axum::{
    extract::{
        ws::{Message as AxumWsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::SessionError;
use crate::hub::Hub;
use crate::protocol::{ClientCommand, ClientId, ServerEvent};

pub async fn ws_endpoint(ws: WebSocketUpgrade, State(hub): State<Hub>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, hub))
}

/// Drives one client channel until either direction fails, then runs the
/// disconnect path exactly once.
pub async fn handle_connection(socket: WebSocket, hub: Hub) {
    let client_id = Uuid::new_v4();
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    hub.add_client(client_id, tx);
    hub.send_to(client_id, ServerEvent::Connected { client_id });

    // Spawn task to send events to client
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!("Failed to serialize event: {}", e);
                    continue;
                }
            };

            if let Err(e) = ws_sender.send(AxumWsMessage::Text(json)).await {
                tracing::warn!("Failed to send to client {}: {}", client_id, e);
                break;
            }
        }
    });

    // Handle incoming frames
    let recv_hub = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(AxumWsMessage::Text(text)) => handle_frame(&recv_hub, client_id, &text),
                Ok(AxumWsMessage::Close(_)) => {
                    tracing::info!("Client {} closing connection", client_id);
                    break;
                }
                Err(e) => {
                    tracing::warn!("WebSocket error from {}: {}", client_id, e);
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.remove_client(client_id);
}

fn handle_frame(hub: &Hub, client_id: ClientId, text: &str) {
    match serde_json::from_str::<ClientCommand>(text) {
        Ok(command) => hub.handle_command(client_id, command),
        Err(e) => {
            tracing::warn!("Malformed frame from client {}: {}", client_id, e);
            hub.reject(client_id, SessionError::invalid(e.to_string()));
        }
    }
}
