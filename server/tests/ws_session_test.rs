//! End-to-end room sessions over real WebSocket connections

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use reelsync_server::config::RoomSettings;
use reelsync_server::protocol::{ErrorKind, ServerEvent};
use reelsync_server::{router, Hub};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_relay() -> (SocketAddr, Hub) {
    let hub = Hub::new(RoomSettings::default());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(hub.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, hub)
}

/// Connects and returns the socket along with the id the relay assigned.
async fn connect(addr: SocketAddr) -> (Socket, Uuid) {
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    match next_event(&mut ws).await {
        ServerEvent::Connected { client_id } => (ws, client_id),
        other => panic!("expected connected, got {other:?}"),
    }
}

async fn send(ws: &mut Socket, frame: Value) {
    ws.send(Message::Text(frame.to_string().into())).await.unwrap();
}

async fn next_event(ws: &mut Socket) -> ServerEvent {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn test_movie_night_session() {
    let (addr, hub) = spawn_relay().await;
    let (mut a, a_id) = connect(addr).await;
    let (mut b, b_id) = connect(addr).await;
    let (mut c, _c_id) = connect(addr).await;

    send(
        &mut a,
        json!({ "type": "create-room", "payload": { "roomId": "r1", "roomName": "Movie Night", "maxMembers": 2 } }),
    )
    .await;
    assert!(matches!(
        next_event(&mut a).await,
        ServerEvent::RoomCreated { room_id, .. } if room_id == "r1"
    ));

    send(&mut b, json!({ "type": "join-room", "payload": { "roomId": "r1" } })).await;
    match next_event(&mut b).await {
        ServerEvent::RoomJoined { room, .. } => assert_eq!(room.members, vec![a_id, b_id]),
        other => panic!("expected room-joined, got {other:?}"),
    }
    assert!(matches!(
        next_event(&mut a).await,
        ServerEvent::UserJoined { user_id, .. } if user_id == b_id
    ));

    send(&mut c, json!({ "type": "join-room", "payload": { "roomId": "r1" } })).await;
    assert_eq!(
        next_event(&mut c).await,
        ServerEvent::RoomError {
            error: ErrorKind::RoomFull,
            room_id: Some("r1".into()),
        }
    );

    send(
        &mut a,
        json!({ "type": "play-state", "payload": { "currentTime": 120000 } }),
    )
    .await;
    match next_event(&mut b).await {
        ServerEvent::PlayStateUpdate(update) => {
            assert_eq!(update.state.current_time, 120000.0);
            assert_eq!(update.user_id, a_id);
        }
        other => panic!("expected play-state-update, got {other:?}"),
    }

    // A's next frame is the reply to this query, so no echo was queued before it.
    send(&mut a, json!({ "type": "get-rooms" })).await;
    assert!(matches!(next_event(&mut a).await, ServerEvent::RoomsList(_)));

    hub.verify_consistency().unwrap();
}

#[tokio::test]
async fn test_malformed_frame_keeps_connection_open() {
    let (addr, _hub) = spawn_relay().await;
    let (mut a, _) = connect(addr).await;

    send(&mut a, json!({ "type": "play-state", "payload": { "duration": 3 } })).await;
    assert_eq!(
        next_event(&mut a).await,
        ServerEvent::RoomError {
            error: ErrorKind::InvalidPayload,
            room_id: None,
        }
    );

    send(&mut a, json!({ "type": "get-rooms" })).await;
    assert_eq!(next_event(&mut a).await, ServerEvent::RoomsList(Vec::new()));
}

#[tokio::test]
async fn test_disconnect_migrates_host_and_notifies() {
    let (addr, hub) = spawn_relay().await;
    let (mut a, a_id) = connect(addr).await;
    let (mut b, b_id) = connect(addr).await;

    send(
        &mut a,
        json!({ "type": "create-room", "payload": { "roomId": "r1", "roomName": "Movie Night" } }),
    )
    .await;
    next_event(&mut a).await;
    send(&mut b, json!({ "type": "join-room", "payload": { "roomId": "r1" } })).await;
    next_event(&mut b).await;
    next_event(&mut a).await;

    a.close(None).await.unwrap();

    assert!(matches!(
        next_event(&mut b).await,
        ServerEvent::UserLeft { user_id, .. } if user_id == a_id
    ));
    send(&mut b, json!({ "type": "get-room-info", "payload": { "roomId": "r1" } })).await;
    match next_event(&mut b).await {
        ServerEvent::RoomInfo(info) => {
            assert_eq!(info.host_id, b_id);
            assert_eq!(info.members, vec![b_id]);
        }
        other => panic!("expected room-info, got {other:?}"),
    }
    hub.verify_consistency().unwrap();
}

#[tokio::test]
async fn test_last_member_disconnect_removes_room() {
    let (addr, hub) = spawn_relay().await;
    let (mut a, _) = connect(addr).await;

    send(
        &mut a,
        json!({ "type": "create-room", "payload": { "roomId": "r1", "roomName": "Movie Night" } }),
    )
    .await;
    next_event(&mut a).await;
    send(&mut a, json!({ "type": "leave-room" })).await;
    assert_eq!(
        next_event(&mut a).await,
        ServerEvent::RoomLeft {
            room_id: "r1".into()
        }
    );
    drop(a);

    for _ in 0..50 {
        if hub.connection_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(hub.connection_count(), 0);
    assert!(hub.room_summaries().is_empty());
}
