use anyhow::Result;
use std::{sync::Arc, time::Instant};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use uuid::Uuid;

use reelsync_client::{
    commands::{Input, HELP},
    constants::VERSION,
    echo::EchoGuard,
    player::{MediaControl, PlaybackSync, SimulatedPlayer},
    protocol::ServerEvent,
    reconnect::{run_connection_loop, ConnectionControl},
    ClientConfig, LaunchOptions, SyncClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reelsync_client=debug,info".into()),
        )
        .init();

    let options = LaunchOptions::from_args(std::env::args().skip(1))?;
    let mut config = ClientConfig::from_env()?;
    config.apply(&options)?;
    tracing::info!("reelsync client v{} using {}", VERSION, config.server_url);

    let sync = Arc::new(SyncClient::new());
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ServerEvent>();
    let (control_tx, control_rx) = mpsc::unbounded_channel::<ConnectionControl>();

    tokio::spawn(run_connection_loop(
        Arc::clone(&sync),
        config.server_url.to_string(),
        config.reconnect_interval,
        event_tx,
        control_rx,
    ));

    let (player, mut local_rx) = SimulatedPlayer::new(None);
    let mut playback = PlaybackSync::new(player, EchoGuard::new(config.echo_cooldown));
    let mut launch = Some(options);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("Type 'help' for commands");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match Input::parse(&line) {
                    Ok(Input::Quit) => break,
                    Ok(input) => {
                        if let Err(e) = handle_input(input, &sync, &mut playback, &control_tx) {
                            println!("error: {e:#}");
                        }
                    }
                    Err(e) => println!("{e}"),
                }
            }
            Some(event) = event_rx.recv() => {
                if matches!(event, ServerEvent::Connected { .. }) {
                    if let Some(options) = launch.take() {
                        run_launch_action(&sync, options);
                    }
                }
                if let Err(e) = playback.apply_remote(&event, sync.client_id(), Instant::now()) {
                    tracing::warn!("Failed to apply remote playback: {}", e);
                }
                print_event(&event);
            }
            Some(action) = local_rx.recv() => {
                if let Some(command) = playback.on_local(action, Instant::now()) {
                    match sync.send_playback(command) {
                        Ok(true) => tracing::debug!("Announced local {:?}", action),
                        Ok(false) => {}
                        Err(e) => tracing::warn!("Failed to announce {:?}: {}", action, e),
                    }
                }
            }
        }
    }

    sync.disconnect();
    Ok(())
}

fn run_launch_action(sync: &SyncClient, options: LaunchOptions) {
    let result = match (options.create, options.room) {
        (Some(name), room) => {
            let room_id = room.unwrap_or_else(|| Uuid::new_v4().simple().to_string()[..8].to_string());
            sync.create_room(room_id, name, options.max_members)
        }
        (None, Some(room_id)) => sync.join_room(room_id),
        (None, None) => Ok(()),
    };
    if let Err(e) = result {
        tracing::warn!("Launch room request failed: {:#}", e);
    }
}

fn handle_input(
    input: Input,
    sync: &SyncClient,
    playback: &mut PlaybackSync<SimulatedPlayer>,
    control: &mpsc::UnboundedSender<ConnectionControl>,
) -> Result<()> {
    match input {
        Input::Create {
            room_id,
            name,
            max_members,
        } => sync.create_room(room_id, name, max_members)?,
        Input::Join(room_id) => sync.join_room(room_id)?,
        Input::Leave => sync.leave_room()?,
        Input::Rooms => sync.get_rooms()?,
        Input::Info(room_id) => match room_id.or_else(|| sync.last_room()) {
            Some(room_id) => sync.get_room_info(room_id)?,
            None => println!("not in a room; usage: info <room-id>"),
        },
        Input::Play => playback.media_mut().play().map_err(anyhow::Error::msg)?,
        Input::Pause => playback.media_mut().pause().map_err(anyhow::Error::msg)?,
        Input::Seek(secs) => playback
            .media_mut()
            .seek(secs * 1000.0)
            .map_err(anyhow::Error::msg)?,
        Input::Status => print_status(sync, playback),
        Input::Disconnect => control.send(ConnectionControl::Disconnect)?,
        Input::Reconnect => control.send(ConnectionControl::ReconnectNow)?,
        Input::Help => println!("{HELP}"),
        Input::Quit => {}
    }
    Ok(())
}

fn print_status(sync: &SyncClient, playback: &PlaybackSync<SimulatedPlayer>) {
    let stats = sync.stats_snapshot();
    let player = playback.media();
    println!(
        "connected: {} | id: {} | room: {}",
        sync.is_connected(),
        sync.client_id().map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
        sync.last_room().unwrap_or_else(|| "-".into()),
    );
    println!(
        "player: {} at {:.1}s",
        if player.is_playing() { "playing" } else { "paused" },
        player.position_ms() / 1000.0,
    );
    println!(
        "traffic: {} msgs out / {} msgs in, up {}, rtt {}",
        stats.messages_out,
        stats.messages_in,
        stats
            .connected_duration
            .map(|secs| format!("{secs:.0}s"))
            .unwrap_or_else(|| "-".into()),
        stats
            .last_rtt_ms
            .map(|ms| format!("{ms:.0} ms"))
            .unwrap_or_else(|| "-".into()),
    );
}

fn print_event(event: &ServerEvent) {
    match event {
        ServerEvent::Connected { client_id } => println!("connected as {client_id}"),
        ServerEvent::RoomCreated { room_id, room } => {
            println!("created room {} ({}), capacity {}", room_id, room.name, room.max_members)
        }
        ServerEvent::RoomJoined { room_id, room } => println!(
            "joined room {} ({}), {}/{} members",
            room_id,
            room.name,
            room.members.len(),
            room.max_members
        ),
        ServerEvent::RoomLeft { room_id } => println!("left room {room_id}"),
        ServerEvent::RoomError { error, room_id } => match room_id {
            Some(room_id) => println!("room error: {error} ({room_id})"),
            None => println!("room error: {error}"),
        },
        ServerEvent::RoomsList(rooms) if rooms.is_empty() => println!("no rooms"),
        ServerEvent::RoomsList(rooms) => {
            for room in rooms {
                println!(
                    "  {} - {} ({}/{})",
                    room.id, room.name, room.member_count, room.max_members
                );
            }
        }
        ServerEvent::RoomInfo(room) => {
            println!("room {} ({}) host {}", room.id, room.name, room.host_id);
            for member in &room.members {
                println!("  {member}");
            }
        }
        ServerEvent::UserJoined { user_id, .. } => println!("{user_id} joined"),
        ServerEvent::UserLeft { user_id, .. } => println!("{user_id} left"),
        ServerEvent::RoomDeleted { room_id } => println!("room {room_id} was deleted"),
        ServerEvent::PlayStateUpdate(update) => {
            println!("{} played at {:.1}s", update.user_id, update.state.current_time / 1000.0)
        }
        ServerEvent::PauseStateUpdate(update) => {
            println!("{} paused at {:.1}s", update.user_id, update.state.current_time / 1000.0)
        }
        ServerEvent::SeekTimeUpdate(update) => {
            println!("{} seeked to {:.1}s", update.user_id, update.state.current_time / 1000.0)
        }
    }
}
