use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::protocol::ServerEvent;
use crate::sync::SyncClient;

/// Fixed-interval reconnect timer, kept as plain state so the owning loop
/// decides when to sleep.
#[derive(Debug, Clone)]
pub struct ReconnectSchedule {
    interval: Duration,
    next_attempt: Option<Instant>,
    cancelled: bool,
}

impl ReconnectSchedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_attempt: None,
            cancelled: false,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn next_attempt(&self) -> Option<Instant> {
        self.next_attempt
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn on_disconnected(&mut self, now: Instant) {
        if self.cancelled {
            return;
        }
        // Only one pending attempt at a time
        if self.next_attempt.is_none() {
            self.next_attempt = Some(now + self.interval);
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        !self.cancelled && self.next_attempt.is_some_and(|at| now >= at)
    }

    pub fn on_attempt_failed(&mut self, now: Instant) {
        if self.cancelled {
            return;
        }
        self.next_attempt = Some(now + self.interval);
    }

    pub fn on_connected(&mut self) {
        self.next_attempt = None;
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.next_attempt = None;
    }

    pub fn resume(&mut self) {
        self.cancelled = false;
    }
}

/// User-issued connection control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionControl {
    /// Close the channel and stop reconnecting
    Disconnect,
    /// Connect immediately, clearing a previous disconnect
    ReconnectNow,
}

/// Keeps the sync channel up: connects, re-joins the last room, and after a
/// drop waits out the schedule before trying again. Ends when the control
/// channel closes.
pub async fn run_connection_loop(
    sync_client: Arc<SyncClient>,
    server_url: String,
    interval: Duration,
    events: mpsc::UnboundedSender<ServerEvent>,
    mut control_rx: mpsc::UnboundedReceiver<ConnectionControl>,
) {
    let mut schedule = ReconnectSchedule::new(interval);
    let mut attempt: u32 = 0;

    loop {
        if schedule.is_cancelled() {
            match control_rx.recv().await {
                Some(ConnectionControl::ReconnectNow) => {
                    tracing::info!("Reconnect requested; resuming connection attempts");
                    schedule.resume();
                }
                Some(ConnectionControl::Disconnect) => continue,
                None => return,
            }
        }

        attempt += 1;
        tracing::debug!("Connecting to {} (attempt {})", server_url, attempt);

        let handler_events = events.clone();
        let connected = sync_client
            .connect(&server_url, move |event| {
                let _ = handler_events.send(event);
            })
            .await;

        let closed = match connected {
            Ok(closed) => {
                tracing::info!("Connected to sync server at {}", server_url);
                attempt = 0;
                schedule.on_connected();
                if let Some(room_id) = sync_client.last_room() {
                    tracing::info!("Rejoining room {}", room_id);
                    if let Err(e) = sync_client.join_room(room_id) {
                        tracing::warn!("Failed to queue rejoin: {}", e);
                    }
                }
                Some(closed)
            }
            Err(e) => {
                tracing::warn!("Failed to connect to {}: {:#}", server_url, e);
                schedule.on_attempt_failed(Instant::now());
                None
            }
        };

        if let Some(mut closed) = closed {
            loop {
                tokio::select! {
                    _ = &mut closed => {
                        tracing::warn!("Connection to sync server lost");
                        schedule.on_disconnected(Instant::now());
                        break;
                    }
                    control = control_rx.recv() => match control {
                        Some(ConnectionControl::Disconnect) => {
                            sync_client.disconnect();
                            schedule.cancel();
                            tracing::info!("Disconnected by user");
                            break;
                        }
                        Some(ConnectionControl::ReconnectNow) => {
                            tracing::debug!("Already connected; ignoring reconnect request");
                        }
                        None => {
                            sync_client.disconnect();
                            return;
                        }
                    },
                }
            }
        }

        let Some(deadline) = schedule.next_attempt() else {
            continue;
        };
        tracing::info!(
            "Reconnecting in {} ms",
            deadline.saturating_duration_since(Instant::now()).as_millis()
        );

        let sleep = tokio::time::sleep_until(deadline.into());
        tokio::pin!(sleep);
        tokio::select! {
            _ = sleep.as_mut() => {}
            control = control_rx.recv() => match control {
                Some(ConnectionControl::ReconnectNow) => {
                    tracing::info!("Manual reconnect requested");
                    schedule.on_connected();
                    attempt = 0;
                }
                Some(ConnectionControl::Disconnect) => {
                    tracing::info!("Reconnect cancelled by user");
                    schedule.cancel();
                }
                None => {
                    tracing::info!("Control channel closed; stopping connection loop");
                    return;
                }
            },
        }
    }
}
