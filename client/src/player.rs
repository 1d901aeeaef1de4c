use std::time::Instant;

use serde_json::Map;
use tokio::sync::mpsc;

use crate::echo::EchoGuard;
use crate::protocol::{ClientCommand, ClientId, PlaybackState, PlaybackUpdate, ServerEvent};

/// Adapter over whatever actually renders the video. Times are milliseconds.
pub trait MediaControl {
    fn play(&mut self) -> Result<(), String>;
    fn pause(&mut self) -> Result<(), String>;
    fn seek(&mut self, position_ms: f64) -> Result<(), String>;
    fn position_ms(&self) -> f64;
    fn duration_ms(&self) -> Option<f64>;
}

/// Playback change observed on the local player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalAction {
    Play,
    Pause,
    Seek,
}

impl LocalAction {
    pub fn command(self, state: PlaybackState) -> ClientCommand {
        match self {
            LocalAction::Play => ClientCommand::PlayState(state),
            LocalAction::Pause => ClientCommand::PauseState(state),
            LocalAction::Seek => ClientCommand::SeekTime(state),
        }
    }
}

/// Wires a media control to the room: remote updates drive the player and
/// local changes become outbound commands, with the echo guard in between.
pub struct PlaybackSync<M> {
    media: M,
    guard: EchoGuard,
}

impl<M: MediaControl> PlaybackSync<M> {
    pub fn new(media: M, guard: EchoGuard) -> Self {
        Self { media, guard }
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }

    pub fn guard(&self) -> &EchoGuard {
        &self.guard
    }

    /// Applies a relayed playback update. Returns whether the player was touched.
    pub fn apply_remote(
        &mut self,
        event: &ServerEvent,
        own_id: Option<ClientId>,
        now: Instant,
    ) -> Result<bool, String> {
        let (action, update) = match event {
            ServerEvent::PlayStateUpdate(update) => (LocalAction::Play, update),
            ServerEvent::PauseStateUpdate(update) => (LocalAction::Pause, update),
            ServerEvent::SeekTimeUpdate(update) => (LocalAction::Seek, update),
            _ => return Ok(false),
        };
        if own_id == Some(update.user_id) {
            return Ok(false);
        }

        self.guard.begin_remote(now);
        self.apply(action, update)?;
        Ok(true)
    }

    fn apply(&mut self, action: LocalAction, update: &PlaybackUpdate) -> Result<(), String> {
        let position = update.state.current_time;
        tracing::debug!("Applying remote {:?} at {} ms from {}", action, position, update.user_id);
        self.media.seek(position)?;
        match action {
            LocalAction::Play => self.media.play(),
            LocalAction::Pause => self.media.pause(),
            LocalAction::Seek => Ok(()),
        }
    }

    /// Turns a local player notification into a command, unless it is the
    /// echo of a remote action still inside the cool-down.
    pub fn on_local(&mut self, action: LocalAction, now: Instant) -> Option<ClientCommand> {
        if !self.guard.should_emit(now) {
            tracing::debug!("Suppressed local {:?} while applying remote action", action);
            return None;
        }
        Some(action.command(self.current_state()))
    }

    pub fn current_state(&self) -> PlaybackState {
        PlaybackState {
            current_time: self.media.position_ms(),
            duration: self.media.duration_ms(),
            extra: Map::new(),
        }
    }
}

/// Clock-driven stand-in for a real player. Like a real one it reports every
/// play/pause/seek through its notification channel, whoever caused it.
pub struct SimulatedPlayer {
    playing: bool,
    anchor_ms: f64,
    anchor_at: Instant,
    duration_ms: Option<f64>,
    notify: mpsc::UnboundedSender<LocalAction>,
}

impl SimulatedPlayer {
    pub fn new(
        duration_ms: Option<f64>,
    ) -> (Self, mpsc::UnboundedReceiver<LocalAction>) {
        let (notify, rx) = mpsc::unbounded_channel();
        let player = Self {
            playing: false,
            anchor_ms: 0.0,
            anchor_at: Instant::now(),
            duration_ms,
            notify,
        };
        (player, rx)
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    fn position_at(&self, now: Instant) -> f64 {
        let mut position = self.anchor_ms;
        if self.playing {
            position += now.duration_since(self.anchor_at).as_secs_f64() * 1000.0;
        }
        match self.duration_ms {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    fn reanchor(&mut self, position_ms: f64) {
        self.anchor_ms = position_ms;
        self.anchor_at = Instant::now();
    }

    fn emit(&self, action: LocalAction) {
        // Nobody listening just means nobody cares
        let _ = self.notify.send(action);
    }
}

impl MediaControl for SimulatedPlayer {
    fn play(&mut self) -> Result<(), String> {
        if !self.playing {
            self.reanchor(self.position_at(Instant::now()));
            self.playing = true;
        }
        self.emit(LocalAction::Play);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), String> {
        if self.playing {
            self.reanchor(self.position_at(Instant::now()));
            self.playing = false;
        }
        self.emit(LocalAction::Pause);
        Ok(())
    }

    fn seek(&mut self, position_ms: f64) -> Result<(), String> {
        if !position_ms.is_finite() || position_ms < 0.0 {
            return Err(format!("Invalid seek position {position_ms}"));
        }
        let target = match self.duration_ms {
            Some(duration) => position_ms.min(duration),
            None => position_ms,
        };
        self.reanchor(target);
        self.emit(LocalAction::Seek);
        Ok(())
    }

    fn position_ms(&self) -> f64 {
        self.position_at(Instant::now())
    }

    fn duration_ms(&self) -> Option<f64> {
        self.duration_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Play,
        Pause,
        Seek(f64),
    }

    #[derive(Default)]
    struct RecordingPlayer {
        calls: Vec<Call>,
        position: f64,
    }

    impl MediaControl for RecordingPlayer {
        fn play(&mut self) -> Result<(), String> {
            self.calls.push(Call::Play);
            Ok(())
        }

        fn pause(&mut self) -> Result<(), String> {
            self.calls.push(Call::Pause);
            Ok(())
        }

        fn seek(&mut self, position_ms: f64) -> Result<(), String> {
            self.position = position_ms;
            self.calls.push(Call::Seek(position_ms));
            Ok(())
        }

        fn position_ms(&self) -> f64 {
            self.position
        }

        fn duration_ms(&self) -> Option<f64> {
            Some(5_400_000.0)
        }
    }

    fn update(user_id: ClientId, current_time: f64) -> PlaybackUpdate {
        PlaybackUpdate {
            state: PlaybackState {
                current_time,
                duration: None,
                extra: Map::new(),
            },
            user_id,
            timestamp: 0,
        }
    }

    fn sync() -> PlaybackSync<RecordingPlayer> {
        PlaybackSync::new(
            RecordingPlayer::default(),
            EchoGuard::new(Duration::from_millis(1000)),
        )
    }

    #[test]
    fn test_remote_play_seeks_then_plays() {
        let mut sync = sync();
        let other = Uuid::new_v4();
        let event = ServerEvent::PlayStateUpdate(update(other, 120_000.0));

        assert!(sync.apply_remote(&event, Some(Uuid::new_v4()), Instant::now()).unwrap());
        assert_eq!(sync.media().calls, vec![Call::Seek(120_000.0), Call::Play]);
    }

    #[test]
    fn test_remote_pause_and_seek() {
        let mut sync = sync();
        let other = Uuid::new_v4();
        let now = Instant::now();

        sync.apply_remote(&ServerEvent::PauseStateUpdate(update(other, 10.0)), None, now)
            .unwrap();
        sync.apply_remote(&ServerEvent::SeekTimeUpdate(update(other, 20.0)), None, now)
            .unwrap();

        assert_eq!(
            sync.media().calls,
            vec![Call::Seek(10.0), Call::Pause, Call::Seek(20.0)]
        );
    }

    #[test]
    fn test_own_updates_are_ignored() {
        let mut sync = sync();
        let me = Uuid::new_v4();
        let event = ServerEvent::SeekTimeUpdate(update(me, 5.0));

        assert!(!sync.apply_remote(&event, Some(me), Instant::now()).unwrap());
        assert!(sync.media().calls.is_empty());
    }

    #[test]
    fn test_echo_suppressed_then_reenabled() {
        let mut sync = sync();
        let start = Instant::now();
        let event = ServerEvent::PlayStateUpdate(update(Uuid::new_v4(), 3_000.0));
        sync.apply_remote(&event, None, start).unwrap();

        assert_eq!(sync.on_local(LocalAction::Seek, start), None);
        assert_eq!(
            sync.on_local(LocalAction::Play, start + Duration::from_millis(500)),
            None
        );

        let later = sync.on_local(LocalAction::Pause, start + Duration::from_millis(1000));
        assert!(matches!(
            later,
            Some(ClientCommand::PauseState(state)) if state.current_time == 3_000.0
        ));
    }

    #[test]
    fn test_remote_applied_during_cooldown() {
        let mut sync = sync();
        let start = Instant::now();
        let other = Uuid::new_v4();
        sync.apply_remote(&ServerEvent::PlayStateUpdate(update(other, 1.0)), None, start)
            .unwrap();
        sync.apply_remote(
            &ServerEvent::PauseStateUpdate(update(other, 2.0)),
            None,
            start + Duration::from_millis(100),
        )
        .unwrap();

        assert_eq!(sync.media().calls.last(), Some(&Call::Pause));
    }

    #[test]
    fn test_simulated_player_reports_every_change() {
        let (mut player, mut rx) = SimulatedPlayer::new(Some(60_000.0));
        player.seek(90_000.0).unwrap();
        player.play().unwrap();
        player.pause().unwrap();

        assert!(player.position_ms() >= 60_000.0);
        assert!(!player.is_playing());
        assert!(player.seek(-1.0).is_err());

        let mut seen = Vec::new();
        while let Ok(action) = rx.try_recv() {
            seen.push(action);
        }
        assert_eq!(
            seen,
            vec![LocalAction::Seek, LocalAction::Play, LocalAction::Pause]
        );
    }
}
