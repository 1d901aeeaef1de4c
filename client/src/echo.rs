use std::time::{Duration, Instant};

use crate::constants::DEFAULT_ECHO_COOLDOWN_MS;

/// Mutes outbound playback notifications while a remote action is being applied.
///
/// Applying a remote play/pause/seek makes the local player fire the same
/// notifications a user action would. Without the guard those would be sent
/// back to the room and bounce between members.
#[derive(Debug, Clone)]
pub struct EchoGuard {
    cooldown: Duration,
    applying_until: Option<Instant>,
}

impl Default for EchoGuard {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_ECHO_COOLDOWN_MS))
    }
}

impl EchoGuard {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            applying_until: None,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Arms the guard; a second remote action extends the window
    pub fn begin_remote(&mut self, now: Instant) {
        self.applying_until = Some(now + self.cooldown);
    }

    pub fn is_applying_remote(&mut self, now: Instant) -> bool {
        match self.applying_until {
            Some(deadline) if now < deadline => true,
            Some(_) => {
                self.applying_until = None;
                false
            }
            None => false,
        }
    }

    /// Whether a locally observed action should be announced to the room
    pub fn should_emit(&mut self, now: Instant) -> bool {
        !self.is_applying_remote(now)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.applying_until
    }
}
