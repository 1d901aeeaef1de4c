pub const LOCAL_WS_URL: &str = "ws://localhost:3005/ws";

/// Delay between reconnect attempts after the channel drops
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 5_000;

/// How long local media notifications stay muted after applying a remote action
pub const DEFAULT_ECHO_COOLDOWN_MS: u64 = 1_000;

pub const KEEPALIVE_INTERVAL_SECS: u64 = 12;

/// Current application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
