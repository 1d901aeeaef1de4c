//! Client side of the playback-sync relay: WebSocket transport, echo
//! suppression, reconnect scheduling and the media-control seam.

pub mod commands;
pub mod config;
pub mod constants;
pub mod echo;
pub mod player;
pub mod protocol;
pub mod reconnect;
pub mod sync;

pub use config::{ClientConfig, LaunchOptions};
pub use sync::SyncClient;
