//! Playback-sync relay: groups WebSocket clients into rooms and fans
//! play/pause/seek events out to the other members of each room.

pub mod config;
pub mod connection;
pub mod coordinator;
pub mod error;
pub mod hub;
pub mod membership;
pub mod protocol;
pub mod registry;
pub mod routes;

pub use config::Config;
pub use hub::Hub;
pub use routes::router;

pub(crate) const LOG_TAG: &str = "[reelsync]";
