//! Relay configuration loaded from environment variables

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use anyhow::{bail, Context, Result};

const DEFAULT_PORT: u16 = 3005;
const DEFAULT_MAX_MEMBERS: usize = 10;
const DEFAULT_MAX_ROOM_CAPACITY: usize = 100;

/// Capacity limits applied when rooms are created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomSettings {
    /// Used when create-room omits `maxMembers`
    pub default_max_members: usize,
    /// Upper bound a requested `maxMembers` is clamped to
    pub max_room_capacity: usize,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            default_max_members: DEFAULT_MAX_MEMBERS,
            max_room_capacity: DEFAULT_MAX_ROOM_CAPACITY,
        }
    }
}

impl RoomSettings {
    /// Resolves the capacity for a new room. `None` for a zero request.
    pub fn capacity_for(&self, requested: Option<usize>) -> Option<usize> {
        match requested {
            Some(0) => None,
            Some(value) => Some(value.min(self.max_room_capacity)),
            None => Some(self.default_max_members),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address (default: 0.0.0.0)
    pub host: IpAddr,

    /// Listen port (default: 3005)
    pub port: u16,

    pub rooms: RoomSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            rooms: RoomSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = parse_or(&lookup, "HOST", defaults.host)?;
        let port = parse_or(&lookup, "PORT", defaults.port)?;
        let default_max_members = parse_or(
            &lookup,
            "DEFAULT_MAX_MEMBERS",
            defaults.rooms.default_max_members,
        )?;
        let max_room_capacity = parse_or(
            &lookup,
            "MAX_ROOM_CAPACITY",
            defaults.rooms.max_room_capacity,
        )?;

        if default_max_members == 0 {
            bail!("DEFAULT_MAX_MEMBERS must be at least 1");
        }
        if max_room_capacity < default_max_members {
            bail!(
                "MAX_ROOM_CAPACITY ({}) must not be below DEFAULT_MAX_MEMBERS ({})",
                max_room_capacity,
                default_max_members
            );
        }

        Ok(Self {
            host,
            port,
            rooms: RoomSettings {
                default_max_members,
                max_room_capacity,
            },
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key).filter(|value| !value.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key} value: {raw}")),
        None => Ok(default),
    }
}
