use anyhow::{bail, Context, Result};
use std::{env, str::FromStr, time::Duration};
use url::Url;

use crate::constants::{DEFAULT_ECHO_COOLDOWN_MS, DEFAULT_RECONNECT_INTERVAL_MS, LOCAL_WS_URL};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: Url,
    pub reconnect_interval: Duration,
    pub echo_cooldown: Duration,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_url = match lookup("REELSYNC_SERVER_URL").filter(|v| !v.trim().is_empty()) {
            Some(raw) => parse_server_url(raw.trim())?,
            None => parse_server_url(LOCAL_WS_URL)?,
        };
        let reconnect_ms = parse_or(&lookup, "REELSYNC_RECONNECT_MS", DEFAULT_RECONNECT_INTERVAL_MS)?;
        let cooldown_ms = parse_or(&lookup, "REELSYNC_ECHO_COOLDOWN_MS", DEFAULT_ECHO_COOLDOWN_MS)?;

        if reconnect_ms == 0 {
            bail!("REELSYNC_RECONNECT_MS must be at least 1");
        }

        Ok(Self {
            server_url,
            reconnect_interval: Duration::from_millis(reconnect_ms),
            echo_cooldown: Duration::from_millis(cooldown_ms),
        })
    }

    /// Command-line flags win over the environment
    pub fn apply(&mut self, options: &LaunchOptions) -> Result<()> {
        if let Some(server) = &options.server {
            self.server_url = parse_server_url(server)?;
        }
        Ok(())
    }
}

/// What the user asked for on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    pub server: Option<String>,
    pub room: Option<String>,
    pub create: Option<String>,
    pub max_members: Option<usize>,
}

impl LaunchOptions {
    pub fn from_args<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--server" => options.server = Some(flag_value(&mut args, "--server")?),
                "--room" => options.room = Some(flag_value(&mut args, "--room")?),
                "--create" => options.create = Some(flag_value(&mut args, "--create")?),
                "--max" => {
                    let raw = flag_value(&mut args, "--max")?;
                    let max = raw
                        .parse()
                        .with_context(|| format!("Invalid --max value: {raw}"))?;
                    options.max_members = Some(max);
                }
                other => bail!("Unknown argument: {other}"),
            }
        }
        if options.max_members.is_some() && options.create.is_none() {
            bail!("--max only applies together with --create");
        }
        Ok(options)
    }
}

fn flag_value<I>(args: &mut I, flag: &str) -> Result<String>
where
    I: Iterator<Item = String>,
{
    args.next()
        .filter(|value| !value.starts_with("--"))
        .with_context(|| format!("{flag} needs a value"))
}

fn parse_server_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("Invalid server URL: {raw}"))?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => bail!("Server URL must use ws or wss, got {other}"),
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.server_url.as_str(), "ws://localhost:3005/ws");
        assert_eq!(config.reconnect_interval, Duration::from_millis(5000));
        assert_eq!(config.echo_cooldown, Duration::from_millis(1000));
    }

    #[test]
    fn test_env_overrides() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("REELSYNC_SERVER_URL", "wss://sync.example.com/ws"),
            ("REELSYNC_RECONNECT_MS", "250"),
            ("REELSYNC_ECHO_COOLDOWN_MS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.server_url.scheme(), "wss");
        assert_eq!(config.reconnect_interval, Duration::from_millis(250));
        assert_eq!(config.echo_cooldown, Duration::ZERO);
    }

    #[test]
    fn test_rejects_http_url() {
        let err = ClientConfig::from_lookup(lookup_from(&[(
            "REELSYNC_SERVER_URL",
            "http://localhost:3005/ws",
        )]))
        .unwrap_err();
        assert!(err.to_string().contains("ws or wss"));
    }

    #[test]
    fn test_parses_launch_flags() {
        let options = LaunchOptions::from_args(args(&[
            "--server",
            "ws://10.0.0.2:3005/ws",
            "--room",
            "r1",
            "--create",
            "Movie Night",
            "--max",
            "2",
        ]))
        .unwrap();
        assert_eq!(options.room.as_deref(), Some("r1"));
        assert_eq!(options.create.as_deref(), Some("Movie Night"));
        assert_eq!(options.max_members, Some(2));

        let mut config = ClientConfig::from_lookup(lookup_from(&[])).unwrap();
        config.apply(&options).unwrap();
        assert_eq!(config.server_url.host_str(), Some("10.0.0.2"));
    }

    #[test]
    fn test_rejects_bad_flags() {
        assert!(LaunchOptions::from_args(args(&["--room"])).is_err());
        assert!(LaunchOptions::from_args(args(&["--max", "two", "--create", "x"])).is_err());
        assert!(LaunchOptions::from_args(args(&["--max", "3"])).is_err());
        assert!(LaunchOptions::from_args(args(&["--verbose"])).is_err());
    }
}
