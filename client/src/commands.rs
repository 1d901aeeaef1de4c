//! Line commands typed into the interactive client.

/// One parsed line of user input
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Create {
        room_id: String,
        name: String,
        max_members: Option<usize>,
    },
    Join(String),
    Leave,
    Rooms,
    Info(Option<String>),
    Play,
    Pause,
    /// Position in seconds
    Seek(f64),
    Status,
    Disconnect,
    Reconnect,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  create <room-id> <name...> [--max N]   create a room and join it
  join <room-id>                         join an existing room
  leave                                  leave the current room
  rooms                                  list rooms
  info [room-id]                         show one room (defaults to current)
  play | pause                           control the local player
  seek <seconds>                         jump to a position
  status                                 connection and player status
  disconnect | reconnect                 drop or restore the sync channel
  quit";

impl Input {
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err("empty command".to_string());
        };
        let rest: Vec<&str> = words.collect();

        match head.to_ascii_lowercase().as_str() {
            "create" => parse_create(&rest),
            "join" => match rest.as_slice() {
                [room_id] => Ok(Input::Join(room_id.to_string())),
                _ => Err("usage: join <room-id>".to_string()),
            },
            "leave" => Ok(Input::Leave),
            "rooms" | "ls" => Ok(Input::Rooms),
            "info" => match rest.as_slice() {
                [] => Ok(Input::Info(None)),
                [room_id] => Ok(Input::Info(Some(room_id.to_string()))),
                _ => Err("usage: info [room-id]".to_string()),
            },
            "play" => Ok(Input::Play),
            "pause" => Ok(Input::Pause),
            "seek" => match rest.as_slice() {
                [secs] => secs
                    .parse::<f64>()
                    .ok()
                    .filter(|s| s.is_finite() && *s >= 0.0)
                    .map(Input::Seek)
                    .ok_or_else(|| format!("invalid position: {secs}")),
                _ => Err("usage: seek <seconds>".to_string()),
            },
            "status" => Ok(Input::Status),
            "disconnect" => Ok(Input::Disconnect),
            "reconnect" => Ok(Input::Reconnect),
            "help" | "?" => Ok(Input::Help),
            "quit" | "exit" => Ok(Input::Quit),
            other => Err(format!("unknown command: {other}")),
        }
    }
}

fn parse_create(args: &[&str]) -> Result<Input, String> {
    let mut max_members = None;
    let mut words = Vec::new();
    let mut iter = args.iter();
    while let Some(word) = iter.next() {
        if *word == "--max" {
            let raw = iter.next().ok_or("--max needs a value")?;
            let max = raw
                .parse::<usize>()
                .map_err(|_| format!("invalid --max value: {raw}"))?;
            max_members = Some(max);
        } else {
            words.push(*word);
        }
    }

    match words.split_first() {
        Some((room_id, name)) if !name.is_empty() => Ok(Input::Create {
            room_id: room_id.to_string(),
            name: name.join(" "),
            max_members,
        }),
        _ => Err("usage: create <room-id> <name...> [--max N]".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create() {
        assert_eq!(
            Input::parse("create r1 Movie Night --max 2"),
            Ok(Input::Create {
                room_id: "r1".into(),
                name: "Movie Night".into(),
                max_members: Some(2),
            })
        );
        assert!(Input::parse("create r1").is_err());
        assert!(Input::parse("create r1 x --max").is_err());
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Input::parse("  JOIN r1 "), Ok(Input::Join("r1".into())));
        assert_eq!(Input::parse("info"), Ok(Input::Info(None)));
        assert_eq!(Input::parse("seek 90.5"), Ok(Input::Seek(90.5)));
        assert_eq!(Input::parse("exit"), Ok(Input::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Input::parse("").is_err());
        assert!(Input::parse("seek -3").is_err());
        assert!(Input::parse("seek soon").is_err());
        assert!(Input::parse("dance").is_err());
    }
}
