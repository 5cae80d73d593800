//! Message protocol definitions
//!
//! Line-oriented text protocol: one command per line, colon-delimited
//! fields. Each message type implements `FromStr` for parsing an incoming
//! line (without its newline) and `Display` for producing the outgoing line
//! (again without the newline; writers append it).

use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Client → Server message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Answer to the `AUTH:` challenge
    Auth { token: String },
    /// Candidate name during negotiation
    Name { name: String },
    /// Chat text for everyone
    Say { text: String },
    /// Request the sorted list of named clients
    List,
    /// Ask the server to kick a named client
    Kick { name: String },
    /// Leave the chat
    Leave,
}

impl FromStr for ClientMessage {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        match line {
            "LIST:" => return Ok(ClientMessage::List),
            "LEAVE:" => return Ok(ClientMessage::Leave),
            _ => {}
        }

        if let Some(token) = line.strip_prefix("AUTH:") {
            Ok(ClientMessage::Auth {
                token: token.to_string(),
            })
        } else if let Some(name) = line.strip_prefix("NAME:") {
            Ok(ClientMessage::Name {
                name: name.to_string(),
            })
        } else if let Some(text) = line.strip_prefix("SAY:") {
            Ok(ClientMessage::Say {
                text: text.to_string(),
            })
        } else if let Some(name) = line.strip_prefix("KICK:") {
            Ok(ClientMessage::Kick {
                name: name.to_string(),
            })
        } else {
            Err(ProtocolError::Unrecognized(line.to_string()))
        }
    }
}

impl fmt::Display for ClientMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientMessage::Auth { token } => write!(f, "AUTH:{token}"),
            ClientMessage::Name { name } => write!(f, "NAME:{name}"),
            ClientMessage::Say { text } => write!(f, "SAY:{text}"),
            ClientMessage::List => f.write_str("LIST:"),
            ClientMessage::Kick { name } => write!(f, "KICK:{name}"),
            ClientMessage::Leave => f.write_str("LEAVE:"),
        }
    }
}

/// Server → Client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Authentication challenge
    Auth,
    /// Candidate name already in use (or empty)
    NameTaken,
    /// Acknowledges a good `AUTH:` or `NAME:` reply
    Ok,
    /// Name request
    Who,
    /// A client finished negotiation
    Enter { name: String },
    /// Chat text relayed from a named client
    Msg { name: String, text: String },
    /// A client left the chat
    Leave { name: String },
    /// You have been kicked
    Kick,
    /// Case-insensitively sorted names of all named clients
    List { names: Vec<String> },
}

impl FromStr for ServerMessage {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        match line {
            "AUTH:" => return Ok(ServerMessage::Auth),
            "NAME_TAKEN:" => return Ok(ServerMessage::NameTaken),
            "OK:" => return Ok(ServerMessage::Ok),
            "WHO:" => return Ok(ServerMessage::Who),
            "KICK:" => return Ok(ServerMessage::Kick),
            _ => {}
        }

        if let Some(name) = line.strip_prefix("ENTER:") {
            Ok(ServerMessage::Enter {
                name: name.to_string(),
            })
        } else if let Some(rest) = line.strip_prefix("MSG:") {
            // Names never contain the separator, text may.
            let (name, text) = rest
                .split_once(':')
                .ok_or_else(|| ProtocolError::Unrecognized(line.to_string()))?;
            Ok(ServerMessage::Msg {
                name: name.to_string(),
                text: text.to_string(),
            })
        } else if let Some(name) = line.strip_prefix("LEAVE:") {
            Ok(ServerMessage::Leave {
                name: name.to_string(),
            })
        } else if let Some(csv) = line.strip_prefix("LIST:") {
            let names = csv
                .split(',')
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect();
            Ok(ServerMessage::List { names })
        } else {
            Err(ProtocolError::Unrecognized(line.to_string()))
        }
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Auth => f.write_str("AUTH:"),
            ServerMessage::NameTaken => f.write_str("NAME_TAKEN:"),
            ServerMessage::Ok => f.write_str("OK:"),
            ServerMessage::Who => f.write_str("WHO:"),
            ServerMessage::Enter { name } => write!(f, "ENTER:{name}"),
            ServerMessage::Msg { name, text } => write!(f, "MSG:{name}:{text}"),
            ServerMessage::Leave { name } => write!(f, "LEAVE:{name}"),
            ServerMessage::Kick => f.write_str("KICK:"),
            ServerMessage::List { names } => write!(f, "LIST:{}", names.join(",")),
        }
    }
}
