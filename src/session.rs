//! Session struct definition
//!
//! Represents one connected participant as held by the Roster: identity,
//! negotiated name, outbound channel and per-session command counters.

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::ClientId;

/// Lifecycle of a session worker
///
/// `AuthenticatedUnnamed → NamedActive → Terminated`. A connection that
/// has not yet passed the auth gate is `Connecting` and has no Roster entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted, waiting for the `AUTH:` reply
    Connecting,
    /// In the Roster without a name, negotiating one
    AuthenticatedUnnamed,
    /// Named and dispatching chat commands
    NamedActive,
    /// Worker finished; the Roster entry (if any) is gone
    Terminated,
}

/// Per-session command counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionCounters {
    pub say: u64,
    pub kick: u64,
    pub list: u64,
}

/// Connected session information
#[derive(Debug)]
pub struct Session {
    /// Unique identifier for this session
    pub id: ClientId,
    /// Negotiated name (None until negotiation succeeds)
    pub name: Option<String>,
    /// Server → Client message channel
    pub sender: mpsc::UnboundedSender<ServerMessage>,
    /// Commands issued by this session
    pub counters: SessionCounters,
}

impl Session {
    /// Create a new unnamed session with the given ID and sender channel
    pub fn new(id: ClientId, sender: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            id,
            name: None,
            sender,
            counters: SessionCounters::default(),
        }
    }

    /// Queue a message for this session's writer
    ///
    /// Never waits on the peer. Returns an error if the channel is closed
    /// (writer task gone).
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender.send(msg).map_err(|_| SendError::ChannelClosed)
    }

    /// Check if this session has negotiated a name
    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }

    /// Whether this session is named exactly `name`
    pub fn has_name(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }

    /// Statistics line: `<name>:SAY:<n>:KICK:<n>:LIST:<n>`
    ///
    /// Returns None for unnamed sessions.
    pub fn stats_line(&self) -> Option<String> {
        let name = self.name.as_deref()?;
        let SessionCounters { say, kick, list } = self.counters;
        Some(format!("{name}:SAY:{say}:KICK:{kick}:LIST:{list}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = Session::new(ClientId::new(), tx);

        assert!(session.name.is_none());
        assert!(!session.is_named());
        assert_eq!(session.counters, SessionCounters::default());
        assert!(session.stats_line().is_none());
    }

    #[tokio::test]
    async fn test_session_send() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = Session::new(ClientId::new(), tx);

        session.send(ServerMessage::Who).unwrap();
        assert_eq!(rx.recv().await, Some(ServerMessage::Who));

        drop(rx);
        assert!(session.send(ServerMessage::Who).is_err());
    }

    #[test]
    fn test_send_does_not_wait_for_reader() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = Session::new(ClientId::new(), tx);

        for _ in 0..10_000 {
            session.send(ServerMessage::Kick).unwrap();
        }
        assert_eq!(rx.try_recv(), Ok(ServerMessage::Kick));
    }

    #[test]
    fn test_stats_line() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut session = Session::new(ClientId::new(), tx);
        session.name = Some("alice".to_string());
        session.counters = SessionCounters {
            say: 3,
            kick: 1,
            list: 0,
        };

        assert!(session.has_name("alice"));
        assert!(!session.has_name("Alice"));
        assert_eq!(
            session.stats_line().as_deref(),
            Some("alice:SAY:3:KICK:1:LIST:0")
        );
    }
}
