//! Error types for the chat server and client
//!
//! Defines session-level errors, message send errors, configuration errors
//! and the process exit reasons shared by both binaries.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Session worker errors
///
/// Every variant ends the session worker. None of them is fatal to the
/// server process; the acceptor keeps running.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error on the peer socket
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Command channel to the ChatServer actor is closed
    #[error("Channel send error")]
    ChannelSend,

    /// The actor dropped a reply channel without answering
    #[error("ChatServer dropped the reply")]
    ReplyDropped,

    /// Peer closed the stream before answering `AUTH:`
    #[error("Stream closed during authentication")]
    AuthClosed,

    /// Peer presented a token that does not match the secret
    #[error("Authentication rejected")]
    AuthRejected,

    /// Peer closed the stream during name negotiation
    #[error("Stream closed during name negotiation")]
    NegotiationClosed,

    /// The session has no Roster entry
    #[error("Session is not in the roster")]
    NotAdmitted,
}

impl From<tokio::sync::oneshot::error::RecvError> for AppError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        AppError::ReplyDropped
    }
}

/// Message send errors
///
/// Occurs when attempting to send messages through closed channels.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Secret file missing or unreadable
    #[error("cannot read secret file {path}: {source}")]
    SecretFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A line that is not a known protocol message
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unrecognized line: {0}")]
    Unrecognized(String),
}

/// Why a process terminates, mapped to a distinct exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExitReason {
    /// Local explicit leave (client) or end of input
    #[error("left the chat")]
    Left,
    /// Bad arguments or unreadable files, before any networking
    #[error("invalid invocation")]
    Invocation,
    /// Connect/bind failure or unexpected stream closure
    #[error("Communications error")]
    Communication,
    /// Server-issued forced termination
    #[error("Kicked")]
    Kicked,
    /// Stream closed while authenticating (bad secret)
    #[error("Authentication error")]
    Authentication,
}

impl ExitReason {
    /// Process exit status for this reason
    pub fn code(self) -> u8 {
        match self {
            ExitReason::Left => 0,
            ExitReason::Invocation => 1,
            ExitReason::Communication => 2,
            ExitReason::Kicked => 3,
            ExitReason::Authentication => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let reasons = [
            ExitReason::Left,
            ExitReason::Invocation,
            ExitReason::Communication,
            ExitReason::Kicked,
            ExitReason::Authentication,
        ];
        let mut codes: Vec<u8> = reasons.iter().map(|r| r.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), reasons.len());
    }

    #[test]
    fn test_exit_messages() {
        assert_eq!(ExitReason::Kicked.to_string(), "Kicked");
        assert_eq!(ExitReason::Communication.to_string(), "Communications error");
        assert_eq!(ExitReason::Authentication.to_string(), "Authentication error");
    }
}
