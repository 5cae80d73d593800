//! ChatServer Actor implementation
//!
//! The central actor that exclusively owns the Roster. Session workers and
//! the statistics reporter talk to it through `ServerCommand`s; because it
//! handles one command at a time, each handler below is a critical section:
//! admission, name check+commit, counters, broadcast iteration and the
//! statistics snapshot never interleave. Handlers only enqueue onto session
//! channels and never wait on a peer.

use std::fmt;
use std::io::Write;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::message::ServerMessage;
use crate::roster::{NameClaim, Roster};
use crate::session::Session;
use crate::types::ClientId;

/// Commands sent from session workers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// Check an `AUTH:` token; on success admit the session unnamed
    Authenticate {
        client_id: ClientId,
        token: String,
        sender: mpsc::UnboundedSender<ServerMessage>,
        reply: oneshot::Sender<bool>,
    },
    /// Claim a name for an unnamed session
    ClaimName {
        client_id: ClientId,
        name: String,
        reply: oneshot::Sender<NameClaim>,
    },
    /// Broadcast chat text
    Say {
        client_id: ClientId,
        text: String,
    },
    /// Broadcast the sorted name list
    List {
        client_id: ClientId,
    },
    /// Send `KICK:` to a named session
    Kick {
        client_id: ClientId,
        target: String,
    },
    /// Named session leaves (explicit `LEAVE:` or closed stream)
    Leave {
        client_id: ClientId,
    },
    /// Drop a session that failed negotiation, without announcement
    Abandon {
        client_id: ClientId,
    },
    /// Snapshot the statistics report
    Report {
        reply: oneshot::Sender<String>,
    },
}

/// The main ChatServer actor
///
/// Owns the Roster and processes commands from session workers.
pub struct ChatServer {
    /// All admitted sessions, counters and the secret
    roster: Roster,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
    /// Where enter/chat/leave lines are rendered (stdout by default)
    console: Box<dyn Write + Send>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>, roster: Roster) -> Self {
        Self {
            roster,
            receiver,
            console: Box::new(std::io::stdout()),
        }
    }

    /// Render console lines to `console` instead of stdout
    pub fn with_console(mut self, console: impl Write + Send + 'static) -> Self {
        self.console = Box::new(console);
        self
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("ChatServer shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Authenticate {
                client_id,
                token,
                sender,
                reply,
            } => {
                let accepted = self.handle_authenticate(client_id, &token, sender);
                let _ = reply.send(accepted);
            }
            ServerCommand::ClaimName {
                client_id,
                name,
                reply,
            } => {
                let claim = self.handle_claim_name(client_id, name);
                let _ = reply.send(claim);
            }
            ServerCommand::Say { client_id, text } => {
                self.handle_say(client_id, text);
            }
            ServerCommand::List { client_id } => {
                self.handle_list(client_id);
            }
            ServerCommand::Kick { client_id, target } => {
                self.handle_kick(client_id, &target);
            }
            ServerCommand::Leave { client_id } => {
                self.handle_leave(client_id);
            }
            ServerCommand::Abandon { client_id } => {
                if self.roster.remove(client_id).is_some() {
                    debug!("Client {} abandoned negotiation", client_id);
                }
            }
            ServerCommand::Report { reply } => {
                let _ = reply.send(self.roster.report());
            }
        }
    }

    /// Handle an `AUTH:` reply
    ///
    /// On success the session is admitted unnamed and `OK:` is queued
    /// before the worker is told, so it precedes the first `WHO:`.
    fn handle_authenticate(
        &mut self,
        client_id: ClientId,
        token: &str,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> bool {
        if !self.roster.authenticate(token) {
            warn!("Client {} failed authentication", client_id);
            return false;
        }

        let session = Session::new(client_id, sender);
        let _ = session.send(ServerMessage::Ok);
        self.roster.admit(session);
        info!("Client {} authenticated", client_id);
        debug!("Total sessions: {}", self.roster.len());
        true
    }

    /// Handle a `NAME:` candidate
    fn handle_claim_name(&mut self, client_id: ClientId, name: String) -> NameClaim {
        let claim = self.roster.claim_name(client_id, &name);

        match claim {
            NameClaim::Accepted => {
                if let Some(session) = self.roster.get(client_id) {
                    let _ = session.send(ServerMessage::Ok);
                }
                info!("Client {} is now '{}'", client_id, name);
                self.render(format_args!("({name} has entered the chat)"));
                self.broadcast(ServerMessage::Enter { name });
            }
            NameClaim::Taken => {
                if let Some(session) = self.roster.get(client_id) {
                    let _ = session.send(ServerMessage::NameTaken);
                }
                debug!("Client {} asked for taken name '{}'", client_id, name);
            }
            NameClaim::Unknown => {}
        }

        claim
    }

    /// Handle chat text
    fn handle_say(&mut self, client_id: ClientId, text: String) {
        let Some(name) = self.roster.record_say(client_id) else {
            return;
        };

        self.render(format_args!("{name}: {text}"));
        self.broadcast(ServerMessage::Msg { name, text });
    }

    /// Handle a listing request
    fn handle_list(&mut self, client_id: ClientId) {
        if !self.roster.record_list(client_id) {
            return;
        }

        let names = self.roster.sorted_names();
        self.broadcast(ServerMessage::List { names });
    }

    /// Handle a kick request
    ///
    /// Only `KICK:` is sent; the target stays in the Roster until its own
    /// connection closes and its worker reports the leave.
    fn handle_kick(&mut self, client_id: ClientId, target: &str) {
        if !self.roster.record_kick(client_id) {
            return;
        }

        match self.roster.find_named(target) {
            Some(session) => {
                info!("Client {} kicked '{}'", client_id, target);
                let _ = session.send(ServerMessage::Kick);
            }
            None => {
                debug!("Kick target '{}' not found", target);
            }
        }
    }

    /// Handle a named session leaving
    fn handle_leave(&mut self, client_id: ClientId) {
        let Some(session) = self.roster.remove(client_id) else {
            return;
        };

        let Some(name) = session.name else {
            debug!("Client {} left before naming", client_id);
            return;
        };

        self.roster.record_leave();
        info!("Client {} ('{}') left", client_id, name);
        self.render(format_args!("({name} has left the chat)"));
        // Already removed, so the departing session is not a target.
        self.broadcast(ServerMessage::Leave { name });
    }

    /// Write one console line
    ///
    /// A closed or broken console is logged and otherwise ignored.
    fn render(&mut self, line: fmt::Arguments<'_>) {
        let written = writeln!(self.console, "{line}").and_then(|()| self.console.flush());
        if let Err(e) = written {
            debug!("Console write failed: {}", e);
        }
    }

    /// Send a message to every named session
    ///
    /// A failed send means that peer's writer is gone; its worker will
    /// observe the closed stream and report the leave itself.
    fn broadcast(&self, msg: ServerMessage) {
        for session in self.roster.named() {
            if session.send(msg.clone()).is_err() {
                debug!("Broadcast to {} failed, channel closed", session.id);
            }
        }
    }
}
