//! Session worker
//!
//! Handles one accepted connection: the authentication gate, name
//! negotiation and the chat command loop. Outbound lines are written by a
//! separate writer task fed through the session's unbounded channel. The
//! ChatServer only ever enqueues onto it, so a peer that stops reading
//! backs up its own queue and never the actor.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::message::{ClientMessage, ServerMessage};
use crate::roster::NameClaim;
use crate::server::ServerCommand;
use crate::session::SessionState;
use crate::types::ClientId;

/// Handle a new TCP connection
///
/// Runs the session to completion. Returns once the peer has left (or
/// failed a handshake step) and every queued outbound line is written.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    // One small line per write.
    stream.set_nodelay(true)?;

    let (reader, writer) = stream.into_split();
    let client_id = ClientId::new();
    debug!("Client {} connected from {}", client_id, peer_addr);

    let result = serve(client_id, reader, writer, cmd_tx).await;
    info!("Client {} disconnected", client_id);
    result
}

/// Run a session over any split byte stream
pub async fn serve<R, W>(
    client_id: ClientId,
    reader: R,
    writer: W,
    cmd_tx: mpsc::Sender<ServerCommand>,
) -> Result<(), AppError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (msg_tx, msg_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let write_task = tokio::spawn(write_loop(writer, msg_rx));

    let mut worker = SessionWorker::new(client_id, BufReader::new(reader), msg_tx, cmd_tx);
    let result = worker.run().await;

    // The writer stops once the Roster has dropped its sender too.
    drop(worker);
    let _ = write_task.await;

    result
}

/// Write each queued message as one line, flushing after every line
pub async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<ServerMessage>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = rx.recv().await {
        let line = format!("{msg}\n");
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            debug!("Write failed, ending write task: {}", e);
            break;
        }
        if writer.flush().await.is_err() {
            break;
        }
    }
    debug!("Write task ended");

    let _ = writer.shutdown().await;
}

/// Per-connection protocol state machine
pub struct SessionWorker<R> {
    id: ClientId,
    state: SessionState,
    lines: Lines<R>,
    outbound: mpsc::UnboundedSender<ServerMessage>,
    commands: mpsc::Sender<ServerCommand>,
}

impl<R> SessionWorker<R>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    pub fn new(
        id: ClientId,
        reader: R,
        outbound: mpsc::UnboundedSender<ServerMessage>,
        commands: mpsc::Sender<ServerCommand>,
    ) -> Self {
        Self {
            id,
            state: SessionState::Connecting,
            lines: reader.lines(),
            outbound,
            commands,
        }
    }

    /// Drive the session through every state until it terminates
    ///
    /// A session that fails while it holds an unnamed Roster entry has that
    /// entry dropped without announcement.
    pub async fn run(&mut self) -> Result<(), AppError> {
        let result = self.drive().await;
        if let Err(e) = &result {
            debug!("Client {} failed in {:?}: {}", self.id, self.state, e);
            if self.state == SessionState::AuthenticatedUnnamed {
                let _ = self
                    .commands
                    .send(ServerCommand::Abandon { client_id: self.id })
                    .await;
            }
        }
        self.state = SessionState::Terminated;
        result
    }

    async fn drive(&mut self) -> Result<(), AppError> {
        self.authenticate().await?;
        self.state = SessionState::AuthenticatedUnnamed;

        let name = self.claim_name().await?;
        self.state = SessionState::NamedActive;

        self.dispatch(&name).await
    }

    /// `AUTH:` challenge, exactly one comparison
    async fn authenticate(&mut self) -> Result<(), AppError> {
        self.send(ServerMessage::Auth)?;

        let Some(line) = self.next_line().await else {
            return Err(AppError::AuthClosed);
        };
        let Ok(ClientMessage::Auth { token }) = line.parse::<ClientMessage>() else {
            warn!("Client {} answered the challenge with '{}'", self.id, line);
            return Err(AppError::AuthRejected);
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        self.command(ServerCommand::Authenticate {
            client_id: self.id,
            token,
            sender: self.outbound.clone(),
            reply: reply_tx,
        })
        .await?;

        if reply_rx.await? {
            Ok(())
        } else {
            Err(AppError::AuthRejected)
        }
    }

    /// Name negotiation: `WHO:` until a candidate is accepted
    async fn claim_name(&mut self) -> Result<String, AppError> {
        loop {
            self.send(ServerMessage::Who)?;

            let Some(line) = self.next_line().await else {
                return Err(AppError::NegotiationClosed);
            };
            let Ok(ClientMessage::Name { name }) = line.parse::<ClientMessage>() else {
                debug!("Client {} sent '{}' while negotiating", self.id, line);
                continue;
            };

            let (reply_tx, reply_rx) = oneshot::channel();
            self.command(ServerCommand::ClaimName {
                client_id: self.id,
                name: name.clone(),
                reply: reply_tx,
            })
            .await?;

            match reply_rx.await? {
                NameClaim::Accepted => return Ok(name),
                NameClaim::Taken => continue,
                NameClaim::Unknown => return Err(AppError::NotAdmitted),
            }
        }
    }

    /// Chat command loop for a named session
    async fn dispatch(&mut self, name: &str) -> Result<(), AppError> {
        loop {
            let Some(line) = self.next_line().await else {
                debug!("Client {} ('{}') closed the stream", self.id, name);
                return self.command(ServerCommand::Leave { client_id: self.id }).await;
            };

            let client_id = self.id;
            let cmd = match line.parse::<ClientMessage>() {
                Ok(ClientMessage::Say { text }) => ServerCommand::Say { client_id, text },
                Ok(ClientMessage::List) => ServerCommand::List { client_id },
                Ok(ClientMessage::Kick { name: target }) => ServerCommand::Kick { client_id, target },
                Ok(ClientMessage::Leave) => {
                    debug!("Client {} ('{}') sent LEAVE:", self.id, name);
                    return self.command(ServerCommand::Leave { client_id }).await;
                }
                Ok(ClientMessage::Auth { .. }) | Ok(ClientMessage::Name { .. }) | Err(_) => {
                    debug!("Ignoring '{}' from {}", line, self.id);
                    continue;
                }
            };
            self.command(cmd).await?;
        }
    }

    /// Next protocol line; None on end of stream or read error
    async fn next_line(&mut self) -> Option<String> {
        match self.lines.next_line().await {
            Ok(line) => line,
            Err(e) => {
                debug!("Read error for {}: {}", self.id, e);
                None
            }
        }
    }

    fn send(&self, msg: ServerMessage) -> Result<(), AppError> {
        self.outbound.send(msg).map_err(|_| AppError::ChannelSend)
    }

    async fn command(&self, cmd: ServerCommand) -> Result<(), AppError> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| AppError::ChannelSend)
    }
}
