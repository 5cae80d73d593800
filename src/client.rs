//! Chat client
//!
//! Connects to the server, answers the authentication challenge,
//! negotiates a name and then runs two loops concurrently: local input is
//! forwarded to the server, and server lines are rendered locally.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::config::{DEFAULT_HOST, ESCAPE_CHAR, MAX_NAME_ATTEMPTS};
use crate::error::ExitReason;
use crate::message::{ClientMessage, ServerMessage};

/// Name to offer after `taken` rejections: `base`, `base0`, `base1`, ...
pub fn candidate_name(base: &str, taken: Option<u32>) -> String {
    match taken {
        None => base.to_string(),
        Some(n) => format!("{base}{n}"),
    }
}

/// Connect and run a full client session
pub async fn run(name: &str, secret: &str, port: u16) -> ExitReason {
    let stream = match TcpStream::connect((DEFAULT_HOST, port)).await {
        Ok(stream) => stream,
        Err(e) => {
            debug!("Connect to port {} failed: {}", port, e);
            return ExitReason::Communication;
        }
    };

    let (reader, mut writer) = stream.into_split();
    let mut inbound = BufReader::new(reader).lines();

    let name = match handshake(&mut inbound, &mut writer, secret, name).await {
        Ok(name) => name,
        Err(reason) => return reason,
    };
    info!("Joined the chat as '{}'", name);

    let input = BufReader::new(tokio::io::stdin()).lines();
    let output = tokio::io::stdout();

    tokio::select! {
        reason = forward_input(input, &mut writer) => reason,
        reason = render_inbound(inbound, output) => reason,
    }
}

/// Answer `AUTH:` and negotiate a name; returns the accepted name
///
/// A closed stream before authentication completes is an authentication
/// failure; afterwards it is a communication failure.
pub async fn handshake<R, W>(
    lines: &mut Lines<R>,
    writer: &mut W,
    secret: &str,
    name: &str,
) -> Result<String, ExitReason>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let Some(line) = lines.next_line().await.ok().flatten() else {
            return Err(ExitReason::Authentication);
        };
        match line.parse::<ServerMessage>() {
            Ok(ServerMessage::Auth) => {
                let reply = ClientMessage::Auth {
                    token: secret.to_string(),
                };
                send_line(writer, &reply.to_string()).await?;
            }
            Ok(ServerMessage::Ok) => break,
            _ => debug!("Ignoring '{}' before authentication", line),
        }
    }

    let mut taken: Option<u32> = None;
    loop {
        let Some(line) = lines.next_line().await.ok().flatten() else {
            return Err(ExitReason::Communication);
        };
        match line.parse::<ServerMessage>() {
            Ok(ServerMessage::Who) => {
                let reply = ClientMessage::Name {
                    name: candidate_name(name, taken),
                };
                send_line(writer, &reply.to_string()).await?;
            }
            Ok(ServerMessage::NameTaken) => {
                let next = taken.map_or(0, |n| n + 1);
                if next >= MAX_NAME_ATTEMPTS {
                    return Err(ExitReason::Communication);
                }
                taken = Some(next);
            }
            Ok(ServerMessage::Ok) => return Ok(candidate_name(name, taken)),
            _ => debug!("Ignoring '{}' during name negotiation", line),
        }
    }
}

/// Translate one line of local input into the protocol line to send
///
/// A leading escape character sends the remainder verbatim; anything else
/// is chat text.
pub fn outbound_line(input: &str) -> String {
    match input.strip_prefix(ESCAPE_CHAR) {
        Some(raw) => raw.to_string(),
        None => ClientMessage::Say {
            text: input.to_string(),
        }
        .to_string(),
    }
}

/// Forward local input until the user leaves or input ends
pub async fn forward_input<R, W>(mut input: Lines<R>, writer: &mut W) -> ExitReason
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let leave = ClientMessage::Leave.to_string();

    loop {
        let line = match input.next_line().await {
            Ok(Some(line)) => outbound_line(&line),
            // End of local input leaves the chat.
            Ok(None) | Err(_) => leave.clone(),
        };

        if let Err(reason) = send_line(writer, &line).await {
            return reason;
        }
        if line == leave {
            return ExitReason::Left;
        }
    }
}

/// Human-readable rendering of a server line; None for lines not shown
pub fn render(msg: &ServerMessage) -> Option<String> {
    match msg {
        ServerMessage::Enter { name } => Some(format!("({name} has entered the chat)")),
        ServerMessage::Msg { name, text } => Some(format!("{name}: {text}")),
        ServerMessage::Leave { name } => Some(format!("({name} has left the chat)")),
        ServerMessage::List { names } => Some(format!("(current chatters: {})", names.join(","))),
        _ => None,
    }
}

/// Render server lines until kicked or the stream closes
pub async fn render_inbound<R, W>(mut lines: Lines<R>, mut out: W) -> ExitReason
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let Some(line) = lines.next_line().await.ok().flatten() else {
            return ExitReason::Communication;
        };

        let msg = match line.parse::<ServerMessage>() {
            Ok(ServerMessage::Kick) => return ExitReason::Kicked,
            Ok(msg) => msg,
            Err(_) => {
                debug!("Ignoring '{}'", line);
                continue;
            }
        };

        if let Some(text) = render(&msg) {
            if send_line(&mut out, &text).await.is_err() {
                return ExitReason::Communication;
            }
        }
    }
}

async fn send_line<W>(writer: &mut W, line: &str) -> Result<(), ExitReason>
where
    W: AsyncWrite + Unpin,
{
    let framed = format!("{line}\n");
    writer
        .write_all(framed.as_bytes())
        .await
        .map_err(|_| ExitReason::Communication)?;
    writer.flush().await.map_err(|_| ExitReason::Communication)
}
