//! Connection acceptor
//!
//! Binds the loopback listener and spawns one session worker per accepted
//! connection. The loop never waits on session work.

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::DEFAULT_HOST;
use crate::error::AppError;
use crate::handler::handle_connection;
use crate::server::ServerCommand;

/// Bind the listener on the loopback host
///
/// Port 0 asks the OS for an ephemeral port. Returns the listener together
/// with the port actually bound.
pub async fn bind(port: u16) -> std::io::Result<(TcpListener, u16)> {
    let listener = TcpListener::bind((DEFAULT_HOST, port)).await?;
    let port = listener.local_addr()?.port();
    info!("Chat server listening on {}:{}", DEFAULT_HOST, port);
    Ok((listener, port))
}

/// Accept connections forever
pub async fn accept_loop(listener: TcpListener, cmd_tx: mpsc::Sender<ServerCommand>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!("New connection from {}", addr);
                let cmd_tx = cmd_tx.clone();

                tokio::spawn(async move {
                    match handle_connection(stream, cmd_tx).await {
                        Ok(()) => {}
                        Err(e @ (AppError::AuthClosed
                        | AppError::AuthRejected
                        | AppError::NegotiationClosed)) => {
                            debug!("Session from {} ended early: {}", addr, e);
                        }
                        Err(e) => error!("Connection handler error: {}", e),
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Roster;
    use crate::server::ChatServer;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let (_listener, port) = bind(0).await.unwrap();
        assert_ne!(port, 0);
    }

    #[tokio::test]
    async fn test_accepts_parallel_connections() {
        let (listener, port) = bind(0).await.unwrap();
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        tokio::spawn(ChatServer::new(cmd_rx, Roster::new("pw")).run());
        tokio::spawn(accept_loop(listener, cmd_tx));

        // The first connection stays silent; the second is still served.
        let silent = TcpStream::connect((DEFAULT_HOST, port)).await.unwrap();
        let mut active = TcpStream::connect((DEFAULT_HOST, port)).await.unwrap();

        let (read, mut write) = active.split();
        let mut lines = BufReader::new(read).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("AUTH:"));
        write.write_all(b"AUTH:pw\n").await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("OK:"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("WHO:"));

        drop(silent);
    }
}
