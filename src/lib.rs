//! Multi-client TCP Chat Server Library
//!
//! A line-oriented chat server and its client, built on tokio using the
//! Actor pattern for shared state.
//!
//! # Features
//! - Shared-secret authentication
//! - Unique name negotiation with retry
//! - Broadcast chat, sorted name listing, kick and leave
//! - Statistics report on the hang-up signal
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor owning the `Roster`
//! - Each connection has a `handler` task communicating with the server
//! - No locks needed - all Roster access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::sync::mpsc;
//! use tcp_chat::{accept_loop, bind, ChatServer, Roster};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let (listener, port) = bind(0).await?;
//!     eprintln!("{port}");
//!
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!     tokio::spawn(ChatServer::new(cmd_rx, Roster::new("secret")).run());
//!
//!     accept_loop(listener, cmd_tx).await;
//!     Ok(())
//! }
//! ```

pub mod acceptor;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod roster;
pub mod server;
pub mod session;
pub mod stats;
pub mod types;

// Re-export main types for convenience
pub use acceptor::{accept_loop, bind};
pub use error::{AppError, ConfigError, ExitReason, SendError};
pub use handler::handle_connection;
pub use message::{ClientMessage, ServerMessage};
pub use roster::Roster;
pub use server::{ChatServer, ServerCommand};
pub use session::Session;
pub use stats::StatsReporter;
pub use types::ClientId;
