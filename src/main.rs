//! Multi-client TCP Chat Server - Entry Point
//!
//! Loads the secret, binds the listener, starts the ChatServer actor and
//! the statistics reporter, then accepts connections.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use tcp_chat::config::{load_secret, COMMAND_BUFFER_SIZE, MIN_PORT};
use tcp_chat::{accept_loop, bind, ChatServer, ExitReason, Roster, StatsReporter};

const USAGE: &str = "Usage: chat_server authfile [port]";

#[derive(Parser, Debug)]
#[command(name = "chat_server", version, about = "Multi-client TCP chat server")]
struct Args {
    /// File whose first line is the shared secret
    authfile: PathBuf,

    /// Port to listen on; an ephemeral port is chosen when omitted
    #[arg(value_parser = clap::value_parser!(u16).range(i64::from(MIN_PORT)..))]
    port: Option<u16>,
}

fn exit_with(reason: ExitReason, message: &str) -> ExitCode {
    eprintln!("{message}");
    ExitCode::from(reason.code())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Use RUST_LOG to raise the level, e.g. RUST_LOG=tcp_chat=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tcp_chat=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            debug!("Invalid arguments: {}", e);
            return exit_with(ExitReason::Invocation, USAGE);
        }
    };

    let secret = match load_secret(&args.authfile) {
        Ok(secret) => secret,
        Err(e) => {
            debug!("{}", e);
            return exit_with(ExitReason::Invocation, USAGE);
        }
    };

    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER_SIZE);

    // Registered before the port is announced.
    let reporter = match StatsReporter::new(cmd_tx.clone()) {
        Ok(reporter) => reporter,
        Err(e) => {
            error!("Failed to register the hang-up handler: {}", e);
            return exit_with(ExitReason::Communication, "Communications error");
        }
    };

    let (listener, port) = match bind(args.port.unwrap_or(0)).await {
        Ok(bound) => bound,
        Err(e) => {
            error!("Failed to bind: {}", e);
            return exit_with(ExitReason::Communication, "Communications error");
        }
    };
    eprintln!("{port}");

    tokio::spawn(ChatServer::new(cmd_rx, Roster::new(secret)).run());
    tokio::spawn(reporter.run());
    info!("ChatServer actor started");

    accept_loop(listener, cmd_tx).await;
    ExitCode::SUCCESS
}
