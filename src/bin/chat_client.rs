//! Chat client - Entry Point
//!
//! `chat_client name authfile port`

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use tcp_chat::client;
use tcp_chat::config::load_secret;
use tcp_chat::ExitReason;

const USAGE: &str = "Usage: chat_client name authfile port";

#[derive(Parser, Debug)]
#[command(name = "chat_client", version, about = "Client for the TCP chat server")]
struct Args {
    /// Preferred name; a numeric suffix is added while it is taken
    name: String,

    /// File whose first line is the shared secret
    authfile: PathBuf,

    /// Server port on the loopback host
    port: u16,
}

/// Exit without waiting on the blocking stdin reader
fn exit(reason: ExitReason) -> ! {
    match reason {
        ExitReason::Left => {}
        ExitReason::Invocation => eprintln!("{USAGE}"),
        other => eprintln!("{other}"),
    }
    std::process::exit(i32::from(reason.code()))
}

#[tokio::main]
async fn main() {
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
            exit(ExitReason::Left);
        }
        Err(e) => {
            debug!("Invalid arguments: {}", e);
            exit(ExitReason::Invocation);
        }
    };

    let secret = match load_secret(&args.authfile) {
        Ok(secret) => secret,
        Err(e) => {
            debug!("{}", e);
            exit(ExitReason::Invocation);
        }
    };

    let reason = client::run(&args.name, &secret, args.port).await;
    exit(reason);
}
