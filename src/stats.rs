//! Statistics reporter
//!
//! Waits for the hang-up signal and, each time it arrives, asks the
//! ChatServer for a report and writes it to stderr. The snapshot is taken
//! inside one actor command, so it is consistent with every session.

use std::io::Write;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::server::ServerCommand;

/// Signal-driven statistics task
pub struct StatsReporter {
    cmd_tx: mpsc::Sender<ServerCommand>,
    #[cfg(unix)]
    hangup: tokio::signal::unix::Signal,
}

impl StatsReporter {
    /// Register the hang-up handler
    ///
    /// Must be called before the server announces itself, so an early
    /// signal is reported instead of terminating the process.
    pub fn new(cmd_tx: mpsc::Sender<ServerCommand>) -> std::io::Result<Self> {
        Ok(Self {
            cmd_tx,
            #[cfg(unix)]
            hangup: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())?,
        })
    }

    /// Current report text from the ChatServer
    pub async fn snapshot(&self) -> Result<String, AppError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(ServerCommand::Report { reply })
            .await
            .map_err(|_| AppError::ChannelSend)?;
        Ok(rx.await?)
    }

    /// Report on every hang-up until the ChatServer is gone
    pub async fn run(mut self) {
        loop {
            if !self.wait().await {
                break;
            }
            debug!("Hang-up received, writing statistics");

            match self.snapshot().await {
                Ok(report) => emit(&mut std::io::stderr().lock(), &report),
                Err(e) => {
                    warn!("Statistics unavailable: {}", e);
                    break;
                }
            }
        }
    }

    #[cfg(unix)]
    async fn wait(&mut self) -> bool {
        self.hangup.recv().await.is_some()
    }

    #[cfg(not(unix))]
    async fn wait(&mut self) -> bool {
        // No hang-up signal here; the reporter just parks.
        std::future::pending::<()>().await;
        false
    }
}

/// Write a report; a closed stream is logged, never fatal
fn emit(out: &mut impl Write, report: &str) {
    let written = out.write_all(report.as_bytes()).and_then(|()| out.flush());
    if let Err(e) = written {
        debug!("Statistics write failed: {}", e);
    }
}
