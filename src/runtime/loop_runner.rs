//! Long-running event loop for interactive front ends.
//!
//! Multiplexes shutdown signals, commands from the front end, completed
//! background tasks and timer deadlines.

use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use super::{sleep_until_opt, Controller};
use crate::api::RemoteApi;
use crate::app::{App, Effect};

/// A transition requested by the front end.
pub type Command = Box<dyn FnOnce(&mut App, Instant) -> Vec<Effect> + Send>;

/// Housekeeping interval for status-message expiry.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_millis(250);

impl<A: RemoteApi> Controller<A> {
    /// Run until the command channel closes or a shutdown signal arrives.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<Command>) -> Result<()> {
        let mut housekeeping = tokio::time::interval(HOUSEKEEPING_INTERVAL);

        #[cfg(unix)]
        let mut sigterm = signal(SignalKind::terminate())?;
        #[cfg(unix)]
        let mut sigint = signal(SignalKind::interrupt())?;

        loop {
            #[cfg(unix)]
            let sigterm_fut = sigterm.recv();
            #[cfg(not(unix))]
            let sigterm_fut = std::future::pending::<Option<()>>();

            #[cfg(unix)]
            let sigint_fut = sigint.recv();
            #[cfg(not(unix))]
            let sigint_fut = std::future::pending::<Option<()>>();

            let deadline = self.app.next_deadline();

            tokio::select! {
                biased;

                _ = sigterm_fut => {
                    tracing::info!("Received SIGTERM, shutting down gracefully");
                    break;
                }

                _ = sigint_fut => {
                    tracing::info!("Received SIGINT, shutting down gracefully");
                    break;
                }

                Some(event) = self.event_rx.recv() => self.on_event(event),

                command = commands.recv() => match command {
                    Some(command) => self.act(command),
                    None => {
                        tracing::debug!("Command channel closed");
                        break;
                    }
                },

                _ = sleep_until_opt(deadline) => self.on_deadline(),

                _ = housekeeping.tick() => {
                    self.app.clear_expired_status();
                }
            }
        }
        Ok(())
    }
}
