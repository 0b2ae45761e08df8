//! tcpping server.
//!
//! One dual-stack listener accepts connections and hands each one to its
//! own task through the `Supervisor`. The accept loop never waits on a
//! session, and sessions share no state.

pub mod handler;
pub mod supervisor;

pub use handler::{handle_connection, Session};
pub use supervisor::{Slot, Supervisor};

use crate::config::ServerConfig;
use crate::runtime::socket;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Pause after a failed accept (e.g. descriptor exhaustion) before retrying.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Listener plus session supervisor.
pub struct Dispatcher {
    listener: TcpListener,
    supervisor: Supervisor,
}

impl Dispatcher {
    /// Bind the dual-stack listener.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(config: &ServerConfig) -> io::Result<Self> {
        let listener = socket::dual_stack_listener(config.port, config.backlog)?;
        Ok(Self {
            listener: TcpListener::from_std(listener)?,
            supervisor: Supervisor::new(config.max_sessions),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever.
    ///
    /// Only fails if the session limiter breaks; accept errors are logged
    /// and accepting continues.
    pub async fn run(self) -> io::Result<()> {
        info!(
            address = %self.local_addr()?,
            "TCP ping server listening (IPv4/IPv6 dual-stack)"
        );

        loop {
            let slot = self.supervisor.reserve().await?;

            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(
                        peer = %peer,
                        active = ?self.supervisor.active(),
                        "Accepted connection"
                    );
                    slot.spawn(handle_connection(stream, peer));
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}
