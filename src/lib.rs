//! tcpping: TCP ping over one long-lived connection
//!
//! Two programs share this library:
//! - `tcpping` connects once and measures round-trip time of a small
//!   request/response exchange, printing per-probe lines and a summary
//! - `tcppingd` answers those requests on a dual-stack listener
//!
//! Unlike ICMP ping, every probe travels over the same established TCP
//! session, so the figures reflect application-level latency on that path.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod runtime;
pub mod server;

pub use error::{Error, TransportError};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `level`. Diagnostics go to stderr so they never mix
/// with the client's report on stdout.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
