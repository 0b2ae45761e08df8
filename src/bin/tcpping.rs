//! tcpping: measure round-trip time over one TCP connection.

use std::process::ExitCode;
use tcpping::client::{self, ConsoleReporter};
use tcpping::config::ClientConfig;
use tcpping::runtime::{cancel, CancelToken};
use tracing::{debug, error, warn};

fn main() -> ExitCode {
    let config = match ClientConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tcpping: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tcpping::init_tracing(&config.log_level);

    let token = CancelToken::new();
    if let Err(e) = cancel::cancel_on_interrupt(token.clone()) {
        warn!(error = %e, "Ctrl+C handler unavailable");
    }

    let mut reporter = ConsoleReporter::stdout();
    match client::run(&config, &token, &mut reporter) {
        Ok(Some(_)) => ExitCode::SUCCESS,
        Ok(None) => {
            debug!("Interrupted before a connection was established");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "tcpping failed");
            eprintln!("tcpping: {}", e);
            ExitCode::FAILURE
        }
    }
}
