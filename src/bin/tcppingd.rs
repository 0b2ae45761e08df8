//! tcppingd: answer tcpping probes on a dual-stack listener.

use std::process::ExitCode;
use tcpping::config::ServerConfig;
use tcpping::server::Dispatcher;
use tracing::{error, info};

fn main() -> ExitCode {
    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tcppingd: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tcpping::init_tracing(&config.log_level);

    info!(
        port = config.port,
        backlog = config.backlog,
        max_sessions = ?config.max_sessions,
        "Starting tcppingd"
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to build runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        let dispatcher = Dispatcher::bind(&config)?;
        dispatcher.run().await
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, port = config.port, "Server failed");
            ExitCode::FAILURE
        }
    }
}
