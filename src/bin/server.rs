//! `alex-server` — HTTP/SSE gateway front-end.
//!
//! Wires the container in sandbox mode (unless overridden) and serves the
//! task, session, SSE and health APIs.  `ALEX_SANDBOX_BASE_URL` is
//! required; startup aborts with a clear message when it is missing.

use std::process::ExitCode;
use std::sync::Arc;

use alex::config::load_default_config;
use alex::gateway::start_gateway;
use alex::{AppContainer, ProcessRole};

#[tokio::main]
async fn main() -> ExitCode {
    let _log_guard = alex::logging::init(false);

    let config = load_default_config();
    let container = match AppContainer::build(config, ProcessRole::Server) {
        Ok(container) => Arc::new(container),
        Err(e) => {
            eprintln!("startup error: {e}");
            return ExitCode::FAILURE;
        }
    };

    container.start().await;

    if let Err(e) = start_gateway(Arc::clone(&container)).await {
        eprintln!("gateway error: {e}");
        container.shutdown().await;
        return ExitCode::FAILURE;
    }

    container.shutdown().await;
    ExitCode::SUCCESS
}
