//! Gateway assembly: router, middleware, bind loop.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::container::AppContainer;

use super::routes::{
    cancel_task, create_task, delete_session, fork_session, get_session, get_task, health,
    list_sessions,
};
use super::sse::sse_handler;

/// Build the API router over a started container.
pub fn router(container: Arc<AppContainer>) -> Router {
    Router::new()
        .route("/api/tasks", post(create_task))
        .route("/api/tasks/:id", get(get_task))
        .route("/api/tasks/:id/cancel", post(cancel_task))
        .route("/api/sessions", get(list_sessions))
        .route(
            "/api/sessions/:id",
            get(get_session).delete(delete_session),
        )
        .route("/api/sessions/:id/fork", post(fork_session))
        .route("/api/sse", get(sse_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(container)
}

/// Bind and serve until the process is stopped.
pub async fn start_gateway(container: Arc<AppContainer>) -> Result<(), String> {
    let addr: SocketAddr = format!(
        "{}:{}",
        container.config().server.host,
        container.config().server.port
    )
    .parse()
    .map_err(|e| format!("invalid server address: {e}"))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("could not bind {addr}: {e}"))?;
    let local = listener.local_addr().map_err(|e| e.to_string())?;
    log::info!("alex gateway listening on {local}");

    axum::serve(listener, router(container))
        .await
        .map_err(|e| format!("gateway error: {e}"))
}
