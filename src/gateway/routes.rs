//! HTTP handlers for the task and session API.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::container::AppContainer;
use crate::coordinator::{RequestedBy, TaskRequest};
use crate::errors::AgentError;
use crate::presets::PresetConfig;

pub type GatewayState = Arc<AppContainer>;

fn error_response(e: AgentError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &e {
        AgentError::Validation(_) => StatusCode::BAD_REQUEST,
        AgentError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        AgentError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": e.to_string() })))
}

// ─── Health ──────────────────────────────────────────────────────────────────

pub async fn health(State(container): State<GatewayState>) -> impl IntoResponse {
    Json(container.health().report().await)
}

// ─── Tasks ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub task: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub agent_preset: Option<String>,
    #[serde(default)]
    pub tool_preset: Option<String>,
    #[serde(default)]
    pub llm_selection: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateTaskResponse {
    pub task_id: String,
    pub session_id: String,
    pub run_id: String,
}

pub async fn create_task(
    State(container): State<GatewayState>,
    Json(body): Json<CreateTaskRequest>,
) -> impl IntoResponse {
    let request = TaskRequest {
        task: body.task,
        session_id: body.session_id,
        presets: PresetConfig {
            agent_preset: body.agent_preset,
            tool_preset: body.tool_preset,
        },
        llm_selection: body.llm_selection,
        stream: true,
        ..Default::default()
    };

    match container.coordinator().execute_task_async(request).await {
        Ok(handle) => (
            StatusCode::ACCEPTED,
            Json(CreateTaskResponse {
                task_id: handle.task_id,
                session_id: handle.session_id,
                run_id: handle.run_id,
            }),
        )
            .into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

pub async fn get_task(
    State(container): State<GatewayState>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    match container.coordinator().task_status(&task_id) {
        Some(status) => Json(status).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown task: {task_id}") })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct CancelTaskRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn cancel_task(
    State(container): State<GatewayState>,
    Path(task_id): Path<String>,
    body: Option<Json<CancelTaskRequest>>,
) -> impl IntoResponse {
    let reason = body
        .and_then(|Json(b)| b.reason)
        .unwrap_or_else(|| "user_requested".to_string());
    if container
        .coordinator()
        .cancel_task(&task_id, &reason, RequestedBy::User)
    {
        Json(json!({ "task_id": task_id })).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown task: {task_id}") })),
        )
            .into_response()
    }
}

// ─── Sessions ────────────────────────────────────────────────────────────────

pub async fn list_sessions(State(container): State<GatewayState>) -> impl IntoResponse {
    match container.coordinator().list_sessions().await {
        Ok(sessions) => Json(json!({ "sessions": sessions })).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

pub async fn get_session(
    State(container): State<GatewayState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match container.coordinator().get_session(&session_id).await {
        Ok(session) => Json(session).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

pub async fn delete_session(
    State(container): State<GatewayState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match container.coordinator().delete_session(&session_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

pub async fn fork_session(
    State(container): State<GatewayState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match container.coordinator().fork_session(&session_id).await {
        Ok(fork) => (
            StatusCode::CREATED,
            Json(json!({ "session_id": fork.id })),
        )
            .into_response(),
        Err(e) => error_response(e).into_response(),
    }
}
