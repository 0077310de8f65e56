// src/api/handlers.rs

use crate::api::{auth, types::*, ApiState};
use crate::calendar;
use crate::timer::{CommandReply, Notification, TimerAction, TimerSnapshot};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

async fn run_action(
    state: &ApiState,
    headers: &HeaderMap,
    action: TimerAction,
) -> Result<Json<CommandReply>, ApiError> {
    auth::check_auth(state, headers)?;
    let reply = state.timer.apply(action).await.map_err(track_error)?;
    Ok(Json(reply))
}

/// GET /api/v1/timer — Current timer snapshot.
pub async fn get_timer(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<TimerSnapshot>, ApiError> {
    auth::check_auth(&state, &headers)?;
    let snapshot = state.timer.state().await.map_err(track_error)?;
    Ok(Json(snapshot))
}

/// POST /api/v1/timer/select — Attach the timer to a task.
pub async fn select_task(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<SelectRequest>,
) -> Result<Json<CommandReply>, ApiError> {
    let task_id = body.task_id.trim();
    if task_id.is_empty() {
        auth::check_auth(&state, &headers)?;
        return Err(api_error(StatusCode::BAD_REQUEST, "task_id cannot be empty"));
    }
    run_action(&state, &headers, TimerAction::Select(task_id.to_string())).await
}

pub async fn start(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<CommandReply>, ApiError> {
    run_action(&state, &headers, TimerAction::Start).await
}

pub async fn pause(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<CommandReply>, ApiError> {
    run_action(&state, &headers, TimerAction::Pause).await
}

pub async fn toggle(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<CommandReply>, ApiError> {
    run_action(&state, &headers, TimerAction::Toggle).await
}

/// POST /api/v1/timer/save — Record the current interval.
pub async fn save(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<CommandReply>, ApiError> {
    run_action(&state, &headers, TimerAction::Save).await
}

pub async fn reset(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<CommandReply>, ApiError> {
    run_action(&state, &headers, TimerAction::Reset).await
}

/// POST /api/v1/timer/reconcile — Retry unsynced saves and deletes now.
pub async fn reconcile(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<CommandReply>, ApiError> {
    run_action(&state, &headers, TimerAction::Reconcile).await
}

/// DELETE /api/v1/timer/selection — Detach the timer from its task.
pub async fn clear_selection(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<CommandReply>, ApiError> {
    run_action(&state, &headers, TimerAction::ClearSelection).await
}

/// DELETE /api/v1/timer/records/{index} — Delete one recorded interval.
pub async fn delete_record(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(index): Path<usize>,
) -> Result<Json<CommandReply>, ApiError> {
    run_action(&state, &headers, TimerAction::Delete(index)).await
}

/// GET /api/v1/timer/notifications — Drain queued notifications.
pub async fn notifications(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Notification>>, ApiError> {
    auth::check_auth(&state, &headers)?;
    let drained = state
        .timer
        .drain_notifications()
        .await
        .map_err(track_error)?;
    Ok(Json(drained))
}

/// GET /api/calendar/{token} — iCalendar feed. The token is the credential.
pub async fn calendar_feed(
    State(state): State<ApiState>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    let body = calendar::feed_for_token(&state.store, &token, &state.calendar)
        .await
        .map_err(track_error)?;
    Ok((
        [
            (header::CONTENT_TYPE, calendar::CONTENT_TYPE),
            (header::CONTENT_DISPOSITION, calendar::CONTENT_DISPOSITION),
        ],
        body,
    )
        .into_response())
}

/// GET /api/v1/health — Simple health check.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
