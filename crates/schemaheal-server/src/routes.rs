//! Control surface handlers

use crate::error::ApiResult;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use schemaheal_core::{Fix, FixExecution};
use schemaheal_engine::{HealthMonitor, IssueView, MonitorStatus, ScanTicket};
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct AppState {
    pub monitor: HealthMonitor,
}

#[derive(Debug, Default, Deserialize)]
pub struct IssuesQuery {
    /// Include resolved and applied issues
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplyRequest {
    #[serde(default)]
    pub approved: bool,
}

#[derive(Debug, Deserialize)]
pub struct AutoApplyRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct AutoApplyResponse {
    pub auto_apply_enabled: bool,
}

/// Build the router
pub fn router(monitor: HealthMonitor) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/issues", get(list_issues))
        .route("/scan", post(trigger_scan))
        .route("/fixes/executions", get(list_executions))
        .route("/fixes/:issue_id/preview", post(preview_fix))
        .route("/fixes/:issue_id/apply", post(apply_fix))
        .route("/monitoring/auto-apply", post(set_auto_apply))
        .route("/monitoring/resume", post(resume))
        .with_state(AppState { monitor })
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn status(State(state): State<AppState>) -> Json<MonitorStatus> {
    Json(state.monitor.status())
}

async fn list_issues(State(state): State<AppState>, Query(query): Query<IssuesQuery>) -> Json<Vec<IssueView>> {
    Json(state.monitor.issues(query.all))
}

async fn trigger_scan(State(state): State<AppState>) -> ApiResult<(StatusCode, Json<ScanTicket>)> {
    let ticket = state.monitor.trigger_scan()?;
    tracing::info!(cycle_id = %ticket.cycle_id, already_running = ticket.already_running, "scan requested");
    Ok((StatusCode::ACCEPTED, Json(ticket)))
}

async fn preview_fix(State(state): State<AppState>, Path(issue_id): Path<String>) -> ApiResult<Json<Fix>> {
    Ok(Json(state.monitor.preview_fix(&issue_id)?))
}

async fn apply_fix(
    State(state): State<AppState>,
    Path(issue_id): Path<String>,
    body: Option<Json<ApplyRequest>>,
) -> ApiResult<Json<FixExecution>> {
    let approved = body.map(|Json(request)| request.approved).unwrap_or(false);
    let execution = state.monitor.apply_fix(&issue_id, approved).await?;
    Ok(Json(execution))
}

async fn list_executions(State(state): State<AppState>) -> ApiResult<Json<Vec<FixExecution>>> {
    Ok(Json(state.monitor.executions()?))
}

async fn set_auto_apply(
    State(state): State<AppState>,
    Json(request): Json<AutoApplyRequest>,
) -> Json<AutoApplyResponse> {
    Json(AutoApplyResponse {
        auto_apply_enabled: state.monitor.set_auto_apply(request.enabled),
    })
}

async fn resume(State(state): State<AppState>) -> Json<MonitorStatus> {
    state.monitor.resume();
    Json(state.monitor.status())
}
