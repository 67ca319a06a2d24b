use axum::Json;
use axum::extract::Path;
use axum::routing::{post, put};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::grid::{DragOutcome, EntryFilter, FilterSelector, parse_key};
use crate::models::{PositionOperation, TimetableEntry};
use crate::services::{SessionState, VisibleEntries};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DragRequest {
    pub source: String,
    pub destination: String,
}

#[derive(Debug, Serialize)]
pub struct DragResponse {
    pub outcome: DragOutcome,
    pub state: SessionState,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub operation: Option<PositionOperation>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

#[derive(Debug, Deserialize)]
pub struct RestoreRequest {
    pub slot: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/session/timetable/{uuid}", post(select_timetable))
        .route("/session/refresh", post(refresh))
        .route("/session/filter", put(set_filter))
        .route("/session/entries", get(list_entries))
        .route("/session/entries/search", post(search_entries))
        .route("/session/drag", post(drag))
        .route("/session/confirm", post(confirm))
        .route("/session/cancel", post(cancel))
        .route("/session/restore", post(restore))
        .route("/session/state", get(session_state))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    if let Some(db) = &state.db {
        sqlx::query("select 1").execute(db).await?;
    }
    Ok(StatusCode::OK)
}

async fn select_timetable(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
) -> Result<Json<VisibleEntries>, AppError> {
    let visible = state.service.select_timetable(uuid).await?;
    Ok(Json(visible))
}

async fn refresh(State(state): State<AppState>) -> Result<Json<VisibleEntries>, AppError> {
    let visible = state.service.refresh().await?;
    Ok(Json(visible))
}

async fn set_filter(
    State(state): State<AppState>,
    Json(selector): Json<FilterSelector>,
) -> Json<VisibleEntries> {
    Json(state.service.set_filter(selector).await)
}

async fn list_entries(State(state): State<AppState>) -> Json<VisibleEntries> {
    Json(state.service.visible_entries().await)
}

async fn search_entries(
    State(state): State<AppState>,
    Json(filter): Json<EntryFilter>,
) -> Result<Json<Vec<TimetableEntry>>, AppError> {
    let entries = state.service.search_entries(&filter).await?;
    Ok(Json(entries))
}

async fn drag(
    State(state): State<AppState>,
    Json(req): Json<DragRequest>,
) -> Result<Json<DragResponse>, AppError> {
    let source = parse_key(&req.source)?;
    let destination = parse_key(&req.destination)?;

    let outcome = state.service.drag(source, destination).await?;
    Ok(Json(DragResponse {
        outcome,
        state: state.service.state().await,
    }))
}

async fn confirm(
    State(state): State<AppState>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<VisibleEntries>, AppError> {
    let operation = req.operation.unwrap_or(PositionOperation::Swap);
    let visible = state.service.confirm(operation).await?;
    Ok(Json(visible))
}

async fn cancel(State(state): State<AppState>) -> Json<CancelResponse> {
    Json(CancelResponse {
        cancelled: state.service.cancel().await,
    })
}

async fn restore(
    State(state): State<AppState>,
    Json(req): Json<RestoreRequest>,
) -> Result<Json<VisibleEntries>, AppError> {
    let slot = parse_key(&req.slot)?;
    let visible = state.service.restore(slot).await?;
    Ok(Json(visible))
}

async fn session_state(State(state): State<AppState>) -> Json<SessionState> {
    Json(state.service.state().await)
}
