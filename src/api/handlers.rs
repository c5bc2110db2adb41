use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::request_id::RequestId,
    models::{ItemKind, ItemRef, Partition, RankedCandidate},
    services::{ranking::ComparisonPrompt, ratings, sessions::SessionProgress},
};

use super::AppState;

// Request types

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub item_id: String,
    pub kind: ItemKind,
    pub partition: Partition,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceRequest {
    /// Id of whichever item of the current pair the user preferred
    pub winner_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RatingsQuery {
    pub partition: Option<Partition>,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Start rating an item in the chosen partition
pub async fn start_session(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<StartSessionRequest>,
) -> AppResult<(StatusCode, Json<SessionProgress>)> {
    tracing::info!(
        request_id = %request_id,
        item_id = %request.item_id,
        kind = %request.kind,
        partition = %request.partition,
        "Starting rating session"
    );

    let item = ItemRef::new(request.item_id, request.kind);
    let progress = state.sessions.start(item, request.partition).await?;

    Ok((StatusCode::CREATED, Json(progress)))
}

/// Current comparison of a session
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<ComparisonPrompt>> {
    let prompt = state.sessions.prompt(session_id).await?;
    Ok(Json(prompt))
}

/// Record the user's choice for the current comparison
pub async fn record_choice(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<ChoiceRequest>,
) -> AppResult<Json<SessionProgress>> {
    tracing::debug!(
        request_id = %request_id,
        session_id = %session_id,
        winner_id = %request.winner_id,
        "Recording choice"
    );

    let progress = state.sessions.choose(session_id, &request.winner_id).await?;
    Ok(Json(progress))
}

/// Abandon a session
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.sessions.cancel(session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Ratings of one kind, best first
pub async fn list_ratings(
    State(state): State<AppState>,
    Path(kind): Path<ItemKind>,
    Query(query): Query<RatingsQuery>,
) -> AppResult<Json<Vec<RankedCandidate>>> {
    let ratings = ratings::list_ratings(state.store.clone(), kind, query.partition).await?;
    Ok(Json(ratings))
}

/// Remove one rating
pub async fn delete_rating(
    State(state): State<AppState>,
    Path((kind, item_id)): Path<(ItemKind, String)>,
) -> AppResult<StatusCode> {
    ratings::delete_rating(state.store.clone(), kind, &item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
