use crate::api::{middleware::RequestUser, AppState};
use crate::error::{AppError, Result};
use crate::metrics::gather_metrics;
use crate::models::{ActivityEvent, Book, BookSearch, NewBook, TitleUpdate};
use crate::pipeline::PoolStats;
use axum::{
    body::Bytes,
    extract::{Extension, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        pipeline: state.catalog.pool_stats(),
        activity_dropped: state.catalog.activity().dropped_events(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub pipeline: PoolStats,
    pub activity_dropped: u64,
}

/// Prometheus text exposition
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gather_metrics(),
    )
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookIdResponse {
    pub id: String,
}

/// Queue a new book
pub async fn create_book(
    State(state): State<AppState>,
    Json(request): Json<NewBook>,
) -> Result<(StatusCode, Json<BookIdResponse>)> {
    let accepted = state.catalog.create_book(request).await?;
    Ok((StatusCode::ACCEPTED, Json(BookIdResponse { id: accepted.id })))
}

/// Get a book by id
pub async fn get_book(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Book>> {
    state
        .catalog
        .get_book(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))
}

/// Queue a title change
pub async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<TitleUpdate>,
) -> Result<(StatusCode, Json<BookIdResponse>)> {
    let accepted = state.catalog.update_title(&id, update).await?;
    Ok((StatusCode::ACCEPTED, Json(BookIdResponse { id: accepted.id })))
}

/// Queue a deletion
pub async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<BookIdResponse>)> {
    let accepted = state.catalog.delete_book(&id).await?;
    Ok((StatusCode::ACCEPTED, Json(BookIdResponse { id: accepted.id })))
}

/// Pagination from the query string; wins over the body
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub size: Option<usize>,
    pub from: Option<usize>,
}

/// Search books with criteria in an optional JSON body
pub async fn search_books(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    body: Bytes,
) -> Result<Json<Vec<Book>>> {
    let mut search: BookSearch = if body.is_empty() {
        BookSearch::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("invalid search body: {}", e)))?
    };

    if let Some(size) = page.size {
        search.size = size;
    }
    if let Some(from) = page.from {
        search.from = from;
    }

    Ok(Json(state.catalog.search_books(&search).await?))
}

/// Catalog statistics
pub async fn book_stats(State(state): State<AppState>) -> Result<Json<BTreeMap<String, i64>>> {
    Ok(Json(state.catalog.book_stats().await?))
}

/// The caller's most recent recorded requests
pub async fn recent_activity(
    State(state): State<AppState>,
    Extension(RequestUser(user)): Extension<RequestUser>,
) -> Result<Json<Vec<ActivityEvent>>> {
    Ok(Json(state.catalog.recent_activity(&user).await?))
}
