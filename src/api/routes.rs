use crate::api::{handlers, middleware::record_activity, AppState};
use crate::metrics::track_metrics;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    let request_timeout = state.request_timeout;

    Router::new()
        // Health and metrics
        .route("/", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        // Book management
        .route("/v1/books", post(handlers::create_book))
        .route("/v1/books/search", get(handlers::search_books))
        .route(
            "/v1/books/:id",
            get(handlers::get_book)
                .put(handlers::update_book)
                .delete(handlers::delete_book),
        )
        // Statistics and activity
        .route("/store", get(handlers::book_stats))
        .route("/activity", get(handlers::recent_activity))
        // Activity recording needs the state
        .layer(from_fn_with_state(state.clone(), record_activity))
        .with_state(state)
        // Add middleware
        .layer(from_fn(track_metrics))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
}
