use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::AppState;
use crate::middleware::request_id::{make_span_with_request_id, request_id_middleware};

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                // Outermost, so the trace span can read the id
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        // Rating sessions
        .route("/sessions", post(handlers::start_session))
        .route(
            "/sessions/:session_id",
            get(handlers::get_session).delete(handlers::cancel_session),
        )
        .route("/sessions/:session_id/choice", post(handlers::record_choice))
        // Stored ratings
        .route("/ratings/:kind", get(handlers::list_ratings))
        .route("/ratings/:kind/:item_id", delete(handlers::delete_rating))
}
