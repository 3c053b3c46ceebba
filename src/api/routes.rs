//! API Routes
//!
//! Configures the Axum router with all resource cache endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, get_entry_handler, health_handler, invalidate_handler, navigate_handler,
    predictions_handler, put_entry_handler, record_event_handler, reset_stats_handler,
    resolve_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /resolve/*key` - Resolve a resource through its strategy
/// - `GET|PUT|DELETE /entries/*key` - Read, store or invalidate one entry
/// - `DELETE /entries` - Clear every bucket
/// - `GET|DELETE /stats` - Read or reset statistics
/// - `POST /events` - Record a navigation event
/// - `POST /navigate` - Schedule prefetches after a navigation
/// - `GET /predictions/*key` - Predicted next resources
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/resolve/*key", get(resolve_handler))
        .route(
            "/entries/*key",
            get(get_entry_handler)
                .put(put_entry_handler)
                .delete(invalidate_handler),
        )
        .route("/entries", delete(clear_handler))
        .route("/stats", get(stats_handler).delete(reset_stats_handler))
        .route("/events", post(record_event_handler))
        .route("/navigate", post(navigate_handler))
        .route("/predictions/*key", get(predictions_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
