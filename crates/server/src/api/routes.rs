use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{handlers, middleware::metrics_middleware, titles};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Titles
        .route(
            "/titles",
            get(titles::list_titles)
                .post(titles::install_title)
                .delete(titles::clear_titles),
        )
        .route(
            "/titles/{id}",
            get(titles::get_title).delete(titles::remove_title),
        )
        .route("/titles/{id}/play", post(titles::play_title))
        .route("/stats", get(titles::get_stats))
        // Notifications
        .route("/notifications", get(handlers::list_notifications))
        // Disc images are far larger than the default body limit.
        .layer(DefaultBodyLimit::disable())
        .with_state(Arc::clone(&state));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
