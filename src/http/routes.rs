use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let storage_root = state.storage_root.clone();

    let router = Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Sign-in
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        // Capture control
        .route("/capture/start", post(handlers::start_capture))
        .route("/capture/stop", post(handlers::stop_capture))
        // Recording control
        .route("/record/start", post(handlers::start_recording))
        .route("/record/stop", post(handlers::stop_recording))
        .route("/record/export", post(handlers::export_recording))
        // Visualizer surface
        .route("/canvas/resize", post(handlers::resize_canvas))
        // Queries
        .route("/status", get(handlers::get_status))
        .route("/notices", get(handlers::get_notices));

    // Uploaded objects are reachable under their public URL
    let router = match storage_root {
        Some(root) => router.nest_service("/storage", ServeDir::new(root)),
        None => router,
    };

    router
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        // The studio page may be served from another origin
        .layer(CorsLayer::permissive())
        .with_state(state)
}
