//! Axum router construction.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use super::{handlers, state::AppState};

/// Build the application [`Router`] with all routes and middleware attached.
pub fn build(state: AppState) -> Router {
    let limits = state.limits;
    Router::new()
        .route("/api/encrypt", post(handlers::encrypt))
        .route("/api/image/process", post(handlers::process_image))
        .route("/api/image/auto-decrypt", post(handlers::auto_decrypt))
        .route("/api/hash", post(handlers::hash))
        .route("/api/keys/rsa", post(handlers::rsa_keys))
        .route("/api/keys/ecc", post(handlers::ecc_keys))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(limits.max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(limits.request_timeout))
        .layer(CompressionLayer::new())
        .with_state(state)
}
