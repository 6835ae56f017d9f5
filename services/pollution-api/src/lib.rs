//! Pollution API service library.
//!
//! Serves the active gridded pollution dataset over HTTP: metadata, point
//! feature collections and rendered rasters, plus dataset switching and
//! upload.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod registry;
pub mod state;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post, put},
    Extension, Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Multipart framing allowance on top of the configured upload size.
const UPLOAD_OVERHEAD: usize = 64 * 1024;

/// Build the router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let upload_limit = usize::try_from(state.config.upload.max_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(UPLOAD_OVERHEAD);
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/pollution", get(handlers::pollution::features_handler))
        .route("/pollution/image", get(handlers::pollution::image_handler))
        .route("/pollution/bounds", get(handlers::pollution::bounds_handler))
        .route("/pollution/time", get(handlers::pollution::time_handler))
        .route("/pollution/species", get(handlers::pollution::species_handler))
        .route("/pollution/data_types", get(handlers::pollution::data_types_handler))
        // Dataset management
        .route("/pollution/datasets", get(handlers::datasets::list_handler))
        .route("/pollution/datasets/current", put(handlers::datasets::switch_handler))
        .route(
            "/pollution/upload",
            post(handlers::datasets::upload_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        // Health and metrics
        .route("/health", get(handlers::health::health_handler))
        .route("/ready", get(handlers::health::ready_handler))
        .route("/metrics", get(handlers::health::metrics_handler))
        // Middleware
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}

/// Permissive unless origins are configured.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
