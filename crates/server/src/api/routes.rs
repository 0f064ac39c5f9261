use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::any::Any;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, services::ServeFile, trace::TraceLayer,
};

use super::{convert, error, handlers, jobs, presets};
use super::middleware::metrics_middleware;
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let environment = state.environment();
    let body_limit = state.config().server.max_upload_bytes;

    // Landing page
    let index = ServeFile::new(state.config().server.static_dir.join("index.html"));

    Router::new()
        .route_service("/", index)
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/presets", get(presets::list_presets))
        .route(
            "/convert",
            post(convert::convert).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/jobs/{id}/{preset}/{filename}", get(jobs::download))
        .fallback(handlers::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(CatchPanicLayer::custom(move |panic: Box<dyn Any + Send + 'static>| {
                    error::panic_response(panic, environment)
                }))
                .layer(middleware::from_fn(metrics_middleware)),
        )
        .with_state(state)
}
