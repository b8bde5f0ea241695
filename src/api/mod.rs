use axum::{
    Router, middleware,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

mod error;
mod observability;
mod system;
mod tasks;
mod types;
mod webhooks;

pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: Instant::now(),
        prometheus_handle,
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/webhooks/sonarr", post(webhooks::sonarr))
        .route("/webhooks/radarr", post(webhooks::radarr))
        .route("/tasks/wanted", post(tasks::trigger_wanted))
        .route("/tasks/wanted/movies", post(tasks::trigger_wanted_movies))
        .route("/tasks/full-sweep", post(tasks::trigger_full_sweep))
        .route("/system/health", get(system::health))
        .route("/system/status", get(system::get_status))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn(observability::logging_middleware))
        .with_state(state);

    Router::new()
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http())
}
