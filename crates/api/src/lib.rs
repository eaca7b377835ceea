//! HTTP intake for the order saga system.
//!
//! Provides the order placement endpoint that drives the saga, plus
//! health and Prometheus metrics routes, with structured logging
//! (tracing) on every request.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::SagaStore;
use saga::{Discounts, SagaOrchestrator};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// GET /metrics — renders the saga counters (`saga_executions_total`,
/// `saga_completed`, `saga_failed`, `saga_duration_seconds`) in
/// Prometheus text format.
async fn render_saga_metrics(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: SagaStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(render_saga_metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/orders", post(routes::orders::place::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over the given store.
pub fn create_state<S: SagaStore + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState {
        orchestrator: SagaOrchestrator::new(store.clone()),
        discounts: Discounts::new(store.clone()),
        store,
    })
}
