//! HTTP protocol endpoint for the LRA coordinator.
//!
//! Exposes the coordinator lifecycle, participant enlistment and the
//! recovery trigger over REST, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use coordinator::{LraCoordinator, ParticipantClient, RecoveryScheduler};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryRecordStore, RecordStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::lra::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: RecordStore + Clone + 'static, C: ParticipantClient + 'static>(
    state: Arc<AppState<S, C>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/lra-coordinator", post(routes::lra::start::<S, C>))
        .route("/lra-coordinator", get(routes::lra::list_active::<S, C>))
        .route("/lra-coordinator/status", get(routes::lra::list_all::<S, C>))
        .route("/lra-coordinator/{id}", put(routes::lra::join::<S, C>))
        .route("/lra-coordinator/{id}/close", put(routes::lra::close::<S, C>))
        .route("/lra-coordinator/{id}/cancel", put(routes::lra::cancel::<S, C>))
        .route("/lra-coordinator/{id}/status", get(routes::lra::status::<S, C>))
        .route("/lra-coordinator/{id}/renew", put(routes::lra::renew::<S, C>))
        .route("/lra-coordinator/{id}/remove", put(routes::lra::leave::<S, C>))
        .route(
            "/lra-recovery-coordinator/recovery",
            get(routes::recovery::scan::<S, C>),
        )
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

/// Creates application state over the in-memory store and the given
/// participant client.
pub fn create_default_state<C: ParticipantClient + 'static>(
    client: C,
    config: &Config,
) -> Arc<AppState<InMemoryRecordStore, C>> {
    let store = InMemoryRecordStore::new();
    let coordinator = Arc::new(
        LraCoordinator::new(store.clone(), client).with_default_timeout(config.default_timeout),
    );
    let registry = coordinator.registry();
    let scheduler = Arc::new(
        RecoveryScheduler::new(coordinator.clone()).with_retention(config.eviction_retention),
    );

    Arc::new(AppState {
        coordinator,
        registry,
        scheduler,
        store,
    })
}
