pub mod error;
pub mod monitoring_api;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::{self, Next},
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::monitoring::{AlertManager, HealthMonitor, LogScanner, MetricsCollector};

pub use error::ApiError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared handles for the monitoring API
#[derive(Clone)]
pub struct AppState {
    pub collector: Arc<MetricsCollector>,
    pub alerts: Arc<AlertManager>,
    pub health: Arc<HealthMonitor>,
    pub logs: LogScanner,
}

/// Create the monitoring API router
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        // Liveness
        .route("/health", get(health_check))
        // Metrics
        .route(
            "/monitoring/metrics/current",
            get(monitoring_api::get_current_metrics),
        )
        .route(
            "/monitoring/metrics/history",
            get(monitoring_api::get_metrics_history),
        )
        // Alerts
        .route(
            "/monitoring/alerts/active",
            get(monitoring_api::get_active_alerts),
        )
        .route(
            "/monitoring/alerts/history",
            get(monitoring_api::get_alert_history),
        )
        .route(
            "/monitoring/alerts/stats",
            get(monitoring_api::get_alert_stats),
        )
        .route(
            "/monitoring/alerts/:id/resolve",
            post(monitoring_api::resolve_alert),
        )
        // Dashboard and logs
        .route(
            "/monitoring/dashboard/summary",
            get(monitoring_api::get_dashboard_summary),
        )
        .route(
            "/monitoring/logs/recent",
            get(monitoring_api::get_recent_logs),
        )
        // Health monitor
        .route(
            "/monitoring/health/current",
            get(monitoring_api::get_current_health),
        )
        .route(
            "/monitoring/health/history",
            get(monitoring_api::get_health_history),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            track_requests,
        ))
        .with_state(state)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Feed every routed request into the metrics collector, keyed by route
/// template.
async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string());
    let started = Instant::now();

    let response = next.run(request).await;

    if let Some(endpoint) = endpoint {
        state.collector.record_api_request(
            &endpoint,
            &method,
            response.status().as_u16(),
            started.elapsed().as_secs_f64() * 1000.0,
        );
    }
    response
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "vigil",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
