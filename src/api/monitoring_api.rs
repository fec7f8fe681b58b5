use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{ApiError, AppState};
use crate::error::MonitoringError;
use crate::monitoring::{build_dashboard_summary, LogQuery};

const MAX_HISTORY_HOURS: u32 = 168;
const DEFAULT_HISTORY_HOURS: u32 = 24;
const MAX_LOG_LIMIT: usize = 200;
const DEFAULT_LOG_LIMIT: usize = 50;

type ApiResult = Result<Json<Value>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub hours: Option<u32>,
}

impl HistoryParams {
    fn hours(&self) -> Result<u32, MonitoringError> {
        let hours = self.hours.unwrap_or(DEFAULT_HISTORY_HOURS);
        if !(1..=MAX_HISTORY_HOURS).contains(&hours) {
            return Err(MonitoringError::InvalidQuery {
                message: format!("hours must be between 1 and {}", MAX_HISTORY_HOURS),
            });
        }
        Ok(hours)
    }
}

#[derive(Debug, Deserialize)]
pub struct LogParams {
    pub category: Option<String>,
    pub level: Option<String>,
    pub limit: Option<usize>,
}

impl LogParams {
    fn into_query(self) -> Result<LogQuery, MonitoringError> {
        let limit = self.limit.unwrap_or(DEFAULT_LOG_LIMIT);
        if !(1..=MAX_LOG_LIMIT).contains(&limit) {
            return Err(MonitoringError::InvalidQuery {
                message: format!("limit must be between 1 and {}", MAX_LOG_LIMIT),
            });
        }
        Ok(LogQuery {
            category: non_empty(self.category),
            level: non_empty(self.level),
            limit,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(inner)| inner)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

fn success<T: Serialize>(data: T) -> ApiResult {
    Ok(Json(json!({
        "success": true,
        "data": serde_json::to_value(data).map_err(MonitoringError::from)?,
        "timestamp": Utc::now(),
    })))
}

fn success_list<T: Serialize>(items: Vec<T>) -> ApiResult {
    let count = items.len();
    Ok(Json(json!({
        "success": true,
        "data": serde_json::to_value(items).map_err(MonitoringError::from)?,
        "count": count,
        "timestamp": Utc::now(),
    })))
}

/// Live metrics snapshot
pub async fn get_current_metrics(State(state): State<AppState>) -> ApiResult {
    success(state.collector.get_current_metrics())
}

pub async fn get_metrics_history(
    State(state): State<AppState>,
    query: Result<Query<HistoryParams>, QueryRejection>,
) -> ApiResult {
    let hours = params(query)?.hours()?;
    success_list(state.collector.get_metrics_history(hours))
}

pub async fn get_active_alerts(State(state): State<AppState>) -> ApiResult {
    success_list(state.alerts.get_active_alerts())
}

pub async fn get_alert_history(
    State(state): State<AppState>,
    query: Result<Query<HistoryParams>, QueryRejection>,
) -> ApiResult {
    let hours = params(query)?.hours()?;
    success_list(state.alerts.get_alert_history(hours))
}

pub async fn get_alert_stats(State(state): State<AppState>) -> ApiResult {
    success(state.alerts.get_alert_stats())
}

/// Manually resolve an active alert
pub async fn resolve_alert(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let alert = state.alerts.resolve_alert(&id)?;
    info!(alert_id = %alert.id, "Alert resolved through API");
    success(alert)
}

/// Metrics, alerts and the computed system-health score in one view
pub async fn get_dashboard_summary(State(state): State<AppState>) -> ApiResult {
    let snapshot = state.collector.get_current_metrics();
    let active = state.alerts.get_active_alerts();
    let stats = state.alerts.get_alert_stats();
    success(build_dashboard_summary(&snapshot, &active, stats))
}

pub async fn get_recent_logs(
    State(state): State<AppState>,
    query: Result<Query<LogParams>, QueryRejection>,
) -> ApiResult {
    let query = params(query)?.into_query()?;
    let scanner = state.logs.clone();

    let entries = tokio::task::spawn_blocking(move || scanner.recent(&query))
        .await
        .map_err(|e| ApiError::Internal(format!("log reader failed: {}", e)))?
        .map_err(MonitoringError::from)?;

    success_list(entries)
}

pub async fn get_current_health(State(state): State<AppState>) -> ApiResult {
    success(state.health.get_current_health())
}

pub async fn get_health_history(
    State(state): State<AppState>,
    query: Result<Query<HistoryParams>, QueryRejection>,
) -> ApiResult {
    let hours = params(query)?.hours()?;
    success_list(state.health.get_health_history(hours))
}
