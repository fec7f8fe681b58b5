use super::events::{BusinessEvent, BusinessEventKind, EventStore};
use super::host::HostProbe;
use super::logs::LogScanner;
use super::scheduler::{spawn_periodic, LoopHandle};
use crate::config::MetricsConfig;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Response-time samples kept per endpoint.
pub const RESPONSE_TIME_WINDOW: usize = 100;

/// Per endpoint+verb request aggregates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiMetrics {
    pub endpoint: String,
    pub method: String,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub success_rate: f64,
    pub error_rate: f64,
    pub response_times: VecDeque<f64>,
    pub min_response_time: f64,
    pub max_response_time: f64,
    pub avg_response_time: f64,
    pub last_request: Option<DateTime<Utc>>,
}

impl ApiMetrics {
    pub fn new(endpoint: &str, method: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            success_rate: 0.0,
            error_rate: 0.0,
            response_times: VecDeque::with_capacity(RESPONSE_TIME_WINDOW),
            min_response_time: 0.0,
            max_response_time: 0.0,
            avg_response_time: 0.0,
            last_request: None,
        }
    }

    pub fn key(endpoint: &str, method: &str) -> String {
        format!("{method} {endpoint}")
    }

    /// Status codes below 400 count as successful.
    pub fn record(&mut self, status_code: u16, duration_ms: f64, at: DateTime<Utc>) {
        self.total_requests += 1;
        if status_code < 400 {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }

        let total = self.total_requests as f64;
        self.success_rate = self.successful_requests as f64 / total * 100.0;
        self.error_rate = self.failed_requests as f64 / total * 100.0;

        if self.response_times.len() == RESPONSE_TIME_WINDOW {
            self.response_times.pop_front();
        }
        self.response_times.push_back(duration_ms);

        let (min, max, sum) = self.response_times.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), &t| (min.min(t), max.max(t), sum + t),
        );
        self.min_response_time = min;
        self.max_response_time = max;
        self.avg_response_time = sum / self.response_times.len() as f64;
        self.last_request = Some(at);
    }
}

/// Business counters folded from event records. Counters only grow; the
/// daily set is cleared when the UTC date changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusinessMetrics {
    pub missions_completed: u64,
    pub quizzes_completed: u64,
    pub badges_awarded: u64,
    pub points_distributed: u64,
    pub xp_distributed: u64,
    pub active_users: BTreeSet<String>,
    pub daily_active_users: BTreeSet<String>,
    pub daily_window: NaiveDate,
    pub last_event_at: Option<DateTime<Utc>>,
}

impl BusinessMetrics {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            missions_completed: 0,
            quizzes_completed: 0,
            badges_awarded: 0,
            points_distributed: 0,
            xp_distributed: 0,
            active_users: BTreeSet::new(),
            daily_active_users: BTreeSet::new(),
            daily_window: today,
            last_event_at: None,
        }
    }

    pub fn active_user_count(&self) -> usize {
        self.active_users.len()
    }

    pub fn daily_active_user_count(&self) -> usize {
        self.daily_active_users.len()
    }

    /// Clear the daily set once per calendar day.
    pub fn roll_day(&mut self, today: NaiveDate) {
        if self.daily_window != today {
            self.daily_active_users.clear();
            self.daily_window = today;
        }
    }

    pub fn apply(&mut self, event: &BusinessEvent) {
        match event.kind {
            BusinessEventKind::MissionCompleted => self.missions_completed += 1,
            BusinessEventKind::QuizCompleted => self.quizzes_completed += 1,
            BusinessEventKind::BadgeEarned => self.badges_awarded += 1,
            BusinessEventKind::RewardGranted => {}
        }
        self.points_distributed = self.points_distributed.saturating_add(event.points);
        self.xp_distributed = self.xp_distributed.saturating_add(event.xp);

        if !event.user_id.is_empty() {
            self.active_users.insert(event.user_id.clone());
            if event.occurred_at.date_naive() == self.daily_window {
                self.daily_active_users.insert(event.user_id.clone());
            }
        }

        if self.last_event_at.map_or(true, |last| event.occurred_at > last) {
            self.last_event_at = Some(event.occurred_at);
        }
    }
}

/// Point-in-time gauges, overwritten every tick. Unavailable readings are 0.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SystemMetrics {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub process_memory_mb: f64,
    pub disk_percent: f64,
    pub log_size_bytes: u64,
    pub log_file_count: usize,
    pub error_count: u64,
    pub warning_count: u64,
    pub uptime_seconds: u64,
    pub collected_at: Option<DateTime<Utc>>,
}

/// Immutable copy of all three metric families.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub api: BTreeMap<String, ApiMetrics>,
    pub business: BusinessMetrics,
    pub system: SystemMetrics,
}

impl MetricsSnapshot {
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            api: BTreeMap::new(),
            business: BusinessMetrics::new(timestamp.date_naive()),
            system: SystemMetrics::default(),
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.api.values().map(|m| m.total_requests).sum()
    }

    pub fn total_failures(&self) -> u64 {
        self.api.values().map(|m| m.failed_requests).sum()
    }

    /// Failures over requests across every endpoint, in percent. `None`
    /// without traffic.
    pub fn pooled_error_rate(&self) -> Option<f64> {
        let total = self.total_requests();
        if total == 0 {
            return None;
        }
        Some(self.total_failures() as f64 / total as f64 * 100.0)
    }

    /// Unweighted mean of per-endpoint error rates, in percent.
    pub fn mean_endpoint_error_rate(&self) -> Option<f64> {
        let rates: Vec<f64> = self
            .api
            .values()
            .filter(|m| m.total_requests > 0)
            .map(|m| m.error_rate)
            .collect();
        if rates.is_empty() {
            return None;
        }
        Some(rates.iter().sum::<f64>() / rates.len() as f64)
    }
}

struct CollectorState {
    api: BTreeMap<String, ApiMetrics>,
    business: BusinessMetrics,
    system: SystemMetrics,
}

/// Owns the metric model and its bounded snapshot history.
pub struct MetricsCollector {
    config: MetricsConfig,
    host: Arc<dyn HostProbe>,
    logs: LogScanner,
    events: Option<Arc<dyn EventStore>>,
    state: RwLock<CollectorState>,
    history: RwLock<VecDeque<MetricsSnapshot>>,
    started_at: Instant,
}

impl MetricsCollector {
    pub fn new(config: MetricsConfig, host: Arc<dyn HostProbe>, logs: LogScanner) -> Self {
        let today = Utc::now().date_naive();
        Self {
            config,
            host,
            logs,
            events: None,
            state: RwLock::new(CollectorState {
                api: BTreeMap::new(),
                business: BusinessMetrics::new(today),
                system: SystemMetrics::default(),
            }),
            history: RwLock::new(VecDeque::new()),
            started_at: Instant::now(),
        }
    }

    pub fn with_event_store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.events = Some(store);
        self
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Record one served request. Runs inline on the request path and never
    /// blocks beyond a short lock.
    pub fn record_api_request(
        &self,
        endpoint: &str,
        method: &str,
        status_code: u16,
        duration_ms: f64,
    ) {
        let endpoint = match endpoint.trim() {
            "" => "unknown",
            trimmed => trimmed,
        };
        let method = match method.trim() {
            "" => "UNKNOWN".to_string(),
            trimmed => trimmed.to_ascii_uppercase(),
        };
        let duration_ms = if duration_ms.is_finite() && duration_ms >= 0.0 {
            duration_ms
        } else {
            0.0
        };

        let key = ApiMetrics::key(endpoint, &method);
        let mut state = self.state.write();
        state
            .api
            .entry(key)
            .or_insert_with(|| ApiMetrics::new(endpoint, &method))
            .record(status_code, duration_ms, Utc::now());
    }

    /// One collection tick: system gauges, business counters, snapshot.
    /// Each step is isolated; nothing escapes to the caller.
    pub async fn collect_all_metrics(&self) {
        let tick_start = Instant::now();
        let now = Utc::now();

        let host = Arc::clone(&self.host);
        let logs = self.logs.clone();
        let started_at = self.started_at;
        let sampled = tokio::task::spawn_blocking(move || {
            sample_system(host.as_ref(), &logs, started_at, now)
        })
        .await;
        match sampled {
            Ok(system) => self.state.write().system = system,
            Err(e) => error!(
                "System metrics sampling failed ({}); keeping previous gauges",
                e
            ),
        }

        if let Err(e) = self.scan_business_events(now).await {
            warn!("Business metrics scan failed: {:#}", e);
        }

        let snapshot = self.get_current_metrics();
        self.push_snapshot(snapshot, now);

        debug!(
            "Metrics collection completed in {}ms",
            tick_start.elapsed().as_millis()
        );
    }

    async fn scan_business_events(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        let today = now.date_naive();
        let Some(store) = &self.events else {
            self.state.write().business.roll_day(today);
            return Ok(());
        };

        // Future-dated records stay in the store until due, so the cursor
        // never passes `now`.
        let cursor = self.state.read().business.last_event_at;
        let events = store.events_between(cursor, now).await;

        let mut state = self.state.write();
        state.business.roll_day(today);
        let events = events?;
        for event in &events {
            state.business.apply(event);
        }

        if !events.is_empty() {
            debug!("Folded {} business events into metrics", events.len());
        }
        Ok(())
    }

    /// Append a snapshot and drop everything older than the retention window.
    pub(crate) fn push_snapshot(&self, snapshot: MetricsSnapshot, now: DateTime<Utc>) {
        let cutoff = now - chrono::Duration::hours(self.config.retention_hours as i64);
        let mut history = self.history.write();

        if history
            .back()
            .map_or(true, |last| snapshot.timestamp >= last.timestamp)
        {
            history.push_back(snapshot);
        } else {
            let idx = history.partition_point(|s| s.timestamp <= snapshot.timestamp);
            history.insert(idx, snapshot);
        }

        while history.front().map_or(false, |s| s.timestamp < cutoff) {
            history.pop_front();
        }
    }

    /// Live state, not the last history entry.
    pub fn get_current_metrics(&self) -> MetricsSnapshot {
        let state = self.state.read();
        MetricsSnapshot {
            timestamp: Utc::now(),
            api: state.api.clone(),
            business: state.business.clone(),
            system: state.system.clone(),
        }
    }

    /// Snapshots taken within the last `hours`, oldest first.
    pub fn get_metrics_history(&self, hours: u32) -> Vec<MetricsSnapshot> {
        let cutoff = Utc::now() - chrono::Duration::hours(hours as i64);
        self.history
            .read()
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }

    pub fn start(self: &Arc<Self>) -> LoopHandle {
        info!(
            "Starting metrics collector ({}s interval, {}h retention)",
            self.config.collection_interval_seconds, self.config.retention_hours
        );
        let collector = Arc::clone(self);
        spawn_periodic(
            "metrics_collector",
            self.config.collection_interval(),
            move || {
                let collector = Arc::clone(&collector);
                async move {
                    collector.collect_all_metrics().await;
                    Ok(())
                }
            },
        )
    }
}

/// Host gauges and log statistics. Blocking; runs off the async workers.
fn sample_system(
    host: &dyn HostProbe,
    logs: &LogScanner,
    started_at: Instant,
    now: DateTime<Utc>,
) -> SystemMetrics {
    let host = host.sample();
    let logs = match logs.stats(now) {
        Ok(stats) => stats,
        Err(e) => {
            warn!("Failed to scan log directory {}: {}", logs.dir().display(), e);
            Default::default()
        }
    };

    SystemMetrics {
        cpu_percent: host.cpu_percent.unwrap_or(0.0),
        memory_percent: host.memory_percent.unwrap_or(0.0),
        process_memory_mb: host.process_memory_mb.unwrap_or(0.0),
        disk_percent: host.disk_percent.unwrap_or(0.0),
        log_size_bytes: logs.total_bytes,
        log_file_count: logs.file_count,
        error_count: logs.error_count,
        warning_count: logs.warning_count,
        uptime_seconds: started_at.elapsed().as_secs(),
        collected_at: Some(now),
    }
}
