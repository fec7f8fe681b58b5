use super::alerts::AlertManager;
use super::events::EventStore;
use super::host::HostProbe;
use super::logs::LogScanner;
use super::metrics::MetricsCollector;
use super::scheduler::{spawn_periodic, LoopHandle};
use super::HealthStatus;
use crate::config::HEALTH_CHECK_INTERVAL_SECONDS;
use crate::error::MonitoringError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Health snapshots kept in memory, oldest evicted first.
pub const HEALTH_HISTORY_LIMIT: usize = 100;

const LOG_VOLUME_WARNING_BYTES: u64 = 100 * 1024 * 1024;
const LOG_VOLUME_CRITICAL_BYTES: u64 = 500 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    pub message: String,
    pub latency_ms: f64,
    pub details: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub checks: Vec<HealthCheck>,
    pub last_checked: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub timestamp: DateTime<Utc>,
    pub overall_status: HealthStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

/// Aggregate view over the latest snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentHealth {
    pub overall_status: HealthStatus,
    pub timestamp: Option<DateTime<Utc>>,
    pub components: BTreeMap<String, ComponentHealth>,
    pub status_counts: BTreeMap<String, usize>,
    pub active_alerts: usize,
}

/// What a probe reports; the monitor stamps name, latency and time.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub status: HealthStatus,
    pub message: String,
    pub details: Value,
}

impl ProbeOutcome {
    pub fn new(status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: Value::Null,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn name(&self) -> &str;

    /// Component this probe's result is grouped under.
    fn component(&self) -> &str;

    async fn check(&self) -> Result<ProbeOutcome>;
}

/// An external dependency that can be pinged.
#[async_trait]
pub trait Reachable: Send + Sync {
    fn target(&self) -> String;

    async fn ping(&self) -> Result<()>;
}

pub struct StoreReachability(pub Arc<dyn EventStore>);

#[async_trait]
impl Reachable for StoreReachability {
    fn target(&self) -> String {
        "business event store".to_string()
    }

    async fn ping(&self) -> Result<()> {
        self.0.ping().await
    }
}

/// HTTP service that counts as reachable on any response, error statuses
/// included.
pub struct HttpEndpoint {
    client: reqwest::Client,
    url: String,
}

impl HttpEndpoint {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Reachable for HttpEndpoint {
    fn target(&self) -> String {
        self.url.clone()
    }

    async fn ping(&self) -> Result<()> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("connecting to {}", self.url))?;
        debug!("{} answered with {}", self.url, response.status());
        Ok(())
    }
}

/// CRITICAL when the dependency is unconfigured, unreachable or slow.
pub struct ReachabilityProbe {
    name: String,
    component: String,
    target: Option<Arc<dyn Reachable>>,
    timeout: Duration,
}

impl ReachabilityProbe {
    pub fn new(
        name: &str,
        component: &str,
        target: Option<Arc<dyn Reachable>>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.to_string(),
            component: component.to_string(),
            target,
            timeout,
        }
    }
}

#[async_trait]
impl HealthProbe for ReachabilityProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn component(&self) -> &str {
        &self.component
    }

    async fn check(&self) -> Result<ProbeOutcome> {
        let Some(target) = &self.target else {
            return Ok(ProbeOutcome::new(
                HealthStatus::Critical,
                format!("{} is not configured", self.component),
            ));
        };

        let name = target.target();
        let failure = match tokio::time::timeout(self.timeout, target.ping()).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(MonitoringError::Dependency {
                name: name.clone(),
                reason: format!("{:#}", e),
            }),
            Err(_) => Some(MonitoringError::Timeout {
                message: format!(
                    "{} gave no answer within {}ms",
                    name,
                    self.timeout.as_millis()
                ),
            }),
        };

        let outcome = match failure {
            None => ProbeOutcome::new(HealthStatus::Healthy, "reachable"),
            Some(e) => ProbeOutcome::new(HealthStatus::Critical, e.to_string()),
        };
        Ok(outcome.with_details(json!({ "target": name })))
    }
}

/// Pooled failure ratio across every endpoint.
pub struct ApiErrorRateProbe {
    collector: Arc<MetricsCollector>,
}

impl ApiErrorRateProbe {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self { collector }
    }
}

#[async_trait]
impl HealthProbe for ApiErrorRateProbe {
    fn name(&self) -> &str {
        "api_error_rate"
    }

    fn component(&self) -> &str {
        "api"
    }

    async fn check(&self) -> Result<ProbeOutcome> {
        let snapshot = self.collector.get_current_metrics();
        let Some(rate) = snapshot.pooled_error_rate() else {
            return Ok(ProbeOutcome::new(HealthStatus::Healthy, "no requests"));
        };

        let status = grade(rate, 5.0, 10.0);
        Ok(
            ProbeOutcome::new(status, format!("error rate {:.2}%", rate)).with_details(json!({
                "error_rate": rate,
                "total_requests": snapshot.total_requests(),
                "failed_requests": snapshot.total_failures(),
            })),
        )
    }
}

pub struct LogVolumeProbe {
    scanner: LogScanner,
}

impl LogVolumeProbe {
    pub fn new(scanner: LogScanner) -> Self {
        Self { scanner }
    }
}

#[async_trait]
impl HealthProbe for LogVolumeProbe {
    fn name(&self) -> &str {
        "log_volume"
    }

    fn component(&self) -> &str {
        "logs"
    }

    async fn check(&self) -> Result<ProbeOutcome> {
        let scanner = self.scanner.clone();
        let bytes = tokio::task::spawn_blocking(move || scanner.total_size())
            .await
            .context("log size task failed")?
            .context("measuring log directory")?;

        let status = if bytes >= LOG_VOLUME_CRITICAL_BYTES {
            HealthStatus::Critical
        } else if bytes >= LOG_VOLUME_WARNING_BYTES {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        };
        let mb = bytes as f64 / (1024.0 * 1024.0);
        Ok(
            ProbeOutcome::new(status, format!("log directory holds {:.1}MB", mb))
                .with_details(json!({ "total_bytes": bytes })),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Memory,
    Disk,
}

/// Host gauge graded against warning/critical percentages.
pub struct ResourceProbe {
    resource: Resource,
    host: Arc<dyn HostProbe>,
    warning: f64,
    critical: f64,
}

impl ResourceProbe {
    pub fn memory(host: Arc<dyn HostProbe>) -> Self {
        Self {
            resource: Resource::Memory,
            host,
            warning: 70.0,
            critical: 85.0,
        }
    }

    pub fn disk(host: Arc<dyn HostProbe>) -> Self {
        Self {
            resource: Resource::Disk,
            host,
            warning: 80.0,
            critical: 90.0,
        }
    }
}

#[async_trait]
impl HealthProbe for ResourceProbe {
    fn name(&self) -> &str {
        match self.resource {
            Resource::Memory => "memory",
            Resource::Disk => "disk",
        }
    }

    fn component(&self) -> &str {
        "system"
    }

    async fn check(&self) -> Result<ProbeOutcome> {
        let host = Arc::clone(&self.host);
        let sample = tokio::task::spawn_blocking(move || host.sample())
            .await
            .context("host sampling task failed")?;

        let reading = match self.resource {
            Resource::Memory => sample.memory_percent,
            Resource::Disk => sample.disk_percent,
        };
        let Some(percent) = reading.filter(|p| p.is_finite()) else {
            return Ok(ProbeOutcome::new(
                HealthStatus::Unknown,
                format!("{} usage unavailable on this host", self.name()),
            ));
        };

        Ok(ProbeOutcome::new(
            grade(percent, self.warning, self.critical),
            format!("{} usage {:.1}%", self.name(), percent),
        )
        .with_details(json!({
            "usage_percent": percent,
            "warning_threshold": self.warning,
            "critical_threshold": self.critical,
        })))
    }
}

fn grade(value: f64, warning: f64, critical: f64) -> HealthStatus {
    if value >= critical {
        HealthStatus::Critical
    } else if value >= warning {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    }
}

/// The standard probe set: store, auth, api, logs, memory and disk.
pub fn builtin_probes(
    collector: Arc<MetricsCollector>,
    host: Arc<dyn HostProbe>,
    logs: LogScanner,
    store: Option<Arc<dyn EventStore>>,
    auth: Option<Arc<dyn Reachable>>,
    dependency_timeout: Duration,
) -> Vec<Arc<dyn HealthProbe>> {
    let store = store.map(|s| Arc::new(StoreReachability(s)) as Arc<dyn Reachable>);
    vec![
        Arc::new(ReachabilityProbe::new(
            "store_reachability",
            "store",
            store,
            dependency_timeout,
        )),
        Arc::new(ReachabilityProbe::new(
            "auth_reachability",
            "auth",
            auth,
            dependency_timeout,
        )),
        Arc::new(ApiErrorRateProbe::new(collector)),
        Arc::new(LogVolumeProbe::new(logs)),
        Arc::new(ResourceProbe::memory(Arc::clone(&host))),
        Arc::new(ResourceProbe::disk(host)),
    ]
}

pub struct HealthMonitor {
    probes: Vec<Arc<dyn HealthProbe>>,
    probe_timeout: Duration,
    check_interval: Duration,
    alerts: Option<Arc<AlertManager>>,
    history: RwLock<VecDeque<HealthSnapshot>>,
}

impl HealthMonitor {
    pub fn new(probes: Vec<Arc<dyn HealthProbe>>) -> Self {
        Self {
            probes,
            probe_timeout: Duration::from_secs(10),
            check_interval: Duration::from_secs(HEALTH_CHECK_INTERVAL_SECONDS),
            alerts: None,
            history: RwLock::new(VecDeque::new()),
        }
    }

    /// Upper bound for a single probe; a slower probe is reported UNKNOWN.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Source of the active-alert count in `get_current_health`.
    pub fn with_alert_manager(mut self, alerts: Arc<AlertManager>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    pub fn probe_names(&self) -> Vec<String> {
        self.probes.iter().map(|p| p.name().to_string()).collect()
    }

    /// Run every probe once, record the snapshot and return it.
    pub async fn check_all_components(&self) -> HealthSnapshot {
        let started = Instant::now();
        let checks = join_all(self.probes.iter().map(|p| self.run_probe(p.as_ref()))).await;
        let timestamp = Utc::now();

        let mut components: BTreeMap<String, ComponentHealth> = BTreeMap::new();
        for (probe, check) in self.probes.iter().zip(checks) {
            let component = components
                .entry(probe.component().to_string())
                .or_insert_with(|| ComponentHealth {
                    name: probe.component().to_string(),
                    status: HealthStatus::Healthy,
                    checks: Vec::new(),
                    last_checked: timestamp,
                });
            component.status = component.status.max(check.status);
            component.checks.push(check);
        }

        let overall_status =
            HealthStatus::worst(components.values().map(|c| c.status)).unwrap_or(HealthStatus::Unknown);
        let snapshot = HealthSnapshot {
            timestamp,
            overall_status,
            components,
        };

        log_summary(&snapshot, started.elapsed());

        let mut history = self.history.write();
        history.push_back(snapshot.clone());
        while history.len() > HEALTH_HISTORY_LIMIT {
            history.pop_front();
        }

        snapshot
    }

    async fn run_probe(&self, probe: &dyn HealthProbe) -> HealthCheck {
        let started = Instant::now();
        let result = tokio::time::timeout(
            self.probe_timeout,
            AssertUnwindSafe(probe.check()).catch_unwind(),
        )
        .await;

        let outcome = match result {
            Ok(Ok(Ok(outcome))) => outcome,
            Ok(Ok(Err(e))) => {
                warn!(probe = probe.name(), "Health probe failed: {:#}", e);
                ProbeOutcome::new(HealthStatus::Unknown, format!("probe failed: {:#}", e))
            }
            Ok(Err(_)) => {
                error!(probe = probe.name(), "Health probe panicked");
                ProbeOutcome::new(HealthStatus::Unknown, "probe panicked")
            }
            Err(_) => {
                warn!(probe = probe.name(), "Health probe timed out");
                ProbeOutcome::new(
                    HealthStatus::Unknown,
                    format!("probe timed out after {}s", self.probe_timeout.as_secs()),
                )
            }
        };

        HealthCheck {
            name: probe.name().to_string(),
            status: outcome.status,
            message: outcome.message,
            latency_ms: started.elapsed().as_secs_f64() * 1000.0,
            details: outcome.details,
            timestamp: Utc::now(),
        }
    }

    pub fn get_current_health(&self) -> CurrentHealth {
        let active_alerts = self
            .alerts
            .as_ref()
            .map_or(0, |a| a.get_active_alerts().len());

        let history = self.history.read();
        let Some(latest) = history.back() else {
            return CurrentHealth {
                overall_status: HealthStatus::Unknown,
                timestamp: None,
                components: BTreeMap::new(),
                status_counts: status_counts(std::iter::empty::<HealthStatus>()),
                active_alerts,
            };
        };

        CurrentHealth {
            overall_status: latest.overall_status,
            timestamp: Some(latest.timestamp),
            components: latest.components.clone(),
            status_counts: status_counts(latest.components.values().map(|c| c.status)),
            active_alerts,
        }
    }

    /// Snapshots taken within the last `hours`, oldest first.
    pub fn get_health_history(&self, hours: u32) -> Vec<HealthSnapshot> {
        let cutoff = Utc::now() - chrono::Duration::hours(hours as i64);
        self.history
            .read()
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    pub fn start(self: &Arc<Self>) -> LoopHandle {
        info!(
            "Starting health monitor ({} probes: {})",
            self.probes.len(),
            self.probe_names().join(", ")
        );
        let monitor = Arc::clone(self);
        spawn_periodic("health_monitor", self.check_interval, move || {
            let monitor = Arc::clone(&monitor);
            async move {
                monitor.check_all_components().await;
                Ok(())
            }
        })
    }
}

fn status_counts(statuses: impl Iterator<Item = HealthStatus>) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = [
        HealthStatus::Healthy,
        HealthStatus::Warning,
        HealthStatus::Critical,
        HealthStatus::Unknown,
    ]
    .iter()
    .map(|s| (s.as_str().to_string(), 0))
    .collect();
    for status in statuses {
        *counts.entry(status.as_str().to_string()).or_insert(0) += 1;
    }
    counts
}

fn log_summary(snapshot: &HealthSnapshot, elapsed: Duration) {
    let degraded: Vec<String> = snapshot
        .components
        .values()
        .filter(|c| c.status != HealthStatus::Healthy)
        .map(|c| format!("{}={}", c.name, c.status))
        .collect();
    let elapsed_ms = elapsed.as_millis() as u64;

    match snapshot.overall_status {
        HealthStatus::Critical => error!(
            status = %snapshot.overall_status,
            elapsed_ms,
            category = "health",
            "System health CRITICAL: {}",
            degraded.join(", ")
        ),
        HealthStatus::Warning | HealthStatus::Unknown => warn!(
            status = %snapshot.overall_status,
            elapsed_ms,
            category = "health",
            "System health degraded: {}",
            degraded.join(", ")
        ),
        HealthStatus::Healthy => info!(
            status = %snapshot.overall_status,
            elapsed_ms,
            category = "health",
            "System health check passed ({} components)",
            snapshot.components.len()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricsConfig;
    use crate::monitoring::events::MemoryEventStore;
    use crate::monitoring::host::{HostSample, StaticHostProbe};
    use tempfile::TempDir;

    struct FixedProbe {
        name: &'static str,
        component: &'static str,
        behaviour: Behaviour,
    }

    enum Behaviour {
        Report(HealthStatus),
        Fail,
        Panic,
        Hang,
    }

    #[async_trait]
    impl HealthProbe for FixedProbe {
        fn name(&self) -> &str {
            self.name
        }

        fn component(&self) -> &str {
            self.component
        }

        async fn check(&self) -> Result<ProbeOutcome> {
            match self.behaviour {
                Behaviour::Report(status) => Ok(ProbeOutcome::new(status, "fixed")),
                Behaviour::Fail => anyhow::bail!("boom"),
                Behaviour::Panic => panic!("probe exploded"),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(ProbeOutcome::new(HealthStatus::Healthy, "late"))
                }
            }
        }
    }

    fn fixed(name: &'static str, component: &'static str, behaviour: Behaviour) -> Arc<dyn HealthProbe> {
        Arc::new(FixedProbe {
            name,
            component,
            behaviour,
        })
    }

    fn collector(host: Arc<dyn HostProbe>) -> Arc<MetricsCollector> {
        Arc::new(MetricsCollector::new(
            MetricsConfig::default(),
            host,
            LogScanner::new("/nonexistent/vigil-logs"),
        ))
    }

    #[tokio::test]
    async fn test_unknown_before_first_tick() {
        let monitor = HealthMonitor::new(vec![]);
        let health = monitor.get_current_health();
        assert_eq!(health.overall_status, HealthStatus::Unknown);
        assert!(health.timestamp.is_none());
        assert!(monitor.get_health_history(24).is_empty());
    }

    #[tokio::test]
    async fn test_failing_probes_are_isolated() {
        let monitor = HealthMonitor::new(vec![
            fixed("ok", "a", Behaviour::Report(HealthStatus::Healthy)),
            fixed("fails", "b", Behaviour::Fail),
            fixed("panics", "c", Behaviour::Panic),
            fixed("hangs", "d", Behaviour::Hang),
        ])
        .with_probe_timeout(Duration::from_millis(50));

        let snapshot = monitor.check_all_components().await;
        assert_eq!(snapshot.components["a"].status, HealthStatus::Healthy);
        assert_eq!(snapshot.components["b"].status, HealthStatus::Unknown);
        assert_eq!(snapshot.components["c"].status, HealthStatus::Unknown);
        assert_eq!(snapshot.components["d"].status, HealthStatus::Unknown);
        assert_eq!(snapshot.overall_status, HealthStatus::Unknown);
    }

    #[tokio::test]
    async fn test_overall_is_worst_component() {
        let monitor = HealthMonitor::new(vec![
            fixed("x1", "x", Behaviour::Report(HealthStatus::Healthy)),
            fixed("x2", "x", Behaviour::Report(HealthStatus::Warning)),
            fixed("y", "y", Behaviour::Report(HealthStatus::Unknown)),
            fixed("z", "z", Behaviour::Report(HealthStatus::Critical)),
        ]);

        let snapshot = monitor.check_all_components().await;
        assert_eq!(snapshot.components["x"].status, HealthStatus::Warning);
        assert_eq!(snapshot.components["x"].checks.len(), 2);
        assert_eq!(snapshot.overall_status, HealthStatus::Critical);

        let current = monitor.get_current_health();
        assert_eq!(current.overall_status, HealthStatus::Critical);
        assert_eq!(current.status_counts["warning"], 1);
        assert_eq!(current.status_counts["unknown"], 1);
        assert_eq!(current.status_counts["critical"], 1);
        assert_eq!(current.status_counts["healthy"], 0);
    }

    #[tokio::test]
    async fn test_history_is_capped() {
        let monitor = HealthMonitor::new(vec![fixed(
            "ok",
            "a",
            Behaviour::Report(HealthStatus::Healthy),
        )]);
        for _ in 0..(HEALTH_HISTORY_LIMIT + 20) {
            monitor.check_all_components().await;
        }
        assert_eq!(monitor.get_health_history(1).len(), HEALTH_HISTORY_LIMIT);
    }

    #[tokio::test]
    async fn test_api_probe_without_traffic_is_healthy() {
        let probe = ApiErrorRateProbe::new(collector(Arc::new(StaticHostProbe::default())));
        let outcome = probe.check().await.unwrap();
        assert_eq!(outcome.status, HealthStatus::Healthy);
        assert_eq!(outcome.message, "no requests");
    }

    #[tokio::test]
    async fn test_api_probe_uses_pooled_rate() {
        let collector = collector(Arc::new(StaticHostProbe::default()));
        // one endpoint at 100% errors, one at 0% over many requests
        collector.record_api_request("/broken", "GET", 500, 1.0);
        for _ in 0..99 {
            collector.record_api_request("/fine", "GET", 200, 1.0);
        }

        let outcome = ApiErrorRateProbe::new(Arc::clone(&collector))
            .check()
            .await
            .unwrap();
        assert_eq!(outcome.status, HealthStatus::Healthy);

        for _ in 0..11 {
            collector.record_api_request("/broken", "GET", 503, 1.0);
        }
        let outcome = ApiErrorRateProbe::new(collector).check().await.unwrap();
        assert_eq!(outcome.status, HealthStatus::Critical);
    }

    #[tokio::test]
    async fn test_resource_probes() {
        let host = Arc::new(StaticHostProbe::new(HostSample {
            memory_percent: Some(75.0),
            disk_percent: Some(96.0),
            ..HostSample::default()
        }));

        let memory = ResourceProbe::memory(host.clone()).check().await.unwrap();
        assert_eq!(memory.status, HealthStatus::Warning);
        let disk = ResourceProbe::disk(host.clone()).check().await.unwrap();
        assert_eq!(disk.status, HealthStatus::Critical);

        host.set(HostSample::unavailable());
        let memory = ResourceProbe::memory(host).check().await.unwrap();
        assert_eq!(memory.status, HealthStatus::Unknown);
    }

    #[tokio::test]
    async fn test_log_volume_probe() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("app.log"), "small").unwrap();
        let outcome = LogVolumeProbe::new(LogScanner::new(dir.path()))
            .check()
            .await
            .unwrap();
        assert_eq!(outcome.status, HealthStatus::Healthy);
        assert_eq!(outcome.details["total_bytes"], 5);
    }

    #[tokio::test]
    async fn test_reachability_probe() {
        let unconfigured =
            ReachabilityProbe::new("auth_reachability", "auth", None, Duration::from_secs(1));
        assert_eq!(
            unconfigured.check().await.unwrap().status,
            HealthStatus::Critical
        );

        let store: Arc<dyn Reachable> =
            Arc::new(StoreReachability(Arc::new(MemoryEventStore::new())));
        let reachable = ReachabilityProbe::new(
            "store_reachability",
            "store",
            Some(store),
            Duration::from_secs(1),
        );
        assert_eq!(reachable.check().await.unwrap().status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_unreachable_http_endpoint_is_critical() {
        let endpoint: Arc<dyn Reachable> = Arc::new(
            HttpEndpoint::new("http://127.0.0.1:9/health", Duration::from_millis(500)).unwrap(),
        );
        let probe = ReachabilityProbe::new(
            "auth_reachability",
            "auth",
            Some(endpoint),
            Duration::from_secs(1),
        );
        let outcome = probe.check().await.unwrap();
        assert_eq!(outcome.status, HealthStatus::Critical);
        assert!(outcome
            .message
            .starts_with("Dependency http://127.0.0.1:9/health unreachable"));
    }

    struct SilentDependency;

    #[async_trait]
    impl Reachable for SilentDependency {
        fn target(&self) -> String {
            "silent".to_string()
        }

        async fn ping(&self) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_slow_dependency_reports_timeout() {
        let silent: Arc<dyn Reachable> = Arc::new(SilentDependency);
        let probe = ReachabilityProbe::new(
            "auth_reachability",
            "auth",
            Some(silent),
            Duration::from_millis(50),
        );
        let outcome = probe.check().await.unwrap();
        assert_eq!(outcome.status, HealthStatus::Critical);
        assert_eq!(
            outcome.message,
            "Operation timeout: silent gave no answer within 50ms"
        );
        assert_eq!(outcome.details["target"], "silent");
    }

    #[tokio::test]
    async fn test_builtin_probe_set() {
        let host: Arc<dyn HostProbe> = Arc::new(StaticHostProbe::default());
        let probes = builtin_probes(
            collector(host.clone()),
            host,
            LogScanner::new("/nonexistent/vigil-logs"),
            None,
            None,
            Duration::from_secs(1),
        );
        let monitor = HealthMonitor::new(probes);
        assert_eq!(
            monitor.probe_names(),
            vec![
                "store_reachability",
                "auth_reachability",
                "api_error_rate",
                "log_volume",
                "memory",
                "disk"
            ]
        );

        let snapshot = monitor.check_all_components().await;
        assert_eq!(snapshot.components.len(), 5);
        assert_eq!(snapshot.components["store"].status, HealthStatus::Critical);
        assert_eq!(snapshot.components["api"].status, HealthStatus::Healthy);
        assert_eq!(snapshot.components["system"].status, HealthStatus::Unknown);
        assert_eq!(snapshot.overall_status, HealthStatus::Critical);
    }
}
