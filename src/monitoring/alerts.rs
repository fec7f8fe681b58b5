use super::metrics::{ApiMetrics, MetricsCollector, MetricsSnapshot};
use super::scheduler::{spawn_periodic, LoopHandle};
use super::{AlertCondition, AlertRule, AlertSeverity, AlertType};
use crate::config::ALERT_CHECK_INTERVAL_SECONDS;
use crate::error::{MonitoringError, Result};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Alert history keeps at most this many entries, oldest evicted first.
pub const ALERT_HISTORY_LIMIT: usize = 1000;

pub type AlertCallback = Arc<dyn Fn(&Alert) + Send + Sync>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub rule_name: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    /// Endpoint key for per-endpoint rules; `None` for host-wide gauges.
    #[serde(default)]
    pub subject: Option<String>,
    /// Full metrics snapshot at trigger time
    pub details: MetricsSnapshot,
    pub triggered_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertStats {
    pub total_alerts: usize,
    pub active_alerts: usize,
    pub resolved_alerts: usize,
    pub alerts_last_24h: usize,
    pub severity_breakdown: BTreeMap<String, usize>,
    pub enabled_rules: usize,
    pub total_rules: usize,
}

#[derive(Debug, Clone)]
pub struct AlertManagerConfig {
    pub check_interval: Duration,
    pub history_limit: usize,
    /// Resolve active alerts whose condition no longer holds
    pub auto_resolve: bool,
}

impl Default for AlertManagerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(ALERT_CHECK_INTERVAL_SECONDS),
            history_limit: ALERT_HISTORY_LIMIT,
            auto_resolve: true,
        }
    }
}

struct AlertState {
    rules: Vec<AlertRule>,
    active: Vec<Alert>,
    history: VecDeque<Alert>,
}

/// What an evaluator observed when a rule's condition held.
struct Breach {
    value: f64,
    subject: Option<String>,
    message: String,
}

pub struct AlertManager {
    collector: Arc<MetricsCollector>,
    config: AlertManagerConfig,
    state: Mutex<AlertState>,
    callbacks: RwLock<Vec<AlertCallback>>,
    sequence: AtomicU64,
}

impl AlertManager {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self::with_rules(collector, Self::default_alert_rules())
    }

    pub fn with_rules(collector: Arc<MetricsCollector>, rules: Vec<AlertRule>) -> Self {
        Self {
            collector,
            config: AlertManagerConfig::default(),
            state: Mutex::new(AlertState {
                rules,
                active: Vec::new(),
                history: VecDeque::new(),
            }),
            callbacks: RwLock::new(Vec::new()),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn with_config(mut self, config: AlertManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Built-in rule table, one rule per alert type
    pub fn default_alert_rules() -> Vec<AlertRule> {
        vec![
            AlertRule::new(
                "high_error_rate",
                AlertType::ErrorRate,
                AlertSeverity::High,
                AlertCondition::Gt,
                10.0,
                15,
                "Endpoint error rate above 10%",
            ),
            AlertRule::new(
                "slow_response_time",
                AlertType::ResponseTime,
                AlertSeverity::Medium,
                AlertCondition::Gt,
                2000.0,
                15,
                "Endpoint average response time above 2s",
            ),
            AlertRule::new(
                "high_memory_usage",
                AlertType::MemoryUsage,
                AlertSeverity::High,
                AlertCondition::Gt,
                85.0,
                30,
                "Host memory usage above 85%",
            ),
            AlertRule::new(
                "high_cpu_usage",
                AlertType::CpuUsage,
                AlertSeverity::High,
                AlertCondition::Gt,
                90.0,
                30,
                "Host CPU usage above 90%",
            ),
            AlertRule::new(
                "low_disk_space",
                AlertType::DiskUsage,
                AlertSeverity::Critical,
                AlertCondition::Gt,
                90.0,
                60,
                "Disk usage above 90%",
            ),
            AlertRule::new(
                "no_business_activity",
                AlertType::BusinessInactivity,
                AlertSeverity::Low,
                AlertCondition::Eq,
                0.0,
                240,
                "No active users today",
            ),
            AlertRule::new(
                "excessive_errors",
                AlertType::ExcessiveErrors,
                AlertSeverity::High,
                AlertCondition::Gt,
                100.0,
                30,
                "More than 100 logged errors in the last hour",
            ),
        ]
    }

    pub fn register_callback<F>(&self, callback: F)
    where
        F: Fn(&Alert) + Send + Sync + 'static,
    {
        self.callbacks.write().push(Arc::new(callback));
    }

    /// Evaluate every rule against the collector's live metrics.
    pub fn check_all_alerts(&self) -> Vec<Alert> {
        let snapshot = self.collector.get_current_metrics();
        self.evaluate(&snapshot, Utc::now())
    }

    /// Evaluate every rule against `snapshot` as of `now`; returns the alerts
    /// fired.
    pub fn evaluate(&self, snapshot: &MetricsSnapshot, now: DateTime<Utc>) -> Vec<Alert> {
        let (fired, recovered) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            let recovered = if self.config.auto_resolve {
                Self::resolve_recovered(state, snapshot, now)
            } else {
                Vec::new()
            };

            let mut fired = Vec::new();
            for rule in state.rules.iter_mut() {
                if !rule.enabled || rule.in_cooldown(now) {
                    continue;
                }
                let Some(breach) = evaluate_rule(rule, snapshot) else {
                    continue;
                };

                let alert = Alert {
                    id: self.next_alert_id(&rule.name, now),
                    rule_name: rule.name.clone(),
                    alert_type: rule.alert_type,
                    severity: rule.severity,
                    message: breach.message,
                    value: breach.value,
                    threshold: rule.threshold,
                    subject: breach.subject,
                    details: snapshot.clone(),
                    triggered_at: now,
                    resolved: false,
                    resolved_at: None,
                };
                rule.last_triggered = Some(now);

                state.active.push(alert.clone());
                state.history.push_back(alert.clone());
                while state.history.len() > self.config.history_limit {
                    state.history.pop_front();
                }
                fired.push(alert);
            }

            (fired, recovered)
        };

        for alert in &recovered {
            info!(
                alert_id = %alert.id,
                rule = %alert.rule_name,
                category = "alerts",
                "ALERT RESOLVED (condition cleared): {}",
                alert.message
            );
        }

        for alert in &fired {
            log_alert(alert);
            self.notify(alert);
        }

        fired
    }

    fn next_alert_id(&self, rule_name: &str, now: DateTime<Utc>) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}_{}", rule_name, now.format("%Y%m%dT%H%M%S%3f"), seq)
    }

    fn resolve_recovered(
        state: &mut AlertState,
        snapshot: &MetricsSnapshot,
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        let recovered_ids: Vec<String> = state
            .active
            .iter()
            .filter(|alert| {
                let still_breached = state
                    .rules
                    .iter()
                    .find(|r| r.name == alert.rule_name)
                    .map_or(false, |rule| {
                        rule.enabled && alert_still_holds(rule, alert, snapshot)
                    });
                !still_breached
            })
            .map(|alert| alert.id.clone())
            .collect();

        recovered_ids
            .iter()
            .filter_map(|id| Self::resolve_in(state, id, now))
            .collect()
    }

    fn resolve_in(state: &mut AlertState, id: &str, now: DateTime<Utc>) -> Option<Alert> {
        let pos = state.active.iter().position(|a| a.id == id)?;
        let mut alert = state.active.remove(pos);
        alert.resolved = true;
        alert.resolved_at = Some(now);

        if let Some(entry) = state.history.iter_mut().find(|a| a.id == id) {
            entry.resolved = true;
            entry.resolved_at = Some(now);
        }
        Some(alert)
    }

    fn notify(&self, alert: &Alert) {
        let callbacks: Vec<AlertCallback> = self.callbacks.read().clone();
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(alert))).is_err() {
                error!(alert_id = %alert.id, "Alert callback panicked");
            }
        }
    }

    /// Manually resolve an active alert. Unknown ids leave state untouched.
    pub fn resolve_alert(&self, id: &str) -> Result<Alert> {
        let resolved = {
            let mut state = self.state.lock();
            Self::resolve_in(&mut state, id, Utc::now())
        };

        match resolved {
            Some(alert) => {
                info!(
                    alert_id = %alert.id,
                    rule = %alert.rule_name,
                    category = "alerts",
                    "ALERT RESOLVED: {}",
                    alert.message
                );
                Ok(alert)
            }
            None => Err(MonitoringError::AlertNotFound { id: id.to_string() }),
        }
    }

    pub fn get_active_alerts(&self) -> Vec<Alert> {
        self.state.lock().active.clone()
    }

    /// Alerts triggered within the last `hours`, newest first.
    pub fn get_alert_history(&self, hours: u32) -> Vec<Alert> {
        let cutoff = Utc::now() - chrono::Duration::hours(hours as i64);
        self.state
            .lock()
            .history
            .iter()
            .rev()
            .filter(|a| a.triggered_at >= cutoff)
            .cloned()
            .collect()
    }

    pub fn get_alert_stats(&self) -> AlertStats {
        let state = self.state.lock();
        let cutoff = Utc::now() - chrono::Duration::hours(24);

        let mut severity_breakdown: BTreeMap<String, usize> = [
            AlertSeverity::Low,
            AlertSeverity::Medium,
            AlertSeverity::High,
            AlertSeverity::Critical,
        ]
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();

        let mut alerts_last_24h = 0;
        for alert in state.history.iter().filter(|a| a.triggered_at >= cutoff) {
            alerts_last_24h += 1;
            *severity_breakdown
                .entry(alert.severity.as_str().to_string())
                .or_insert(0) += 1;
        }

        AlertStats {
            total_alerts: state.history.len(),
            active_alerts: state.active.len(),
            resolved_alerts: state.history.iter().filter(|a| a.resolved).count(),
            alerts_last_24h,
            severity_breakdown,
            enabled_rules: state.rules.iter().filter(|r| r.enabled).count(),
            total_rules: state.rules.len(),
        }
    }

    pub fn rules(&self) -> Vec<AlertRule> {
        self.state.lock().rules.clone()
    }

    /// Toggle a rule by name; false when no such rule exists.
    pub fn set_rule_enabled(&self, name: &str, enabled: bool) -> bool {
        let mut state = self.state.lock();
        match state.rules.iter_mut().find(|r| r.name == name) {
            Some(rule) => {
                rule.enabled = enabled;
                info!(rule = name, enabled, "Alert rule toggled");
                true
            }
            None => false,
        }
    }

    pub fn start(self: &Arc<Self>) -> LoopHandle {
        let manager = Arc::clone(self);
        spawn_periodic("alert_manager", self.config.check_interval, move || {
            let manager = Arc::clone(&manager);
            async move {
                manager.check_all_alerts();
                Ok(())
            }
        })
    }
}

fn log_alert(alert: &Alert) {
    match alert.severity {
        AlertSeverity::Critical | AlertSeverity::High => error!(
            alert_id = %alert.id,
            rule = %alert.rule_name,
            severity = %alert.severity,
            category = "alerts",
            "ALERT TRIGGERED: {}",
            alert.message
        ),
        AlertSeverity::Medium => warn!(
            alert_id = %alert.id,
            rule = %alert.rule_name,
            severity = %alert.severity,
            category = "alerts",
            "ALERT TRIGGERED: {}",
            alert.message
        ),
        AlertSeverity::Low => info!(
            alert_id = %alert.id,
            rule = %alert.rule_name,
            severity = %alert.severity,
            category = "alerts",
            "ALERT TRIGGERED: {}",
            alert.message
        ),
    }
}

/// Reading a per-endpoint rule watches; `None` for host-wide rules and for
/// endpoints without data.
fn endpoint_reading(rule: &AlertRule, metrics: &ApiMetrics) -> Option<f64> {
    match rule.alert_type {
        AlertType::ErrorRate => (metrics.total_requests > 0).then_some(metrics.error_rate),
        AlertType::ResponseTime => {
            (!metrics.response_times.is_empty()).then_some(metrics.avg_response_time)
        }
        _ => None,
    }
}

/// An endpoint alert holds only while its own endpoint breaches.
fn alert_still_holds(rule: &AlertRule, alert: &Alert, snapshot: &MetricsSnapshot) -> bool {
    match &alert.subject {
        Some(key) => snapshot
            .api
            .get(key)
            .and_then(|m| endpoint_reading(rule, m))
            .map_or(false, |value| rule.condition.holds(value, rule.threshold)),
        None => evaluate_rule(rule, snapshot).is_some(),
    }
}

/// First endpoint, in key order, whose reading breaches the rule.
fn endpoint_breach(rule: &AlertRule, snapshot: &MetricsSnapshot) -> Option<(String, f64)> {
    snapshot.api.iter().find_map(|(key, m)| {
        endpoint_reading(rule, m)
            .filter(|value| rule.condition.holds(*value, rule.threshold))
            .map(|value| (key.clone(), value))
    })
}

/// Per-type evaluator. Missing or NaN inputs never breach.
fn evaluate_rule(rule: &AlertRule, snapshot: &MetricsSnapshot) -> Option<Breach> {
    let holds = |value: f64| rule.condition.holds(value, rule.threshold);
    let op = rule.condition.symbol();

    match rule.alert_type {
        AlertType::ErrorRate => endpoint_breach(rule, snapshot).map(|(key, value)| Breach {
            value,
            message: format!(
                "High error rate on {}: {:.1}% ({} {:.1}%)",
                key, value, op, rule.threshold
            ),
            subject: Some(key),
        }),
        AlertType::ResponseTime => endpoint_breach(rule, snapshot).map(|(key, value)| Breach {
            value,
            message: format!(
                "Slow response time on {}: {:.0}ms ({} {:.0}ms)",
                key, value, op, rule.threshold
            ),
            subject: Some(key),
        }),
        AlertType::MemoryUsage => gauge_breach(
            snapshot.system.memory_percent,
            holds,
            format!(
                "Memory usage at {:.1}% ({} {:.1}%)",
                snapshot.system.memory_percent, op, rule.threshold
            ),
        ),
        AlertType::CpuUsage => gauge_breach(
            snapshot.system.cpu_percent,
            holds,
            format!(
                "CPU usage at {:.1}% ({} {:.1}%)",
                snapshot.system.cpu_percent, op, rule.threshold
            ),
        ),
        AlertType::DiskUsage => gauge_breach(
            snapshot.system.disk_percent,
            holds,
            format!(
                "Disk usage at {:.1}% ({} {:.1}%)",
                snapshot.system.disk_percent, op, rule.threshold
            ),
        ),
        AlertType::BusinessInactivity => {
            let daily = snapshot.business.daily_active_user_count() as f64;
            gauge_breach(
                daily,
                holds,
                format!("{} active users today ({} {:.0})", daily, op, rule.threshold),
            )
        }
        AlertType::ExcessiveErrors => {
            let errors = snapshot.system.error_count as f64;
            gauge_breach(
                errors,
                holds,
                format!(
                    "{} errors logged in the last hour ({} {:.0})",
                    errors, op, rule.threshold
                ),
            )
        }
    }
}

fn gauge_breach(value: f64, holds: impl Fn(f64) -> bool, message: String) -> Option<Breach> {
    holds(value).then_some(Breach {
        value,
        subject: None,
        message,
    })
}
