pub mod alerts;
pub mod dashboard;
pub mod events;
pub mod health;
pub mod host;
pub mod logs;
pub mod metrics;
pub mod scheduler;

pub use alerts::*;
pub use dashboard::*;
pub use events::*;
pub use health::*;
pub use host::*;
pub use logs::*;
pub use metrics::*;
pub use scheduler::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Probe and component status. Variant order is severity order, so `max()`
/// over a set of statuses yields the worst one.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unknown,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unknown => "unknown",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
        }
    }

    /// Worst status of an iterator; `None` for an empty one.
    pub fn worst<I>(statuses: I) -> Option<HealthStatus>
    where
        I: IntoIterator<Item = HealthStatus>,
    {
        statuses.into_iter().max()
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a rule watches. Each type has its own evaluator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    ErrorRate,
    ResponseTime,
    MemoryUsage,
    CpuUsage,
    DiskUsage,
    BusinessInactivity,
    ExcessiveErrors,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::ErrorRate => "error_rate",
            AlertType::ResponseTime => "response_time",
            AlertType::MemoryUsage => "memory_usage",
            AlertType::CpuUsage => "cpu_usage",
            AlertType::DiskUsage => "disk_usage",
            AlertType::BusinessInactivity => "business_inactivity",
            AlertType::ExcessiveErrors => "excessive_errors",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparator applied as `value <condition> threshold`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertCondition {
    Gt,
    Lt,
    Eq,
}

impl AlertCondition {
    /// NaN never satisfies a condition.
    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        if value.is_nan() || threshold.is_nan() {
            return false;
        }
        match self {
            AlertCondition::Gt => value > threshold,
            AlertCondition::Lt => value < threshold,
            AlertCondition::Eq => (value - threshold).abs() < f64::EPSILON,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            AlertCondition::Gt => ">",
            AlertCondition::Lt => "<",
            AlertCondition::Eq => "==",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub name: String,
    pub enabled: bool,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub threshold: f64,
    pub condition: AlertCondition,
    pub description: String,
    pub cooldown_minutes: i64,
    pub last_triggered: Option<DateTime<Utc>>,
}

impl AlertRule {
    pub fn new(
        name: &str,
        alert_type: AlertType,
        severity: AlertSeverity,
        condition: AlertCondition,
        threshold: f64,
        cooldown_minutes: i64,
        description: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            alert_type,
            severity,
            threshold,
            condition,
            description: description.to_string(),
            cooldown_minutes,
            last_triggered: None,
        }
    }

    /// True while the rule is still cooling down from its last trigger.
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        match self.last_triggered {
            Some(last) => now - last < chrono::Duration::minutes(self.cooldown_minutes),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_ordering() {
        let worst = HealthStatus::worst([
            HealthStatus::Healthy,
            HealthStatus::Unknown,
            HealthStatus::Warning,
        ]);
        assert_eq!(worst, Some(HealthStatus::Warning));

        let worst = HealthStatus::worst([HealthStatus::Unknown, HealthStatus::Healthy]);
        assert_eq!(worst, Some(HealthStatus::Unknown));

        assert!(HealthStatus::Critical > HealthStatus::Warning);
        assert_eq!(HealthStatus::worst(Vec::new()), None);
    }

    #[test]
    fn test_condition_evaluation() {
        assert!(AlertCondition::Gt.holds(2500.0, 2000.0));
        assert!(!AlertCondition::Gt.holds(2000.0, 2000.0));
        assert!(AlertCondition::Lt.holds(1.0, 2.0));
        assert!(AlertCondition::Eq.holds(0.0, 0.0));
        assert!(!AlertCondition::Gt.holds(f64::NAN, 1.0));
        assert!(!AlertCondition::Eq.holds(f64::NAN, f64::NAN));
    }

    #[test]
    fn test_rule_cooldown_window() {
        let now = Utc::now();
        let mut rule = AlertRule::new(
            "slow",
            AlertType::ResponseTime,
            AlertSeverity::Medium,
            AlertCondition::Gt,
            2000.0,
            15,
            "slow endpoint",
        );
        assert!(!rule.in_cooldown(now));

        rule.last_triggered = Some(now - chrono::Duration::minutes(5));
        assert!(rule.in_cooldown(now));

        rule.last_triggered = Some(now - chrono::Duration::minutes(15));
        assert!(!rule.in_cooldown(now));

        rule.cooldown_minutes = 0;
        rule.last_triggered = Some(now);
        assert!(!rule.in_cooldown(now));
    }
}
