//! Composite operator view and the heuristic system-health score.
//!
//! The score is computed from raw metrics and active alerts and is
//! independent of the health monitor's probe aggregate. Its error-rate input
//! is the mean of per-endpoint error rates, not the pooled ratio used by the
//! API health probe.

use super::alerts::{Alert, AlertStats};
use super::metrics::{MetricsSnapshot, SystemMetrics};
use super::AlertSeverity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthBucket {
    Excellent,
    Good,
    Warning,
    Critical,
}

impl HealthBucket {
    pub fn from_score(score: u8) -> Self {
        match score {
            90.. => HealthBucket::Excellent,
            75..=89 => HealthBucket::Good,
            50..=74 => HealthBucket::Warning,
            _ => HealthBucket::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthBucket::Excellent => "excellent",
            HealthBucket::Good => "good",
            HealthBucket::Warning => "warning",
            HealthBucket::Critical => "critical",
        }
    }
}

impl fmt::Display for HealthBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One deduction applied to the score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreFactor {
    pub factor: String,
    pub impact: i32,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemHealthScore {
    pub score: u8,
    pub status: HealthBucket,
    pub factors: Vec<ScoreFactor>,
}

pub fn score_system_health(snapshot: &MetricsSnapshot, active_alerts: &[Alert]) -> SystemHealthScore {
    let mut factors = Vec::new();
    let mut deduct = |factor: &str, impact: i32, detail: String| {
        factors.push(ScoreFactor {
            factor: factor.to_string(),
            impact: -impact,
            detail,
        });
    };

    let critical = count_severity(active_alerts, AlertSeverity::Critical);
    if critical > 0 {
        deduct("critical_alerts", 30, format!("{} critical alert(s) active", critical));
    }
    let high = count_severity(active_alerts, AlertSeverity::High);
    if high > 0 {
        deduct("high_alerts", 20, format!("{} high alert(s) active", high));
    }

    let system = &snapshot.system;
    if system.cpu_percent > 90.0 {
        deduct("cpu_usage", 15, format!("CPU at {:.1}%", system.cpu_percent));
    } else if system.cpu_percent > 80.0 {
        deduct("cpu_usage", 10, format!("CPU at {:.1}%", system.cpu_percent));
    }

    if system.process_memory_mb > 1024.0 {
        deduct(
            "process_memory",
            15,
            format!("process using {:.0}MB", system.process_memory_mb),
        );
    }

    if system.disk_percent > 95.0 {
        deduct("disk_usage", 20, format!("disk at {:.1}%", system.disk_percent));
    } else if system.disk_percent > 90.0 {
        deduct("disk_usage", 10, format!("disk at {:.1}%", system.disk_percent));
    }

    if let Some(rate) = snapshot.mean_endpoint_error_rate() {
        if rate > 10.0 {
            deduct("error_rate", 25, format!("mean endpoint error rate {:.1}%", rate));
        } else if rate > 5.0 {
            deduct("error_rate", 15, format!("mean endpoint error rate {:.1}%", rate));
        }
    }

    let total: i32 = factors.iter().map(|f| f.impact).sum();
    let score = (100 + total).clamp(0, 100) as u8;

    SystemHealthScore {
        score,
        status: HealthBucket::from_score(score),
        factors,
    }
}

fn count_severity(alerts: &[Alert], severity: AlertSeverity) -> usize {
    alerts.iter().filter(|a| a.severity == severity).count()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiOverview {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub endpoint_count: usize,
    pub error_rate: Option<f64>,
    pub avg_response_time: Option<f64>,
    pub slowest_endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessOverview {
    pub missions_completed: u64,
    pub quizzes_completed: u64,
    pub badges_awarded: u64,
    pub points_distributed: u64,
    pub xp_distributed: u64,
    pub active_users: usize,
    pub daily_active_users: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertDigest {
    pub id: String,
    pub rule_name: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub timestamp: DateTime<Utc>,
    pub system_health: SystemHealthScore,
    pub api: ApiOverview,
    pub business: BusinessOverview,
    pub system: SystemMetrics,
    pub active_alerts: Vec<AlertDigest>,
    pub alert_stats: AlertStats,
}

pub fn build_dashboard_summary(
    snapshot: &MetricsSnapshot,
    active_alerts: &[Alert],
    alert_stats: AlertStats,
) -> DashboardSummary {
    let with_samples: Vec<_> = snapshot
        .api
        .values()
        .filter(|m| !m.response_times.is_empty())
        .collect();
    let avg_response_time = (!with_samples.is_empty()).then(|| {
        with_samples.iter().map(|m| m.avg_response_time).sum::<f64>() / with_samples.len() as f64
    });
    let slowest_endpoint = with_samples
        .iter()
        .max_by(|a, b| a.avg_response_time.total_cmp(&b.avg_response_time))
        .map(|m| format!("{} {}", m.method, m.endpoint));

    let business = &snapshot.business;

    let mut digests: Vec<AlertDigest> = active_alerts
        .iter()
        .map(|a| AlertDigest {
            id: a.id.clone(),
            rule_name: a.rule_name.clone(),
            severity: a.severity,
            message: a.message.clone(),
            triggered_at: a.triggered_at,
        })
        .collect();
    digests.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then(b.triggered_at.cmp(&a.triggered_at))
    });

    DashboardSummary {
        timestamp: snapshot.timestamp,
        system_health: score_system_health(snapshot, active_alerts),
        api: ApiOverview {
            total_requests: snapshot.total_requests(),
            failed_requests: snapshot.total_failures(),
            endpoint_count: snapshot.api.len(),
            error_rate: snapshot.mean_endpoint_error_rate(),
            avg_response_time,
            slowest_endpoint,
        },
        business: BusinessOverview {
            missions_completed: business.missions_completed,
            quizzes_completed: business.quizzes_completed,
            badges_awarded: business.badges_awarded,
            points_distributed: business.points_distributed,
            xp_distributed: business.xp_distributed,
            active_users: business.active_user_count(),
            daily_active_users: business.daily_active_user_count(),
        },
        system: snapshot.system.clone(),
        active_alerts: digests,
        alert_stats,
    }
}
