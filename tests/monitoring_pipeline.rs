//! End-to-end behaviour of the monitoring core: collector feeding the alert
//! manager, the health monitor and the dashboard score.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use vigil::config::MetricsConfig;
use vigil::monitoring::{
    build_dashboard_summary, builtin_probes, AlertManager, BusinessEvent, BusinessEventKind,
    EventStore, HealthBucket, HealthMonitor, HealthStatus, HostProbe, HostSample, LogScanner,
    MemoryEventStore, MetricsCollector, StaticHostProbe,
};

struct Pipeline {
    _logs: TempDir,
    host: Arc<StaticHostProbe>,
    events: Arc<MemoryEventStore>,
    collector: Arc<MetricsCollector>,
    alerts: Arc<AlertManager>,
    health: Arc<HealthMonitor>,
}

fn pipeline(sample: HostSample) -> Pipeline {
    let logs = TempDir::new().unwrap();
    let host = Arc::new(StaticHostProbe::new(sample));
    let events = Arc::new(MemoryEventStore::new());

    let host_probe: Arc<dyn HostProbe> = host.clone();
    let store: Arc<dyn EventStore> = events.clone();
    let scanner = LogScanner::new(logs.path());

    let collector = Arc::new(
        MetricsCollector::new(MetricsConfig::default(), host_probe.clone(), scanner.clone())
            .with_event_store(store.clone()),
    );
    let alerts = Arc::new(AlertManager::new(collector.clone()));
    let health = Arc::new(
        HealthMonitor::new(builtin_probes(
            collector.clone(),
            host_probe,
            scanner,
            Some(store),
            None,
            Duration::from_secs(1),
        ))
        .with_alert_manager(alerts.clone()),
    );

    Pipeline {
        _logs: logs,
        host,
        events,
        collector,
        alerts,
        health,
    }
}

fn calm_host() -> HostSample {
    HostSample {
        cpu_percent: Some(12.0),
        memory_percent: Some(40.0),
        process_memory_mb: Some(180.0),
        disk_percent: Some(35.0),
    }
}

#[tokio::test]
async fn test_rolling_window_keeps_last_hundred_samples() {
    let p = pipeline(calm_host());
    for duration in 1..=101 {
        p.collector
            .record_api_request("/x", "get", 200, duration as f64);
    }

    let snapshot = p.collector.get_current_metrics();
    let metrics = &snapshot.api["GET /x"];
    assert_eq!(metrics.total_requests, 101);
    assert_eq!(metrics.response_times.len(), 100);
    assert_eq!(metrics.response_times.front().copied(), Some(2.0));
    assert_eq!(metrics.min_response_time, 2.0);
    assert_eq!(metrics.max_response_time, 101.0);
    assert!((metrics.avg_response_time - 51.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_full_disk_degrades_every_view() -> Result<()> {
    let p = pipeline(HostSample {
        disk_percent: Some(96.0),
        ..calm_host()
    });
    p.events.push(
        BusinessEvent::new(BusinessEventKind::MissionCompleted, "learner-1", Utc::now())
            .with_rewards(50, 20),
    );

    p.collector.collect_all_metrics().await;
    let fired = p.alerts.check_all_alerts();
    let names: Vec<&str> = fired.iter().map(|a| a.rule_name.as_str()).collect();
    assert_eq!(names, vec!["low_disk_space"]);

    let snapshot = p.health.check_all_components().await;
    assert_eq!(snapshot.components["system"].status, HealthStatus::Critical);
    assert_eq!(snapshot.components["store"].status, HealthStatus::Healthy);
    assert_eq!(snapshot.components["auth"].status, HealthStatus::Critical);
    assert_eq!(snapshot.components["api"].checks[0].message, "no requests");

    let current = p.health.get_current_health();
    assert_eq!(current.overall_status, HealthStatus::Critical);
    assert_eq!(current.active_alerts, 1);

    let metrics = p.collector.get_current_metrics();
    let summary = build_dashboard_summary(
        &metrics,
        &p.alerts.get_active_alerts(),
        p.alerts.get_alert_stats(),
    );
    // critical alert and disk above 95%
    assert_eq!(summary.system_health.score, 50);
    assert_eq!(summary.system_health.status, HealthBucket::Warning);
    assert_eq!(summary.business.missions_completed, 1);
    assert_eq!(summary.business.points_distributed, 50);
    assert_eq!(summary.business.daily_active_users, 1);

    Ok(())
}

#[tokio::test]
async fn test_disk_alert_resolves_after_cleanup() {
    let p = pipeline(HostSample {
        disk_percent: Some(96.0),
        ..calm_host()
    });
    p.events.push(BusinessEvent::new(
        BusinessEventKind::QuizCompleted,
        "learner-2",
        Utc::now(),
    ));

    p.collector.collect_all_metrics().await;
    assert_eq!(p.alerts.check_all_alerts().len(), 1);

    p.host.set(calm_host());
    p.collector.collect_all_metrics().await;
    assert!(p.alerts.check_all_alerts().is_empty());
    assert!(p.alerts.get_active_alerts().is_empty());

    let history = p.alerts.get_alert_history(1);
    assert_eq!(history.len(), 1);
    assert!(history[0].resolved);
}

#[tokio::test]
async fn test_unavailable_host_never_fails_a_tick() {
    let p = pipeline(HostSample::unavailable());

    p.collector.collect_all_metrics().await;
    let metrics = p.collector.get_current_metrics();
    assert_eq!(metrics.system.cpu_percent, 0.0);
    assert_eq!(metrics.system.disk_percent, 0.0);
    assert_eq!(p.collector.history_len(), 1);

    let snapshot = p.health.check_all_components().await;
    for check in &snapshot.components["system"].checks {
        assert_eq!(check.status, HealthStatus::Unknown);
    }
}

#[tokio::test]
async fn test_loops_tick_until_stopped() {
    let p = pipeline(calm_host());

    let metrics = p.collector.start();
    let health = p.health.start();
    tokio::time::sleep(Duration::from_millis(200)).await;
    metrics.stop().await;
    health.stop().await;

    assert!(p.collector.history_len() >= 1);
    assert!(!p.health.get_health_history(1).is_empty());
}
