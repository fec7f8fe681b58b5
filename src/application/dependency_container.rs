use crate::{
    api::AppState,
    monitoring::{
        builtin_probes, AlertManager, EventStore, HealthMonitor, HealthSnapshot, HostProbe,
        HttpEndpoint, JsonlEventStore, LogScanner, LoopHandle, MetricsCollector, Reachable,
        SysinfoHost,
    },
    Config,
};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Composition root: builds the collector, alert manager and health
/// monitor once and hands out shared references.
pub struct DependencyContainer {
    pub config: Config,
    pub host: Arc<dyn HostProbe>,
    pub log_scanner: LogScanner,
    pub event_store: Option<Arc<dyn EventStore>>,
    pub collector: Arc<MetricsCollector>,
    pub alerts: Arc<AlertManager>,
    pub health: Arc<HealthMonitor>,
}

impl DependencyContainer {
    pub fn new(config: Config) -> Result<Self> {
        let host: Arc<dyn HostProbe> = Arc::new(SysinfoHost::new(&config.log_dir));
        Self::with_host(config, host)
    }

    /// Same wiring with an injected host probe.
    pub fn with_host(config: Config, host: Arc<dyn HostProbe>) -> Result<Self> {
        info!("Initializing monitoring container...");

        let log_scanner = LogScanner::new(&config.log_dir);

        let event_store: Option<Arc<dyn EventStore>> = config
            .dependencies
            .events_dir
            .as_ref()
            .map(|dir| Arc::new(JsonlEventStore::new(dir)) as Arc<dyn EventStore>);
        if event_store.is_none() {
            info!("No EVENTS_DIR configured; business metrics stay at zero");
        }

        let auth: Option<Arc<dyn Reachable>> = match &config.dependencies.auth_provider_url {
            Some(url) => Some(Arc::new(HttpEndpoint::new(
                url.clone(),
                config.dependencies.timeout(),
            )?) as Arc<dyn Reachable>),
            None => None,
        };

        let mut collector =
            MetricsCollector::new(config.metrics.clone(), host.clone(), log_scanner.clone());
        if let Some(store) = &event_store {
            collector = collector.with_event_store(store.clone());
        }
        let collector = Arc::new(collector);

        let alerts = Arc::new(AlertManager::new(collector.clone()));

        let probes = builtin_probes(
            collector.clone(),
            host.clone(),
            log_scanner.clone(),
            event_store.clone(),
            auth,
            config.dependencies.timeout(),
        );
        let health = Arc::new(
            HealthMonitor::new(probes)
                .with_probe_timeout(config.dependencies.timeout() + Duration::from_secs(5))
                .with_alert_manager(alerts.clone()),
        );

        info!("Monitoring container ready");
        Ok(Self {
            config,
            host,
            log_scanner,
            event_store,
            collector,
            alerts,
            health,
        })
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            collector: self.collector.clone(),
            alerts: self.alerts.clone(),
            health: self.health.clone(),
            logs: self.log_scanner.clone(),
        }
    }

    /// Start the three periodic loops.
    pub fn start_monitoring(&self) -> MonitoringHandles {
        MonitoringHandles {
            metrics: self.collector.start(),
            alerts: self.alerts.start(),
            health: self.health.start(),
        }
    }

    /// One collection tick plus one probe round.
    pub async fn health_check(&self) -> Result<HealthSnapshot> {
        self.collector.collect_all_metrics().await;
        Ok(self.health.check_all_components().await)
    }
}

pub struct MonitoringHandles {
    pub metrics: LoopHandle,
    pub alerts: LoopHandle,
    pub health: LoopHandle,
}

impl MonitoringHandles {
    pub async fn stop(self) {
        self.health.stop().await;
        self.alerts.stop().await;
        self.metrics.stop().await;
        info!("Monitoring loops stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::{HealthStatus, StaticHostProbe};
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.log_dir = dir.path().join("logs");
        config
    }

    #[tokio::test]
    async fn test_container_wires_unconfigured_dependencies_as_critical() {
        let dir = TempDir::new().unwrap();
        let container =
            DependencyContainer::with_host(config(&dir), Arc::new(StaticHostProbe::default()))
                .unwrap();
        assert!(container.event_store.is_none());

        let snapshot = container.health_check().await.unwrap();
        assert_eq!(snapshot.components["store"].status, HealthStatus::Critical);
        assert_eq!(snapshot.components["auth"].status, HealthStatus::Critical);
        assert_eq!(container.collector.history_len(), 1);
    }

    #[tokio::test]
    async fn test_container_uses_event_directory() {
        let dir = TempDir::new().unwrap();
        let events = dir.path().join("events");
        std::fs::create_dir_all(&events).unwrap();

        let mut config = config(&dir);
        config.dependencies.events_dir = Some(events);
        let container =
            DependencyContainer::with_host(config, Arc::new(StaticHostProbe::default())).unwrap();

        let snapshot = container.health_check().await.unwrap();
        assert_eq!(snapshot.components["store"].status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_loops_start_and_stop() {
        let dir = TempDir::new().unwrap();
        let container =
            DependencyContainer::with_host(config(&dir), Arc::new(StaticHostProbe::default()))
                .unwrap();

        let handles = container.start_monitoring();
        assert_eq!(handles.metrics.name(), "metrics_collector");
        tokio::time::timeout(Duration::from_secs(5), handles.stop())
            .await
            .unwrap();
    }
}
