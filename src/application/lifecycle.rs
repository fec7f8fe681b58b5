use crate::api::create_api_router;
use crate::application::{DependencyContainer, MonitoringHandles};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Manages monitoring loop startup, the HTTP server and graceful shutdown
pub struct ApplicationLifecycle {
    container: Arc<DependencyContainer>,
    handles: Mutex<Option<MonitoringHandles>>,
}

impl ApplicationLifecycle {
    pub fn new(container: Arc<DependencyContainer>) -> Self {
        Self {
            container,
            handles: Mutex::new(None),
        }
    }

    /// Validate configuration and start the monitoring loops
    pub async fn initialize(&self) -> Result<()> {
        info!("Initializing monitoring service...");

        self.container.config.validate()?;

        let mut handles = self.handles.lock().await;
        if handles.is_some() {
            warn!("Monitoring loops already running");
            return Ok(());
        }
        *handles = Some(self.container.start_monitoring());

        info!("Monitoring service initialized");
        Ok(())
    }

    /// Serve the HTTP surface until a shutdown signal arrives
    pub async fn serve(&self) -> Result<()> {
        let address = self.container.config.bind_address();
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .with_context(|| format!("binding {}", address))?;
        info!("Monitoring API listening on http://{}", address);

        let router = create_api_router(self.container.app_state());
        axum::serve(listener, router)
            .with_graceful_shutdown(wait_for_shutdown())
            .await
            .context("HTTP server failed")?;

        Ok(())
    }

    /// Graceful shutdown
    pub async fn shutdown(&self) -> Result<()> {
        info!("Initiating graceful shutdown...");

        if let Some(handles) = self.handles.lock().await.take() {
            handles.stop().await;
        }

        info!("Graceful shutdown completed");
        Ok(())
    }
}

/// Wait for Ctrl+C or SIGTERM
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install terminate signal handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::StaticHostProbe;
    use crate::Config;
    use tempfile::TempDir;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_initialize_is_idempotent_and_shutdown_stops_loops() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.log_dir = dir.path().to_path_buf();
        let container = Arc::new(
            DependencyContainer::with_host(config, Arc::new(StaticHostProbe::default())).unwrap(),
        );
        let lifecycle = ApplicationLifecycle::new(container);

        assert_ok!(lifecycle.initialize().await);
        assert_ok!(lifecycle.initialize().await);
        assert!(lifecycle.handles.lock().await.is_some());

        assert_ok!(lifecycle.shutdown().await);
        assert!(lifecycle.handles.lock().await.is_none());
    }
}
