use anyhow::Result;
use std::sync::Arc;

pub mod dependency_container;
pub mod lifecycle;

pub use dependency_container::{DependencyContainer, MonitoringHandles};
pub use lifecycle::ApplicationLifecycle;

/// Application layer - wires the monitoring core to its HTTP surface
pub struct Application {
    pub container: Arc<DependencyContainer>,
    pub lifecycle: Arc<ApplicationLifecycle>,
}

impl Application {
    pub fn new(config: crate::Config) -> Result<Self> {
        let container = Arc::new(DependencyContainer::new(config)?);
        let lifecycle = Arc::new(ApplicationLifecycle::new(container.clone()));

        Ok(Self {
            container,
            lifecycle,
        })
    }

    pub async fn initialize(&self) -> Result<()> {
        self.lifecycle.initialize().await
    }

    pub async fn serve(&self) -> Result<()> {
        self.lifecycle.serve().await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.lifecycle.shutdown().await
    }
}
