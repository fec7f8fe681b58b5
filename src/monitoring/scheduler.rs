use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Cancellation handle for a periodic loop. Dropping the handle also ends
/// the loop after its current tick.
pub struct LoopHandle {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl LoopHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the loop and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(task = self.name, "Periodic loop ended abnormally: {}", e);
        }
    }
}

/// Run `work` now and then every `period` until stopped. A failing or
/// panicking tick is logged and the loop carries on.
pub fn spawn_periodic<F, Fut>(name: &'static str, period: Duration, mut work: F) -> LoopHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let (shutdown, mut signal) = watch::channel(false);

    let task = tokio::spawn(async move {
        info!(task = name, "Periodic loop started ({}s interval)", period.as_secs());

        loop {
            if *signal.borrow() {
                break;
            }

            match AssertUnwindSafe(work()).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(task = name, "Tick failed: {:#}", e),
                Err(_) => error!(task = name, "Tick panicked; loop continues"),
            }

            tokio::select! {
                _ = tokio::time::sleep(period) => {}
                changed = signal.changed() => {
                    if changed.is_err() || *signal.borrow() {
                        break;
                    }
                }
            }
        }

        info!(task = name, "Periodic loop stopped");
    });

    LoopHandle {
        name,
        shutdown,
        task,
    }
}
