//! Business-event records consumed by the metrics collector.
//!
//! The store behind this boundary is owned by the business services; the
//! monitoring core only reads from it and probes its reachability.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BusinessEventKind {
    MissionCompleted,
    QuizCompleted,
    BadgeEarned,
    RewardGranted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusinessEvent {
    #[serde(rename = "type")]
    pub kind: BusinessEventKind,
    pub user_id: String,
    #[serde(default)]
    pub points: u64,
    #[serde(default)]
    pub xp: u64,
    pub occurred_at: DateTime<Utc>,
}

impl BusinessEvent {
    pub fn new(kind: BusinessEventKind, user_id: &str, occurred_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            user_id: user_id.to_string(),
            points: 0,
            xp: 0,
            occurred_at,
        }
    }

    pub fn with_rewards(mut self, points: u64, xp: u64) -> Self {
        self.points = points;
        self.xp = xp;
        self
    }
}

/// Read-only view of the business-event store.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Events with `after < occurred_at <= until`. No lower bound when
    /// `after` is `None`. Records dated past `until` are held back until they
    /// fall due. Order is not guaranteed.
    async fn events_between(
        &self,
        after: Option<DateTime<Utc>>,
        until: DateTime<Utc>,
    ) -> Result<Vec<BusinessEvent>>;

    /// Cheap reachability check.
    async fn ping(&self) -> Result<()>;
}

fn in_window(event: &BusinessEvent, after: Option<DateTime<Utc>>, until: DateTime<Utc>) -> bool {
    event.occurred_at <= until && after.map_or(true, |a| event.occurred_at > a)
}

/// Directory of `*.jsonl` files, one event per line. Lines that fail to
/// parse are skipped. Files last modified at or before `after` are not
/// read again.
#[derive(Debug, Clone)]
pub struct JsonlEventStore {
    dir: PathBuf,
}

impl JsonlEventStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }
}

#[async_trait]
impl EventStore for JsonlEventStore {
    async fn events_between(
        &self,
        after: Option<DateTime<Utc>>,
        until: DateTime<Utc>,
    ) -> Result<Vec<BusinessEvent>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("reading event directory {}", self.dir.display()))?;

        let mut events = Vec::new();
        let mut skipped = 0usize;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }

            if let Some(after) = after {
                let modified = entry.metadata().await.and_then(|m| m.modified());
                if let Ok(modified) = modified {
                    if DateTime::<Utc>::from(modified) <= after {
                        continue;
                    }
                }
            }

            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Skipping unreadable event file {}: {}", path.display(), e);
                    continue;
                }
            };

            for line in String::from_utf8_lossy(&bytes).lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<BusinessEvent>(line) {
                    Ok(event) if in_window(&event, after, until) => events.push(event),
                    Ok(_) => {}
                    Err(_) => skipped += 1,
                }
            }
        }

        if skipped > 0 {
            debug!("Skipped {} malformed business-event records", skipped);
        }

        Ok(events)
    }

    async fn ping(&self) -> Result<()> {
        let metadata = tokio::fs::metadata(&self.dir)
            .await
            .with_context(|| format!("event store {} unreachable", self.dir.display()))?;
        if !metadata.is_dir() {
            anyhow::bail!("event store {} is not a directory", self.dir.display());
        }
        Ok(())
    }
}

/// In-process event buffer fed directly by the host application. Events
/// handed out by `events_between` are removed, so one collector drains it.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: Mutex<Vec<BusinessEvent>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: BusinessEvent) {
        self.events.lock().push(event);
    }

    /// Events not yet drained, future-dated ones included.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn events_between(
        &self,
        after: Option<DateTime<Utc>>,
        until: DateTime<Utc>,
    ) -> Result<Vec<BusinessEvent>> {
        let mut events = self.events.lock();
        let (due, pending): (Vec<_>, Vec<_>) =
            events.drain(..).partition(|e| e.occurred_at <= until);
        *events = pending;

        Ok(due
            .into_iter()
            .filter(|e| in_window(e, after, until))
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
