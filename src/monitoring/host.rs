use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use sysinfo::{Disks, Pid, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tracing::debug;

/// One reading of host resources. `None` means the platform could not
/// provide that gauge this time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HostSample {
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub process_memory_mb: Option<f64>,
    pub disk_percent: Option<f64>,
}

impl HostSample {
    pub fn unavailable() -> Self {
        Self::default()
    }
}

/// Source of host resource gauges. Implementations must not block for long
/// and must never panic on an unsupported platform.
pub trait HostProbe: Send + Sync {
    fn sample(&self) -> HostSample;
}

struct SysinfoState {
    system: System,
    cpu_refreshed_at: Instant,
    cpu_percent: f64,
}

/// `sysinfo`-backed probe, shared by the collector and the resource probes.
/// CPU usage is measured between refreshes at least
/// `MINIMUM_CPU_UPDATE_INTERVAL` apart; samples taken closer together reuse
/// the last reading, which is 0 until the first interval has passed.
pub struct SysinfoHost {
    state: Mutex<SysinfoState>,
    pid: Option<Pid>,
    disk_path: PathBuf,
}

impl SysinfoHost {
    /// `disk_path` selects the filesystem whose usage is reported.
    pub fn new(disk_path: impl Into<PathBuf>) -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        Self {
            state: Mutex::new(SysinfoState {
                system,
                cpu_refreshed_at: Instant::now(),
                cpu_percent: 0.0,
            }),
            pid: sysinfo::get_current_pid().ok(),
            disk_path: disk_path.into(),
        }
    }

    fn disk_usage(&self) -> Option<f64> {
        let target = std::fs::canonicalize(&self.disk_path)
            .or_else(|_| std::env::current_dir())
            .ok()?;
        let disks = Disks::new_with_refreshed_list();

        // Longest mount point that prefixes the target owns it.
        let disk = disks
            .list()
            .iter()
            .filter(|d| target.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())?;

        let total = disk.total_space();
        if total == 0 {
            return None;
        }
        let used = total.saturating_sub(disk.available_space());
        Some(used as f64 / total as f64 * 100.0)
    }

    pub fn disk_path(&self) -> &Path {
        &self.disk_path
    }
}

impl HostProbe for SysinfoHost {
    fn sample(&self) -> HostSample {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            debug!("Host resource probing unsupported on this platform");
            return HostSample::unavailable();
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.cpu_refreshed_at.elapsed() >= MINIMUM_CPU_UPDATE_INTERVAL {
            state.system.refresh_cpu();
            state.cpu_percent = state.system.global_cpu_info().cpu_usage() as f64;
            state.cpu_refreshed_at = Instant::now();
        }
        let cpu_percent = Some(state.cpu_percent);

        let system = &mut state.system;
        system.refresh_memory();

        let total_memory = system.total_memory();
        let memory_percent = if total_memory > 0 {
            Some(system.used_memory() as f64 / total_memory as f64 * 100.0)
        } else {
            None
        };

        let process_memory_mb = self.pid.and_then(|pid| {
            if system.refresh_process(pid) {
                system
                    .process(pid)
                    .map(|p| p.memory() as f64 / (1024.0 * 1024.0))
            } else {
                None
            }
        });
        drop(guard);

        HostSample {
            cpu_percent,
            memory_percent,
            process_memory_mb,
            disk_percent: self.disk_usage(),
        }
    }
}

/// Probe returning whatever sample was last set. Used by embedders that
/// source gauges elsewhere, and by tests.
#[derive(Default)]
pub struct StaticHostProbe {
    sample: Mutex<HostSample>,
}

impl StaticHostProbe {
    pub fn new(sample: HostSample) -> Self {
        Self {
            sample: Mutex::new(sample),
        }
    }

    pub fn set(&self, sample: HostSample) {
        *self.sample.lock() = sample;
    }
}

impl HostProbe for StaticHostProbe {
    fn sample(&self) -> HostSample {
        *self.sample.lock()
    }
}
