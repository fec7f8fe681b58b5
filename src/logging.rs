use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Prefix of the daily log files; the log scanner reads them back by stem.
pub const LOG_FILE_PREFIX: &str = "vigil.log";

/// `RUST_LOG` wins over the configured level.
pub fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Console output plus a daily-rotated JSON file in `log_dir`. Keep the
/// returned guard alive for the life of the process.
pub fn init_logging(default_level: &str, log_dir: &Path) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let (file_writer, guard) = non_blocking(rolling::daily(log_dir, LOG_FILE_PREFIX));

    tracing_subscriber::registry()
        .with(build_filter(default_level))
        .with(fmt::layer())
        .with(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(guard)
}

/// Console only, for one-shot commands.
pub fn init_console_logging(default_level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(build_filter(default_level))
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("installing tracing subscriber")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::logs::parse_line;

    #[test]
    fn test_invalid_level_falls_back() {
        let filter = build_filter("definitely[not=valid");
        assert!(!filter.to_string().is_empty());
    }

    #[test]
    fn test_json_layer_output_is_readable_by_scanner() {
        let line = r#"{"timestamp":"2026-10-18T10:00:00.000000Z","level":"ERROR","fields":{"message":"ALERT TRIGGERED: disk","alert_id":"low_disk_space_1","category":"alerts"},"target":"vigil::monitoring::alerts"}"#;
        let entry = parse_line(line, "vigil").unwrap();
        assert_eq!(entry.level, "ERROR");
        assert_eq!(entry.category, "alerts");
        assert_eq!(entry.message, "ALERT TRIGGERED: disk");
    }
}
