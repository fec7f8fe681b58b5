//! Log directory scanning: on-disk volume, recent error/warning counts and a
//! filtered tail for operators.
//!
//! Lines may be JSON (the `tracing` JSON layer this crate installs) or plain
//! text. Anything unreadable is skipped; scanning never fails on content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Only this many trailing bytes of each file are parsed.
const TAIL_BYTES: u64 = 4 * 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogStats {
    pub total_bytes: u64,
    pub file_count: usize,
    /// ERROR entries inside the activity window
    pub error_count: u64,
    /// WARN entries inside the activity window
    pub warning_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: Option<DateTime<Utc>>,
    pub level: String,
    pub category: String,
    pub message: String,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct LogQuery {
    pub category: Option<String>,
    pub level: Option<String>,
    pub limit: usize,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            category: None,
            level: None,
            limit: 50,
        }
    }
}

impl LogQuery {
    fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(category) = &self.category {
            if !entry.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(level) = &self.level {
            if normalize_level(level) != entry.level {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct LogScanner {
    dir: PathBuf,
    activity_window: chrono::Duration,
}

impl LogScanner {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            activity_window: chrono::Duration::hours(1),
        }
    }

    pub fn with_activity_window(mut self, window: chrono::Duration) -> Self {
        self.activity_window = window;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Combined size of all files in the directory. A missing directory is
    /// empty, not an error.
    pub fn total_size(&self) -> io::Result<u64> {
        Ok(self.log_files()?.iter().map(|f| f.len).sum())
    }

    /// Size plus error/warning counts within the activity window.
    pub fn stats(&self, now: DateTime<Utc>) -> io::Result<LogStats> {
        let files = self.log_files()?;
        let cutoff = now - self.activity_window;
        let mut stats = LogStats {
            total_bytes: files.iter().map(|f| f.len).sum(),
            file_count: files.len(),
            ..LogStats::default()
        };

        for file in &files {
            // Untimestamped lines only count when the file itself is fresh.
            let fresh = file
                .modified
                .map(|m| DateTime::<Utc>::from(m) >= cutoff)
                .unwrap_or(false);
            if !fresh {
                continue;
            }

            let text = match read_tail(&file.path, TAIL_BYTES) {
                Ok(text) => text,
                Err(e) => {
                    debug!("Skipping log file {}: {}", file.path.display(), e);
                    continue;
                }
            };

            for line in text.lines() {
                let Some(entry) = parse_line(line, &file.stem) else {
                    continue;
                };
                if entry.timestamp.map_or(false, |ts| ts < cutoff) {
                    continue;
                }
                match entry.level.as_str() {
                    "ERROR" => stats.error_count += 1,
                    "WARN" => stats.warning_count += 1,
                    _ => {}
                }
            }
        }

        Ok(stats)
    }

    /// Newest-first entries matching `query`.
    pub fn recent(&self, query: &LogQuery) -> io::Result<Vec<LogEntry>> {
        let mut collected = Vec::new();
        if query.limit == 0 {
            return Ok(collected);
        }

        for file in self.log_files()? {
            let text = match read_tail(&file.path, TAIL_BYTES) {
                Ok(text) => text,
                Err(e) => {
                    debug!("Skipping log file {}: {}", file.path.display(), e);
                    continue;
                }
            };

            for line in text.lines().rev() {
                if let Some(entry) = parse_line(line, &file.stem) {
                    if query.matches(&entry) {
                        collected.push(entry);
                        if collected.len() >= query.limit {
                            return Ok(collected);
                        }
                    }
                }
            }
        }

        Ok(collected)
    }

    /// Regular files in the directory, most recently modified first.
    fn log_files(&self) -> io::Result<Vec<LogFile>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut files = Vec::new();
        for entry in entries.flatten() {
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let path = entry.path();
            let stem = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.split('.').next())
                .unwrap_or("log")
                .to_string();
            files.push(LogFile {
                path,
                stem,
                len: metadata.len(),
                modified: metadata.modified().ok(),
            });
        }

        files.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(files)
    }
}

struct LogFile {
    path: PathBuf,
    stem: String,
    len: u64,
    modified: Option<SystemTime>,
}

fn read_tail(path: &Path, max_bytes: u64) -> io::Result<String> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let start = len.saturating_sub(max_bytes);
    file.seek(SeekFrom::Start(start))?;

    let mut bytes = Vec::with_capacity((len - start) as usize);
    file.read_to_end(&mut bytes)?;
    let text = String::from_utf8_lossy(&bytes).into_owned();

    // Mid-file seeks land inside a line; drop the fragment.
    if start > 0 {
        if let Some(idx) = text.find('\n') {
            return Ok(text[idx + 1..].to_string());
        }
        return Ok(String::new());
    }
    Ok(text)
}

fn normalize_level(level: &str) -> String {
    match level.trim().to_ascii_uppercase().as_str() {
        "WARNING" => "WARN".to_string(),
        "CRITICAL" | "FATAL" => "ERROR".to_string(),
        other => other.to_string(),
    }
}

fn is_level(token: &str) -> bool {
    matches!(
        normalize_level(token).as_str(),
        "ERROR" | "WARN" | "INFO" | "DEBUG" | "TRACE"
    )
}

fn category_from_target(target: &str) -> Option<String> {
    target
        .rsplit("::")
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse one log line; `None` for blank or unrecognizable lines.
pub fn parse_line(line: &str, file_stem: &str) -> Option<LogEntry> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if line.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(line) {
            return Some(parse_json_entry(&value, file_stem));
        }
    }

    parse_text_entry(line, file_stem)
}

/// `tracing`'s JSON layer nests event fields under `fields`.
fn json_field<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    value
        .get("fields")
        .and_then(|f| f.get(key))
        .or_else(|| value.get(key))
        .and_then(|v| v.as_str())
}

fn parse_json_entry(value: &serde_json::Value, file_stem: &str) -> LogEntry {
    let timestamp = value
        .get("timestamp")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let category = json_field(value, "category")
        .map(str::to_string)
        .or_else(|| {
            value
                .get("target")
                .and_then(|v| v.as_str())
                .and_then(category_from_target)
        })
        .unwrap_or_else(|| file_stem.to_string());

    LogEntry {
        timestamp,
        level: normalize_level(json_field(value, "level").unwrap_or("INFO")),
        category,
        message: json_field(value, "message").unwrap_or_default().to_string(),
        source: file_stem.to_string(),
    }
}

fn parse_text_entry(line: &str, file_stem: &str) -> Option<LogEntry> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let mut timestamp = None;
    let mut level = None;
    let mut category = None;
    let mut consumed = 0;

    for (idx, raw) in tokens.iter().enumerate().take(4) {
        let token = raw.trim_matches(|c| c == '[' || c == ']');
        if idx == 0 {
            if let Ok(ts) = DateTime::parse_from_rfc3339(token) {
                timestamp = Some(ts.with_timezone(&Utc));
                consumed = idx + 1;
                continue;
            }
        }
        if level.is_none() && is_level(token.trim_end_matches(':')) {
            level = Some(normalize_level(token.trim_end_matches(':')));
            consumed = idx + 1;
            continue;
        }
        if level.is_some() && token.ends_with(':') && token.len() > 1 {
            category = category_from_target(token.trim_end_matches(':'));
            consumed = idx + 1;
        }
        break;
    }

    let level = level?;
    Some(LogEntry {
        timestamp,
        level,
        category: category.unwrap_or_else(|| file_stem.to_string()),
        message: tokens[consumed..].join(" "),
        source: file_stem.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_log(dir: &TempDir, name: &str, body: &str) {
        fs::write(dir.path().join(name), body).unwrap();
    }

    #[test]
    fn test_parse_tracing_text_line() {
        let entry = parse_line(
            "2026-10-18T08:00:00.123Z  WARN vigil::monitoring::alerts: slow endpoint",
            "vigil",
        )
        .unwrap();
        assert_eq!(entry.level, "WARN");
        assert_eq!(entry.category, "alerts");
        assert_eq!(entry.message, "slow endpoint");
        assert!(entry.timestamp.is_some());
    }

    #[test]
    fn test_parse_json_line() {
        let line = r#"{"timestamp":"2026-10-18T08:00:00Z","level":"ERROR","fields":{"message":"boom","category":"business"},"target":"vigil::monitoring::metrics"}"#;
        let entry = parse_line(line, "vigil").unwrap();
        assert_eq!(entry.level, "ERROR");
        assert_eq!(entry.category, "business");
        assert_eq!(entry.message, "boom");

        let line = r#"{"timestamp":"2026-10-18T08:00:00Z","level":"INFO","fields":{"message":"tick"},"target":"vigil::monitoring::health"}"#;
        assert_eq!(parse_line(line, "vigil").unwrap().category, "health");
    }

    #[test]
    fn test_unrecognized_lines_are_skipped() {
        assert!(parse_line("", "app").is_none());
        assert!(parse_line("just some words", "app").is_none());
        assert!(parse_line("{broken json", "app").is_none());
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let scanner = LogScanner::new("/definitely/not/here");
        assert_eq!(scanner.total_size().unwrap(), 0);
        assert!(scanner.recent(&LogQuery::default()).unwrap().is_empty());
    }

    #[test]
    fn test_stats_count_recent_levels() {
        let dir = TempDir::new().unwrap();
        let now = Utc::now();
        let recent = now.to_rfc3339();
        let stale = (now - chrono::Duration::hours(3)).to_rfc3339();
        write_log(
            &dir,
            "app.log",
            &format!(
                "{recent} ERROR app::api: failed\n{recent} WARN app::api: slow\n{stale} ERROR app::api: old failure\nERROR no timestamp here\n"
            ),
        );
        fs::write(dir.path().join("binary.log"), [0xff, 0xfe, 0x00, b'\n']).unwrap();

        let stats = LogScanner::new(dir.path()).stats(now).unwrap();
        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.error_count, 2);
        assert_eq!(stats.warning_count, 1);
        assert!(stats.total_bytes > 0);
    }

    #[test]
    fn test_recent_filters_and_limits() {
        let dir = TempDir::new().unwrap();
        let ts = Utc::now().to_rfc3339();
        let body: String = (0..10)
            .map(|i| {
                let level = if i % 2 == 0 { "INFO" } else { "ERROR" };
                format!("{ts} {level} app::alerts: line {i}\n")
            })
            .collect();
        write_log(&dir, "app.log", &body);

        let scanner = LogScanner::new(dir.path());
        let errors = scanner
            .recent(&LogQuery {
                level: Some("error".to_string()),
                limit: 3,
                ..LogQuery::default()
            })
            .unwrap();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].message, "line 9");
        assert!(errors.iter().all(|e| e.level == "ERROR"));

        let by_category = scanner
            .recent(&LogQuery {
                category: Some("alerts".to_string()),
                limit: 50,
                ..LogQuery::default()
            })
            .unwrap();
        assert_eq!(by_category.len(), 10);

        let none = scanner
            .recent(&LogQuery {
                category: Some("business".to_string()),
                ..LogQuery::default()
            })
            .unwrap();
        assert!(none.is_empty());
    }
}
