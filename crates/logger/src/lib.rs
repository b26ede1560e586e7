/// prop-sync — Logger
/// JSONL event stream, one file per UTC day

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

pub struct EventLogger {
    log_dir: PathBuf,
}

impl EventLogger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        let dir = log_dir.into();
        fs::create_dir_all(&dir).ok();
        Self { log_dir: dir }
    }

    pub fn log<T: Serialize>(&self, event: &T) -> Result<()> {
        let date  = Utc::now().format("%Y-%m-%d").to_string();
        let path  = self.log_dir.join(format!("{date}.jsonl"));
        let line  = serde_json::to_string(event)?;
        let mut f = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

// ── Event types ───────────────────────────────────────────────────────────────

#[derive(Serialize, Debug, Clone)]
pub struct SyncCycleEvent {
    pub ts:              String,
    pub event:           &'static str,   // "SYNC_CYCLE"
    pub cycle:           u64,
    pub targets:         usize,
    pub fetches_ok:      usize,
    pub fetches_failed:  usize,
    pub quotes:          usize,
    pub decode_errors:   usize,
    pub markets_written: usize,
    pub insufficient:    usize,
    pub evicted:         usize,
    pub synced:          usize,
    pub partial:         usize,
    pub outdated:        usize,
    pub latency_ms:      u64,
}

#[derive(Serialize, Debug, Clone)]
pub struct SourceUnavailableEvent {
    pub ts:      String,
    pub event:   &'static str,   // "SOURCE_UNAVAILABLE"
    pub source:  String,
    pub target:  String,
    pub reason:  String,         // "timeout" | error text
}

#[derive(Serialize, Debug, Clone)]
pub struct CycleFailedEvent {
    pub ts:     String,
    pub event:  &'static str,    // "SYNC_CYCLE_FAILED"
    pub cycle:  u64,
    pub reason: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct SyncHeartbeatEvent {
    pub ts:                String,
    pub event:             &'static str,   // "SYNC_HEARTBEAT"
    pub cached_markets:    usize,
    pub synced:            usize,
    pub partial:           usize,
    pub outdated:          usize,
    pub active_bookmakers: Vec<String>,
    pub mean_latency_ms:   u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_json_line_per_event() {
        let dir = std::env::temp_dir().join(format!("prop-sync-logger-{}", std::process::id()));
        let logger = EventLogger::new(&dir);
        let ev = SourceUnavailableEvent {
            ts:     now_iso(),
            event:  "SOURCE_UNAVAILABLE",
            source: "sgo".into(),
            target: "nba/g1".into(),
            reason: "timeout".into(),
        };
        logger.log(&ev).unwrap();
        logger.log(&ev).unwrap();

        let date = Utc::now().format("%Y-%m-%d").to_string();
        let body = fs::read_to_string(dir.join(format!("{date}.jsonl"))).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert!(lines.len() >= 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["event"], "SOURCE_UNAVAILABLE");
        fs::remove_dir_all(&dir).ok();
    }
}
