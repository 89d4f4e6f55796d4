use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};

/// Request counters for the `music_service_status` tool.
pub struct ServiceStatus {
    started: Instant,
    total_requests: AtomicU64,
    last_request: Mutex<Option<DateTime<Utc>>>,
}

impl ServiceStatus {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            total_requests: AtomicU64::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let mut last = self.last_request.lock().unwrap_or_else(|e| e.into_inner());
        *last = Some(Utc::now());
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<String> {
        self.last_request
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for ServiceStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// `1h 5m` style uptime.
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
}
