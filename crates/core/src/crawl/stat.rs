//! Session counters and periodic reporting.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ReportConfig;

/// Counters shared by every worker of a session.
pub struct Stat {
    started_at: Instant,
    file: AtomicU64,
    request: AtomicU64,
    scraped: AtomicU64,
    skip_visit: AtomicU64,
    skip_mark_visit: AtomicU64,
    extension: AtomicU64,
    error: AtomicU64,
    last_scraped_at: Mutex<Option<DateTime<Utc>>>,
    last_report: Mutex<Instant>,
    extensions: Mutex<BTreeMap<String, u64>>,
}

/// Point-in-time copy of [`Stat`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatSnapshot {
    pub file: u64,
    pub request: u64,
    pub scraped: u64,
    pub skip: u64,
    pub skip_mark: u64,
    pub ext: u64,
    pub err: u64,
    pub last_scraped_at: Option<DateTime<Utc>>,
    pub elapsed_secs: u64,
    pub extensions: BTreeMap<String, u64>,
}

impl Default for Stat {
    fn default() -> Self {
        let now = Instant::now();
        Self {
            started_at: now,
            file: AtomicU64::new(0),
            request: AtomicU64::new(0),
            scraped: AtomicU64::new(0),
            skip_visit: AtomicU64::new(0),
            skip_mark_visit: AtomicU64::new(0),
            extension: AtomicU64::new(0),
            error: AtomicU64::new(0),
            last_scraped_at: Mutex::new(None),
            last_report: Mutex::new(now),
            extensions: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Stat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_file(&self) {
        self.file.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_request(&self) {
        self.request.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a scraped response and return the new total.
    pub fn inc_scraped(&self) -> u64 {
        *self
            .last_scraped_at
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(Utc::now());
        self.scraped.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn inc_skip_visit(&self) {
        self.skip_visit.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_skip_mark_visit(&self) {
        self.skip_mark_visit.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_error(&self) {
        self.error.fetch_add(1, Ordering::Relaxed);
    }

    /// Tally one file under its effective extension (empty means none).
    pub fn count_ext(&self, ext: &str) {
        self.extension.fetch_add(1, Ordering::Relaxed);
        let mut extensions = self.extensions.lock().unwrap_or_else(|e| e.into_inner());
        *extensions.entry(ext.to_string()).or_insert(0) += 1;
    }

    pub fn error_count(&self) -> u64 {
        self.error.load(Ordering::Relaxed)
    }

    pub fn scraped_count(&self) -> u64 {
        self.scraped.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatSnapshot {
        StatSnapshot {
            file: self.file.load(Ordering::Relaxed),
            request: self.request.load(Ordering::Relaxed),
            scraped: self.scraped.load(Ordering::Relaxed),
            skip: self.skip_visit.load(Ordering::Relaxed),
            skip_mark: self.skip_mark_visit.load(Ordering::Relaxed),
            ext: self.extension.load(Ordering::Relaxed),
            err: self.error.load(Ordering::Relaxed),
            last_scraped_at: *self
                .last_scraped_at
                .lock()
                .unwrap_or_else(|e| e.into_inner()),
            elapsed_secs: self.started_at.elapsed().as_secs(),
            extensions: self
                .extensions
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
        }
    }

    /// Emit a report if a threshold has passed since the last one.
    ///
    /// Fires on every `every_scraped`-th scraped page once `min_interval_secs`
    /// have passed, or whenever `max_interval_secs` have passed.
    pub fn maybe_report(&self, config: &ReportConfig) -> bool {
        let scraped = self.scraped_count();
        let mut last = self.last_report.lock().unwrap_or_else(|e| e.into_inner());

        if !should_report(scraped, last.elapsed(), config) {
            return false;
        }
        *last = Instant::now();
        drop(last);

        self.report("progress");
        true
    }

    pub fn report(&self, label: &str) {
        let s = self.snapshot();
        tracing::info!(
            file = s.file,
            request = s.request,
            scraped = s.scraped,
            skip = s.skip,
            skip_mark = s.skip_mark,
            ext = s.ext,
            err = s.err,
            elapsed_secs = s.elapsed_secs,
            extensions = ?s.extensions,
            "stat {}",
            label
        );
    }
}

fn should_report(scraped: u64, elapsed: Duration, config: &ReportConfig) -> bool {
    let every = config.every_scraped.max(1);
    (scraped % every == 0 && elapsed > Duration::from_secs(config.min_interval_secs))
        || elapsed > Duration::from_secs(config.max_interval_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stat = Stat::new();
        stat.inc_request();
        stat.inc_request();
        assert_eq!(stat.inc_scraped(), 1);
        stat.inc_file();
        stat.inc_skip_visit();
        stat.inc_skip_mark_visit();
        stat.inc_error();

        let s = stat.snapshot();
        assert_eq!(s.request, 2);
        assert_eq!(s.scraped, 1);
        assert_eq!(s.file, 1);
        assert_eq!(s.skip, 1);
        assert_eq!(s.skip_mark, 1);
        assert_eq!(s.err, 1);
        assert!(s.last_scraped_at.is_some());
    }

    #[test]
    fn test_extension_histogram() {
        let stat = Stat::new();
        stat.count_ext(".torrent");
        stat.count_ext(".torrent");
        stat.count_ext("");

        let s = stat.snapshot();
        assert_eq!(s.ext, 3);
        assert_eq!(s.extensions.get(".torrent"), Some(&2));
        assert_eq!(s.extensions.get(""), Some(&1));
    }

    #[test]
    fn test_should_report_thresholds() {
        let config = ReportConfig::default();

        // Modulus hit but too soon
        assert!(!should_report(1000, Duration::from_secs(5), &config));
        // Modulus hit after the minimum interval
        assert!(should_report(2000, Duration::from_secs(11), &config));
        // No modulus hit, not yet at the maximum interval
        assert!(!should_report(1001, Duration::from_secs(20), &config));
        // Maximum interval always reports
        assert!(should_report(1001, Duration::from_secs(31), &config));
    }

    #[test]
    fn test_maybe_report_resets_timer() {
        let stat = Stat::new();
        let config = ReportConfig {
            every_scraped: 1,
            min_interval_secs: 0,
            max_interval_secs: 3600,
        };

        std::thread::sleep(Duration::from_millis(5));
        assert!(stat.maybe_report(&config));
        // Elapsed was just reset, so the strict minimum has not passed yet
        let quiet = ReportConfig {
            min_interval_secs: 60,
            ..config
        };
        assert!(!stat.maybe_report(&quiet));
    }
}
