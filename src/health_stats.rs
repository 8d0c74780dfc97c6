//! Scrape health statistics.
//!
//! Tracks how the scrape cycles are doing (duration, domains, samples,
//! skipped domains, rejected batches) and renders them as the plain-text
//! table served on `/health`.

use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock as StdRwLock};
use std::time::Instant;

use chrono::{DateTime, Local};

/// Running statistics for a single value.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    /// `(last, avg, max, min, count)`
    pub fn snapshot(&self) -> (f64, f64, f64, f64, u64) {
        let s = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        (s.last, s.avg(), s.max, s.min, s.count)
    }
}

/// Outcome of one scrape cycle, as reported by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub domains: usize,
    pub domains_skipped: usize,
    pub samples_recorded: usize,
    pub schema_mismatches: usize,
    pub enumeration_retries: usize,
    pub duration_seconds: f64,
}

/// Written by the scheduler thread, read by the `/health` handler.
pub struct ScrapeStats {
    pub cycle_duration_seconds: Stat,
    pub domains: Stat,
    pub samples_recorded: Stat,
    pub total_cycles: AtomicU64,
    pub domains_skipped: AtomicU64,
    pub schema_mismatches: AtomicU64,
    pub enumeration_retries: AtomicU64,
    pub http_requests: AtomicU64,
    pub start_time: Instant,
    pub last_cycle: StdRwLock<Option<DateTime<Local>>>,
}

impl Default for ScrapeStats {
    fn default() -> Self {
        Self {
            cycle_duration_seconds: Stat::default(),
            domains: Stat::default(),
            samples_recorded: Stat::default(),
            total_cycles: AtomicU64::new(0),
            domains_skipped: AtomicU64::new(0),
            schema_mismatches: AtomicU64::new(0),
            enumeration_retries: AtomicU64::new(0),
            http_requests: AtomicU64::new(0),
            start_time: Instant::now(),
            last_cycle: StdRwLock::new(None),
        }
    }
}

impl ScrapeStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_cycle(&self, report: &CycleReport) {
        self.cycle_duration_seconds
            .add_sample(report.duration_seconds);
        self.domains.add_sample(report.domains as f64);
        self.samples_recorded
            .add_sample(report.samples_recorded as f64);
        self.total_cycles.fetch_add(1, Ordering::Relaxed);
        self.domains_skipped
            .fetch_add(report.domains_skipped as u64, Ordering::Relaxed);
        self.schema_mismatches
            .fetch_add(report.schema_mismatches as u64, Ordering::Relaxed);
        self.enumeration_retries
            .fetch_add(report.enumeration_retries as u64, Ordering::Relaxed);
        if let Ok(mut guard) = self.last_cycle.write() {
            *guard = Some(Local::now());
        }
    }

    pub fn record_http_request(&self) {
        self.http_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn has_completed_cycle(&self) -> bool {
        self.total_cycles.load(Ordering::Relaxed) > 0
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn get_last_cycle_str(&self) -> String {
        self.last_cycle
            .read()
            .ok()
            .and_then(|guard| *guard)
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }

    pub fn render_table(&self) -> String {
        let left_col = 26usize;
        let col_w = 12usize;

        let mut out = String::new();

        writeln!(out, "HEALTH ENDPOINT - SCRAPE STATS").ok();
        writeln!(out, "==============================").ok();
        writeln!(out).ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out).ok();
        writeln!(out, "SCRAPE CYCLES").ok();
        writeln!(out, "-------------").ok();

        let rows = [
            ("cycle_duration (s)", &self.cycle_duration_seconds, 3usize),
            ("domains", &self.domains, 0),
            ("samples_recorded", &self.samples_recorded, 0),
        ];
        for (name, stat, precision) in rows {
            let (cur, avg, max, min, _) = stat.snapshot();
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                name,
                format!("{:.p$}", cur, p = precision),
                format!("{:.p$}", avg, p = precision.max(1)),
                format!("{:.p$}", max, p = precision),
                format!("{:.p$}", min, p = precision),
                left = left_col,
                col = col_w
            )
            .ok();
        }

        writeln!(out).ok();
        writeln!(out, "ERROR TRACKING").ok();
        writeln!(out, "--------------").ok();

        let counters = [
            ("domains_skipped", &self.domains_skipped),
            ("schema_mismatches", &self.schema_mismatches),
            ("enumeration_retries", &self.enumeration_retries),
        ];
        for (name, counter) in counters {
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                name,
                counter.load(Ordering::Relaxed),
                "N/A",
                "N/A",
                "N/A",
                left = left_col,
                col = col_w
            )
            .ok();
        }

        writeln!(out).ok();
        writeln!(
            out,
            "number of done cycles: {} | last cycle: {} | http requests: {} | uptime: {:.1}h",
            self.total_cycles.load(Ordering::Relaxed),
            self.get_last_cycle_str(),
            self.http_requests.load(Ordering::Relaxed),
            self.start_time.elapsed().as_secs_f64() / 3600.0
        )
        .ok();

        out
    }
}
