use std::time::Instant;
use tracing::{info, warn};

/// Periodic progress logging for the per-title update scan.
///
/// Keeps log volume bounded on large libraries: one line every
/// `progress_interval` titles plus a summary at the end.
pub struct ProgressTracker {
    total: usize,
    with_update: usize,
    up_to_date: usize,
    no_result: usize,
    start_time: Instant,
    progress_interval: usize,
    last_progress_log: usize,
}

impl ProgressTracker {
    pub fn new(total: usize, progress_interval: usize) -> Self {
        if total > 10 {
            info!(operation = "update_scan", "Checking {} titles for new episodes", total);
        }
        Self {
            total,
            with_update: 0,
            up_to_date: 0,
            no_result: 0,
            start_time: Instant::now(),
            progress_interval: progress_interval.max(1),
            last_progress_log: 0,
        }
    }

    pub fn record_update(&mut self) {
        self.with_update += 1;
    }

    pub fn record_up_to_date(&mut self) {
        self.up_to_date += 1;
    }

    /// No provider returned a usable count
    pub fn record_no_result(&mut self) {
        self.no_result += 1;
    }

    pub fn checked(&self) -> usize {
        self.with_update + self.up_to_date + self.no_result
    }

    /// `current` is 1-based
    pub fn log_progress(&mut self, current: usize) {
        if current - self.last_progress_log < self.progress_interval && current != self.total {
            return;
        }
        let elapsed = self.start_time.elapsed().as_secs_f64();
        // Provider calls are rate limited, so a sub-second pass means nothing worth reporting
        if elapsed < 0.5 && current < self.total {
            return;
        }
        let rate = if elapsed > 0.0 { current as f64 / elapsed } else { 0.0 };
        info!(
            operation = "update_scan",
            "Progress: {}/{} ({:.2} titles/sec) | Updates: {} | Up to date: {} | No result: {}",
            current, self.total, rate, self.with_update, self.up_to_date, self.no_result
        );
        self.last_progress_log = current;
    }

    pub fn log_summary(&self, cancelled: bool) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if cancelled {
            warn!(
                operation = "update_scan",
                "Update scan cancelled after {}/{} titles in {:.1}s",
                self.checked(), self.total, elapsed
            );
            return;
        }
        info!(
            operation = "update_scan",
            "Update scan completed: {} titles in {:.1}s | Updates: {} | Up to date: {} | No result: {}",
            self.total, elapsed, self.with_update, self.up_to_date, self.no_result
        );
    }
}
