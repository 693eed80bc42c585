// Scan metrics module
//
// Provides lightweight per-session counters for the scan loop

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Per-session scan metrics
///
/// Uses atomic operations so status readers can sample the counters while the
/// session loop is updating them. A fresh instance is created for each session and
/// its summary is logged when the session ends.
#[derive(Debug)]
pub struct ScanMetrics {
    /// Frames captured and handed to the decoder
    pub frames_captured: AtomicU64,

    /// Captures that reported the target as temporarily unavailable
    pub frames_unavailable: AtomicU64,

    /// QR payloads returned by the decoder
    pub payloads_decoded: AtomicU64,

    /// Payloads without a ticket
    pub payloads_ignored: AtomicU64,

    /// Tickets admitted by the dedup gate
    pub tickets_admitted: AtomicU64,

    /// Tickets suppressed by the dedup gate
    pub tickets_suppressed: AtomicU64,

    /// Claim attempts that succeeded
    pub logins_succeeded: AtomicU64,

    /// Claim attempts that failed
    pub logins_failed: AtomicU64,

    /// Total time spent in claim attempts in milliseconds
    pub total_login_time_ms: AtomicU64,

    /// Session start time
    start_time: Instant,
}

impl ScanMetrics {
    /// Create a new ScanMetrics instance
    pub fn new() -> Self {
        Self {
            frames_captured: AtomicU64::new(0),
            frames_unavailable: AtomicU64::new(0),
            payloads_decoded: AtomicU64::new(0),
            payloads_ignored: AtomicU64::new(0),
            tickets_admitted: AtomicU64::new(0),
            tickets_suppressed: AtomicU64::new(0),
            logins_succeeded: AtomicU64::new(0),
            logins_failed: AtomicU64::new(0),
            total_login_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_frame(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unavailable(&self) {
        self.frames_unavailable.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the number of payloads one frame decoded to
    pub fn record_payloads(&self, count: usize) {
        self.payloads_decoded
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_ignored_payload(&self) {
        self.payloads_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_admitted(&self) {
        self.tickets_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suppressed(&self) {
        self.tickets_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished claim attempt and how long it took
    pub fn record_login(&self, success: bool, duration: Duration) {
        if success {
            self.logins_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.logins_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.total_login_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Get session uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average claim round trip in milliseconds
    pub fn avg_login_time_ms(&self) -> f64 {
        let total = self.total_login_time_ms.load(Ordering::Relaxed);
        let count = self.logins_succeeded.load(Ordering::Relaxed)
            + self.logins_failed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Scan Session Summary ===");
        tracing::info!("Duration: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Frames: {} captured, {} unavailable",
            self.frames_captured.load(Ordering::Relaxed),
            self.frames_unavailable.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Payloads: {} decoded, {} without ticket",
            self.payloads_decoded.load(Ordering::Relaxed),
            self.payloads_ignored.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Tickets: {} admitted, {} suppressed",
            self.tickets_admitted.load(Ordering::Relaxed),
            self.tickets_suppressed.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Logins: {} succeeded, {} failed (avg: {:.0}ms)",
            self.logins_succeeded.load(Ordering::Relaxed),
            self.logins_failed.load(Ordering::Relaxed),
            self.avg_login_time_ms()
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}
