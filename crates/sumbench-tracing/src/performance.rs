//! Performance-focused tracing events.
//!
//! Measurement code reports what it observed through these helpers so every
//! event carries the same field names (`duration_us`, `elements_per_sec`,
//! `size_bytes`, ...) regardless of which kernel produced it.
//!
//! ```rust
//! use sumbench_tracing::performance::{record_throughput, PerformanceSpan};
//!
//! let span = PerformanceSpan::new("size_configuration", Some(100));
//! record_throughput("scalar", 1_000, 3);
//! drop(span); // logged only if it took at least 100µs
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use tracing::Level;

static ENABLED: AtomicBool = AtomicBool::new(true);
// u64::MAX encodes "no threshold".
static THRESHOLD_US: AtomicU64 = AtomicU64::new(u64::MAX);

/// Apply the process-wide performance event settings.
pub fn configure(enabled: bool, threshold_us: Option<u64>) {
    ENABLED.store(enabled, Ordering::Relaxed);
    THRESHOLD_US.store(threshold_us.unwrap_or(u64::MAX), Ordering::Relaxed);
}

/// Whether performance events are currently emitted.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

fn default_threshold() -> Option<u64> {
    match THRESHOLD_US.load(Ordering::Relaxed) {
        u64::MAX => None,
        us => Some(us),
    }
}

/// RAII guard that times a region and logs it on drop.
///
/// The region is logged only when performance events are enabled and the
/// elapsed time reaches the threshold.
pub struct PerformanceSpan {
    name: String,
    threshold_us: Option<u64>,
    start_time: Instant,
    span: tracing::Span,
}

impl PerformanceSpan {
    /// Create a span at debug level. `None` falls back to the threshold set
    /// through [`configure`].
    pub fn new(name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        Self::with_level(Level::DEBUG, name, threshold_us)
    }

    /// Create a span at an explicit tracing level.
    pub fn with_level(level: Level, name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        let name = name.into();
        let span = match level {
            Level::TRACE => tracing::trace_span!("perf", name = %name),
            Level::DEBUG => tracing::debug_span!("perf", name = %name),
            Level::INFO => tracing::info_span!("perf", name = %name),
            Level::WARN => tracing::warn_span!("perf", name = %name),
            Level::ERROR => tracing::error_span!("perf", name = %name),
        };

        Self {
            name,
            threshold_us: threshold_us.or_else(default_threshold),
            start_time: Instant::now(),
            span,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn elapsed_us(&self) -> u64 {
        self.start_time.elapsed().as_micros() as u64
    }
}

impl Drop for PerformanceSpan {
    fn drop(&mut self) {
        if !is_enabled() {
            return;
        }
        let elapsed_us = self.elapsed_us();
        if self.threshold_us.is_none_or(|t| elapsed_us >= t) {
            let _entered = self.span.enter();
            tracing::debug!(
                duration_us = elapsed_us,
                duration_ms = elapsed_us as f64 / 1000.0,
                "performance_span_complete"
            );
        }
    }
}

/// Elements per second for `elements` processed in `duration_ns`.
pub fn elements_per_sec(elements: usize, duration_ns: f64) -> f64 {
    if duration_ns <= 0.0 {
        return 0.0;
    }
    elements as f64 / duration_ns * 1_000_000_000.0
}

/// Record how fast a kernel consumed its input.
pub fn record_throughput(kernel: &str, elements: usize, mean_ns: u64) {
    if !is_enabled() {
        return;
    }
    let per_sec = elements_per_sec(elements, mean_ns as f64);
    tracing::debug!(
        event = "throughput",
        kernel = kernel,
        elements = elements,
        mean_ns = mean_ns,
        elements_per_sec = per_sec,
        melems_per_sec = per_sec / 1_000_000.0,
        gbytes_per_sec = per_sec * 4.0 / 1_000_000_000.0,
        "kernel_throughput"
    );
}

/// Record bytes allocated by a kernel across its timed trials.
pub fn record_allocation(kernel: &str, total_bytes: u64, trials: usize) {
    if !is_enabled() {
        return;
    }
    tracing::debug!(
        event = "allocation",
        kernel = kernel,
        total_bytes = total_bytes,
        trials = trials,
        bytes_per_trial = if trials == 0 { 0.0 } else { total_bytes as f64 / trials as f64 },
        "kernel_allocation"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn span_keeps_name_and_threshold() {
        let span = PerformanceSpan::new("trial", Some(1000));
        assert_eq!(span.name(), "trial");
        assert_eq!(span.threshold_us, Some(1000));
    }

    #[test]
    fn span_elapsed_advances() {
        let span = PerformanceSpan::with_level(Level::INFO, "sleep", None);
        thread::sleep(Duration::from_millis(5));
        assert!(span.elapsed_us() >= 5_000);
    }

    #[test]
    #[serial]
    fn configured_threshold_is_the_default() {
        configure(true, Some(42));
        let span = PerformanceSpan::new("defaulted", None);
        assert_eq!(span.threshold_us, Some(42));
        configure(true, None);
        let span = PerformanceSpan::new("unbounded", None);
        assert_eq!(span.threshold_us, None);
    }

    #[test]
    #[serial]
    fn disabled_events_are_dropped_quietly() {
        configure(false, None);
        assert!(!is_enabled());
        record_throughput("scalar", 1024, 100);
        record_allocation("scalar", 0, 10);
        configure(true, None);
        assert!(is_enabled());
    }

    #[test]
    fn throughput_math() {
        // 1M elements in 1ms = 1G elements/s
        assert!((elements_per_sec(1_000_000, 1_000_000.0) - 1e9).abs() < 1.0);
        assert_eq!(elements_per_sec(10, 0.0), 0.0);
    }
}
