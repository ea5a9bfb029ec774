//! Per-trial measurements and their aggregation.

use std::time::Duration;

use serde::Serialize;

/// One timed invocation of one kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialResult {
    pub value: f32,
    pub elapsed: Duration,
    pub allocated_bytes: u64,
}

/// Elapsed-time statistics over the trials of one (kernel, size) pair,
/// in nanoseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingStats {
    pub mean_ns: f64,
    pub median_ns: f64,
    pub std_dev_ns: f64,
    pub min_ns: u64,
    pub max_ns: u64,
    pub p99_ns: u64,
    pub samples: usize,
}

impl TimingStats {
    /// Summarize raw samples. Returns `None` for an empty slice.
    pub fn from_samples(samples: &[u64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        let len = sorted.len();
        let sum: u128 = sorted.iter().map(|&s| u128::from(s)).sum();
        let mean = sum as f64 / len as f64;
        let median = if len % 2 == 0 {
            (sorted[len / 2 - 1] as f64 + sorted[len / 2] as f64) / 2.0
        } else {
            sorted[len / 2] as f64
        };
        let variance = sorted
            .iter()
            .map(|&s| {
                let diff = s as f64 - mean;
                diff * diff
            })
            .sum::<f64>()
            / len as f64;
        let p99_index = ((len as f64) * 0.99).ceil() as usize;

        Some(Self {
            mean_ns: mean,
            median_ns: median,
            std_dev_ns: variance.sqrt(),
            min_ns: sorted[0],
            max_ns: sorted[len - 1],
            p99_ns: sorted[p99_index.clamp(1, len) - 1],
            samples: len,
        })
    }

    pub fn from_trials(trials: &[TrialResult]) -> Option<Self> {
        let samples: Vec<u64> = trials.iter().map(|t| t.elapsed.as_nanos() as u64).collect();
        Self::from_samples(&samples)
    }

    /// `self.mean / baseline.mean`; below 1.0 means faster than baseline.
    pub fn ratio_to(&self, baseline: &TimingStats) -> f64 {
        if baseline.mean_ns <= 0.0 {
            return if self.mean_ns <= 0.0 { 1.0 } else { f64::INFINITY };
        }
        self.mean_ns / baseline.mean_ns
    }
}

/// Bytes allocated during the timed trials of one (kernel, size) pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AllocationStats {
    pub total_bytes: u64,
    pub mean_bytes: f64,
}

impl AllocationStats {
    pub fn from_trials(trials: &[TrialResult]) -> Self {
        if trials.is_empty() {
            return Self::default();
        }
        let total_bytes: u64 = trials.iter().map(|t| t.allocated_bytes).sum();
        Self {
            total_bytes,
            mean_bytes: total_bytes as f64 / trials.len() as f64,
        }
    }
}

/// Relative error of `actual` against `expected`.
///
/// Exact equality (including two zeros) is 0; otherwise the difference is
/// scaled by the larger magnitude.
pub fn relative_error(expected: f32, actual: f32) -> f64 {
    if expected == actual {
        return 0.0;
    }
    let (e, a) = (f64::from(expected), f64::from(actual));
    let scale = e.abs().max(a.abs());
    if scale == 0.0 || !scale.is_finite() {
        return f64::INFINITY;
    }
    (e - a).abs() / scale
}

pub fn within_tolerance(expected: f32, actual: f32, tolerance: f64) -> bool {
    relative_error(expected, actual) <= tolerance
}

/// Outcome of comparing a kernel's results to the baseline's.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Correctness {
    Pass {
        max_relative_error: f64,
    },
    Mismatch {
        expected: f32,
        actual: f32,
        relative_error: f64,
    },
}

impl Correctness {
    /// Judge every trial value (and the warm-up value) against `expected`,
    /// reporting the worst one.
    pub fn judge(expected: f32, values: impl IntoIterator<Item = f32>, tolerance: f64) -> Self {
        let mut worst_value = expected;
        let mut worst_error = 0.0f64;
        for value in values {
            let err = relative_error(expected, value);
            if err > worst_error || err.is_nan() {
                worst_error = err;
                worst_value = value;
            }
        }
        if worst_error <= tolerance {
            Correctness::Pass {
                max_relative_error: worst_error,
            }
        } else {
            Correctness::Mismatch {
                expected,
                actual: worst_value,
                relative_error: worst_error,
            }
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Correctness::Pass { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_stats_from_samples() {
        let stats = TimingStats::from_samples(&[40, 10, 30, 20]).unwrap();
        assert_eq!(stats.min_ns, 10);
        assert_eq!(stats.max_ns, 40);
        assert_eq!(stats.mean_ns, 25.0);
        assert_eq!(stats.median_ns, 25.0);
        assert_eq!(stats.p99_ns, 40);
        assert!((stats.std_dev_ns - 125.0f64.sqrt()).abs() < 1e-9);
        assert!(TimingStats::from_samples(&[]).is_none());
    }

    #[test]
    fn single_sample() {
        let stats = TimingStats::from_samples(&[7]).unwrap();
        assert_eq!(stats.median_ns, 7.0);
        assert_eq!(stats.p99_ns, 7);
        assert_eq!(stats.std_dev_ns, 0.0);
    }

    #[test]
    fn ratio_against_baseline() {
        let baseline = TimingStats::from_samples(&[100, 100]).unwrap();
        let faster = TimingStats::from_samples(&[25, 25]).unwrap();
        assert_eq!(faster.ratio_to(&baseline), 0.25);
        assert_eq!(baseline.ratio_to(&baseline), 1.0);
    }

    #[test]
    fn allocation_totals() {
        let trial = |bytes| TrialResult {
            value: 0.0,
            elapsed: Duration::from_nanos(1),
            allocated_bytes: bytes,
        };
        let stats = AllocationStats::from_trials(&[trial(0), trial(64), trial(32)]);
        assert_eq!(stats.total_bytes, 96);
        assert_eq!(stats.mean_bytes, 32.0);
        assert_eq!(AllocationStats::from_trials(&[]), AllocationStats::default());
    }

    #[test]
    fn tolerance_is_relative() {
        assert!(within_tolerance(1000.0, 1000.5, 1e-3));
        assert!(!within_tolerance(1000.0, 1002.0, 1e-3));
        assert!(within_tolerance(0.0, 0.0, 0.0));
        assert!(!within_tolerance(0.0, 1e-6, 1e-3));
    }

    #[test]
    fn judge_reports_worst_value() {
        let verdict = Correctness::judge(100.0, [100.0, 100.01, 150.0], 1e-3);
        match verdict {
            Correctness::Mismatch { actual, .. } => assert_eq!(actual, 150.0),
            other => panic!("expected mismatch, got {other:?}"),
        }
        assert!(Correctness::judge(45.0, [45.0, 45.0], 1e-3).is_pass());
    }
}
