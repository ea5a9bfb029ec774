//! Measurement harness.
//!
//! ## Protocol per size configuration
//!
//! ```text
//! generate one InputBuffer(size)
//! for each kernel: warm-up invocation(s), result kept for the correctness check
//! for each kernel: `trials` timed invocations on the same buffer
//!     each trial: probe bytes -> start clock -> reduce -> stop clock -> probe bytes
//! aggregate per kernel: timing stats, allocation stats, correctness verdict
//! ratio = kernel mean / baseline mean
//! ```
//!
//! Kernels run strictly one after another on the calling thread. The buffer
//! is only ever lent out as `&[f32]`, so it cannot change between kernels.
//!
//! A kernel disagreeing with the baseline does not stop the run: its row is
//! marked [`Correctness::Mismatch`] and measurement continues.

use std::hint::black_box;
use std::iter;
use std::time::Instant;

use sumbench_tracing::performance::{self, PerformanceSpan};

use crate::alloc::{AllocationProbe, NullProbe};
use crate::capability::CapabilitySet;
use crate::config::{validate_sizes_and_trials, HarnessConfig};
use crate::error::{Error, Result};
use crate::input::InputGenerator;
use crate::kernel::{KernelSet, SumKernel};
use crate::report::{KernelRow, Report, SizeReport};
use crate::stats::{AllocationStats, Correctness, TimingStats, TrialResult};

/// Runs a [`KernelSet`] over size configurations and aggregates the results.
#[derive(Debug)]
pub struct Harness<P: AllocationProbe = NullProbe> {
    config: HarnessConfig,
    generator: InputGenerator,
    probe: P,
}

impl Harness<NullProbe> {
    /// Harness without allocation accounting.
    pub fn new(config: HarnessConfig) -> Result<Self> {
        Self::with_probe(config, NullProbe)
    }
}

impl<P: AllocationProbe> Harness<P> {
    /// Harness reading allocation counts from `probe`.
    pub fn with_probe(config: HarnessConfig, probe: P) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            generator: config.input_generator(),
            config,
            probe,
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Measure with the configured sizes and trial count.
    pub fn run_configured(&self, kernels: &KernelSet) -> Result<Report> {
        self.run(kernels, &self.config.sizes, self.config.trials)
    }

    /// Measure every kernel at every size, `trials` timed invocations each.
    ///
    /// Invalid sizes, a zero trial count or a kernel set without exactly one
    /// baseline are rejected before any buffer is generated.
    pub fn run(&self, kernels: &KernelSet, sizes: &[usize], trials: usize) -> Result<Report> {
        validate_sizes_and_trials(sizes, trials)?;
        kernels.validate()?;
        let baseline = kernels.baseline_index()?;

        tracing::info!(
            kernels = ?kernels.names(),
            sizes = ?sizes,
            trials,
            warmup = self.config.warmup_iterations,
            "measurement_started"
        );

        let mut reports = Vec::with_capacity(sizes.len());
        for &size in sizes {
            reports.push(self.measure_size(kernels, baseline, size, trials)?);
        }

        let report = Report {
            capabilities: CapabilitySet::detected(),
            sizes: reports,
            excluded: kernels.excluded().to_vec(),
        };

        let failures = report.correctness_failures();
        tracing::info!(
            sizes = report.sizes.len(),
            correctness_failures = failures.len(),
            "measurement_finished"
        );
        Ok(report)
    }

    fn measure_size(&self, kernels: &KernelSet, baseline: usize, size: usize, trials: usize) -> Result<SizeReport> {
        let _span = tracing::info_span!("size_configuration", size, trials).entered();
        let _perf = PerformanceSpan::new(format!("size_configuration_{size}"), None);

        let buffer = self.generator.generate(size);
        let data = buffer.as_slice();

        let warm: Vec<f32> = kernels.iter().map(|k| self.warm_up(k, data)).collect();
        let expected = warm[baseline];

        let mut trial_buf = Vec::with_capacity(trials);
        let mut rows = Vec::with_capacity(kernels.len());
        for (kernel, &warm_value) in kernels.iter().zip(&warm) {
            trial_buf.clear();
            self.run_trials(kernel, data, trials, &mut trial_buf);

            let timing = TimingStats::from_trials(&trial_buf)
                .ok_or_else(|| Error::invalid(format!("kernel `{}` produced no trials", kernel.name())))?;
            let allocation = AllocationStats::from_trials(&trial_buf);
            let values = iter::once(warm_value).chain(trial_buf.iter().map(|t| t.value));
            let correctness = Correctness::judge(expected, values, self.config.tolerance);

            performance::record_throughput(kernel.name(), size, timing.mean_ns as u64);
            performance::record_allocation(kernel.name(), allocation.total_bytes, trials);

            if let Correctness::Mismatch {
                expected,
                actual,
                relative_error,
            } = correctness
            {
                tracing::warn!(
                    kernel = kernel.name(),
                    size,
                    expected,
                    actual,
                    relative_error,
                    tolerance = self.config.tolerance,
                    "correctness_mismatch"
                );
            }

            rows.push(KernelRow {
                kernel: kernel.name().to_string(),
                baseline: kernel.descriptor().baseline,
                path: kernel.execution_path(),
                value: warm_value,
                elements_per_sec: performance::elements_per_sec(size, timing.mean_ns),
                timing,
                allocation,
                ratio: 1.0,
                correctness,
            });
        }

        let baseline_timing = rows[baseline].timing.clone();
        for row in &mut rows {
            row.ratio = if row.baseline { 1.0 } else { row.timing.ratio_to(&baseline_timing) };
            tracing::info!(
                kernel = %row.kernel,
                size,
                path = %row.path,
                mean_ns = row.timing.mean_ns,
                std_dev_ns = row.timing.std_dev_ns,
                ratio = row.ratio,
                allocated_bytes = row.allocation.total_bytes,
                correct = row.correctness.is_pass(),
                "kernel_measured"
            );
        }

        Ok(SizeReport { size, trials, rows })
    }

    /// Untimed invocations; returns the last result.
    fn warm_up(&self, kernel: &dyn SumKernel, data: &[f32]) -> f32 {
        let mut value = 0.0;
        for _ in 0..self.config.warmup_iterations {
            value = black_box(kernel.reduce(black_box(data)));
        }
        value
    }

    fn run_trials(&self, kernel: &dyn SumKernel, data: &[f32], trials: usize, out: &mut Vec<TrialResult>) {
        for _ in 0..trials {
            let before = self.probe.allocated_bytes();
            let start = Instant::now();
            let value = black_box(kernel.reduce(black_box(data)));
            let elapsed = start.elapsed();
            let after = self.probe.allocated_bytes();
            out.push(TrialResult {
                value,
                elapsed,
                allocated_bytes: after.saturating_sub(before),
            });
        }
    }
}
