//! Aggregated results of a measurement run.

use std::fmt;

use serde::Serialize;

use crate::capability::CapabilitySet;
use crate::kernel::{ExcludedKernel, ExecutionPath};
use crate::stats::{AllocationStats, Correctness, TimingStats};

/// Aggregated statistics for one kernel at one size.
#[derive(Debug, Clone, Serialize)]
pub struct KernelRow {
    pub kernel: String,
    pub baseline: bool,
    pub path: ExecutionPath,
    pub value: f32,
    pub timing: TimingStats,
    pub allocation: AllocationStats,
    /// Mean time relative to the baseline kernel at the same size.
    pub ratio: f64,
    pub elements_per_sec: f64,
    pub correctness: Correctness,
}

/// All kernels measured against one input buffer.
#[derive(Debug, Clone, Serialize)]
pub struct SizeReport {
    pub size: usize,
    pub trials: usize,
    pub rows: Vec<KernelRow>,
}

impl SizeReport {
    pub fn row(&self, kernel: &str) -> Option<&KernelRow> {
        self.rows.iter().find(|r| r.kernel == kernel)
    }

    pub fn baseline(&self) -> Option<&KernelRow> {
        self.rows.iter().find(|r| r.baseline)
    }
}

/// Output of [`Harness::run`](crate::harness::Harness::run).
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub capabilities: CapabilitySet,
    pub sizes: Vec<SizeReport>,
    pub excluded: Vec<ExcludedKernel>,
}

impl Report {
    pub fn size(&self, size: usize) -> Option<&SizeReport> {
        self.sizes.iter().find(|s| s.size == size)
    }

    pub fn row(&self, kernel: &str, size: usize) -> Option<&KernelRow> {
        self.size(size).and_then(|s| s.row(kernel))
    }

    /// (kernel, size) pairs whose results disagreed with the baseline.
    pub fn correctness_failures(&self) -> Vec<(&str, usize)> {
        self.sizes
            .iter()
            .flat_map(|s| {
                s.rows
                    .iter()
                    .filter(|r| !r.correctness.is_pass())
                    .map(move |r| (r.kernel.as_str(), s.size))
            })
            .collect()
    }

    pub fn all_correct(&self) -> bool {
        self.correctness_failures().is_empty()
    }
}

fn format_ns(ns: f64) -> String {
    if ns >= 1_000_000.0 {
        format!("{:.3} ms", ns / 1_000_000.0)
    } else if ns >= 1_000.0 {
        format!("{:.3} us", ns / 1_000.0)
    } else {
        format!("{ns:.2} ns")
    }
}

fn format_bytes(bytes: f64) -> String {
    if bytes == 0.0 {
        "-".to_string()
    } else if bytes >= 1024.0 {
        format!("{:.1} KB", bytes / 1024.0)
    } else {
        format!("{bytes:.0} B")
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CPU capabilities: {}", self.capabilities)?;
        for size in &self.sizes {
            writeln!(f)?;
            writeln!(f, "Size = {} ({} trials)", size.size, size.trials)?;
            writeln!(
                f,
                "| {:<16} | {:>12} | {:>12} | {:>6} | {:>9} | {:<8} | {:<8} |",
                "Method", "Mean", "StdDev", "Ratio", "Allocated", "Path", "Check"
            )?;
            writeln!(f, "|{:-<18}|{:->14}|{:->14}|{:->8}|{:->11}|{:-<10}|{:-<10}|", "", "", "", "", "", "", "")?;
            for row in &size.rows {
                let check = if row.correctness.is_pass() { "ok" } else { "MISMATCH" };
                writeln!(
                    f,
                    "| {:<16} | {:>12} | {:>12} | {:>6.2} | {:>9} | {:<8} | {:<8} |",
                    row.kernel,
                    format_ns(row.timing.mean_ns),
                    format_ns(row.timing.std_dev_ns),
                    row.ratio,
                    format_bytes(row.allocation.mean_bytes),
                    row.path.to_string(),
                    check
                )?;
            }
        }
        for excluded in &self.excluded {
            writeln!(f)?;
            write!(f, "Excluded {}: {}", excluded.name, excluded.reason)?;
        }
        Ok(())
    }
}
