//! Summation kernels and the set the harness measures.
//!
//! Every kernel implements the same contract: read an `f32` slice, return
//! its sum. They differ only in strategy:
//!
//! | Kernel | Strategy | Fallback |
//! |--------|----------|----------|
//! | [`ScalarSum`] | element-by-element accumulation (baseline) | none |
//! | [`UnrolledSum`] | 8 explicit additions per iteration, scalar tail | none |
//! | [`AvxSum`] (`Avx`) | 8-lane `__m256` accumulator, pairwise lane fold, scalar tail | scalar when AVX is absent |
//! | [`AvxSum`] (`Avx2`) | same loop compiled for AVX2 | scalar when AVX2 is absent |
//! | [`ForeignKernel`] | native routine behind the C ABI | none, binding fails at startup instead |
//!
//! Kernels hold no mutable state, so repeated calls on the same slice return
//! identical results.

pub mod avx;
pub mod foreign;
pub mod scalar;
pub mod unrolled;

pub use avx::AvxSum;
pub use foreign::{ForeignBinding, ForeignKernel, ForeignSumFn};
pub use scalar::ScalarSum;
pub use unrolled::UnrolledSum;

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::capability::{Capability, CapabilitySet};
use crate::error::{Error, Result};

/// Elements per group for the unrolled and vectorized kernels
/// (one 256-bit register of `f32`).
pub const VECTOR_WIDTH: usize = 8;

/// Identity of a kernel within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelDescriptor {
    pub name: String,
    /// Ratios in the report are relative to this kernel.
    pub baseline: bool,
    /// Extension the fast path needs, if any.
    pub requirement: Option<Capability>,
}

impl KernelDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            baseline: false,
            requirement: None,
        }
    }

    #[must_use]
    pub fn as_baseline(mut self) -> Self {
        self.baseline = true;
        self
    }

    #[must_use]
    pub fn requires(mut self, capability: Capability) -> Self {
        self.requirement = Some(capability);
        self
    }
}

/// Which body a kernel actually executes, for annotating reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutionPath {
    /// Plain Rust, no capability involved.
    Portable,
    /// Accelerated body for the named extension.
    Fast(Capability),
    /// Requirement missing, scalar baseline body used instead.
    Fallback,
    /// Delegated across the C ABI.
    Native,
}

impl fmt::Display for ExecutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionPath::Portable => f.write_str("portable"),
            ExecutionPath::Fast(cap) => write!(f, "{cap}"),
            ExecutionPath::Fallback => f.write_str("fallback"),
            ExecutionPath::Native => f.write_str("native"),
        }
    }
}

/// A reduction kernel: `&[f32] -> f32`.
pub trait SumKernel {
    fn descriptor(&self) -> &KernelDescriptor;

    /// Path taken by [`SumKernel::reduce`]; constant for the kernel's lifetime.
    fn execution_path(&self) -> ExecutionPath;

    /// Sum every element of `data`. Returns `0.0` for an empty slice.
    fn reduce(&self, data: &[f32]) -> f32;

    fn name(&self) -> &str {
        &self.descriptor().name
    }
}

/// A kernel that could not be registered, and why.
#[derive(Debug, Clone, Serialize)]
pub struct ExcludedKernel {
    pub name: String,
    pub reason: String,
}

/// Ordered collection of kernels measured together.
#[derive(Default)]
pub struct KernelSet {
    kernels: Vec<Box<dyn SumKernel>>,
    excluded: Vec<ExcludedKernel>,
}

impl KernelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four in-process kernels: scalar (baseline), unrolled, AVX, AVX2.
    pub fn standard(capabilities: CapabilitySet) -> Self {
        let mut set = Self::new();
        set.push(ScalarSum::new());
        set.push(UnrolledSum::new());
        set.push(AvxSum::new(Capability::Avx, capabilities));
        set.push(AvxSum::new(Capability::Avx2, capabilities));
        set
    }

    pub fn push<K: SumKernel + 'static>(&mut self, kernel: K) {
        self.kernels.push(Box::new(kernel));
    }

    /// Register the native kernel if its binding succeeded.
    ///
    /// A failed binding excludes only this kernel: it is logged, listed in
    /// [`KernelSet::excluded`] and the rest of the set is untouched.
    pub fn register_foreign(&mut self, binding: Result<ForeignBinding>) {
        match binding {
            Ok(binding) => self.push(ForeignKernel::new(binding)),
            Err(err) => {
                tracing::warn!(kernel = ForeignKernel::NAME, error = %err, "foreign_kernel_excluded");
                self.excluded.push(ExcludedKernel {
                    name: ForeignKernel::NAME.to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }

    #[must_use]
    pub fn with_foreign(mut self, binding: Result<ForeignBinding>) -> Self {
        self.register_foreign(binding);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn SumKernel> + '_ {
        self.kernels.iter().map(|k| k.as_ref())
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|k| k.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn SumKernel> {
        self.iter().find(|k| k.name() == name)
    }

    pub fn excluded(&self) -> &[ExcludedKernel] {
        &self.excluded
    }

    /// Index of the single baseline kernel.
    pub fn baseline_index(&self) -> Result<usize> {
        let mut baselines = self
            .kernels
            .iter()
            .enumerate()
            .filter(|(_, k)| k.descriptor().baseline)
            .map(|(i, _)| i);
        match (baselines.next(), baselines.next()) {
            (Some(index), None) => Ok(index),
            (None, _) => Err(Error::invalid("no kernel is marked as baseline")),
            (Some(_), Some(_)) => Err(Error::invalid("more than one kernel is marked as baseline")),
        }
    }

    /// Checks the set is measurable: non-empty, unique names, one baseline.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::invalid("kernel set is empty"));
        }
        let mut seen = HashSet::new();
        for name in self.names() {
            if !seen.insert(name) {
                return Err(Error::invalid(format!("duplicate kernel name `{name}`")));
            }
        }
        self.baseline_index().map(|_| ())
    }
}

impl fmt::Debug for KernelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelSet")
            .field("kernels", &self.names())
            .field("excluded", &self.excluded)
            .finish()
    }
}
