//! # sumbench-core - f32 Summation Kernels and Their Harness
//!
//! Several strategies for summing an `f32` slice, measured against each other
//! on identical input.
//!
//! ## Architecture
//!
//! - **Kernels** ([`kernel`]): scalar baseline, 8-way unrolled, AVX and AVX2
//!   vectorized, and a native routine bound through the C ABI
//! - **Capabilities** ([`capability`]): CPU features detected once per process
//! - **Dispatch** ([`dispatch`]): fast path when the feature is present,
//!   scalar fallback otherwise
//! - **Harness** ([`harness`]): warm-up, timed trials, allocation accounting,
//!   ratio to baseline, correctness against the baseline
//!
//! ## Example
//!
//! ```text
//! use sumbench_core::{CapabilitySet, Harness, HarnessConfig, KernelSet};
//!
//! let kernels = KernelSet::standard(CapabilitySet::detected());
//! let harness = Harness::new(HarnessConfig::default())?;
//! let report = harness.run(&kernels, &[1_000, 100_000], 100)?;
//! println!("{report}");
//! ```

pub mod alloc;
pub mod capability;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod harness;
pub mod input;
pub mod kernel;
pub mod report;
pub mod stats;

pub use alloc::{AllocationProbe, CountingAllocator, NullProbe};
pub use capability::{Capability, CapabilitySet};
pub use config::HarnessConfig;
pub use error::{Error, ForeignBindingFailure, Result};
pub use harness::Harness;
pub use input::{Distribution, InputBuffer, InputGenerator};
pub use kernel::{
    AvxSum, ExcludedKernel, ExecutionPath, ForeignBinding, ForeignKernel, KernelDescriptor, KernelSet, ScalarSum,
    SumKernel, UnrolledSum,
};
pub use report::{KernelRow, Report, SizeReport};
pub use stats::{AllocationStats, Correctness, TimingStats, TrialResult};
