//! 256-bit vectorized summation.
//!
//! Both generations run the same loop: load eight floats into a `__m256`,
//! add lane-wise into one accumulator, fold the eight lanes pairwise into a
//! scalar, then add the 0..7 tail elements. They differ in the target
//! feature the loop is compiled for and the capability gating it.

#[cfg(target_arch = "x86")]
use std::arch::x86::*;
#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

use super::{scalar, ExecutionPath, KernelDescriptor, SumKernel};
#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
use super::VECTOR_WIDTH;
use crate::capability::{Capability, CapabilitySet};
use crate::dispatch::{self, Path};

/// Vectorized kernel gated on one [`Capability`].
#[derive(Debug, Clone)]
pub struct AvxSum {
    descriptor: KernelDescriptor,
    generation: Capability,
    capabilities: CapabilitySet,
}

impl AvxSum {
    pub const AVX_NAME: &'static str = "vectorized_avx";
    pub const AVX2_NAME: &'static str = "vectorized_avx2";

    /// Kernel for `generation`, taking its fast path only when
    /// `capabilities` contains it.
    pub fn new(generation: Capability, capabilities: CapabilitySet) -> Self {
        let name = match generation {
            Capability::Avx => Self::AVX_NAME,
            Capability::Avx2 => Self::AVX2_NAME,
        };
        Self {
            descriptor: KernelDescriptor::new(name).requires(generation),
            generation,
            capabilities,
        }
    }

    pub fn generation(&self) -> Capability {
        self.generation
    }

    #[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
    fn fast(&self, data: &[f32]) -> f32 {
        // SAFETY: dispatch only returns Fast when `capabilities` holds the
        // generation, and a CapabilitySet never holds an extension the CPU
        // lacks.
        unsafe {
            match self.generation {
                Capability::Avx => sum_avx(data),
                Capability::Avx2 => sum_avx2(data),
            }
        }
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "x86")))]
    fn fast(&self, data: &[f32]) -> f32 {
        scalar::sum(data)
    }
}

impl SumKernel for AvxSum {
    fn descriptor(&self) -> &KernelDescriptor {
        &self.descriptor
    }

    fn execution_path(&self) -> ExecutionPath {
        match dispatch::select(self.descriptor.requirement, &self.capabilities) {
            Path::Fast => ExecutionPath::Fast(self.generation),
            Path::Fallback => ExecutionPath::Fallback,
        }
    }

    fn reduce(&self, data: &[f32]) -> f32 {
        match dispatch::select(self.descriptor.requirement, &self.capabilities) {
            Path::Fast => self.fast(data),
            Path::Fallback => scalar::sum(data),
        }
    }
}

/// Fold the 8 lanes of `v`: 256 → 128 halves, then 4 → 2 → 1.
#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
#[inline]
#[target_feature(enable = "avx")]
unsafe fn horizontal_sum(v: __m256) -> f32 {
    let hi = _mm256_extractf128_ps(v, 1);
    let lo = _mm256_castps256_ps128(v);
    let quad = _mm_add_ps(lo, hi);
    let dual = _mm_add_ps(quad, _mm_movehl_ps(quad, quad));
    let single = _mm_add_ss(dual, _mm_shuffle_ps(dual, dual, 1));
    _mm_cvtss_f32(single)
}

#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
#[target_feature(enable = "avx")]
unsafe fn sum_avx(data: &[f32]) -> f32 {
    let simd_end = data.len() / VECTOR_WIDTH * VECTOR_WIDTH;
    let ptr = data.as_ptr();
    let mut acc = _mm256_setzero_ps();
    let mut i = 0;

    // Process 8 elements at a time
    while i < simd_end {
        acc = _mm256_add_ps(acc, _mm256_loadu_ps(ptr.add(i)));
        i += VECTOR_WIDTH;
    }

    let total = horizontal_sum(acc);
    scalar::sum(&data[simd_end..]) + total
}

#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
#[target_feature(enable = "avx2")]
unsafe fn sum_avx2(data: &[f32]) -> f32 {
    let simd_end = data.len() / VECTOR_WIDTH * VECTOR_WIDTH;
    let ptr = data.as_ptr();
    let mut acc = _mm256_setzero_ps();
    let mut i = 0;

    while i < simd_end {
        acc = _mm256_add_ps(acc, _mm256_loadu_ps(ptr.add(i)));
        i += VECTOR_WIDTH;
    }

    let total = horizontal_sum(acc);
    scalar::sum(&data[simd_end..]) + total
}
