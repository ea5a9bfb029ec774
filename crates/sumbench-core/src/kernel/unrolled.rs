//! Hand-unrolled scalar summation: eight explicit additions per iteration.

use super::{scalar, ExecutionPath, KernelDescriptor, SumKernel, VECTOR_WIDTH};

/// Sum full groups of [`VECTOR_WIDTH`] with one expression each, then fold
/// the 0..7 trailing elements one by one.
#[inline]
pub fn sum(data: &[f32]) -> f32 {
    let chunks = data.chunks_exact(VECTOR_WIDTH);
    let tail = chunks.remainder();

    let mut total = 0.0f32;
    for c in chunks {
        total += c[0] + c[1] + c[2] + c[3] + c[4] + c[5] + c[6] + c[7];
    }
    total + scalar::sum(tail)
}

#[derive(Debug, Clone)]
pub struct UnrolledSum {
    descriptor: KernelDescriptor,
}

impl UnrolledSum {
    pub const NAME: &'static str = "unrolled";

    pub fn new() -> Self {
        Self {
            descriptor: KernelDescriptor::new(Self::NAME),
        }
    }
}

impl Default for UnrolledSum {
    fn default() -> Self {
        Self::new()
    }
}

impl SumKernel for UnrolledSum {
    fn descriptor(&self) -> &KernelDescriptor {
        &self.descriptor
    }

    fn execution_path(&self) -> ExecutionPath {
        ExecutionPath::Portable
    }

    fn reduce(&self, data: &[f32]) -> f32 {
        sum(data)
    }
}
