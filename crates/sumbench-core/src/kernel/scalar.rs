//! Left-to-right scalar summation; the baseline every other kernel is
//! compared against and the fallback body of the vectorized kernels.

use super::{ExecutionPath, KernelDescriptor, SumKernel};

/// Element-by-element accumulation.
#[inline]
pub fn sum(data: &[f32]) -> f32 {
    let mut total = 0.0f32;
    for &value in data {
        total += value;
    }
    total
}

#[derive(Debug, Clone)]
pub struct ScalarSum {
    descriptor: KernelDescriptor,
}

impl ScalarSum {
    pub const NAME: &'static str = "scalar";

    pub fn new() -> Self {
        Self {
            descriptor: KernelDescriptor::new(Self::NAME).as_baseline(),
        }
    }
}

impl Default for ScalarSum {
    fn default() -> Self {
        Self::new()
    }
}

impl SumKernel for ScalarSum {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_in_order() {
        assert_eq!(sum(&[]), 0.0);
        assert_eq!(sum(&[2.5]), 2.5);
        assert_eq!(sum(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]), 45.0);
    }

    #[test]
    fn is_the_baseline() {
        let kernel = ScalarSum::new();
        assert!(kernel.descriptor().baseline);
        assert_eq!(kernel.descriptor().requirement, None);
        assert_eq!(kernel.execution_path(), ExecutionPath::Portable);
    }
}
