//! Native summation engine exported over the C ABI.
//!
//! Built as a `cdylib` so the harness can bind it at startup through
//! `libloading`, exactly as it would bind any externally compiled routine.
//! The `rlib` output exists so tests can link the same entry points
//! statically and still go through the `extern "C"` boundary.
//!
//! ## Exported symbols
//!
//! | Symbol | Signature |
//! |--------|-----------|
//! | `vectorized_sum16` | `(data: *const f32, len: usize) -> f32` |
//! | `sumbench_engine_abi_version` | `() -> u32` |
//!
//! ## Ownership
//!
//! The caller owns `data` and guarantees `len` readable `f32` values for the
//! duration of the call. The engine never retains or frees it.

/// ABI revision of [`vectorized_sum16`]. Bump on any signature change.
pub const ABI_VERSION: u32 = 1;

/// Lanes accumulated per step.
pub const LANES: usize = 16;

/// Sum `len` floats starting at `data`.
///
/// Returns `0.0` for `len == 0` or a null `data` pointer.
///
/// # Safety
///
/// When `len > 0`, `data` must point to `len` initialized, readable `f32`
/// values that stay valid for the whole call.
#[no_mangle]
pub unsafe extern "C" fn vectorized_sum16(data: *const f32, len: usize) -> f32 {
    if data.is_null() || len == 0 {
        return 0.0;
    }
    let values = std::slice::from_raw_parts(data, len);
    sum16(values)
}

/// ABI version getter checked by the loader before the routine is used.
#[no_mangle]
pub extern "C" fn sumbench_engine_abi_version() -> u32 {
    ABI_VERSION
}

/// 16 independent accumulators so the compiler can keep them in vector
/// registers, folded pairwise at the end.
#[inline]
fn sum16(values: &[f32]) -> f32 {
    let mut acc = [0.0f32; LANES];
    let chunks = values.chunks_exact(LANES);
    let tail = chunks.remainder();

    for chunk in chunks {
        for (lane, &v) in acc.iter_mut().zip(chunk) {
            *lane += v;
        }
    }

    let mut width = LANES;
    while width > 1 {
        width /= 2;
        for i in 0..width {
            acc[i] += acc[i + width];
        }
    }

    tail.iter().fold(acc[0], |sum, &v| sum + v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn call(values: &[f32]) -> f32 {
        unsafe { vectorized_sum16(values.as_ptr(), values.len()) }
    }

    #[test]
    fn empty_and_null_are_zero() {
        assert_eq!(call(&[]), 0.0);
        assert_eq!(unsafe { vectorized_sum16(std::ptr::null(), 32) }, 0.0);
    }

    #[test]
    fn sums_small_integers_exactly() {
        let values: Vec<f32> = (1..=9).map(|i| i as f32).collect();
        assert_eq!(call(&values), 45.0);
    }

    #[test]
    fn abi_version_matches_constant() {
        assert_eq!(sumbench_engine_abi_version(), ABI_VERSION);
    }

    proptest! {
        #[test]
        fn every_element_counted_once(len in 0usize..600) {
            let ones = vec![1.0f32; len];
            prop_assert_eq!(call(&ones), len as f32);
        }
    }
}
