//! Native kernel reached through the C ABI.
//!
//! ## Calling contract
//!
//! ```text
//! extern "C" fn(data: *const f32, len: usize) -> f32
//! ```
//!
//! The caller owns the buffer. For the duration of one call `data` points
//! to `len` initialized floats borrowed from a live `&[f32]`; the routine
//! must not write through it, keep it after returning, or free it. This is
//! the one place in the crate where memory safety depends on code the
//! compiler cannot see, so binding is validated up front: a library that
//! cannot be opened, lacks the symbol, reports another ABI version, or
//! computes a wrong smoke sum is refused at startup and never measured.

use std::path::{Path, PathBuf};

use libloading::Library;

use super::{ExecutionPath, KernelDescriptor, SumKernel};
use crate::error::{Error, ForeignBindingFailure, Result};

/// Signature of the native routine.
pub type ForeignSumFn = unsafe extern "C" fn(data: *const f32, len: usize) -> f32;

type AbiVersionFn = unsafe extern "C" fn() -> u32;

/// ABI revision this crate was written against.
pub const EXPECTED_ABI_VERSION: u32 = 1;

/// Symbol looked up when none is configured.
pub const DEFAULT_SYMBOL: &str = "vectorized_sum16";

const ABI_VERSION_SYMBOL: &[u8] = b"sumbench_engine_abi_version";

const SMOKE_INPUT: [f32; 3] = [1.0, 2.0, 3.0];
const SMOKE_EXPECTED: f32 = 6.0;

/// Accept only the ABI revision this crate was written against.
fn check_abi(found: u32) -> std::result::Result<(), ForeignBindingFailure> {
    if found != EXPECTED_ABI_VERSION {
        return Err(ForeignBindingFailure::AbiMismatch {
            expected: EXPECTED_ABI_VERSION,
            found,
        });
    }
    Ok(())
}

/// A validated, callable native routine.
#[derive(Debug)]
pub struct ForeignBinding {
    func: ForeignSumFn,
    origin: PathBuf,
    // Keeps the shared object mapped for as long as `func` may be called.
    _library: Option<Library>,
}

impl ForeignBinding {
    /// Open `path` and bind `symbol`.
    ///
    /// A library without an ABI version getter is assumed to be version 1.
    pub fn load(path: impl AsRef<Path>, symbol: &str) -> Result<Self> {
        let path = path.as_ref();
        let fail = |reason| Error::ForeignBinding {
            source_path: path.to_path_buf(),
            reason,
        };

        // SAFETY: loading runs the library's initializers; the engine has none
        // beyond what the platform loader does for any cdylib.
        let library = unsafe { Library::new(path) }
            .map_err(|e| fail(ForeignBindingFailure::LibraryNotFound(e.to_string())))?;

        let found = unsafe {
            match library.get::<AbiVersionFn>(ABI_VERSION_SYMBOL) {
                Ok(version) => version(),
                Err(_) => 1,
            }
        };
        check_abi(found).map_err(fail)?;

        let func = unsafe { library.get::<ForeignSumFn>(symbol.as_bytes()).map(|s| *s) }.map_err(|e| {
            fail(ForeignBindingFailure::SymbolMissing {
                symbol: symbol.to_string(),
                message: e.to_string(),
            })
        })?;

        tracing::info!(path = %path.display(), symbol, abi_version = found, "foreign_kernel_loaded");

        Self {
            func,
            origin: path.to_path_buf(),
            _library: Some(library),
        }
        .smoke_tested()
    }

    /// Bind a routine linked into this process.
    ///
    /// # Safety
    ///
    /// `func` must follow the calling contract in the module docs: read at
    /// most `len` floats from `data` and never retain or free the pointer.
    pub unsafe fn from_fn(func: ForeignSumFn, origin: impl Into<PathBuf>) -> Result<Self> {
        Self {
            func,
            origin: origin.into(),
            _library: None,
        }
        .smoke_tested()
    }

    fn smoke_tested(self) -> Result<Self> {
        let actual = self.call(&SMOKE_INPUT);
        if actual != SMOKE_EXPECTED {
            return Err(Error::ForeignBinding {
                source_path: self.origin.clone(),
                reason: ForeignBindingFailure::SmokeTestFailed {
                    expected: SMOKE_EXPECTED,
                    actual,
                },
            });
        }
        Ok(self)
    }

    /// Where the routine came from: a library path or a static label.
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    pub fn is_dynamic(&self) -> bool {
        self._library.is_some()
    }

    pub fn call(&self, data: &[f32]) -> f32 {
        // SAFETY: `data` is a live shared borrow of exactly `data.len()`
        // floats for the whole call, and the bound routine was validated
        // against the contract above.
        unsafe { (self.func)(data.as_ptr(), data.len()) }
    }
}

/// Kernel delegating the whole reduction to a [`ForeignBinding`].
#[derive(Debug)]
pub struct ForeignKernel {
    descriptor: KernelDescriptor,
    binding: ForeignBinding,
}

impl ForeignKernel {
    pub const NAME: &'static str = "native_engine";

    pub fn new(binding: ForeignBinding) -> Self {
        Self {
            descriptor: KernelDescriptor::new(Self::NAME),
            binding,
        }
    }

}

impl SumKernel for ForeignKernel {
    fn descriptor(&self) -> &KernelDescriptor {
        &self.descriptor
    }

    fn execution_path(&self) -> ExecutionPath {
        ExecutionPath::Native
    }

    fn reduce(&self, data: &[f32]) -> f32 {
        self.binding.call(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe extern "C" fn always_zero(_data: *const f32, _len: usize) -> f32 {
        0.0
    }

    fn engine() -> ForeignBinding {
        unsafe { ForeignBinding::from_fn(sumbench_engine::vectorized_sum16, "static:sumbench-engine") }.unwrap()
    }

    #[test]
    fn missing_library_is_a_binding_failure() {
        let err = ForeignBinding::load("/nonexistent/libsumbench_engine.so", DEFAULT_SYMBOL).unwrap_err();
        match err {
            Error::ForeignBinding { source_path, reason } => {
                assert_eq!(source_path, PathBuf::from("/nonexistent/libsumbench_engine.so"));
                assert!(matches!(reason, ForeignBindingFailure::LibraryNotFound(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn wrong_routine_fails_smoke_test() {
        let err = unsafe { ForeignBinding::from_fn(always_zero, "static:always_zero") }.unwrap_err();
        assert!(matches!(
            err,
            Error::ForeignBinding {
                reason: ForeignBindingFailure::SmokeTestFailed { actual, .. },
                ..
            } if actual == 0.0
        ));
    }

    #[test]
    fn other_abi_revisions_are_refused() {
        assert_eq!(check_abi(EXPECTED_ABI_VERSION), Ok(()));
        assert_eq!(
            check_abi(2),
            Err(ForeignBindingFailure::AbiMismatch { expected: 1, found: 2 })
        );
        assert!(check_abi(0).is_err());
    }

    #[test]
    fn static_engine_binds_and_sums() {
        let binding = engine();
        assert!(!binding.is_dynamic());
        assert_eq!(binding.origin(), Path::new("static:sumbench-engine"));

        let kernel = ForeignKernel::new(binding);
        assert_eq!(kernel.execution_path(), ExecutionPath::Native);
        assert_eq!(kernel.reduce(&[]), 0.0);
        let data: Vec<f32> = (1..=9).map(|i| i as f32).collect();
        assert_eq!(kernel.reduce(&data), 45.0);
    }
}
