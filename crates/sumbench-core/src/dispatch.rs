//! Fast-path selection for vectorized kernels.
//!
//! The decision is a pure function of a kernel's declared requirement and
//! the capability set it was built with, so it is cheap enough to evaluate on
//! every invocation and gives the same answer for the whole run.

use crate::capability::{Capability, CapabilitySet};

/// Which body a kernel runs for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Path {
    Fast,
    Fallback,
}

/// Choose between the accelerated body and the scalar fallback.
///
/// Kernels without a requirement always take [`Path::Fast`], which for them
/// is simply their only body.
#[inline(always)]
pub fn select(requirement: Option<Capability>, available: &CapabilitySet) -> Path {
    match requirement {
        None => Path::Fast,
        Some(cap) if available.contains(cap) => Path::Fast,
        Some(_) => Path::Fallback,
    }
}
