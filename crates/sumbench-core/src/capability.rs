//! CPU vector-extension detection.
//!
//! Detection runs once per process and the `is_x86_feature_detected!`
//! results are cached in a `OnceLock`. A [`CapabilitySet`] can
//! only shrink after that: callers that want to exercise a fallback path
//! narrow the detected set with [`CapabilitySet::without`] instead of
//! building one from scratch. That keeps every fast path sound, since a set
//! never claims an extension the executing CPU lacks.

use std::fmt;
use std::sync::OnceLock;

use serde::Serialize;

/// A vector instruction-set extension a kernel can require.
///
/// Ordered from least to most capable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Capability {
    /// 256-bit floating-point vectors, first generation.
    Avx,
    /// 256-bit vectors, second generation.
    Avx2,
}

impl Capability {
    pub const ALL: [Capability; 2] = [Capability::Avx, Capability::Avx2];

    pub fn name(self) -> &'static str {
        match self {
            Capability::Avx => "avx",
            Capability::Avx2 => "avx2",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of extensions available to kernels for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CapabilitySet {
    bits: u8,
}

static DETECTED: OnceLock<CapabilitySet> = OnceLock::new();

impl CapabilitySet {
    /// Capabilities of the executing CPU, detected on first call.
    pub fn detected() -> CapabilitySet {
        *DETECTED.get_or_init(|| {
            let caps = detect();
            tracing::debug!(capabilities = %caps, "cpu_capabilities_detected");
            caps
        })
    }

    /// No extensions: every vectorized kernel takes its fallback.
    pub const fn empty() -> CapabilitySet {
        CapabilitySet { bits: 0 }
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.bits & capability.bit() != 0
    }

    /// This set with `capability` removed.
    #[must_use]
    pub fn without(self, capability: Capability) -> CapabilitySet {
        CapabilitySet {
            bits: self.bits & !capability.bit(),
        }
    }

    /// Extensions present in both sets.
    #[must_use]
    pub fn intersect(self, other: CapabilitySet) -> CapabilitySet {
        CapabilitySet {
            bits: self.bits & other.bits,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Contained extensions, least capable first.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.contains(*c))
    }

    pub fn to_vec(&self) -> Vec<Capability> {
        self.iter().collect()
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.iter().map(Capability::name).collect();
        f.write_str(&names.join(","))
    }
}

impl Serialize for CapabilitySet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// Query the CPU. Never fails; a missing extension is simply absent.
pub fn detect() -> CapabilitySet {
    #[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
    {
        let mut bits = 0;
        if std::arch::is_x86_feature_detected!("avx") {
            bits |= Capability::Avx.bit();
        }
        if std::arch::is_x86_feature_detected!("avx2") {
            bits |= Capability::Avx2.bit();
        }
        CapabilitySet { bits }
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "x86")))]
    {
        CapabilitySet::empty()
    }
}
