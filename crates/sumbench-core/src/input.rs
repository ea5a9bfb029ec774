//! Shared input buffers for a size configuration.

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::Serialize;

use crate::error::{Error, Result};

/// Raw-bit draws above this magnitude are redrawn.
pub const RAW_BITS_MAX_MAGNITUDE: f32 = 1e30;

/// Immutable `f32` sequence every kernel reads during one configuration.
///
/// There is no mutable access: kernels only ever see `&[f32]`.
#[derive(Clone, PartialEq)]
pub struct InputBuffer {
    values: Box<[f32]>,
}

impl InputBuffer {
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<f32>> for InputBuffer {
    fn from(values: Vec<f32>) -> Self {
        Self {
            values: values.into_boxed_slice(),
        }
    }
}

impl Deref for InputBuffer {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.values
    }
}

impl fmt::Debug for InputBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputBuffer").field("len", &self.values.len()).finish()
    }
}

/// How values are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Distribution {
    /// Uniform in `[0, 1)`.
    #[default]
    Uniform,
    /// Random bytes reinterpreted as `f32`, keeping only finite values with
    /// magnitude up to [`RAW_BITS_MAX_MAGNITUDE`]. Sums of such buffers are
    /// ill-conditioned (huge values cancel), so kernels may legitimately
    /// disagree beyond tolerance.
    RawBits,
}

impl FromStr for Distribution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uniform" => Ok(Distribution::Uniform),
            "raw-bits" | "raw_bits" | "rawbits" => Ok(Distribution::RawBits),
            other => Err(Error::invalid(format!("unknown distribution `{other}`"))),
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::Uniform => f.write_str("uniform"),
            Distribution::RawBits => f.write_str("raw-bits"),
        }
    }
}

/// Produces [`InputBuffer`]s.
///
/// With a seed, buffer `n` of a run is the same across runs, so timings
/// from different invocations are measured on identical data.
#[derive(Debug, Clone)]
pub struct InputGenerator {
    seed: Option<u64>,
    distribution: Distribution,
}

impl InputGenerator {
    pub fn new(seed: Option<u64>, distribution: Distribution) -> Self {
        Self { seed, distribution }
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn distribution(&self) -> Distribution {
        self.distribution
    }

    /// `length` pseudo-random values.
    ///
    /// The seed is mixed with `length` so each size configuration gets its
    /// own reproducible stream.
    pub fn generate(&self, length: usize) -> InputBuffer {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ (length as u64).rotate_left(32)),
            None => StdRng::from_entropy(),
        };

        let values: Vec<f32> = match self.distribution {
            Distribution::Uniform => (0..length).map(|_| rng.gen_range(0.0f32..1.0)).collect(),
            Distribution::RawBits => (0..length).map(|_| raw_bits_value(&mut rng)).collect(),
        };

        tracing::trace!(length, distribution = %self.distribution, "input_buffer_generated");
        InputBuffer::from(values)
    }
}

impl Default for InputGenerator {
    fn default() -> Self {
        Self::new(None, Distribution::Uniform)
    }
}

fn raw_bits_value(rng: &mut impl RngCore) -> f32 {
    loop {
        let value = f32::from_bits(rng.next_u32());
        if value.is_finite() && value.abs() <= RAW_BITS_MAX_MAGNITUDE {
            return value;
        }
    }
}
