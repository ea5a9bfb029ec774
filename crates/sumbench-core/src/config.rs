//! Measurement run configuration.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::input::{Distribution, InputGenerator};
use crate::kernel::foreign::DEFAULT_SYMBOL;

/// Input lengths measured when none are configured.
pub const DEFAULT_SIZES: [usize; 2] = [1_000, 100_000];
pub const DEFAULT_TRIALS: usize = 100;
pub const DEFAULT_TOLERANCE: f64 = 1e-3;
pub const DEFAULT_SEED: u64 = 0x5EED_CAFE;

/// Everything the harness needs besides the kernels themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    pub sizes: Vec<usize>,
    pub trials: usize,
    /// Untimed invocations per kernel before its trials.
    pub warmup_iterations: usize,
    /// Maximum relative error against the baseline.
    pub tolerance: f64,
    pub seed: Option<u64>,
    pub distribution: Distribution,
    /// Shared library exporting the native routine.
    pub engine_path: PathBuf,
    pub engine_symbol: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            sizes: DEFAULT_SIZES.to_vec(),
            trials: DEFAULT_TRIALS,
            warmup_iterations: 1,
            tolerance: DEFAULT_TOLERANCE,
            seed: Some(DEFAULT_SEED),
            distribution: Distribution::Uniform,
            engine_path: default_engine_path(),
            engine_symbol: DEFAULT_SYMBOL.to_string(),
        }
    }
}

impl HarnessConfig {
    /// Defaults overridden by environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SUMBENCH_SIZES` - comma-separated buffer lengths
    /// - `SUMBENCH_TRIALS` - timed invocations per kernel and size
    /// - `SUMBENCH_WARMUP` - untimed invocations before the trials
    /// - `SUMBENCH_TOLERANCE` - relative tolerance against the baseline
    /// - `SUMBENCH_SEED` - input seed, or `none` for entropy
    /// - `SUMBENCH_DISTRIBUTION` - `uniform` or `raw-bits`
    /// - `SUMBENCH_ENGINE_PATH` - native engine shared library
    /// - `SUMBENCH_ENGINE_SYMBOL` - exported routine name
    ///
    /// Unparseable values are an [`Error::InvalidConfiguration`], never
    /// silently replaced by defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(sizes) = var("SUMBENCH_SIZES") {
            config.sizes = parse_sizes(&sizes)?;
        }
        if let Some(trials) = var("SUMBENCH_TRIALS") {
            config.trials = parse("SUMBENCH_TRIALS", &trials)?;
        }
        if let Some(warmup) = var("SUMBENCH_WARMUP") {
            config.warmup_iterations = parse("SUMBENCH_WARMUP", &warmup)?;
        }
        if let Some(tolerance) = var("SUMBENCH_TOLERANCE") {
            config.tolerance = parse("SUMBENCH_TOLERANCE", &tolerance)?;
        }
        if let Some(seed) = var("SUMBENCH_SEED") {
            config.seed = if seed.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(parse_seed(&seed)?)
            };
        }
        if let Some(distribution) = var("SUMBENCH_DISTRIBUTION") {
            config.distribution = distribution.parse()?;
        }
        if let Some(path) = var("SUMBENCH_ENGINE_PATH") {
            config.engine_path = PathBuf::from(path);
        }
        if let Some(symbol) = var("SUMBENCH_ENGINE_SYMBOL") {
            config.engine_symbol = symbol;
        }

        Ok(config)
    }

    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<()> {
        validate_sizes_and_trials(&self.sizes, self.trials)?;
        if self.warmup_iterations == 0 {
            return Err(Error::invalid("at least one warm-up iteration is required"));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(Error::invalid(format!(
                "tolerance must be a positive number, got {}",
                self.tolerance
            )));
        }
        if self.engine_symbol.trim().is_empty() {
            return Err(Error::invalid("engine symbol is empty"));
        }
        Ok(())
    }

    pub fn input_generator(&self) -> InputGenerator {
        InputGenerator::new(self.seed, self.distribution)
    }
}

pub(crate) fn validate_sizes_and_trials(sizes: &[usize], trials: usize) -> Result<()> {
    if sizes.is_empty() {
        return Err(Error::invalid("no size configurations given"));
    }
    if let Some(pos) = sizes.iter().position(|&s| s == 0) {
        return Err(Error::invalid(format!("size configuration #{pos} is zero")));
    }
    if trials == 0 {
        return Err(Error::invalid("trials per configuration must be at least 1"));
    }
    Ok(())
}

/// Platform file name of the engine library, next to the running binary.
pub fn default_engine_path() -> PathBuf {
    let file_name = format!(
        "{}sumbench_engine{}",
        env::consts::DLL_PREFIX,
        env::consts::DLL_SUFFIX
    );
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&file_name)))
        .unwrap_or_else(|| PathBuf::from(file_name))
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::invalid(format!("{key}: cannot parse `{value}`")))
}

fn parse_seed(value: &str) -> Result<u64> {
    let value = value.trim();
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16)
            .map_err(|_| Error::invalid(format!("SUMBENCH_SEED: cannot parse `{value}`"))),
        None => parse("SUMBENCH_SEED", value),
    }
}

/// Parse `"1000, 100000"` into sizes. Negative or non-numeric entries are
/// rejected.
pub fn parse_sizes(value: &str) -> Result<Vec<usize>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse::<usize>("SUMBENCH_SIZES", &s.replace('_', "")))
        .collect()
}
