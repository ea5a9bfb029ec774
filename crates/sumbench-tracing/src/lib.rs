//! Shared tracing configuration for the sumbench workspace.
//!
//! The `sumbench` binary installs its `tracing` subscriber through this
//! crate, and the harness reports throughput and allocation events through
//! [`performance`].

pub mod performance;

use std::env;

use tracing::Subscriber;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter, Registry};

/// Configuration describing how the shared tracing subscriber should behave.
#[derive(Clone, Debug)]
pub struct TracingConfig {
    /// Optional tracing directives (e.g. `sumbench_core=debug,info`). When
    /// absent the crate falls back to `RUST_LOG` and finally to
    /// [`TracingConfig::default_directive`].
    pub directives: Option<String>,
    /// Fallback directive used when neither `directives` nor `RUST_LOG`
    /// resolve to a valid filter.
    pub default_directive: String,
    /// Whether event targets (module paths) appear in output.
    pub include_targets: bool,
    /// ANSI colouring. Disable for CI logs.
    pub ansi: bool,
    /// Span lifecycle events to emit.
    pub span_events: FmtSpan,
    /// Output format for the formatter layer.
    pub output: TracingOutput,
    /// Whether [`performance`] events are emitted at all.
    pub enable_performance_tracing: bool,
    /// Minimum duration in microseconds for a performance span to be logged.
    pub performance_threshold_us: Option<u64>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::for_local()
    }
}

impl TracingConfig {
    /// Pretty, ANSI-enabled output for a developer terminal.
    pub fn for_local() -> Self {
        Self {
            directives: None,
            default_directive: "info".to_string(),
            include_targets: true,
            ansi: true,
            span_events: FmtSpan::NONE,
            output: TracingOutput::Pretty,
            enable_performance_tracing: cfg!(debug_assertions),
            performance_threshold_us: None,
        }
    }

    /// JSON output without colour codes, for log collectors.
    pub fn for_ci() -> Self {
        Self {
            directives: None,
            default_directive: "info".to_string(),
            include_targets: true,
            ansi: false,
            span_events: FmtSpan::NONE,
            output: TracingOutput::Json,
            enable_performance_tracing: false,
            performance_threshold_us: None,
        }
    }

    /// Preset for inspecting a measurement run in detail.
    ///
    /// Turns on span close events and debug-level output for the harness so
    /// every per-kernel throughput event is visible.
    pub fn for_performance() -> Self {
        Self {
            directives: Some("sumbench=debug,sumbench_core=debug".to_string()),
            default_directive: "info".to_string(),
            include_targets: true,
            ansi: false,
            span_events: FmtSpan::CLOSE,
            output: TracingOutput::Json,
            enable_performance_tracing: true,
            performance_threshold_us: None,
        }
    }

    /// Build a configuration using environment hints.
    ///
    /// # Environment Variables
    ///
    /// - `SUMBENCH_TRACING_PROFILE` - `local` (default), `ci`, or `performance`
    /// - `SUMBENCH_TRACING_DIRECTIVES` - overrides tracing directives
    /// - `SUMBENCH_TRACING_FORMAT` - `pretty`, `compact`, or `json`
    /// - `SUMBENCH_PERF_TRACING` - `true`/`1`/`yes` to enable performance events
    /// - `SUMBENCH_PERF_THRESHOLD_US` - minimum span duration to log
    pub fn from_env() -> Self {
        let profile = env::var("SUMBENCH_TRACING_PROFILE")
            .unwrap_or_else(|_| "local".to_string())
            .to_ascii_lowercase();

        let mut config = match profile.as_str() {
            "ci" => Self::for_ci(),
            "performance" => Self::for_performance(),
            _ => Self::for_local(),
        };

        if let Ok(directives) = env::var("SUMBENCH_TRACING_DIRECTIVES") {
            if !directives.trim().is_empty() {
                config.directives = Some(directives);
            }
        }

        if let Ok(format) = env::var("SUMBENCH_TRACING_FORMAT") {
            if let Some(parsed) = TracingOutput::from_env_value(&format) {
                config.output = parsed;
                if matches!(config.output, TracingOutput::Json) {
                    config.ansi = false;
                }
            }
        }

        if let Ok(perf_tracing) = env::var("SUMBENCH_PERF_TRACING") {
            config.enable_performance_tracing = perf_tracing.eq_ignore_ascii_case("true")
                || perf_tracing == "1"
                || perf_tracing.eq_ignore_ascii_case("yes");
        }

        if let Ok(threshold) = env::var("SUMBENCH_PERF_THRESHOLD_US") {
            if let Ok(threshold_us) = threshold.trim().parse::<u64>() {
                config.performance_threshold_us = Some(threshold_us);
            }
        }

        config
    }

    fn resolve_filter(&self) -> Result<EnvFilter, TracingSetupError> {
        match &self.directives {
            Some(directives) => {
                EnvFilter::try_new(directives).map_err(|err| TracingSetupError::InvalidFilter(err.to_string()))
            }
            None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_directive))),
        }
    }
}

/// Errors surfaced when configuring the shared tracing subscriber fails.
#[derive(Debug, thiserror::Error)]
pub enum TracingSetupError {
    /// The directive string could not be parsed.
    #[error("invalid tracing directive: {0}")]
    InvalidFilter(String),
    /// A global subscriber is already installed.
    #[error("failed to install global tracing subscriber: {0}")]
    SubscriberInit(#[source] tracing_subscriber::util::TryInitError),
}

/// Build a `tracing` subscriber using the provided configuration.
pub fn build_subscriber(config: &TracingConfig) -> Result<impl Subscriber + Send + Sync, TracingSetupError> {
    let filter = config.resolve_filter()?;
    Ok(Registry::default().with(fmt_layer(config)).with(filter))
}

fn fmt_layer(config: &TracingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let span_events = config.span_events.clone();
    match config.output {
        TracingOutput::Compact => Box::new(
            tracing_fmt::layer()
                .compact()
                .with_target(config.include_targets)
                .with_ansi(config.ansi)
                .with_span_events(span_events),
        ),
        TracingOutput::Pretty => Box::new(
            tracing_fmt::layer()
                .pretty()
                .with_target(config.include_targets)
                .with_ansi(config.ansi)
                .with_span_events(span_events),
        ),
        TracingOutput::Json => Box::new(
            tracing_fmt::layer()
                .json()
                .with_target(config.include_targets)
                .with_span_events(span_events)
                .with_ansi(false),
        ),
    }
}

/// Install the configured subscriber as the process-wide default.
///
/// Also applies the performance settings to [`performance`], so a run
/// configured with `enable_performance_tracing = false` emits no
/// throughput events at all.
pub fn init_global_tracing(config: &TracingConfig) -> Result<(), TracingSetupError> {
    performance::configure(config.enable_performance_tracing, config.performance_threshold_us);
    build_subscriber(config)?
        .try_init()
        .map_err(TracingSetupError::SubscriberInit)
}

/// Output format choices for the tracing formatter layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingOutput {
    Compact,
    Pretty,
    Json,
}

impl TracingOutput {
    fn from_env_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}
