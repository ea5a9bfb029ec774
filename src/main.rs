//! `sumbench` - measure every summation kernel on the configured sizes.
//!
//! Configuration comes from `SUMBENCH_*` environment variables (see
//! [`HarnessConfig::from_env`]). Set `SUMBENCH_REPORT_FORMAT=json` for a
//! machine-readable report on stdout.
//!
//! The native kernel is loaded from `libsumbench_engine` next to this binary.
//! `cargo run` alone does not build that library: run
//! `cargo build --workspace` first, or point `SUMBENCH_ENGINE_PATH` at a
//! built copy. Without it the native kernel is listed as excluded.

use std::env;
use std::process::ExitCode;

use sumbench_core::kernel::ForeignBinding;
use sumbench_core::{CapabilitySet, CountingAllocator, Harness, HarnessConfig, KernelSet, Report};
use sumbench_tracing::{init_global_tracing, TracingConfig};

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator::new();

fn main() -> ExitCode {
    if let Err(err) = init_global_tracing(&TracingConfig::from_env()) {
        eprintln!("sumbench: tracing disabled: {err}");
    }

    let report = match run() {
        Ok(report) => report,
        Err(err) => {
            tracing::error!(error = %err, "measurement aborted");
            eprintln!("sumbench: {err}");
            return ExitCode::FAILURE;
        }
    };

    let rendered = render(&report, json_requested());
    let outcome = Outcome::of(&report, &rendered);
    match rendered {
        Ok(text) => println!("{text}"),
        Err(err) => {
            tracing::error!(error = %err, "report serialization failed");
            eprintln!("sumbench: cannot serialize report: {err}");
        }
    }
    for (kernel, size) in report.correctness_failures() {
        tracing::error!(kernel, size, "kernel disagreed with the baseline");
    }
    outcome.into()
}

/// How the process ends once measurement itself succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// Report printed, every kernel agreed with the baseline.
    Agreed,
    /// Report printed, at least one kernel disagreed.
    Mismatch,
    /// Report could not be rendered.
    Unprinted,
}

impl Outcome {
    fn of<E>(report: &Report, rendered: &Result<String, E>) -> Self {
        if rendered.is_err() {
            Outcome::Unprinted
        } else if report.all_correct() {
            Outcome::Agreed
        } else {
            Outcome::Mismatch
        }
    }
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Agreed => ExitCode::SUCCESS,
            Outcome::Mismatch => ExitCode::from(2),
            Outcome::Unprinted => ExitCode::FAILURE,
        }
    }
}

fn run() -> sumbench_core::Result<Report> {
    let config = HarnessConfig::from_env()?;
    let capabilities = CapabilitySet::detected();
    tracing::info!(%capabilities, engine = %config.engine_path.display(), "starting");

    let kernels = KernelSet::standard(capabilities)
        .with_foreign(ForeignBinding::load(&config.engine_path, &config.engine_symbol));
    let harness = Harness::with_probe(config, &GLOBAL)?;
    harness.run_configured(&kernels)
}

fn render(report: &Report, json: bool) -> Result<String, serde_json::Error> {
    if json {
        serde_json::to_string_pretty(report)
    } else {
        Ok(report.to_string())
    }
}

fn json_requested() -> bool {
    env::var("SUMBENCH_REPORT_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"))
}
