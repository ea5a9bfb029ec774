//! End-to-end tests: every kernel, including the native engine, measured
//! through the harness on generated input.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use proptest::prelude::*;
use serial_test::serial;
use sumbench_core::kernel::{ForeignBinding, ForeignKernel};
use sumbench_core::{
    AvxSum, CapabilitySet, Correctness, Error, ExecutionPath, ForeignBindingFailure, Harness, HarnessConfig,
    KernelSet, ScalarSum,
};

fn engine() -> sumbench_core::Result<ForeignBinding> {
    // SAFETY: the engine routine reads exactly `len` floats and keeps nothing.
    unsafe { ForeignBinding::from_fn(sumbench_engine::vectorized_sum16, "sumbench_engine (static)") }
}

fn engine_file_name() -> String {
    format!("{}sumbench_engine{}", env::consts::DLL_PREFIX, env::consts::DLL_SUFFIX)
}

/// `target/<profile>` of the running test binary (`target/<profile>/deps/..`).
fn profile_dir() -> PathBuf {
    let exe = env::current_exe().unwrap();
    exe.parent().and_then(Path::parent).unwrap().to_path_buf()
}

/// The engine cdylib built for this profile, building it into a separate
/// target directory if cargo has not produced one.
fn built_engine() -> PathBuf {
    let profile = profile_dir();
    let profile_name = if cfg!(debug_assertions) { "debug" } else { "release" };
    let fixture_dir = profile.parent().unwrap().join("engine-fixture");
    let candidates = [
        profile.join(engine_file_name()),
        profile.join("deps").join(engine_file_name()),
        fixture_dir.join(profile_name).join(engine_file_name()),
    ];
    if let Some(found) = candidates.iter().find(|p| p.exists()) {
        return found.clone();
    }

    let mut build = Command::new(env!("CARGO"));
    build
        .args(["build", "-p", "sumbench-engine", "--manifest-path"])
        .arg(Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml"))
        .arg("--target-dir")
        .arg(&fixture_dir);
    if !cfg!(debug_assertions) {
        build.arg("--release");
    }
    assert!(build.status().unwrap().success(), "building sumbench-engine failed");
    candidates
        .into_iter()
        .find(|p| p.exists())
        .expect("engine library missing after build")
}

fn all_kernels(capabilities: CapabilitySet) -> KernelSet {
    KernelSet::standard(capabilities).with_foreign(engine())
}

fn config(sizes: Vec<usize>, trials: usize) -> HarnessConfig {
    HarnessConfig {
        sizes,
        trials,
        ..HarnessConfig::default()
    }
}

#[test]
fn five_kernels_register_with_the_static_engine() {
    let kernels = all_kernels(CapabilitySet::detected());
    assert_eq!(
        kernels.names(),
        vec!["scalar", "unrolled", "vectorized_avx", "vectorized_avx2", "native_engine"]
    );
    assert!(kernels.excluded().is_empty());
    assert_eq!(kernels.get(ForeignKernel::NAME).unwrap().execution_path(), ExecutionPath::Native);
}

#[test]
fn nine_elements_sum_to_45_everywhere() {
    let data: Vec<f32> = (1..=9).map(|v| v as f32).collect();
    for capabilities in [CapabilitySet::detected(), CapabilitySet::empty()] {
        for kernel in all_kernels(capabilities).iter() {
            assert_eq!(kernel.reduce(&data), 45.0, "{}", kernel.name());
        }
    }
}

#[test]
fn empty_input_sums_to_zero_but_is_not_a_size() {
    for kernel in all_kernels(CapabilitySet::detected()).iter() {
        assert_eq!(kernel.reduce(&[]), 0.0, "{}", kernel.name());
    }

    let harness = Harness::new(config(vec![1], 1)).unwrap();
    let result = harness.run(&all_kernels(CapabilitySet::detected()), &[0], 1);
    assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
}

#[test]
fn forced_fallback_runs_every_vectorized_kernel_on_the_scalar_path() {
    let kernels = all_kernels(CapabilitySet::empty());
    let data: Vec<f32> = (0..1_003).map(|i| (i % 17) as f32 * 0.25).collect();
    let expected = kernels.get(ScalarSum::NAME).unwrap().reduce(&data);

    for name in [AvxSum::AVX_NAME, AvxSum::AVX2_NAME] {
        let kernel = kernels.get(name).unwrap();
        assert_eq!(kernel.execution_path(), ExecutionPath::Fallback);
        assert_eq!(kernel.reduce(&data).to_bits(), expected.to_bits());
    }
}

#[test]
fn missing_engine_leaves_four_kernels_and_a_valid_report() {
    let missing = ForeignBinding::load("/nonexistent/libsumbench_engine.so", "vectorized_sum16");
    match &missing {
        Err(Error::ForeignBinding { reason, .. }) => {
            assert!(matches!(reason, ForeignBindingFailure::LibraryNotFound(_)));
        }
        other => panic!("expected a binding failure, got {other:?}"),
    }

    let kernels = KernelSet::standard(CapabilitySet::detected()).with_foreign(missing);
    assert_eq!(kernels.len(), 4);
    assert_eq!(kernels.excluded().len(), 1);
    assert_eq!(kernels.excluded()[0].name, ForeignKernel::NAME);

    let harness = Harness::new(config(vec![1_000], 5)).unwrap();
    let report = harness.run_configured(&kernels).unwrap();
    assert_eq!(report.sizes[0].rows.len(), 4);
    assert!(report.row(ForeignKernel::NAME, 1_000).is_none());
    assert!(report.all_correct());
    assert!(report.to_string().contains("Excluded native_engine"));
}

#[test]
#[serial]
fn built_engine_loads_dynamically() {
    let path = built_engine();

    let binding = ForeignBinding::load(&path, "vectorized_sum16").unwrap();
    assert!(binding.is_dynamic());
    assert_eq!(binding.origin(), path.as_path());
    assert_eq!(binding.call(&[1.0; 17]), 17.0);

    let kernels = KernelSet::standard(CapabilitySet::detected()).with_foreign(Ok(binding));
    assert_eq!(kernels.get(ForeignKernel::NAME).unwrap().reduce(&[1.0; 17]), 17.0);

    match ForeignBinding::load(&path, "no_such_symbol") {
        Err(Error::ForeignBinding {
            source_path,
            reason: ForeignBindingFailure::SymbolMissing { symbol, message },
        }) => {
            assert_eq!(source_path, path);
            assert_eq!(symbol, "no_such_symbol");
            assert!(message.contains("no_such_symbol"), "{message}");
        }
        other => panic!("expected a missing symbol, got {other:?}"),
    }
}

#[test]
#[serial]
fn uniform_100k_agrees_across_all_kernels() {
    let harness = Harness::new(config(vec![100_000], 10)).unwrap();
    let report = harness.run_configured(&all_kernels(CapabilitySet::detected())).unwrap();

    let size = report.size(100_000).unwrap();
    assert_eq!(size.rows.len(), 5);
    assert_eq!(size.baseline().unwrap().ratio, 1.0);
    for row in &size.rows {
        match row.correctness {
            Correctness::Pass { max_relative_error } => assert!(max_relative_error <= 1e-3, "{}", row.kernel),
            Correctness::Mismatch { .. } => panic!("{} disagreed: {:?}", row.kernel, row.correctness),
        }
        // uniform [0, 1): the sum is near n / 2
        assert!((row.value - 50_000.0).abs() < 1_000.0, "{} = {}", row.kernel, row.value);
    }

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["sizes"][0]["rows"][0]["correctness"]["status"], "pass");
}

#[test]
#[serial]
#[cfg_attr(debug_assertions, ignore = "timing comparison needs an optimized build")]
fn vectorized_kernels_beat_the_baseline_when_available() {
    let capabilities = CapabilitySet::detected();
    let harness = Harness::new(config(vec![100_000], 50)).unwrap();
    let report = harness.run_configured(&KernelSet::standard(capabilities)).unwrap();

    for row in &report.size(100_000).unwrap().rows {
        if let ExecutionPath::Fast(capability) = row.path {
            assert!(capabilities.contains(capability));
            assert!(row.ratio < 1.0, "{} ratio {}", row.kernel, row.ratio);
        }
    }
}

proptest! {
    #[test]
    fn every_kernel_matches_the_baseline(data in prop::collection::vec(0.0f32..1.0, 0..600)) {
        let kernels = all_kernels(CapabilitySet::detected());
        let expected = kernels.get(ScalarSum::NAME).unwrap().reduce(&data);
        for kernel in kernels.iter() {
            let actual = kernel.reduce(&data);
            let scale = expected.abs().max(actual.abs()).max(f32::MIN_POSITIVE);
            prop_assert!(
                expected == actual || ((expected - actual).abs() / scale) <= 1e-3,
                "{}: {} vs {}", kernel.name(), actual, expected
            );
        }
    }

    #[test]
    fn repeated_calls_are_bit_identical(data in prop::collection::vec(-100.0f32..100.0, 0..300)) {
        for kernel in all_kernels(CapabilitySet::detected()).iter() {
            prop_assert_eq!(kernel.reduce(&data).to_bits(), kernel.reduce(&data).to_bits());
        }
    }

    #[test]
    fn tails_are_never_dropped(len in 0usize..2_000) {
        let ones = vec![1.0f32; len];
        for kernel in all_kernels(CapabilitySet::detected()).iter() {
            prop_assert_eq!(kernel.reduce(&ones), len as f32, "{}", kernel.name());
        }
    }
}
