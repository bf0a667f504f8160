mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use t2map_core::error::{InputError, T2Error};
use t2map_core::io::dicom::{tags, DicomFile, TransferSyntax};
use t2map_core::io::loader::decode_frame;
use t2map_core::pipeline::{
    compute_t2_map, compute_t2_map_reported, run_from_folder, PipelineStage, ProgressReporter,
    RunOutcome, T2Config,
};
use t2map_core::window::ScaleMode;

use common::{decay_value, gradient_decay_stack, stack_from_fn, write_echo_series};

const ECHO_TIMES: [f64; 4] = [10.0, 20.0, 30.0, 40.0];

fn config_in(dir: &std::path::Path) -> T2Config {
    T2Config {
        output_dir: dir.to_path_buf(),
        ..T2Config::default()
    }
}

/// Two pixels decaying with S0 = 500, T2 = 40 ms; two pixels of pure zeros.
fn two_valid_two_zero(r: usize, c: usize, te: f64) -> u16 {
    if r == c {
        decay_value(500.0, 40.0, te)
    } else {
        0
    }
}

#[derive(Default)]
struct RecordingReporter {
    stages: Mutex<Vec<PipelineStage>>,
    advances: AtomicUsize,
}

impl ProgressReporter for RecordingReporter {
    fn begin_stage(&self, stage: PipelineStage, _total_items: Option<usize>) {
        self.stages.lock().unwrap().push(stage);
    }

    fn advance(&self, _items_done: usize) {
        self.advances.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[test]
fn test_two_by_two_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let stack = stack_from_fn(2, 2, &ECHO_TIMES, two_valid_two_zero);
    let config = config_in(dir.path());

    let outcome = compute_t2_map(&stack, &config).unwrap();
    let artifacts = match outcome {
        RunOutcome::Success(a) => a,
        RunOutcome::AllPixelsInvalid => panic!("expected a map"),
    };

    assert_eq!(artifacts.summary.converged, 2);
    assert_eq!(artifacts.summary.low_signal, 2);
    assert!((artifacts.window.low - 40.0).abs() < 0.5);

    let codes = artifacts.raster.codes();
    assert_eq!(codes.dim(), (2, 2));
    assert_eq!(codes[[0, 1]], 0);
    assert_eq!(codes[[1, 0]], 0);
    // Identical valid pixels collapse the window, which encodes to all zeros.
    assert!(artifacts.window.is_degenerate());
    assert_eq!(codes[[0, 0]], 0);
    assert_eq!(codes[[1, 1]], 0);

    assert!(artifacts.output_image_path.exists());
    assert!(artifacts.histogram_path.exists());
    assert!(artifacts.preview_path.is_none());
    assert_eq!(artifacts.histogram.total(), 2);

    let written = DicomFile::open(&artifacts.output_image_path).unwrap();
    assert_eq!(&decode_frame(&written, 0).unwrap().pixels, codes);
}

#[test]
fn test_valid_pixels_get_scaled_codes() {
    let dir = tempfile::tempdir().unwrap();
    let stack = gradient_decay_stack(8, 8, &ECHO_TIMES);
    let config = T2Config {
        window_percentiles: (0.0, 100.0),
        ..config_in(dir.path())
    };

    let artifacts = match compute_t2_map(&stack, &config).unwrap() {
        RunOutcome::Success(a) => a,
        RunOutcome::AllPixelsInvalid => panic!("expected a map"),
    };
    let codes = artifacts.raster.codes();
    assert_eq!(codes[[0, 0]], 0);
    assert_eq!(codes[[7, 7]], 65535);
    assert!(codes[[4, 4]] > 0 && codes[[4, 4]] < 65535);
}

#[test]
fn test_run_is_deterministic() {
    let stack = gradient_decay_stack(10, 10, &ECHO_TIMES);
    let a_dir = tempfile::tempdir().unwrap();
    let b_dir = tempfile::tempdir().unwrap();

    let a = compute_t2_map(&stack, &config_in(a_dir.path())).unwrap();
    let b = compute_t2_map(&stack, &config_in(b_dir.path())).unwrap();

    let (a, b) = (a.artifacts().unwrap(), b.artifacts().unwrap());
    assert_eq!(a.raster, b.raster);
    assert_eq!(a.window, b.window);
    assert_eq!(a.histogram, b.histogram);
}

#[test]
fn test_all_invalid_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let stack = stack_from_fn(3, 3, &ECHO_TIMES, |_, _, _| 2);
    let config = config_in(&out);

    let outcome = compute_t2_map(&stack, &config).unwrap();
    assert!(matches!(outcome, RunOutcome::AllPixelsInvalid));
    assert!(!out.exists());
}

#[test]
fn test_invalid_config_is_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let stack = stack_from_fn(2, 2, &ECHO_TIMES, two_valid_two_zero);
    let config = T2Config {
        output_bit_depth: 0,
        ..config_in(dir.path())
    };
    assert!(matches!(
        compute_t2_map(&stack, &config),
        Err(T2Error::Input(InputError::InvalidConfig(_)))
    ));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_frame_cap_applies_to_in_memory_stack() {
    let dir = tempfile::tempdir().unwrap();
    let stack = stack_from_fn(2, 2, &ECHO_TIMES, two_valid_two_zero);
    let config = T2Config {
        frame_cap: 2,
        ..config_in(dir.path())
    };
    let outcome = compute_t2_map(&stack, &config).unwrap();
    assert_eq!(outcome.artifacts().unwrap().summary.converged, 2);
}

#[test]
fn test_failed_artifact_removes_earlier_ones() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    // A directory in place of the chart makes the final rename fail.
    std::fs::create_dir(config.histogram_path()).unwrap();

    let stack = stack_from_fn(2, 2, &ECHO_TIMES, two_valid_two_zero);
    assert!(compute_t2_map(&stack, &config).is_err());
    assert!(!config.map_path().exists());
}

#[test]
fn test_preview_and_fixed_window() {
    let dir = tempfile::tempdir().unwrap();
    let stack = gradient_decay_stack(6, 6, &ECHO_TIMES);
    let config = T2Config {
        fixed_window: Some((10.0, 200.0)),
        scale: ScaleMode::Logarithmic,
        output_bit_depth: 12,
        write_preview: true,
        ..config_in(dir.path())
    };

    let outcome = compute_t2_map(&stack, &config).unwrap();
    let artifacts = outcome.artifacts().unwrap();
    assert_eq!(artifacts.window.low, 10.0);
    assert_eq!(artifacts.window.high, 200.0);
    assert_eq!(artifacts.raster.max_code(), 4095);
    let preview = artifacts.preview_path.as_ref().unwrap();
    assert!(preview.exists());
    assert_eq!(image::image_dimensions(preview).unwrap(), (6, 6));

    let written = DicomFile::open(&artifacts.output_image_path).unwrap();
    assert_eq!(written.dataset.u16(tags::BITS_STORED), Some(12));
}

#[test]
fn test_reporter_sees_every_stage() {
    let dir = tempfile::tempdir().unwrap();
    let stack = stack_from_fn(2, 2, &ECHO_TIMES, two_valid_two_zero);
    let reporter = Arc::new(RecordingReporter::default());

    compute_t2_map_reported(&stack, &config_in(dir.path()), reporter.clone()).unwrap();

    assert_eq!(
        *reporter.stages.lock().unwrap(),
        vec![
            PipelineStage::Validating,
            PipelineStage::Fitting,
            PipelineStage::Windowing,
            PipelineStage::Encoding,
            PipelineStage::Writing,
        ]
    );
    assert_eq!(reporter.advances.load(Ordering::SeqCst), 2);
}

// ---------------------------------------------------------------------------
// From a folder
// ---------------------------------------------------------------------------

#[test]
fn test_run_from_folder_preserves_reference() {
    let series = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_echo_series(
        series.path(),
        &ECHO_TIMES,
        4,
        4,
        |r, c, te| decay_value(800.0, 30.0 + 5.0 * (r * 4 + c) as f64, te),
        TransferSyntax::ImplicitVrLittleEndian,
    );

    let reporter = Arc::new(RecordingReporter::default());
    let outcome = run_from_folder(series.path(), &config_in(out.path()), reporter.clone()).unwrap();
    let artifacts = outcome.artifacts().unwrap();
    assert_eq!(artifacts.summary.converged, 16);
    assert_eq!(reporter.stages.lock().unwrap()[0], PipelineStage::Loading);

    let written = DicomFile::open(&artifacts.output_image_path).unwrap();
    assert_eq!(written.transfer_syntax, TransferSyntax::ImplicitVrLittleEndian);
    assert_eq!(
        written.dataset.string(tags::PATIENT_NAME).as_deref(),
        Some("Phantom^T2")
    );
    assert_eq!(written.dataset.u16(tags::ROWS), Some(4));
}
