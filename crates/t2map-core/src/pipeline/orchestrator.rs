use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::consts::{HISTOGRAM_CHART_SIZE, PARALLEL_PIXEL_THRESHOLD};
use crate::error::{Result, T2Error};
use crate::fit::LevenbergMarquardt;
use crate::frame::ImageStack;
use crate::histogram::T2Histogram;
use crate::io::chart::{write_histogram_chart, ChartLabels};
use crate::io::image_io::save_raster_preview;
use crate::io::loader::load_stack;
use crate::io::map_writer::write_map_dicom;
use crate::map::assemble_map_with;
use crate::window::{encode_map, resolve_window, EncodedRaster};

use super::config::T2Config;
use super::types::{NoOpReporter, PipelineStage, ProgressReporter, RunArtifacts, RunOutcome};

/// Compute, encode and write the T2 map of a validated stack.
///
/// Returns `RunOutcome::AllPixelsInvalid` without touching the file system
/// when no pixel could be fitted.
pub fn compute_t2_map(stack: &ImageStack, config: &T2Config) -> Result<RunOutcome> {
    compute_t2_map_reported(stack, config, Arc::new(NoOpReporter))
}

/// Run the mapping pipeline with a thread-safe progress reporter.
pub fn compute_t2_map_reported(
    stack: &ImageStack,
    config: &T2Config,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<RunOutcome> {
    reporter.begin_stage(PipelineStage::Validating, None);
    config.validate()?;
    let capped;
    let stack = if stack.depth() > config.frame_cap {
        capped = stack.clone().capped(config.frame_cap)?;
        &capped
    } else {
        stack
    };
    reporter.finish_stage();

    let (h, w) = stack.dim();
    info!(
        echoes = stack.depth(),
        rows = h,
        cols = w,
        echo_times = ?stack.echo_times(),
        "Fitting T2 map"
    );

    reporter.begin_stage(PipelineStage::Fitting, Some(h * w));
    let fit_config = config.fit_config();
    let solver = LevenbergMarquardt::new(fit_config.max_iterations);
    let map = assemble_map_with(
        stack,
        &fit_config,
        &solver,
        h * w >= PARALLEL_PIXEL_THRESHOLD,
        |done| reporter.advance(done),
    );
    reporter.finish_stage();

    if map.is_all_invalid() {
        warn!(pixels = h * w, "No pixel produced a valid T2 fit, nothing written");
        return Ok(RunOutcome::AllPixelsInvalid);
    }

    reporter.begin_stage(PipelineStage::Windowing, None);
    let window = resolve_window(&map, config.fixed_window_range(), config.window_percentiles)?;
    info!(low = window.low, high = window.high, "Display window");
    let histogram = T2Histogram::from_map(&map, config.histogram_bins)
        .ok_or(T2Error::AllPixelsInvalid)?;
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::Encoding, None);
    let raster = encode_map(&map, window, config.output_bit_depth, config.scale)?;
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::Writing, None);
    let mut written = Vec::new();
    let result = write_artifacts(stack, &raster, &histogram, config, &mut written);
    reporter.finish_stage();

    match result {
        Ok(preview_path) => {
            let peak = histogram.peak();
            info!(
                map = %config.map_path().display(),
                histogram = %config.histogram_path().display(),
                peak_t2 = peak.center,
                "T2 map written"
            );
            Ok(RunOutcome::Success(RunArtifacts {
                output_image_path: config.map_path(),
                histogram_path: config.histogram_path(),
                preview_path,
                window,
                raster,
                summary: map.summary(),
                histogram,
            }))
        }
        Err(e) => {
            for path in &written {
                if let Err(remove_err) = std::fs::remove_file(path) {
                    warn!(path = %path.display(), error = %remove_err, "Failed to remove partial output");
                }
            }
            Err(e)
        }
    }
}

/// Write every artifact, recording each completed file in `written`.
fn write_artifacts(
    stack: &ImageStack,
    raster: &EncodedRaster,
    histogram: &T2Histogram,
    config: &T2Config,
    written: &mut Vec<PathBuf>,
) -> Result<Option<PathBuf>> {
    std::fs::create_dir_all(&config.output_dir)?;

    let map_path = config.map_path();
    write_map_dicom(stack.reference(), raster, &map_path)?;
    written.push(map_path);

    let histogram_path = config.histogram_path();
    write_histogram_chart(
        histogram,
        &histogram_path,
        HISTOGRAM_CHART_SIZE,
        &ChartLabels::default(),
    )?;
    written.push(histogram_path);

    if !config.write_preview {
        return Ok(None);
    }
    let preview_path = config.preview_path();
    save_raster_preview(raster, &preview_path)?;
    written.push(preview_path.clone());
    Ok(Some(preview_path))
}

/// Load the series in `dir` and run the pipeline on it.
pub fn run_from_folder(
    dir: &Path,
    config: &T2Config,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<RunOutcome> {
    config.validate()?;
    reporter.begin_stage(PipelineStage::Loading, None);
    let stack = load_stack(dir, config.frame_cap)?;
    reporter.finish_stage();
    compute_t2_map_reported(&stack, config, reporter)
}
