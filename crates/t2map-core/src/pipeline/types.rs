use std::path::PathBuf;

use crate::histogram::T2Histogram;
use crate::map::FitSummary;
use crate::window::{EncodedRaster, WindowRange};

/// Pipeline processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Loading,
    Validating,
    Fitting,
    Windowing,
    Encoding,
    Writing,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loading => write!(f, "Loading echoes"),
            Self::Validating => write!(f, "Validating stack"),
            Self::Fitting => write!(f, "Fitting pixels"),
            Self::Windowing => write!(f, "Windowing"),
            Self::Encoding => write!(f, "Encoding map"),
            Self::Writing => write!(f, "Writing output"),
        }
    }
}

/// Files and figures produced by a successful run.
#[derive(Clone, Debug)]
pub struct RunArtifacts {
    pub output_image_path: PathBuf,
    pub histogram_path: PathBuf,
    pub preview_path: Option<PathBuf>,
    pub window: WindowRange,
    /// Codes stored in the output image.
    pub raster: EncodedRaster,
    pub summary: FitSummary,
    pub histogram: T2Histogram,
}

/// Result of a run that got past input validation.
#[derive(Clone, Debug)]
pub enum RunOutcome {
    Success(RunArtifacts),
    /// Every pixel was rejected; nothing was written.
    AllPixelsInvalid,
}

impl RunOutcome {
    pub fn artifacts(&self) -> Option<&RunArtifacts> {
        match self {
            Self::Success(a) => Some(a),
            Self::AllPixelsInvalid => None,
        }
    }
}

/// Thread-safe progress reporting for the pipeline.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new pipeline stage has started. `total_items` is the number of
    /// work items in this stage (e.g., pixel count), if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// Work items completed so far within the current stage.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter, used when `compute_t2_map` delegates.
pub(super) struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
