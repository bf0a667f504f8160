use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_FRAME_CAP, DEFAULT_HISTOGRAM_BINS, DEFAULT_HISTOGRAM_FILE_NAME,
    DEFAULT_LOW_SIGNAL_THRESHOLD, DEFAULT_MAP_FILE_NAME, DEFAULT_MAX_ITERATIONS,
    DEFAULT_OUTPUT_BIT_DEPTH, DEFAULT_PREVIEW_FILE_NAME, DEFAULT_T2_INIT_MS, DEFAULT_T2_MAX_MS,
    DEFAULT_T2_MIN_MS, DEFAULT_WINDOW_PERCENTILES,
};
use crate::error::{InputError, Result};
use crate::fit::FitConfig;
use crate::window::{validate_bit_depth, validate_percentiles, ScaleMode, WindowRange};

/// Everything a mapping run needs besides the stack itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct T2Config {
    /// Number of files read from the series folder, in file-name order.
    pub frame_cap: usize,
    pub t2_init: f64,
    pub t2_min: f64,
    pub t2_max: f64,
    pub low_signal_threshold: f64,
    pub max_iterations: usize,
    /// (low, high) percentiles in percent.
    pub window_percentiles: (f64, f64),
    /// Fixed (low, high) window in ms. Overrides the percentiles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_window: Option<(f32, f32)>,
    pub scale: ScaleMode,
    pub output_bit_depth: u8,
    pub histogram_bins: usize,
    pub output_dir: PathBuf,
    pub map_file_name: String,
    pub histogram_file_name: String,
    /// Also write a 16-bit PNG of the encoded raster.
    pub write_preview: bool,
    pub preview_file_name: String,
}

impl Default for T2Config {
    fn default() -> Self {
        Self {
            frame_cap: DEFAULT_FRAME_CAP,
            t2_init: DEFAULT_T2_INIT_MS,
            t2_min: DEFAULT_T2_MIN_MS,
            t2_max: DEFAULT_T2_MAX_MS,
            low_signal_threshold: DEFAULT_LOW_SIGNAL_THRESHOLD,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            window_percentiles: DEFAULT_WINDOW_PERCENTILES,
            fixed_window: None,
            scale: ScaleMode::default(),
            output_bit_depth: DEFAULT_OUTPUT_BIT_DEPTH,
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
            output_dir: PathBuf::from("."),
            map_file_name: DEFAULT_MAP_FILE_NAME.to_string(),
            histogram_file_name: DEFAULT_HISTOGRAM_FILE_NAME.to_string(),
            write_preview: false,
            preview_file_name: DEFAULT_PREVIEW_FILE_NAME.to_string(),
        }
    }
}

impl T2Config {
    pub fn fit_config(&self) -> FitConfig {
        FitConfig {
            t2_init: self.t2_init,
            t2_min: self.t2_min,
            t2_max: self.t2_max,
            low_signal_threshold: self.low_signal_threshold,
            max_iterations: self.max_iterations,
        }
    }

    /// Fixed window, if configured.
    pub fn fixed_window_range(&self) -> Option<WindowRange> {
        self.fixed_window.map(|(low, high)| WindowRange { low, high })
    }

    pub fn map_path(&self) -> PathBuf {
        self.output_dir.join(&self.map_file_name)
    }

    pub fn histogram_path(&self) -> PathBuf {
        self.output_dir.join(&self.histogram_file_name)
    }

    pub fn preview_path(&self) -> PathBuf {
        self.output_dir.join(&self.preview_file_name)
    }

    /// Reject settings no run could succeed with.
    ///
    /// Solver bounds are not checked here: infeasible bounds reject every
    /// pixel individually as a fit divergence.
    pub fn validate(&self) -> Result<()> {
        if self.frame_cap < 2 {
            return Err(invalid(format!(
                "frame_cap must be at least 2, got {}",
                self.frame_cap
            )));
        }
        let (low, high) = self.window_percentiles;
        validate_percentiles(low, high)?;
        if let Some((low, high)) = self.fixed_window {
            if !low.is_finite() || !high.is_finite() || low > high {
                return Err(invalid(format!(
                    "fixed_window must satisfy low <= high, got ({}, {})",
                    low, high
                )));
            }
        }
        validate_bit_depth(self.output_bit_depth)?;
        if self.histogram_bins == 0 {
            return Err(invalid("histogram_bins must be positive".into()));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations must be positive".into()));
        }
        for name in [
            &self.map_file_name,
            &self.histogram_file_name,
            &self.preview_file_name,
        ] {
            if name.is_empty() {
                return Err(invalid("output file names must not be empty".into()));
            }
        }
        Ok(())
    }
}

fn invalid(msg: String) -> crate::error::T2Error {
    InputError::InvalidConfig(msg).into()
}
