use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::Array2;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::consts::{PARALLEL_PIXEL_THRESHOLD, PROGRESS_STEPS};
use crate::fit::{fit_curve_with, DecaySolver, FitConfig, FitOutcome, LevenbergMarquardt, RejectReason};
use crate::frame::ImageStack;

/// Per-run tally of fit outcomes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FitSummary {
    pub converged: usize,
    pub low_signal: usize,
    pub diverged: usize,
}

impl FitSummary {
    pub fn total(&self) -> usize {
        self.converged + self.low_signal + self.diverged
    }

    fn record(&mut self, outcome: &FitOutcome) {
        match outcome {
            FitOutcome::Converged { .. } => self.converged += 1,
            FitOutcome::Rejected {
                reason: RejectReason::LowSignal,
            } => self.low_signal += 1,
            FitOutcome::Rejected {
                reason: RejectReason::FitDivergence(_),
            } => self.diverged += 1,
        }
    }
}

/// Relaxation-time map in milliseconds. Rejected pixels hold NaN.
#[derive(Clone, Debug)]
pub struct T2Map {
    values: Array2<f32>,
    s0: Array2<f32>,
    summary: FitSummary,
}

impl T2Map {
    /// Wrap an existing grid of T2 values. Non-finite cells count as diverged.
    pub fn from_values(values: Array2<f32>) -> Self {
        let mut summary = FitSummary::default();
        for v in values.iter() {
            if v.is_finite() {
                summary.converged += 1;
            } else {
                summary.diverged += 1;
            }
        }
        let s0 = Array2::from_elem(values.dim(), f32::NAN);
        Self {
            values,
            s0,
            summary,
        }
    }

    /// T2 per pixel, shape = (rows, cols)
    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    /// Fitted S0 per pixel (NaN where rejected).
    pub fn s0(&self) -> &Array2<f32> {
        &self.s0
    }

    pub fn summary(&self) -> FitSummary {
        self.summary
    }

    pub fn dim(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn finite_values(&self) -> Vec<f32> {
        self.values.iter().copied().filter(|v| v.is_finite()).collect()
    }

    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_finite()).count()
    }

    pub fn is_all_invalid(&self) -> bool {
        !self.values.iter().any(|v| v.is_finite())
    }

    /// (min, max) over finite cells.
    pub fn finite_range(&self) -> Option<(f32, f32)> {
        self.values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Fit every pixel of the stack with the default solver.
pub fn assemble_map(stack: &ImageStack, config: &FitConfig) -> T2Map {
    let solver = LevenbergMarquardt::new(config.max_iterations);
    let (h, w) = stack.dim();
    assemble_map_with(stack, config, &solver, h * w >= PARALLEL_PIXEL_THRESHOLD, |_| {})
}

/// Fit every pixel with an explicit solver and execution mode.
///
/// Rows are fitted independently and written back in row order, so the
/// parallel and sequential paths produce identical maps. `on_progress`
/// receives the number of pixels fitted so far after each row.
pub fn assemble_map_with(
    stack: &ImageStack,
    config: &FitConfig,
    solver: &dyn DecaySolver,
    parallel: bool,
    on_progress: impl Fn(usize) + Sync,
) -> T2Map {
    let (h, w) = stack.dim();
    let total = h * w;
    let done = AtomicUsize::new(0);

    let fit_row = |row: usize| -> Vec<FitOutcome> {
        let outcomes: Vec<FitOutcome> = (0..w)
            .map(|col| fit_curve_with(&stack.curve(row, col), config, solver))
            .collect();
        let before = done.fetch_add(w, Ordering::Relaxed);
        let after = before + w;
        if after * PROGRESS_STEPS / total > before * PROGRESS_STEPS / total {
            info!(
                percent = after * 100 / total,
                pixels = after,
                total,
                "Fitting progress"
            );
        }
        on_progress(after);
        outcomes
    };

    debug!(rows = h, cols = w, echoes = stack.depth(), parallel, "Assembling T2 map");

    let rows: Vec<Vec<FitOutcome>> = if parallel {
        (0..h).into_par_iter().map(fit_row).collect()
    } else {
        (0..h).map(fit_row).collect()
    };

    let mut values = Array2::<f32>::from_elem((h, w), f32::NAN);
    let mut s0 = Array2::<f32>::from_elem((h, w), f32::NAN);
    let mut summary = FitSummary::default();
    for (row, outcomes) in rows.into_iter().enumerate() {
        for (col, outcome) in outcomes.into_iter().enumerate() {
            summary.record(&outcome);
            if let FitOutcome::Converged { t2, s0: amplitude } = outcome {
                values[[row, col]] = t2 as f32;
                s0[[row, col]] = amplitude as f32;
            }
        }
    }

    info!(
        converged = summary.converged,
        low_signal = summary.low_signal,
        diverged = summary.diverged,
        "T2 map assembled"
    );

    T2Map {
        values,
        s0,
        summary,
    }
}
