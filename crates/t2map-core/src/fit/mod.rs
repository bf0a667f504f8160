pub mod solver;

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_LOW_SIGNAL_THRESHOLD, DEFAULT_MAX_ITERATIONS, DEFAULT_T2_INIT_MS, DEFAULT_T2_MAX_MS,
    DEFAULT_T2_MIN_MS,
};
use crate::frame::PixelSignalCurve;

pub use solver::LevenbergMarquardt;

/// Per-pixel fit parameters shared by every curve of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Solver seed for T2 (ms). Clamped into the bounds.
    pub t2_init: f64,
    pub t2_min: f64,
    pub t2_max: f64,
    /// Curves peaking below this intensity are not fitted.
    pub low_signal_threshold: f64,
    pub max_iterations: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            t2_init: DEFAULT_T2_INIT_MS,
            t2_min: DEFAULT_T2_MIN_MS,
            t2_max: DEFAULT_T2_MAX_MS,
            low_signal_threshold: DEFAULT_LOW_SIGNAL_THRESHOLD,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Parameters of `S0 * exp(-TE / T2)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecayParams {
    pub s0: f64,
    pub t2: f64,
}

/// Box constraints: S0 in [0, inf), T2 in [t2_min, t2_max].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecayBounds {
    pub t2_min: f64,
    pub t2_max: f64,
}

impl DecayBounds {
    pub fn is_feasible(&self) -> bool {
        self.t2_min.is_finite() && self.t2_max.is_finite() && self.t2_min > 0.0 && self.t2_min <= self.t2_max
    }

    pub fn project(&self, params: DecayParams) -> DecayParams {
        DecayParams {
            s0: params.s0.max(0.0),
            t2: params.t2.clamp(self.t2_min, self.t2_max),
        }
    }
}

/// Successful solver result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecayFit {
    pub params: DecayParams,
    pub iterations: usize,
}

/// Why the solver gave up on a curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DivergenceCause {
    SingularSystem,
    IterationLimit,
    NonFinite,
    InfeasibleBounds,
    /// No step lowers the cost, yet the point is not stationary.
    Stalled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// Peak intensity below the configured threshold; the solver was not run.
    LowSignal,
    FitDivergence(DivergenceCause),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FitOutcome {
    Converged { t2: f64, s0: f64 },
    Rejected { reason: RejectReason },
}

impl FitOutcome {
    pub fn t2(&self) -> Option<f64> {
        match self {
            Self::Converged { t2, .. } => Some(*t2),
            Self::Rejected { .. } => None,
        }
    }

    pub fn s0(&self) -> Option<f64> {
        match self {
            Self::Converged { s0, .. } => Some(*s0),
            Self::Rejected { .. } => None,
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }

    fn diverged(cause: DivergenceCause) -> Self {
        Self::Rejected {
            reason: RejectReason::FitDivergence(cause),
        }
    }
}

/// Bounded least-squares solver for the mono-exponential model.
///
/// Implementors must be pure: the same curve, seed and bounds always yield
/// the same result.
pub trait DecaySolver: Send + Sync {
    fn solve(
        &self,
        curve: &PixelSignalCurve<'_>,
        initial: DecayParams,
        bounds: DecayBounds,
    ) -> Result<DecayFit, DivergenceCause>;
}

/// Fit one curve with the default Levenberg-Marquardt solver.
pub fn fit_curve(curve: &PixelSignalCurve<'_>, config: &FitConfig) -> FitOutcome {
    let solver = LevenbergMarquardt::new(config.max_iterations);
    fit_curve_with(curve, config, &solver)
}

/// Fit one curve with a caller-supplied solver.
pub fn fit_curve_with(
    curve: &PixelSignalCurve<'_>,
    config: &FitConfig,
    solver: &dyn DecaySolver,
) -> FitOutcome {
    let peak = curve.max_intensity();
    // NaN peak (empty curve) also lands here.
    if !(peak >= config.low_signal_threshold) {
        return FitOutcome::Rejected {
            reason: RejectReason::LowSignal,
        };
    }

    let bounds = DecayBounds {
        t2_min: config.t2_min,
        t2_max: config.t2_max,
    };
    if !bounds.is_feasible() || !config.t2_init.is_finite() {
        return FitOutcome::diverged(DivergenceCause::InfeasibleBounds);
    }

    let initial = bounds.project(DecayParams {
        s0: peak,
        t2: config.t2_init,
    });

    match solver.solve(curve, initial, bounds) {
        Ok(fit) => {
            let DecayParams { s0, t2 } = fit.params;
            if !s0.is_finite() || !t2.is_finite() {
                FitOutcome::diverged(DivergenceCause::NonFinite)
            } else if t2 < bounds.t2_min || t2 > bounds.t2_max || s0 < 0.0 {
                FitOutcome::diverged(DivergenceCause::InfeasibleBounds)
            } else {
                FitOutcome::Converged { t2, s0 }
            }
        }
        Err(cause) => FitOutcome::diverged(cause),
    }
}
