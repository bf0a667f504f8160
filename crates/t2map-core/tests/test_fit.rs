mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use approx::assert_relative_eq;

use t2map_core::fit::{
    fit_curve, fit_curve_with, DecayBounds, DecayFit, DecayParams, DecaySolver, DivergenceCause,
    FitConfig, FitOutcome, LevenbergMarquardt, RejectReason,
};
use t2map_core::frame::PixelSignalCurve;

use common::decay_value;

const ECHO_TIMES: [f64; 6] = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0];

fn synthetic_curve(s0: f64, t2: f64) -> Vec<f64> {
    ECHO_TIMES
        .iter()
        .map(|&te| decay_value(s0, t2, te) as f64)
        .collect()
}

/// Counts calls and always fails.
struct CountingSolver {
    calls: AtomicUsize,
    result: Result<DecayFit, DivergenceCause>,
}

impl CountingSolver {
    fn failing(cause: DivergenceCause) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            result: Err(cause),
        }
    }

    fn returning(params: DecayParams) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            result: Ok(DecayFit {
                params,
                iterations: 1,
            }),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DecaySolver for CountingSolver {
    fn solve(
        &self,
        _curve: &PixelSignalCurve<'_>,
        _initial: DecayParams,
        _bounds: DecayBounds,
    ) -> Result<DecayFit, DivergenceCause> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
    }
}

// ---------------------------------------------------------------------------
// Converged fits
// ---------------------------------------------------------------------------

#[test]
fn test_recovers_known_t2() {
    let intensities = synthetic_curve(1000.0, 50.0);
    let curve = PixelSignalCurve::new(&ECHO_TIMES, intensities);
    let outcome = fit_curve(&curve, &FitConfig::default());

    let t2 = outcome.t2().expect("fit should converge");
    assert!((t2 - 50.0).abs() < 0.5, "t2 = {}", t2);
    assert_relative_eq!(outcome.s0().unwrap(), 1000.0, max_relative = 0.01);
}

#[test]
fn test_recovers_t2_far_from_seed() {
    for &truth in &[15.0, 80.0, 150.0] {
        let curve = PixelSignalCurve::new(&ECHO_TIMES, synthetic_curve(2000.0, truth));
        let t2 = fit_curve(&curve, &FitConfig::default())
            .t2()
            .expect("fit should converge");
        assert_relative_eq!(t2, truth, max_relative = 0.01);
    }
}

#[test]
fn test_exact_curve_is_recovered_tightly() {
    let intensities: Vec<f64> = ECHO_TIMES
        .iter()
        .map(|te| 500.0 * (-te / 42.0f64).exp())
        .collect();
    let curve = PixelSignalCurve::new(&ECHO_TIMES, intensities);
    let outcome = fit_curve(&curve, &FitConfig::default());
    assert_relative_eq!(outcome.t2().unwrap(), 42.0, max_relative = 1e-4);
    assert_relative_eq!(outcome.s0().unwrap(), 500.0, max_relative = 1e-4);
}

#[test]
fn test_result_respects_bounds() {
    // True T2 of 400 ms lies above the default upper bound.
    let curve = PixelSignalCurve::new(&ECHO_TIMES, synthetic_curve(1000.0, 400.0));
    match fit_curve(&curve, &FitConfig::default()) {
        FitOutcome::Converged { t2, .. } => assert!(t2 <= 200.0 && t2 >= 10.0),
        FitOutcome::Rejected { .. } => {}
    }
}

/// Least-squares amplitude for a fixed T2.
fn optimal_s0(echo_times: &[f64], intensities: &[f64], t2: f64) -> f64 {
    let (num, den) = echo_times
        .iter()
        .zip(intensities)
        .fold((0.0, 0.0), |(num, den), (&te, &y)| {
            let e = (-te / t2).exp();
            (num + y * e, den + e * e)
        });
    num / den
}

fn exact_curve(echo_times: &[f64], s0: f64, t2: f64) -> Vec<f64> {
    echo_times.iter().map(|te| s0 * (-te / t2).exp()).collect()
}

#[test]
fn test_upper_bound_fit_has_optimal_s0() {
    let echo_times: Vec<f64> = (1..=16).map(|i| 10.0 * i as f64).collect();
    let intensities = exact_curve(&echo_times, 4000.0, 400.0);
    let curve = PixelSignalCurve::new(&echo_times, intensities.clone());

    let outcome = fit_curve(&curve, &FitConfig::default());
    let (t2, s0) = match outcome {
        FitOutcome::Converged { t2, s0 } => (t2, s0),
        other => panic!("expected a bounded fit, got {:?}", other),
    };
    assert_eq!(t2, 200.0);
    assert_relative_eq!(
        s0,
        optimal_s0(&echo_times, &intensities, 200.0),
        max_relative = 1e-6
    );
}

#[test]
fn test_lower_bound_fit_has_optimal_s0() {
    let echo_times: Vec<f64> = (1..=8).map(|i| 10.0 * i as f64).collect();
    let intensities = exact_curve(&echo_times, 1000.0, 5.0);
    let curve = PixelSignalCurve::new(&echo_times, intensities.clone());

    let outcome = fit_curve(&curve, &FitConfig::default());
    let (t2, s0) = match outcome {
        FitOutcome::Converged { t2, s0 } => (t2, s0),
        other => panic!("expected a bounded fit, got {:?}", other),
    };
    assert_eq!(t2, 10.0);
    assert_relative_eq!(
        s0,
        optimal_s0(&echo_times, &intensities, 10.0),
        max_relative = 1e-6
    );
}

#[test]
fn test_fit_is_deterministic() {
    let curve = PixelSignalCurve::new(&ECHO_TIMES, synthetic_curve(750.0, 33.0));
    let config = FitConfig::default();
    assert_eq!(fit_curve(&curve, &config), fit_curve(&curve, &config));
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

#[test]
fn test_low_signal_never_calls_solver() {
    let curve = PixelSignalCurve::new(&ECHO_TIMES, vec![9.0, 8.0, 6.0, 5.0, 4.0, 3.0]);
    let solver = CountingSolver::failing(DivergenceCause::SingularSystem);
    let outcome = fit_curve_with(&curve, &FitConfig::default(), &solver);

    assert_eq!(
        outcome,
        FitOutcome::Rejected {
            reason: RejectReason::LowSignal
        }
    );
    assert_eq!(solver.calls(), 0);
}

#[test]
fn test_threshold_is_inclusive() {
    let curve = PixelSignalCurve::new(&ECHO_TIMES, vec![10.0, 8.0, 6.0, 5.0, 4.0, 3.0]);
    let solver = CountingSolver::returning(DecayParams { s0: 10.0, t2: 30.0 });
    let outcome = fit_curve_with(&curve, &FitConfig::default(), &solver);
    assert!(outcome.is_converged());
    assert_eq!(solver.calls(), 1);
}

#[test]
fn test_solver_failure_is_divergence() {
    let curve = PixelSignalCurve::new(&ECHO_TIMES, synthetic_curve(1000.0, 50.0));
    let solver = CountingSolver::failing(DivergenceCause::SingularSystem);
    let outcome = fit_curve_with(&curve, &FitConfig::default(), &solver);
    assert_eq!(
        outcome,
        FitOutcome::Rejected {
            reason: RejectReason::FitDivergence(DivergenceCause::SingularSystem)
        }
    );
    assert_eq!(solver.calls(), 1);
}

#[test]
fn test_non_finite_solver_result_is_divergence() {
    let curve = PixelSignalCurve::new(&ECHO_TIMES, synthetic_curve(1000.0, 50.0));
    let solver = CountingSolver::returning(DecayParams {
        s0: f64::NAN,
        t2: 50.0,
    });
    let outcome = fit_curve_with(&curve, &FitConfig::default(), &solver);
    assert_eq!(
        outcome,
        FitOutcome::Rejected {
            reason: RejectReason::FitDivergence(DivergenceCause::NonFinite)
        }
    );
}

#[test]
fn test_out_of_bounds_solver_result_is_divergence() {
    let curve = PixelSignalCurve::new(&ECHO_TIMES, synthetic_curve(1000.0, 50.0));
    let solver = CountingSolver::returning(DecayParams {
        s0: 1000.0,
        t2: 500.0,
    });
    let outcome = fit_curve_with(&curve, &FitConfig::default(), &solver);
    assert!(matches!(
        outcome,
        FitOutcome::Rejected {
            reason: RejectReason::FitDivergence(DivergenceCause::InfeasibleBounds)
        }
    ));
}

#[test]
fn test_infeasible_bounds_rejected_without_solver() {
    let curve = PixelSignalCurve::new(&ECHO_TIMES, synthetic_curve(1000.0, 50.0));
    let config = FitConfig {
        t2_min: 100.0,
        t2_max: 50.0,
        ..FitConfig::default()
    };
    let solver = CountingSolver::returning(DecayParams { s0: 1.0, t2: 60.0 });
    let outcome = fit_curve_with(&curve, &config, &solver);
    assert_eq!(
        outcome,
        FitOutcome::Rejected {
            reason: RejectReason::FitDivergence(DivergenceCause::InfeasibleBounds)
        }
    );
    assert_eq!(solver.calls(), 0);
}

#[test]
fn test_iteration_limit_is_divergence() {
    let curve = PixelSignalCurve::new(&ECHO_TIMES, synthetic_curve(1000.0, 150.0));
    let solver = LevenbergMarquardt::new(1);
    let outcome = fit_curve_with(&curve, &FitConfig::default(), &solver);
    assert_eq!(
        outcome,
        FitOutcome::Rejected {
            reason: RejectReason::FitDivergence(DivergenceCause::IterationLimit)
        }
    );
}

#[test]
fn test_seed_is_clamped_into_bounds() {
    struct SeedCheck;
    impl DecaySolver for SeedCheck {
        fn solve(
            &self,
            _curve: &PixelSignalCurve<'_>,
            initial: DecayParams,
            bounds: DecayBounds,
        ) -> Result<DecayFit, DivergenceCause> {
            assert_eq!(initial.t2, bounds.t2_max);
            assert_eq!(initial.s0, 819.0);
            Ok(DecayFit {
                params: initial,
                iterations: 0,
            })
        }
    }

    let curve = PixelSignalCurve::new(&ECHO_TIMES, synthetic_curve(1000.0, 50.0));
    let config = FitConfig {
        t2_init: 1000.0,
        ..FitConfig::default()
    };
    assert!(fit_curve_with(&curve, &config, &SeedCheck).is_converged());
}
