use nalgebra::{Matrix2, Vector2};

use crate::consts::{
    SOLVER_FTOL, SOLVER_GTOL, SOLVER_INITIAL_DAMPING, SOLVER_MAX_DAMPING, SOLVER_XTOL,
};
use crate::frame::PixelSignalCurve;

use super::{DecayBounds, DecayFit, DecayParams, DecaySolver, DivergenceCause};

/// Projected Levenberg-Marquardt for `S0 * exp(-TE / T2)`.
///
/// Each trial step solves the Marquardt-damped 2x2 normal equations over the
/// free parameters and is projected back into the box. A parameter sitting on
/// a bound whose gradient points out of the box is held fixed. When that
/// parameter is T2, S0 is set to its closed-form least-squares value for the
/// pinned T2. A step is accepted only if it lowers the residual sum of squares.
#[derive(Clone, Copy, Debug)]
pub struct LevenbergMarquardt {
    pub max_iterations: usize,
}

impl LevenbergMarquardt {
    pub fn new(max_iterations: usize) -> Self {
        Self { max_iterations }
    }
}

impl DecaySolver for LevenbergMarquardt {
    fn solve(
        &self,
        curve: &PixelSignalCurve<'_>,
        initial: DecayParams,
        bounds: DecayBounds,
    ) -> Result<DecayFit, DivergenceCause> {
        if !bounds.is_feasible() {
            return Err(DivergenceCause::InfeasibleBounds);
        }
        let te = curve.echo_times();
        let y = curve.intensities();

        let mut p = to_vector(bounds.project(initial));
        let mut cost = sum_of_squares(te, y, &p).ok_or(DivergenceCause::NonFinite)?;
        let mut lambda = SOLVER_INITIAL_DAMPING;
        // Residuals below this are rounding noise and carry no gradient direction.
        let floor = f64::EPSILON * y.iter().map(|v| v * v).sum::<f64>();

        for iteration in 1..=self.max_iterations {
            let (jtj, jtr) = normal_equations(te, y, &p).ok_or(DivergenceCause::NonFinite)?;
            let free = free_parameters(&p, &jtr, bounds);

            if !free[1] {
                // T2 pinned: the model is linear in S0.
                let s0 = best_amplitude(te, y, p[1]).ok_or(DivergenceCause::NonFinite)?;
                let candidate = Vector2::new(s0, p[1]);
                let moved = (candidate - p).norm();
                p = candidate;
                cost = sum_of_squares(te, y, &p).ok_or(DivergenceCause::NonFinite)?;
                if moved <= SOLVER_XTOL * (p.norm() + SOLVER_XTOL) {
                    return Ok(finish(&p, iteration));
                }
                continue;
            }
            if !free[0] {
                // S0 pinned at zero: the model vanishes and T2 has no gradient.
                return Ok(finish(&p, iteration));
            }

            let mut damped = jtj;
            damped[(0, 0)] += lambda * jtj[(0, 0)];
            damped[(1, 1)] += lambda * jtj[(1, 1)];

            let step = damped
                .lu()
                .solve(&(-jtr))
                .ok_or(DivergenceCause::SingularSystem)?;
            if !step[0].is_finite() || !step[1].is_finite() {
                return Err(DivergenceCause::NonFinite);
            }

            let candidate = to_vector(bounds.project(to_params(&(p + step))));
            let moved = (candidate - p).norm();
            if moved <= SOLVER_XTOL * (p.norm() + SOLVER_XTOL) {
                return stationary_or(&p, &jtj, &jtr, cost, floor, iteration);
            }

            match sum_of_squares(te, y, &candidate) {
                Some(new_cost) if new_cost < cost => {
                    let reduction = cost - new_cost;
                    let previous = cost;
                    p = candidate;
                    cost = new_cost;
                    lambda = (lambda / 10.0).max(f64::EPSILON);
                    if reduction <= SOLVER_FTOL * previous {
                        return Ok(finish(&p, iteration));
                    }
                }
                _ => {
                    lambda *= 10.0;
                    if lambda > SOLVER_MAX_DAMPING {
                        return stationary_or(&p, &jtj, &jtr, cost, floor, iteration);
                    }
                }
            }
        }

        Err(DivergenceCause::IterationLimit)
    }
}

/// `[s0_free, t2_free]`: a parameter is held when it sits on a bound and
/// descent would push it outside.
fn free_parameters(p: &Vector2<f64>, jtr: &Vector2<f64>, bounds: DecayBounds) -> [bool; 2] {
    let s0_held = p[0] <= 0.0 && jtr[0] > 0.0;
    let t2_held = (p[1] <= bounds.t2_min && jtr[1] > 0.0) || (p[1] >= bounds.t2_max && jtr[1] < 0.0);
    [!s0_held, !t2_held]
}

/// Least-squares S0 for a fixed T2, clamped at zero.
fn best_amplitude(te: &[f64], y: &[f64], t2: f64) -> Option<f64> {
    let (num, den) = te.iter().zip(y).fold((0.0, 0.0), |(num, den), (&t, &yi)| {
        let e = (-t / t2).exp();
        (num + yi * e, den + e * e)
    });
    let s0 = (num / den).max(0.0);
    (den > 0.0 && s0.is_finite()).then_some(s0)
}

/// Whether the gradient at `p` vanishes: the cost is at or below `floor`, or
/// the cosine between the residual and every Jacobian column is below
/// `SOLVER_GTOL`.
fn is_stationary(jtj: &Matrix2<f64>, jtr: &Vector2<f64>, cost: f64, floor: f64) -> bool {
    if cost <= floor.max(f64::MIN_POSITIVE) {
        return true;
    }
    (0..2).all(|i| {
        let scale = (jtj[(i, i)] * cost).sqrt();
        scale <= 0.0 || jtr[i].abs() <= SOLVER_GTOL * scale
    })
}

/// Accept `p` when no further step is possible, but only at a stationary point.
fn stationary_or(
    p: &Vector2<f64>,
    jtj: &Matrix2<f64>,
    jtr: &Vector2<f64>,
    cost: f64,
    floor: f64,
    iteration: usize,
) -> Result<DecayFit, DivergenceCause> {
    if is_stationary(jtj, jtr, cost, floor) {
        Ok(finish(p, iteration))
    } else {
        Err(DivergenceCause::Stalled)
    }
}

fn to_vector(params: DecayParams) -> Vector2<f64> {
    Vector2::new(params.s0, params.t2)
}

fn to_params(v: &Vector2<f64>) -> DecayParams {
    DecayParams { s0: v[0], t2: v[1] }
}

fn finish(p: &Vector2<f64>, iterations: usize) -> DecayFit {
    DecayFit {
        params: to_params(p),
        iterations,
    }
}

fn sum_of_squares(te: &[f64], y: &[f64], p: &Vector2<f64>) -> Option<f64> {
    let (s0, t2) = (p[0], p[1]);
    let cost: f64 = te
        .iter()
        .zip(y)
        .map(|(&t, &yi)| {
            let r = s0 * (-t / t2).exp() - yi;
            r * r
        })
        .sum();
    cost.is_finite().then_some(cost)
}

/// Jacobian products `(J^T J, J^T r)` at `p`.
fn normal_equations(te: &[f64], y: &[f64], p: &Vector2<f64>) -> Option<(Matrix2<f64>, Vector2<f64>)> {
    let (s0, t2) = (p[0], p[1]);
    let mut jtj = Matrix2::<f64>::zeros();
    let mut jtr = Vector2::<f64>::zeros();

    for (&t, &yi) in te.iter().zip(y) {
        let e = (-t / t2).exp();
        let r = s0 * e - yi;
        // d/dS0 and d/dT2 of the model.
        let j = Vector2::new(e, s0 * e * t / (t2 * t2));
        jtj += j * j.transpose();
        jtr += j * r;
    }

    let finite = jtj.iter().chain(jtr.iter()).all(|v| v.is_finite());
    finite.then_some((jtj, jtr))
}
