//! Levenberg–Marquardt for `y = a·exp(-b·x) + c`.
//!
//! The model is linear in `a` and `c`: for a fixed decay rate the best
//! amplitude and offset follow from a 2×2 weighted solve, leaving a
//! one-dimensional chi-square curve in `b`. The solver walks that curve
//! before iterating on all three parameters:
//!
//! 1. scan it on a log grid spanning [`SCAN_DECADES`] decades either side of
//!    the guessed rate;
//! 2. narrow the best grid cell with a golden-section search;
//! 3. polish `(a, b, c)` with damped Gauss–Newton steps
//!
//! ```text
//! (JᵀJ + λ·diag(JᵀJ)) δ = Jᵀr
//! ```
//!
//! on weighted residuals `r_i = (y_i - f(x_i)) / sigma_i`. A step is kept
//! when chi-square does not grow (λ relaxes), otherwise λ stiffens.
//!
//! Golden-section and LM iterations, rejected steps included, share the
//! `max_iterations` budget. A best rate on the edge of the scan, or a fitted
//! `b` the data barely constrains, is a `Convergence` error.

use nalgebra::{Matrix2, Matrix3, Vector2, Vector3};

use super::{FitParams, Solution, WeightedPoints};
use crate::config::FitOptions;
use crate::error::{AttenuationError, Result};

const INITIAL_LAMBDA: f64 = 1e-3;
const LAMBDA_SCALE: f64 = 10.0;
const MIN_LAMBDA: f64 = 1e-12;
const MAX_LAMBDA: f64 = 1e16;
/// Keeps the damping term alive for parameters with vanishing curvature.
const MIN_DIAGONAL: f64 = 1e-12;

const SCAN_DECADES: i32 = 5;
const SCAN_STEPS_PER_DECADE: i32 = 20;
/// Golden-section shrink factor, 1/φ.
const INV_PHI: f64 = 0.618_033_988_749_894_9;
/// Projected normal matrix counts as singular below this relative determinant.
const DETERMINANT_EPSILON: f64 = 1e-12;
/// A unit change of `ln b` must move the weighted model by at least this
/// many standard deviations.
const MIN_DECAY_SENSITIVITY: f64 = 1.0;

fn to_params(p: &Vector3<f64>) -> FitParams {
    FitParams::Exponential {
        amplitude: p[0],
        decay: p[1],
        offset: p[2],
    }
}

/// `JᵀJ` and `Jᵀr` for the weighted problem at `p`.
fn normal_equations(points: &WeightedPoints, p: &Vector3<f64>) -> (Matrix3<f64>, Vector3<f64>) {
    let (a, b, c) = (p[0], p[1], p[2]);
    let mut jtj = Matrix3::zeros();
    let mut jtr = Vector3::zeros();
    for (x, y, sigma) in points.iter() {
        let e = (-b * x).exp();
        let residual = (y - (a * e + c)) / sigma;
        // df/da, df/db, df/dc, scaled by 1/sigma
        let row = Vector3::new(e, -a * x * e, 1.0) / sigma;
        jtj += row * row.transpose();
        jtr += row * residual;
    }
    (jtj, jtr)
}

pub(super) fn solve(points: &WeightedPoints, options: &FitOptions) -> Result<Solution> {
    let guess = Vector3::from(options.initial_guess);
    if !points.chi_square(&to_params(&guess)).is_finite() {
        return Err(AttenuationError::Convergence {
            iterations: 0,
            reason: format!("initial guess {:?} gives non-finite residuals", options.initial_guess),
        });
    }
    let b0 = guess[1];
    if !b0.is_finite() || b0 <= 0.0 {
        return Err(AttenuationError::Convergence {
            iterations: 0,
            reason: format!("initial decay rate {b0} is not positive"),
        });
    }

    let (lo, hi) = scan(points, b0.ln())?;
    let (ln_b, mut iterations) = golden_section(points, lo, hi, options)?;
    let (p, chi2) = project(points, ln_b.exp()).ok_or_else(|| AttenuationError::Convergence {
        iterations,
        reason: format!("decay rate {:.4e} leaves amplitude and offset undetermined", ln_b.exp()),
    })?;
    log::trace!("projected decay rate {:.6e} after {iterations} iterations, chi2={chi2:.4e}", p[1]);

    let solution = polish(points, p, chi2, &mut iterations, options)?;
    check_sensitivity(points, &solution, iterations)?;
    Ok(solution)
}

// ---------------------------------------------------------------------------
// Variable projection: chi-square as a function of b alone
// ---------------------------------------------------------------------------

/// Best `(a, b, c)` for the fixed decay rate `b`, with its chi-square.
/// `None` when `exp(-b·x)` cannot be told apart from the constant column.
fn project(points: &WeightedPoints, b: f64) -> Option<(Vector3<f64>, f64)> {
    let mut normal = Matrix2::zeros();
    let mut rhs = Vector2::zeros();
    for (x, y, sigma) in points.iter() {
        let row = Vector2::new((-b * x).exp(), 1.0) / sigma;
        normal += row * row.transpose();
        rhs += row * (y / sigma);
    }

    let det = normal.determinant();
    if det.is_nan() || det <= DETERMINANT_EPSILON * normal[(0, 0)] * normal[(1, 1)] {
        return None;
    }
    let ac = normal.lu().solve(&rhs)?;
    let p = Vector3::new(ac[0], b, ac[1]);
    let chi2 = points.chi_square(&to_params(&p));
    chi2.is_finite().then_some((p, chi2))
}

fn projected_chi_square(points: &WeightedPoints, ln_b: f64) -> f64 {
    project(points, ln_b.exp()).map_or(f64::INFINITY, |(_, chi2)| chi2)
}

/// Bracket `[ln b - h, ln b + h]` around the lowest grid point.
fn scan(points: &WeightedPoints, ln_b0: f64) -> Result<(f64, f64)> {
    let half_width = SCAN_DECADES * SCAN_STEPS_PER_DECADE;
    let h = std::f64::consts::LN_10 / f64::from(SCAN_STEPS_PER_DECADE);

    let mut best: Option<(i32, f64)> = None;
    for k in -half_width..=half_width {
        let chi2 = projected_chi_square(points, ln_b0 + f64::from(k) * h);
        if chi2.is_finite() && best.map_or(true, |(_, lowest)| chi2 < lowest) {
            best = Some((k, chi2));
        }
    }

    match best {
        None => Err(AttenuationError::Convergence {
            iterations: 0,
            reason: "no decay rate gives finite residuals".to_string(),
        }),
        Some((k, chi2)) if k.abs() == half_width => Err(AttenuationError::Convergence {
            iterations: 0,
            reason: format!(
                "chi-square {chi2:.4e} is lowest at the edge of the scanned decay rates \
                 [{:.1e}, {:.1e}]",
                (ln_b0 - f64::from(half_width) * h).exp(),
                (ln_b0 + f64::from(half_width) * h).exp()
            ),
        }),
        Some((k, _)) => {
            let centre = ln_b0 + f64::from(k) * h;
            Ok((centre - h, centre + h))
        }
    }
}

/// Minimize the projected chi-square over `ln b` in `[lo, hi]` down to a
/// bracket of `sqrt(tolerance)`. Returns the best `ln b` and the
/// iterations spent.
fn golden_section(
    points: &WeightedPoints,
    mut lo: f64,
    mut hi: f64,
    options: &FitOptions,
) -> Result<(f64, usize)> {
    let width = options.tolerance.sqrt();
    let mut x1 = hi - INV_PHI * (hi - lo);
    let mut x2 = lo + INV_PHI * (hi - lo);
    let mut f1 = projected_chi_square(points, x1);
    let mut f2 = projected_chi_square(points, x2);

    let mut iterations = 0;
    while hi - lo > width {
        if iterations >= options.max_iterations {
            return Err(budget_spent(options.max_iterations, f1.min(f2)));
        }
        iterations += 1;
        if f1 <= f2 {
            hi = x2;
            x2 = x1;
            f2 = f1;
            x1 = hi - INV_PHI * (hi - lo);
            f1 = projected_chi_square(points, x1);
        } else {
            lo = x1;
            x1 = x2;
            f1 = f2;
            x2 = lo + INV_PHI * (hi - lo);
            f2 = projected_chi_square(points, x2);
        }
    }
    Ok((if f1 <= f2 { x1 } else { x2 }, iterations))
}

// ---------------------------------------------------------------------------
// Levenberg–Marquardt on all three parameters
// ---------------------------------------------------------------------------

fn polish(
    points: &WeightedPoints,
    mut p: Vector3<f64>,
    mut chi2: f64,
    iterations: &mut usize,
    options: &FitOptions,
) -> Result<Solution> {
    let tol = options.tolerance;
    let mut lambda = INITIAL_LAMBDA;

    loop {
        if *iterations >= options.max_iterations {
            return Err(budget_spent(options.max_iterations, chi2));
        }
        *iterations += 1;

        let (jtj, jtr) = normal_equations(points, &p);
        let mut damped = jtj;
        for j in 0..3 {
            damped[(j, j)] += lambda * jtj[(j, j)].max(MIN_DIAGONAL);
        }

        let step = damped.lu().solve(&jtr);
        let Some(step) = step.filter(|s| s.iter().all(|v| v.is_finite())) else {
            lambda *= LAMBDA_SCALE;
            if lambda > MAX_LAMBDA {
                return Err(damping_exhausted(*iterations, chi2));
            }
            continue;
        };

        let small_step = step.norm() <= tol * (p.norm() + tol);
        let trial = p + step;
        let trial_chi2 = points.chi_square(&to_params(&trial));

        if trial_chi2.is_finite() && trial_chi2 <= chi2 {
            let improvement = chi2 - trial_chi2;
            p = trial;
            chi2 = trial_chi2;
            lambda = (lambda / LAMBDA_SCALE).max(MIN_LAMBDA);

            if small_step || improvement <= tol * chi2 || chi2 <= f64::MIN_POSITIVE {
                log::debug!("exponential fit converged after {iterations} iterations, chi2={chi2:.4e}");
                break;
            }
        } else {
            // No downhill step left at the current resolution: we sit on the minimum.
            if small_step {
                log::debug!("exponential fit settled after {iterations} iterations, chi2={chi2:.4e}");
                break;
            }
            lambda *= LAMBDA_SCALE;
            if lambda > MAX_LAMBDA {
                return Err(damping_exhausted(*iterations, chi2));
            }
        }
    }

    Ok(Solution {
        params: to_params(&p),
        iterations: *iterations,
        chi_square: chi2,
    })
}

/// Reject a fit whose decay rate the data cannot pin down, such as `b`
/// driven so high that `exp(-b·x)` vanishes past the first point, or a
/// flat table with no decay at all.
fn check_sensitivity(points: &WeightedPoints, solution: &Solution, iterations: usize) -> Result<()> {
    let values = solution.params.values();
    let p = Vector3::new(values[0], values[1], values[2]);
    let (jtj, _) = normal_equations(points, &p);
    let sensitivity = p[1].abs() * jtj[(1, 1)].sqrt();
    if sensitivity.is_nan() || sensitivity < MIN_DECAY_SENSITIVITY {
        return Err(AttenuationError::Convergence {
            iterations,
            reason: format!(
                "decay rate {:.4e} is not constrained by the data (sensitivity {sensitivity:.3e})",
                p[1]
            ),
        });
    }
    Ok(())
}

fn budget_spent(iterations: usize, chi2: f64) -> AttenuationError {
    AttenuationError::Convergence {
        iterations,
        reason: format!("iteration budget spent with chi-square {chi2:.4e} still decreasing"),
    }
}

fn damping_exhausted(iterations: usize, chi2: f64) -> AttenuationError {
    AttenuationError::Convergence {
        iterations,
        reason: format!("no step reduces chi-square {chi2:.4e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const LEAD_THICKNESSES: [f64; 9] = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 8.0, 10.01];

    fn synthetic(xs: &[f64], f: impl Fn(f64) -> f64, sigma_floor: f64) -> WeightedPoints {
        let y: Vec<f64> = xs.iter().map(|&x| f(x)).collect();
        WeightedPoints {
            x: xs.to_vec(),
            sigma: y.iter().map(|v| v.sqrt().max(sigma_floor)).collect(),
            y,
        }
    }

    /// Integer counts shifted by a fixed pattern of `k·sqrt(y)` offsets.
    fn noisy_counts(xs: &[f64], f: impl Fn(f64) -> f64) -> WeightedPoints {
        const PULLS: [f64; 9] = [0.8, -1.1, 0.3, -0.5, 1.4, -0.9, 0.2, -1.3, 0.6];
        let y: Vec<f64> = xs
            .iter()
            .zip(PULLS)
            .map(|(&x, pull)| {
                let expected = f(x);
                (expected + pull * expected.sqrt()).round()
            })
            .collect();
        WeightedPoints {
            x: xs.to_vec(),
            sigma: y.iter().map(|v| v.sqrt().max(1.0)).collect(),
            y,
        }
    }

    fn unpack(params: FitParams) -> (f64, f64, f64) {
        match params {
            FitParams::Exponential {
                amplitude,
                decay,
                offset,
            } => (amplitude, decay, offset),
            other => panic!("unexpected params {other:?}"),
        }
    }

    #[test]
    fn recovers_noise_free_decay_from_default_guess() {
        let xs: Vec<f64> = (0..=10).map(|x| x as f64).collect();
        let points = synthetic(&xs, |x| 1000.0 * (-0.5 * x).exp() + 10.0, 1.0);

        let solution = solve(&points, &FitOptions::default()).unwrap();
        let (a, b, c) = unpack(solution.params);
        assert_relative_eq!(a, 1000.0, max_relative = 1e-4);
        assert_relative_eq!(b, 0.5, max_relative = 1e-4);
        assert_relative_eq!(c, 10.0, epsilon = 1e-2);
        assert!(solution.iterations <= FitOptions::default().max_iterations);
    }

    #[test]
    fn recovers_steep_lead_like_decay() {
        let points = synthetic(&LEAD_THICKNESSES, |x| 49_500.0 * (-0.46 * x).exp() + 120.0, 1.0);

        let solution = solve(&points, &FitOptions::default()).unwrap();
        let (a, b, c) = unpack(solution.params);
        assert_relative_eq!(a, 49_500.0, max_relative = 1e-3);
        assert_relative_eq!(b, 0.46, max_relative = 1e-3);
        assert_relative_eq!(c, 120.0, epsilon = 1.0);
    }

    #[test]
    fn recovers_slow_decays_from_default_guess() {
        for mu in [0.023_f64, 0.073, 0.12, 0.17] {
            let points =
                synthetic(&LEAD_THICKNESSES, |x| (50_000.0 * (-mu * x).exp() + 150.0).round(), 1.0);

            let solution = solve(&points, &FitOptions::default())
                .unwrap_or_else(|e| panic!("mu = {mu}: {e}"));
            let (a, b, _) = unpack(solution.params);
            assert_relative_eq!(b, mu, max_relative = 5e-3);
            assert_relative_eq!(a, 50_000.0, max_relative = 5e-3);
        }
    }

    #[test]
    fn noisy_counts_stay_near_the_true_rate() {
        for mu in [0.12_f64, 0.17, 0.46] {
            let points = noisy_counts(&LEAD_THICKNESSES, |x| 50_000.0 * (-mu * x).exp() + 150.0);

            let solution = solve(&points, &FitOptions::default()).unwrap();
            let (_, b, _) = unpack(solution.params);
            assert_relative_eq!(b, mu, max_relative = 0.03);
            // Residuals of one sigma per point, so chi-square per point is O(1).
            assert!(solution.chi_square < 3.0 * LEAD_THICKNESSES.len() as f64);
        }
    }

    #[test]
    fn far_off_decay_guess_still_finds_the_minimum() {
        let xs: Vec<f64> = (0..=10).map(|x| x as f64).collect();
        let points = synthetic(&xs, |x| 1000.0 * (-0.5 * x).exp() + 10.0, 1.0);
        let options = FitOptions {
            initial_guess: [1000.0, 1000.0, 0.0],
            ..FitOptions::default()
        };

        let (_, b, c) = unpack(solve(&points, &options).unwrap().params);
        assert_relative_eq!(b, 0.5, max_relative = 1e-4);
        assert_relative_eq!(c, 10.0, epsilon = 1e-2);
    }

    #[test]
    fn flat_table_has_no_decay_rate() {
        let points = synthetic(&LEAD_THICKNESSES, |_| 4000.0, 1.0);
        let err = solve(&points, &FitOptions::default()).unwrap_err();
        assert!(matches!(err, AttenuationError::Convergence { .. }));
    }

    #[test]
    fn rising_counts_are_not_fitted_as_decay() {
        let points = synthetic(&LEAD_THICKNESSES, |x| 1000.0 + 100.0 * x, 1.0);
        let err = solve(&points, &FitOptions::default()).unwrap_err();
        assert!(matches!(err, AttenuationError::Convergence { iterations: 0, .. }));
    }

    #[test]
    fn overflowing_guess_is_reported_not_returned() {
        let xs: Vec<f64> = (0..=10).map(|x| x as f64).collect();
        let points = synthetic(&xs, |x| 1000.0 * (-0.5 * x).exp(), 1.0);
        let options = FitOptions {
            initial_guess: [1000.0, -200.0, 0.0],
            ..FitOptions::default()
        };

        let err = solve(&points, &options).unwrap_err();
        assert!(matches!(err, AttenuationError::Convergence { iterations: 0, .. }));
    }

    #[test]
    fn exhausted_budget_is_a_convergence_error() {
        let points = synthetic(&LEAD_THICKNESSES, |x| 49_500.0 * (-0.46 * x).exp() + 120.0, 1.0);
        let options = FitOptions {
            max_iterations: 1,
            ..FitOptions::default()
        };

        let err = solve(&points, &options).unwrap_err();
        assert!(matches!(err, AttenuationError::Convergence { iterations: 1, .. }));
    }
}
