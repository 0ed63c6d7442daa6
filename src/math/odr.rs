//! Weighted orthogonal-distance regression for a straight line.
//!
//! Both coordinates carry their own error, so we minimize the total weighted
//! squared distance of every point to its projection on the line:
//!
//! ```text
//! minimize Σ [ (y_i - a (x_i + δ_i) - b)² / σy_i² + δ_i² / σx_i² ]
//! ```
//!
//! over `(a, b)` and the per-point shifts `δ_i`. For a linear model the optimal
//! `δ_i` has a closed form, and substituting it back leaves the
//! effective-variance objective in `(a, b)` alone:
//!
//! ```text
//! S(a, b) = Σ r_i² / v_i,   r_i = y_i - a x_i - b,   v_i = σy_i² + a² σx_i²
//! ```
//!
//! For a fixed slope the weights `1 / v_i` are fixed too, so the best
//! intercept is their weighted mean of `y_i - a x_i`. That leaves a 1-D
//! problem in `a`: we bracket its minimum starting from the seed slope,
//! narrow the bracket by golden-section search, then polish `(a, b)` with a
//! few Gauss–Newton steps on a 2×2 system solved by nalgebra. The search
//! shrinks the bracket by a fixed ratio per evaluation, so its cost does not
//! depend on how large the residuals are.

use nalgebra::{Matrix2, Vector2};

use crate::domain::FitParams;
use crate::error::LineFitError;

const GOLDEN_GROW: f64 = 1.618_033_988_749_895;
const GOLDEN_SPLIT: f64 = 0.381_966_011_250_105;

/// Solver budget and tolerances.
#[derive(Debug, Clone)]
pub struct OdrOptions {
    /// Hard cap on objective evaluations during the slope search.
    pub max_iterations: usize,
    /// Relative width of the slope bracket at which the search stops.
    pub param_tol: f64,
    /// First bracketing step, relative to `1 + |seed slope|`.
    pub initial_step: f64,
    /// Gauss–Newton steps tried after the search.
    pub polish_steps: usize,
}

impl Default for OdrOptions {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            param_tol: 1e-10,
            initial_step: 0.1,
            polish_steps: 8,
        }
    }
}

/// Converged line and the value of the objective at it.
#[derive(Debug, Clone, Copy)]
pub struct OdrSolution {
    pub params: FitParams,
    pub chi2: f64,
}

/// Fit `y = a·x + b` to the given points, starting from `seed`.
///
/// All slices must have the same length; they hold only the points that take
/// part in the fit.
pub fn fit_line_odr(
    x: &[f64],
    y: &[f64],
    err_x: &[f64],
    err_y: &[f64],
    seed: FitParams,
    opts: &OdrOptions,
) -> Result<OdrSolution, LineFitError> {
    let n = x.len();
    debug_assert!(y.len() == n && err_x.len() == n && err_y.len() == n);
    if n < 2 {
        return Err(LineFitError::NotEnoughPoints(n));
    }

    let mut search = SlopeSearch {
        x,
        y,
        err_x,
        err_y,
        evaluations: 0,
        budget: opts.max_iterations,
    };

    let a0 = if seed.a.is_finite() { seed.a } else { 0.0 };
    let (end1, mid, end2) = search.bracket(a0, opts.initial_step * (1.0 + a0.abs()))?;
    let a = search.golden(end1, mid, end2, opts.param_tol)?;

    let mut params = FitParams::new(a, profile_intercept(x, y, err_x, err_y, a));
    let mut chi2 = objective(x, y, err_x, err_y, params);
    if !chi2.is_finite() {
        return Err(LineFitError::NonFinite);
    }

    for _ in 0..opts.polish_steps {
        let (jtj, jtf) = normal_equations(x, y, err_x, err_y, params);
        let Some(delta) = jtj.lu().solve(&(-jtf)) else {
            break;
        };
        let candidate = FitParams::new(params.a + delta[0], params.b + delta[1]);
        let new_chi2 = objective(x, y, err_x, err_y, candidate);
        if !(new_chi2.is_finite() && new_chi2 <= chi2) {
            break;
        }
        params = candidate;
        let settled = chi2 - new_chi2 <= f64::EPSILON * chi2;
        chi2 = new_chi2;
        if settled {
            break;
        }
    }

    if !params.is_finite() {
        return Err(LineFitError::NonFinite);
    }
    Ok(OdrSolution { params, chi2 })
}

/// `min_b S(a, b)` evaluated under an evaluation budget.
struct SlopeSearch<'a> {
    x: &'a [f64],
    y: &'a [f64],
    err_x: &'a [f64],
    err_y: &'a [f64],
    evaluations: usize,
    budget: usize,
}

impl SlopeSearch<'_> {
    fn eval(&mut self, a: f64) -> Result<f64, LineFitError> {
        if self.evaluations >= self.budget {
            return Err(LineFitError::NoConvergence {
                iterations: self.budget,
            });
        }
        if !a.is_finite() {
            return Err(LineFitError::NonFinite);
        }
        self.evaluations += 1;

        let b = profile_intercept(self.x, self.y, self.err_x, self.err_y, a);
        let s = objective(self.x, self.y, self.err_x, self.err_y, FitParams::new(a, b));
        Ok(if s.is_nan() { f64::INFINITY } else { s })
    }

    /// Walk downhill from `a0` with growing steps until the profile rises.
    ///
    /// Returns both ends and `(mid, f(mid))`, where `mid` lies between the
    /// ends and is no worse than either.
    fn bracket(&mut self, a0: f64, step: f64) -> Result<(f64, (f64, f64), f64), LineFitError> {
        let (mut a, mut fa) = (a0, self.eval(a0)?);
        let (mut b, mut fb) = (a0 + step, self.eval(a0 + step)?);
        if fb > fa {
            std::mem::swap(&mut a, &mut b);
            std::mem::swap(&mut fa, &mut fb);
        }

        let mut c = b + GOLDEN_GROW * (b - a);
        let mut fc = self.eval(c)?;
        while fc < fb {
            (a, b, fb) = (b, c, fc);
            c = b + GOLDEN_GROW * (b - a);
            fc = self.eval(c)?;
        }
        Ok((a, (b, fb), c))
    }

    /// Golden-section search inside a bracket from [`Self::bracket`].
    fn golden(&mut self, end1: f64, mid: (f64, f64), end2: f64, tol: f64) -> Result<f64, LineFitError> {
        let (mut lo, mut hi) = if end1 < end2 { (end1, end2) } else { (end2, end1) };
        let (mut m, mut fm) = mid;

        while hi - lo > tol * (1.0 + m.abs()) {
            let trial = if m - lo > hi - m {
                m - GOLDEN_SPLIT * (m - lo)
            } else {
                m + GOLDEN_SPLIT * (hi - m)
            };
            let ft = self.eval(trial)?;
            if ft < fm {
                if trial < m {
                    hi = m;
                } else {
                    lo = m;
                }
                (m, fm) = (trial, ft);
            } else if trial < m {
                lo = trial;
            } else {
                hi = trial;
            }
        }
        Ok(m)
    }
}

/// Best intercept for a fixed slope: weighted mean of `y - a·x` with weights `1 / v_i`.
fn profile_intercept(x: &[f64], y: &[f64], err_x: &[f64], err_y: &[f64], a: f64) -> f64 {
    let mut sw = 0.0;
    let mut swr = 0.0;
    for i in 0..x.len() {
        let w = 1.0 / (err_y[i] * err_y[i] + a * a * err_x[i] * err_x[i]);
        sw += w;
        swr += w * (y[i] - a * x[i]);
    }
    swr / sw
}

/// Effective-variance objective `S(a, b)`.
pub fn objective(x: &[f64], y: &[f64], err_x: &[f64], err_y: &[f64], p: FitParams) -> f64 {
    let mut sum = 0.0;
    for i in 0..x.len() {
        let r = y[i] - p.a * x[i] - p.b;
        let v = err_y[i] * err_y[i] + p.a * p.a * err_x[i] * err_x[i];
        sum += r * r / v;
    }
    sum
}

/// Build `JᵀJ` and `Jᵀf` for the residuals `f_i = r_i / sqrt(v_i)`.
fn normal_equations(
    x: &[f64],
    y: &[f64],
    err_x: &[f64],
    err_y: &[f64],
    p: FitParams,
) -> (Matrix2<f64>, Vector2<f64>) {
    let mut jtj = Matrix2::zeros();
    let mut jtf = Vector2::zeros();

    for i in 0..x.len() {
        let ex2 = err_x[i] * err_x[i];
        let v = err_y[i] * err_y[i] + p.a * p.a * ex2;
        let s = v.sqrt();
        let r = y[i] - p.a * x[i] - p.b;
        let f = r / s;

        // d f / d a = -x/s - r·a·σx² / s³ ;  d f / d b = -1/s
        let j = Vector2::new(-x[i] / s - r * p.a * ex2 / (v * s), -1.0 / s);

        jtj += j * j.transpose();
        jtf += j * f;
    }

    (jtj, jtf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(a: f64, b: f64, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| a * x + b).collect()
    }

    #[test]
    fn recovers_exact_line_from_zero_seed() {
        let x = [-0.5, 0.0, 0.3, 0.8, 1.4, 2.0];
        let y = line(0.12, -0.35, &x);
        let e = [0.01; 6];
        let sol = fit_line_odr(&x, &y, &e, &e, FitParams::default(), &OdrOptions::default()).unwrap();
        assert!((sol.params.a - 0.12).abs() < 1e-8, "a={}", sol.params.a);
        assert!((sol.params.b + 0.35).abs() < 1e-8, "b={}", sol.params.b);
        assert!(sol.chi2 < 1e-12);
    }

    #[test]
    fn two_points_define_the_line() {
        let x = [0.2, 1.2];
        let y = [1.0, 3.0];
        let e = [0.02, 0.05];
        let sol = fit_line_odr(&x, &y, &e, &e, FitParams::default(), &OdrOptions::default()).unwrap();
        assert!((sol.params.a - 2.0).abs() < 1e-7);
        assert!((sol.params.b - 0.6).abs() < 1e-7);
    }

    #[test]
    fn rejects_fewer_than_two_points() {
        let err = fit_line_odr(&[1.0], &[1.0], &[0.1], &[0.1], FitParams::default(), &OdrOptions::default())
            .unwrap_err();
        assert_eq!(err, LineFitError::NotEnoughPoints(1));
    }

    #[test]
    fn iteration_cap_reports_no_convergence() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [0.1, 0.9, 2.2, 2.8];
        let e = [0.1; 4];
        let opts = OdrOptions {
            max_iterations: 1,
            ..OdrOptions::default()
        };
        let err = fit_line_odr(&x, &y, &e, &e, FitParams::new(-5.0, 10.0), &opts).unwrap_err();
        assert_eq!(err, LineFitError::NoConvergence { iterations: 1 });
    }

    #[test]
    fn x_errors_pull_the_slope_toward_orthogonal_fit() {
        // With negligible x errors the solution matches weighted vertical least squares.
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [0.0, 1.3, 1.8, 3.4, 3.9];
        let ey = [0.1; 5];
        let tiny = [1e-9; 5];
        let sol = fit_line_odr(&x, &y, &tiny, &ey, FitParams::default(), &OdrOptions::default()).unwrap();

        let n = x.len() as f64;
        let (sx, sy): (f64, f64) = (x.iter().sum(), y.iter().sum());
        let sxx: f64 = x.iter().map(|v| v * v).sum();
        let sxy: f64 = x.iter().zip(&y).map(|(a, b)| a * b).sum();
        let slope = (n * sxy - sx * sy) / (n * sxx - sx * sx);
        assert!((sol.params.a - slope).abs() < 1e-6);

        // Large x errors on the same data give a different (steeper) answer.
        let ex = [0.5; 5];
        let odr = fit_line_odr(&x, &y, &ex, &ey, FitParams::default(), &OdrOptions::default()).unwrap();
        assert!((odr.params.a - slope).abs() > 1e-4);
    }

    /// Profile minimum located by brute force over a fine slope grid.
    fn grid_minimum(x: &[f64], y: &[f64], ex: &[f64], ey: &[f64]) -> f64 {
        (0..=40_000)
            .map(|k| -1.0 + k as f64 * 5e-5)
            .map(|a| {
                let b = profile_intercept(x, y, ex, ey, a);
                (a, objective(x, y, ex, ey, FitParams::new(a, b)))
            })
            .fold((0.0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
            .0
    }

    #[test]
    fn mixed_errors_with_an_outlier_converge_within_budget() {
        // Thirteen colors over 0..2.1, errors spanning 1e-4..0.08, one point 0.8 mag off.
        let x: Vec<f64> = (0..13).map(|k| k as f64 * 0.175).collect();
        let noise = [0.01, -0.02, 0.005, 0.03, -0.01, 0.0, -0.025, 0.015, 0.02, -0.005, 0.01, -0.03, 0.0];
        let mut y: Vec<f64> = x.iter().zip(noise).map(|(x, e)| -0.21 * x + 0.27 + e).collect();
        y[9] += 0.8;
        let ex = [0.08, 1e-4, 0.03, 0.06, 0.002, 0.08, 0.01, 1e-4, 0.05, 0.07, 0.004, 0.08, 0.02];
        let ey = [1e-4, 0.08, 0.05, 0.002, 0.07, 0.01, 0.08, 0.03, 1e-4, 0.06, 0.08, 0.005, 0.04];

        let sol = fit_line_odr(&x, &y, &ex, &ey, FitParams::default(), &OdrOptions::default()).unwrap();
        let a_grid = grid_minimum(&x, &y, &ex, &ey);
        assert!((sol.params.a - a_grid).abs() < 1e-4, "a={} grid={a_grid}", sol.params.a);

        // Nothing nearby does better.
        for da in [-1e-5, 1e-5] {
            for db in [-1e-5, 0.0, 1e-5] {
                let p = FitParams::new(sol.params.a + da, sol.params.b + db);
                assert!(objective(&x, &y, &ex, &ey, p) >= sol.chi2);
            }
        }
    }

    #[test]
    fn search_cost_does_not_grow_with_residuals() {
        let x = [0.0, 0.3, 0.7, 1.1, 1.6, 2.1];
        let ey = [0.01, 0.08, 0.02, 1e-4, 0.05, 0.03];
        let ex = [0.05, 1e-4, 0.08, 0.02, 0.01, 0.06];
        let opts = OdrOptions {
            max_iterations: 120,
            ..OdrOptions::default()
        };
        for shift in [0.0, 0.8, 5.0] {
            let mut y: Vec<f64> = x.iter().map(|x| 0.1 * x - 0.2).collect();
            y[2] += shift;
            assert!(fit_line_odr(&x, &y, &ex, &ey, FitParams::default(), &opts).is_ok(), "shift {shift}");
        }
    }
}
