//! Robust line fitting on a single point set.
//!
//! The primitives here are pure functions of `(PointSet, mask, params)`:
//!
//! - `initial_fit` / `refit` run the orthogonal-distance solver
//! - `weighted_rms` is the reported statistic and the clipping unit
//! - `sigma_clip` rebuilds the inclusion mask from scratch
//! - `toggle_point` is the manual override used by interactive review
//!
//! `FitState` bundles their results for one pair; `FitChain` decides when
//! each primitive runs.

use crate::domain::FitParams;
use crate::error::{CalibError, LineFitError};
use crate::fit::pointset::PointSet;
use crate::math::{OdrOptions, fit_line_odr, orthogonal_distance, point_weight};

/// How `sigma_clip` decides which points to keep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Clip {
    /// Keep every point (the un-clipped zeroth pass).
    KeepAll,
    /// Exclude points farther than `factor · rms` from the line.
    Sigma(f64),
}

impl Clip {
    /// Map a numeric sigma factor, where `-1` means "no rejection".
    pub fn from_factor(factor: f64) -> Self {
        if factor == -1.0 {
            Clip::KeepAll
        } else {
            Clip::Sigma(factor)
        }
    }
}

/// Mutable fit state of one pair.
#[derive(Debug, Clone, PartialEq)]
pub struct FitState {
    pub params: FitParams,
    /// One flag per point, `true` = kept.
    pub mask: Vec<bool>,
    pub rms: f64,
    /// Number of kept points.
    pub n: usize,
    /// Advances on every refit/clip step or manual toggle.
    pub iteration: usize,
}

impl FitState {
    /// State before any fit: every point kept, no line yet.
    pub fn unfit(len: usize) -> Self {
        Self {
            params: FitParams::default(),
            mask: vec![true; len],
            rms: f64::NAN,
            n: len,
            iteration: 0,
        }
    }

    /// Initial fit followed by the un-clipped zeroth pass.
    pub fn zeroth_pass(points: &PointSet, opts: &OdrOptions) -> Result<Self, LineFitError> {
        let params = initial_fit(points, opts)?;
        let mask = sigma_clip(points, params, f64::NAN, Clip::KeepAll);
        let rms = weighted_rms(points, &mask, params);
        let n = count_kept(&mask);
        Ok(Self {
            params,
            mask,
            rms,
            n,
            iteration: 0,
        })
    }
}

/// Fit all points twice: once from `(0, 0)`, then seeded with that result.
pub fn initial_fit(points: &PointSet, opts: &OdrOptions) -> Result<FitParams, LineFitError> {
    let all = vec![true; points.len()];
    let first = refit(points, &all, FitParams::default(), opts)?;
    refit(points, &all, first, opts)
}

/// Re-run the orthogonal regression on the kept points, starting at `seed`.
pub fn refit(
    points: &PointSet,
    mask: &[bool],
    seed: FitParams,
    opts: &OdrOptions,
) -> Result<FitParams, LineFitError> {
    let kept = points.select(mask);
    let solution = fit_line_odr(&kept.x, &kept.y, &kept.err_x, &kept.err_y, seed, opts)?;
    Ok(solution.params)
}

/// Weighted RMS of orthogonal distances over the kept points.
///
/// `sqrt(Σ w·d² / Σ w)` with `w = 1 / sqrt(err_x² + err_y²)`. Zero when no
/// point is kept.
pub fn weighted_rms(points: &PointSet, mask: &[bool], params: FitParams) -> f64 {
    let mut sum_wd2 = 0.0;
    let mut sum_w = 0.0;
    for i in (0..points.len()).filter(|&i| mask[i]) {
        let d = orthogonal_distance(params, points.x()[i], points.y()[i]);
        let w = point_weight(points.err_x()[i], points.err_y()[i]);
        sum_wd2 += w * d * d;
        sum_w += w;
    }
    if sum_w > 0.0 { (sum_wd2 / sum_w).sqrt() } else { 0.0 }
}

/// Rebuild the inclusion mask against the line `params`.
///
/// Every point is reconsidered, so a point rejected earlier comes back once
/// the line moves close enough to it.
pub fn sigma_clip(points: &PointSet, params: FitParams, rms: f64, clip: Clip) -> Vec<bool> {
    match clip {
        Clip::KeepAll => vec![true; points.len()],
        Clip::Sigma(factor) => {
            let limit = factor * rms;
            points
                .x()
                .iter()
                .zip(points.y())
                .map(|(&x, &y)| orthogonal_distance(params, x, y) <= limit)
                .collect()
        }
    }
}

/// Flip the inclusion flag of one point.
pub fn toggle_point(points: &PointSet, mask: &[bool], index: usize) -> Result<Vec<bool>, CalibError> {
    if index >= mask.len() {
        return Err(CalibError::InvalidMaskOperation {
            pair: points.label().to_string(),
            reason: format!("point index {index} out of range (0..{})", mask.len()),
        });
    }
    let mut out = mask.to_vec();
    out[index] = !out[index];
    Ok(out)
}

pub fn count_kept(mask: &[bool]) -> usize {
    mask.iter().filter(|&&k| k).count()
}
