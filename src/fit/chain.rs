//! Fit orchestration across all band pairs.
//!
//! Each pair moves through `Unfit → Fitting → Frozen`:
//!
//! - construction runs the initial fit and the un-clipped zeroth pass
//! - batch mode runs exactly `k` refit/clip iterations
//! - interactive mode refits after every manual toggle
//! - `finish` freezes a pair; it is idempotent and any later edit is rejected
//!
//! Pairs never read each other's state, so batch iterations run in parallel.

use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::{CalibConfig, CalibrationResult, Catalog};
use crate::error::{CalibError, LineFitError};
use crate::fit::line_fit::{Clip, FitState, count_kept, refit, sigma_clip, toggle_point, weighted_rms};
use crate::fit::pointset::{PointSet, build_point_sets};
use crate::math::OdrOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairPhase {
    Unfit,
    Fitting,
    Frozen,
}

/// One equation: its points, its fit state, and where it is in its lifecycle.
#[derive(Debug, Clone)]
pub struct PairFit {
    points: PointSet,
    state: FitState,
    phase: PairPhase,
}

impl PairFit {
    fn unfit(points: PointSet) -> Self {
        let state = FitState::unfit(points.len());
        Self {
            points,
            state,
            phase: PairPhase::Unfit,
        }
    }

    pub fn points(&self) -> &PointSet {
        &self.points
    }

    pub fn state(&self) -> &FitState {
        &self.state
    }

    pub fn phase(&self) -> PairPhase {
        self.phase
    }

    pub fn is_frozen(&self) -> bool {
        self.phase == PairPhase::Frozen
    }

    pub fn name(&self) -> String {
        self.points.label().to_string()
    }

    /// Snapshot of a frozen pair; `None` while it is still being fitted.
    pub fn result(&self) -> Option<CalibrationResult> {
        if !self.is_frozen() {
            return None;
        }
        Some(CalibrationResult {
            label: self.points.label().clone(),
            params: self.state.params,
            n: self.state.n,
            rms: self.state.rms,
            mask: self.state.mask.clone(),
            rows: self.points.rows().to_vec(),
            x: self.points.x().to_vec(),
            y: self.points.y().to_vec(),
            err_x: self.points.err_x().to_vec(),
            err_y: self.points.err_y().to_vec(),
        })
    }

    fn start(&mut self, opts: &OdrOptions) -> Result<(), CalibError> {
        let state = FitState::zeroth_pass(&self.points, opts).map_err(|e| self.failure(e))?;
        debug!(
            pair = %self.points.label(),
            a = state.params.a,
            b = state.params.b,
            n = state.n,
            rms = state.rms,
            "initial fit"
        );
        self.state = state;
        self.phase = PairPhase::Fitting;
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), CalibError> {
        match self.phase {
            PairPhase::Fitting => Ok(()),
            PairPhase::Frozen => Err(CalibError::AlreadyFrozen { pair: self.name() }),
            PairPhase::Unfit => Err(CalibError::InvalidMaskOperation {
                pair: self.name(),
                reason: "pair has not been fitted yet".to_string(),
            }),
        }
    }

    fn failure(&self, source: LineFitError) -> CalibError {
        CalibError::FitFailure {
            pair: self.name(),
            source,
        }
    }

    /// Run `k` refit → RMS → clip iterations. The state is replaced only when
    /// every iteration succeeds.
    fn iterate(&mut self, k: usize, sigma_factor: f64, opts: &OdrOptions) -> Result<(), CalibError> {
        self.ensure_editable()?;
        let all = vec![true; self.points.len()];
        let mut next = self.state.clone();

        for _ in 0..k {
            next.params = refit(&self.points, &next.mask, next.params, opts).map_err(|e| self.failure(e))?;
            // The clipping unit is measured over every point, kept or not.
            let rms_all = weighted_rms(&self.points, &all, next.params);
            next.mask = sigma_clip(&self.points, next.params, rms_all, Clip::Sigma(sigma_factor));
            next.n = count_kept(&next.mask);
            next.rms = weighted_rms(&self.points, &next.mask, next.params);
            next.iteration += 1;
            debug!(
                pair = %self.points.label(),
                iteration = next.iteration,
                a = next.params.a,
                b = next.params.b,
                n = next.n,
                rms = next.rms,
                "clipping iteration"
            );
        }

        self.state = next;
        Ok(())
    }

    fn refit_current(&mut self, opts: &OdrOptions) -> Result<(), CalibError> {
        self.ensure_editable()?;
        let mask = self.state.mask.clone();
        self.state = self.refit_with_mask(mask, opts)?;
        Ok(())
    }

    fn toggle(&mut self, index: usize, opts: &OdrOptions) -> Result<(), CalibError> {
        self.ensure_editable()?;
        let mask = toggle_point(&self.points, &self.state.mask, index)?;
        if count_kept(&mask) < 2 {
            return Err(CalibError::InvalidMaskOperation {
                pair: self.name(),
                reason: "at least 2 points must stay in the fit".to_string(),
            });
        }
        self.state = self.refit_with_mask(mask, opts)?;
        Ok(())
    }

    fn refit_with_mask(&self, mask: Vec<bool>, opts: &OdrOptions) -> Result<FitState, CalibError> {
        let params = refit(&self.points, &mask, self.state.params, opts).map_err(|e| self.failure(e))?;
        let rms = weighted_rms(&self.points, &mask, params);
        Ok(FitState {
            params,
            n: count_kept(&mask),
            rms,
            mask,
            iteration: self.state.iteration + 1,
        })
    }

    fn freeze(&mut self) {
        if self.phase != PairPhase::Frozen {
            info!(
                pair = %self.points.label(),
                a = self.state.params.a,
                b = self.state.params.b,
                n = self.state.n,
                rms = self.state.rms,
                "froze fit"
            );
            self.phase = PairPhase::Frozen;
        }
    }
}

/// All equations of one calibration run, in band order.
#[derive(Debug, Clone)]
pub struct FitChain {
    pairs: Vec<PairFit>,
    config: CalibConfig,
    opts: OdrOptions,
}

impl FitChain {
    /// Build point sets from the catalog and run every initial fit.
    pub fn from_catalog(catalog: &Catalog, config: CalibConfig) -> Result<Self, CalibError> {
        let sets = build_point_sets(catalog, &config)?;
        Self::new(sets, config)
    }

    /// Start a chain from prepared point sets.
    ///
    /// Every set is checked for at least two rows before the first fit runs.
    pub fn new(point_sets: Vec<PointSet>, config: CalibConfig) -> Result<Self, CalibError> {
        Self::with_solver_options(point_sets, config, OdrOptions::default())
    }

    pub fn with_solver_options(
        point_sets: Vec<PointSet>,
        config: CalibConfig,
        opts: OdrOptions,
    ) -> Result<Self, CalibError> {
        config.validate()?;
        if point_sets.len() < 2 {
            return Err(CalibError::InputShape(format!(
                "need a point set per band for at least 2 bands, got {}",
                point_sets.len()
            )));
        }
        if let Some(set) = point_sets.iter().find(|s| s.len() < 2) {
            return Err(CalibError::InsufficientPoints {
                pair: set.label().to_string(),
                n: set.len(),
            });
        }

        let mut pairs: Vec<PairFit> = point_sets.into_iter().map(PairFit::unfit).collect();
        first_error(pairs.par_iter_mut().map(|p| p.start(&opts)).collect())?;

        Ok(Self { pairs, config, opts })
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn config(&self) -> &CalibConfig {
        &self.config
    }

    pub fn pairs(&self) -> &[PairFit] {
        &self.pairs
    }

    /// Batch mode: `k` sigma-clipping iterations on every pair.
    ///
    /// Refuses to start if any pair is already frozen.
    pub fn iterate(&mut self, k: usize) -> Result<(), CalibError> {
        for pair in &self.pairs {
            pair.ensure_editable()?;
        }
        let sigma = self.config.sigma_factor;
        let opts = &self.opts;
        first_error(self.pairs.par_iter_mut().map(|p| p.iterate(k, sigma, opts)).collect())
    }

    /// Refit a pair on its current mask.
    pub fn refit(&mut self, idx: usize) -> Result<&FitState, CalibError> {
        let opts = self.opts.clone();
        let pair = self.pair_mut(idx)?;
        pair.refit_current(&opts)?;
        Ok(&pair.state)
    }

    /// Interactive mode: flip one point and refit immediately.
    ///
    /// On error the pair's state is left untouched.
    pub fn toggle_point(&mut self, idx: usize, point: usize) -> Result<&FitState, CalibError> {
        let opts = self.opts.clone();
        let pair = self.pair_mut(idx)?;
        pair.toggle(point, &opts)?;
        Ok(&pair.state)
    }

    /// Freeze one pair with whatever mask it currently holds.
    pub fn finish(&mut self, idx: usize) -> Result<CalibrationResult, CalibError> {
        let pair = self.pair_mut(idx)?;
        pair.freeze();
        pair.result().ok_or_else(|| CalibError::InvalidMaskOperation {
            pair: pair.name(),
            reason: "pair could not be frozen".to_string(),
        })
    }

    pub fn finish_all(&mut self) {
        for pair in &mut self.pairs {
            pair.freeze();
        }
    }

    pub fn is_complete(&self) -> bool {
        self.pairs.iter().all(PairFit::is_frozen)
    }

    /// Final snapshots, available once every pair is frozen.
    pub fn results(&self) -> Option<Vec<CalibrationResult>> {
        self.pairs.iter().map(PairFit::result).collect()
    }

    fn pair_mut(&mut self, idx: usize) -> Result<&mut PairFit, CalibError> {
        let len = self.pairs.len();
        self.pairs.get_mut(idx).ok_or_else(|| CalibError::InvalidMaskOperation {
            pair: format!("pair #{idx}"),
            reason: format!("no such pair (chain has {len})"),
        })
    }
}

fn first_error(results: Vec<Result<(), CalibError>>) -> Result<(), CalibError> {
    results.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PairLabel;

    fn label(number: usize) -> PairLabel {
        PairLabel {
            number,
            x_label: "x".to_string(),
            y_label: "y".to_string(),
        }
    }

    fn set(number: usize, a: f64, b: f64, outlier: Option<usize>) -> PointSet {
        let xs: Vec<f64> = (0..12).map(|i| -0.3 + 0.15 * i as f64).collect();
        let noise = [0.003, -0.002, 0.001, -0.004, 0.002, 0.0, -0.001, 0.003, -0.003, 0.002, -0.002, 0.001];
        let mut ys: Vec<f64> = xs.iter().zip(noise).map(|(x, e)| a * x + b + e).collect();
        if let Some(k) = outlier {
            ys[k] += 0.4;
        }
        let n = xs.len();
        PointSet::new(label(number), (0..n).collect(), xs, vec![0.01; n], ys, vec![0.01; n]).unwrap()
    }

    fn chain(outlier: Option<usize>) -> FitChain {
        let config = CalibConfig {
            iterations: 2,
            ..CalibConfig::default()
        };
        FitChain::new(vec![set(1, 0.02, 0.1, outlier), set(2, -0.05, 0.3, None)], config).unwrap()
    }

    #[test]
    fn construction_runs_zeroth_pass() {
        let chain = chain(None);
        for pair in chain.pairs() {
            assert_eq!(pair.phase(), PairPhase::Fitting);
            assert_eq!(pair.state().n, pair.points().len());
            assert!(pair.state().rms.is_finite());
            assert_eq!(pair.state().iteration, 0);
        }
    }

    #[test]
    fn zero_iterations_keep_the_zeroth_pass() {
        let mut c = chain(Some(4));
        let before: Vec<FitState> = c.pairs().iter().map(|p| p.state().clone()).collect();
        c.iterate(0).unwrap();
        for (pair, prev) in c.pairs().iter().zip(&before) {
            assert_eq!(pair.state(), prev);
        }
    }

    #[test]
    fn batch_iterations_reject_the_outlier() {
        let mut c = chain(Some(4));
        let rms0 = c.pairs()[0].state().rms;
        c.iterate(2).unwrap();
        let state = c.pairs()[0].state();
        assert!(!state.mask[4]);
        assert_eq!(state.n, 11);
        assert_eq!(state.iteration, 2);
        assert!(state.rms < rms0);
    }

    #[test]
    fn frozen_pairs_reject_edits() {
        let mut c = chain(None);
        let first = c.finish(0).unwrap();
        // Finishing again is a no-op with the same snapshot.
        assert_eq!(c.finish(0).unwrap(), first);

        assert!(matches!(c.toggle_point(0, 1), Err(CalibError::AlreadyFrozen { .. })));
        assert!(matches!(c.refit(0), Err(CalibError::AlreadyFrozen { .. })));
        assert!(matches!(c.iterate(1), Err(CalibError::AlreadyFrozen { .. })));
        assert_eq!(c.pairs()[0].state().params, first.params);
    }

    #[test]
    fn toggle_refits_and_bad_index_keeps_state() {
        let mut c = chain(Some(4));
        let before = c.pairs()[0].state().clone();
        let state = c.toggle_point(0, 4).unwrap().clone();
        assert!(!state.mask[4]);
        assert_eq!(state.n, before.n - 1);
        assert_ne!(state.params, before.params);
        assert_eq!(state.iteration, before.iteration + 1);

        let err = c.toggle_point(0, 99).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(c.pairs()[0].state(), &state);
    }

    #[test]
    fn toggle_refuses_to_leave_fewer_than_two_points() {
        let mut c = chain(None);
        for k in 0..10 {
            c.toggle_point(1, k).unwrap();
        }
        let err = c.toggle_point(1, 10).unwrap_err();
        assert!(matches!(err, CalibError::InvalidMaskOperation { .. }));
        assert_eq!(c.pairs()[1].state().n, 2);
    }

    #[test]
    fn results_only_after_every_pair_is_frozen() {
        let mut c = chain(None);
        c.finish(0).unwrap();
        assert!(c.results().is_none());
        c.finish_all();
        let results = c.results().unwrap();
        assert_eq!(results.len(), 2);
        assert!(c.is_complete());
        assert!((results[1].params.a + 0.05).abs() < 0.02);
    }

    #[test]
    fn short_point_set_fails_before_fitting() {
        let short = PointSet::new(label(2), vec![0], vec![0.1], vec![0.01], vec![0.2], vec![0.01]).unwrap();
        let err = FitChain::new(vec![set(1, 0.0, 0.0, None), short], CalibConfig::default()).unwrap_err();
        assert_eq!(
            err,
            CalibError::InsufficientPoints {
                pair: "Equation[2]".to_string(),
                n: 1
            }
        );
    }

    #[test]
    fn solver_budget_exhaustion_names_the_pair() {
        let opts = OdrOptions {
            max_iterations: 1,
            ..OdrOptions::default()
        };
        let err = FitChain::with_solver_options(
            vec![set(1, 0.5, 3.0, None), set(2, 0.5, 3.0, None)],
            CalibConfig::default(),
            opts,
        )
        .unwrap_err();
        match err {
            CalibError::FitFailure { pair, source } => {
                assert_eq!(pair, "Equation[1]");
                assert_eq!(source, LineFitError::NoConvergence { iterations: 1 });
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
