//! Shared calibration workflow.
//!
//! catalog -> point sets + initial fits -> clipping (batch) or review
//! (interactive) -> frozen equations -> standardized magnitudes
//!
//! The front-end only decides how the chain gets frozen; everything before
//! and after is the same for batch and interactive runs.

use tracing::{info, warn};

use crate::domain::{CalibConfig, CalibrationResult, Catalog, StandardizedTable};
use crate::error::{AppError, CalibError};
use crate::fit::FitChain;
use crate::transform::MagnitudeTransformer;

/// Everything one calibration run produced.
#[derive(Debug, Clone)]
pub struct CalibrationRun {
    pub results: Vec<CalibrationResult>,
    pub table: StandardizedTable,
}

/// Build the chain and, in batch mode, run the configured clipping iterations.
pub fn prepare_chain(catalog: &Catalog, config: &CalibConfig) -> Result<FitChain, CalibError> {
    let mut chain = FitChain::from_catalog(catalog, config.clone())?;
    for pair in chain.pairs() {
        let s = pair.state();
        info!(
            equation = %pair.points().label(),
            a = s.params.a,
            b = s.params.b,
            n = s.n,
            rms = s.rms,
            "initial fit"
        );
    }

    if config.interactive {
        if config.iterations > 0 {
            warn!(
                iterations = config.iterations,
                "automatic clipping is skipped in interactive mode"
            );
        }
    } else {
        chain.iterate(config.iterations)?;
    }
    Ok(chain)
}

/// Freeze whatever is still open and convert the catalog.
pub fn standardize(mut chain: FitChain, catalog: &Catalog) -> Result<CalibrationRun, CalibError> {
    chain.finish_all();
    let results = chain.results().ok_or_else(|| CalibError::InvalidMaskOperation {
        pair: "chain".to_string(),
        reason: "not every equation is frozen".to_string(),
    })?;

    let transformer = MagnitudeTransformer::new(&results, chain.config())?;
    let table = transformer.apply(catalog)?;
    Ok(CalibrationRun { results, table })
}

/// Batch calibration of an in-memory catalog.
pub fn calibrate(catalog: &Catalog, config: &CalibConfig) -> Result<CalibrationRun, CalibError> {
    let chain = prepare_chain(catalog, config)?;
    standardize(chain, catalog)
}

/// Calibration with an optional review step between preparation and output.
///
/// `review` receives the prepared chain and returns it once the operator is
/// done; it is only called in interactive mode.
pub fn calibrate_with_review(
    catalog: &Catalog,
    config: &CalibConfig,
    review: impl FnOnce(FitChain) -> Result<FitChain, AppError>,
) -> Result<CalibrationRun, AppError> {
    let chain = prepare_chain(catalog, config)?;
    let chain = if config.interactive { review(chain)? } else { chain };
    Ok(standardize(chain, catalog)?)
}
