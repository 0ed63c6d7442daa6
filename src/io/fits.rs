//! Read/write fit-summary JSON files.
//!
//! A fit summary is the portable record of one calibration run:
//! - run settings (sigma factor, iterations, null marker, minimum error)
//! - every frozen equation with its points and mask
//!
//! It is enough to redraw the figures without the input table
//! (`stdphot plot`).

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CalibConfig, CalibrationResult};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitsFile {
    pub tool: String,
    pub version: String,
    pub generated_at: DateTime<Utc>,
    /// Input table the equations were fitted on.
    pub input: Option<String>,
    pub bands: Vec<String>,
    pub settings: FitSettings,
    pub equations: Vec<CalibrationResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSettings {
    pub sigma_factor: f64,
    pub iterations: usize,
    pub interactive: bool,
    pub null_marker: f64,
    pub min_error: f64,
}

impl From<&CalibConfig> for FitSettings {
    fn from(c: &CalibConfig) -> Self {
        Self {
            sigma_factor: c.sigma_factor,
            iterations: c.iterations,
            interactive: c.interactive,
            null_marker: c.null_marker,
            min_error: c.min_error,
        }
    }
}

impl FitsFile {
    pub fn new(
        input: Option<&Path>,
        bands: Vec<String>,
        config: &CalibConfig,
        equations: Vec<CalibrationResult>,
    ) -> Self {
        Self {
            tool: "stdphot".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
            input: input.map(|p| p.display().to_string()),
            bands,
            settings: config.into(),
            equations,
        }
    }
}

/// Write a fit-summary JSON file.
pub fn write_fits_json(path: &Path, fits: &FitsFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create fit JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(BufWriter::new(file), fits)
        .map_err(|e| AppError::new(2, format!("Failed to write fit JSON: {e}")))?;
    Ok(())
}

/// Read a fit-summary JSON file.
pub fn read_fits_json(path: &Path) -> Result<FitsFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open fit JSON '{}': {e}", path.display())))?;
    let fits: FitsFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid fit JSON: {e}")))?;
    if fits.equations.is_empty() {
        return Err(AppError::new(2, format!("'{}' holds no equations", path.display())));
    }
    for eq in &fits.equations {
        let n = eq.x.len();
        let lengths = [eq.y.len(), eq.err_x.len(), eq.err_y.len(), eq.mask.len(), eq.rows.len()];
        if lengths.iter().any(|&len| len != n) {
            return Err(AppError::new(
                2,
                format!("'{}': {} has point columns of different lengths", path.display(), eq.label),
            ));
        }
    }
    Ok(fits)
}
