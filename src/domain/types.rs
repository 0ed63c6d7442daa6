//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON / text tables
//! - rendered by the TUI and the figure writer

use serde::{Deserialize, Serialize};

use crate::error::CalibError;

/// Sentinel marking a missing magnitude or error in input and output tables.
pub const DEFAULT_NULL_MARKER: f64 = 99.9999;

/// Floor applied to every error before it is used in a weight.
pub const DEFAULT_MIN_ERROR: f64 = 0.0001;

/// Default clipping threshold, in units of the weighted RMS.
pub const DEFAULT_SIGMA_FACTOR: f64 = 3.0;

/// Returns `true` when `value` is the null marker (or NaN).
pub fn is_null(value: f64, null_marker: f64) -> bool {
    value.is_nan() || value == null_marker
}

/// One passband's per-object measurements.
///
/// All four arrays are indexed by object. `std` / `std_err` hold the null
/// marker for objects that are not calibration stars.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub label: String,
    pub ins: Vec<f64>,
    pub ins_err: Vec<f64>,
    pub std: Vec<f64>,
    pub std_err: Vec<f64>,
}

impl Band {
    pub fn new(
        label: impl Into<String>,
        ins: Vec<f64>,
        ins_err: Vec<f64>,
        std: Vec<f64>,
        std_err: Vec<f64>,
    ) -> Result<Self, CalibError> {
        let label = label.into();
        let n = ins.len();
        if ins_err.len() != n || std.len() != n || std_err.len() != n {
            return Err(CalibError::InputShape(format!(
                "band {label}: column lengths differ (ins={n}, ins_err={}, std={}, std_err={})",
                ins_err.len(),
                std.len(),
                std_err.len()
            )));
        }
        Ok(Self {
            label,
            ins,
            ins_err,
            std,
            std_err,
        })
    }

    pub fn len(&self) -> usize {
        self.ins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ins.is_empty()
    }

    /// A reading is valid when none of its four values is null.
    pub fn is_valid(&self, idx: usize, null_marker: f64) -> bool {
        ![self.ins[idx], self.ins_err[idx], self.std[idx], self.std_err[idx]]
            .iter()
            .any(|&v| is_null(v, null_marker))
    }
}

/// All bands of one input table, ordered by growing wavelength.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub ids: Vec<String>,
    pub bands: Vec<Band>,
}

impl Catalog {
    pub fn new(ids: Vec<String>, bands: Vec<Band>) -> Result<Self, CalibError> {
        if bands.len() < 2 {
            return Err(CalibError::InputShape(format!(
                "need at least 2 bands, got {}",
                bands.len()
            )));
        }
        if let Some(band) = bands.iter().find(|b| b.len() != ids.len()) {
            return Err(CalibError::InputShape(format!(
                "band {} has {} rows but there are {} object ids",
                band.label,
                band.len(),
                ids.len()
            )));
        }
        Ok(Self { ids, bands })
    }

    /// Build a catalog from flat columns: four per band
    /// (`ins`, `ins_err`, `std`, `std_err`), in band order.
    pub fn from_columns(
        ids: Vec<String>,
        labels: &[String],
        columns: Vec<Vec<f64>>,
    ) -> Result<Self, CalibError> {
        if columns.is_empty() || columns.len() % 4 != 0 {
            return Err(CalibError::InputShape(format!(
                "{} magnitude columns do not form complete groups of 4",
                columns.len()
            )));
        }
        let n_bands = columns.len() / 4;
        if labels.len() != n_bands {
            return Err(CalibError::InputShape(format!(
                "{} band labels for {n_bands} bands",
                labels.len()
            )));
        }

        let mut bands = Vec::with_capacity(n_bands);
        let mut columns = columns.into_iter();
        for label in labels {
            // The length check above guarantees four columns per label.
            let (Some(ins), Some(ins_err), Some(std), Some(std_err)) =
                (columns.next(), columns.next(), columns.next(), columns.next())
            else {
                return Err(CalibError::InputShape(format!("band {label} is incomplete")));
            };
            bands.push(Band::new(label.clone(), ins, ins_err, std, std_err)?);
        }

        Self::new(ids, bands)
    }

    pub fn n_objects(&self) -> usize {
        self.ids.len()
    }

    pub fn labels(&self) -> Vec<String> {
        self.bands.iter().map(|b| b.label.clone()).collect()
    }
}

/// Run configuration shared by every band pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibConfig {
    /// Clipping threshold in units of the weighted RMS.
    pub sigma_factor: f64,
    /// Number of automatic refit/clip iterations (0 keeps the zeroth pass).
    pub iterations: usize,
    pub interactive: bool,
    pub null_marker: f64,
    pub min_error: f64,
}

impl Default for CalibConfig {
    fn default() -> Self {
        Self {
            sigma_factor: DEFAULT_SIGMA_FACTOR,
            iterations: 0,
            interactive: false,
            null_marker: DEFAULT_NULL_MARKER,
            min_error: DEFAULT_MIN_ERROR,
        }
    }
}

impl CalibConfig {
    pub fn validate(&self) -> Result<(), CalibError> {
        if !(self.sigma_factor.is_finite() && self.sigma_factor > 0.0) {
            return Err(CalibError::InputShape(format!(
                "sigma factor must be finite and > 0, got {}",
                self.sigma_factor
            )));
        }
        if !(self.min_error.is_finite() && self.min_error > 0.0) {
            return Err(CalibError::InputShape(format!(
                "minimum error must be finite and > 0, got {}",
                self.min_error
            )));
        }
        if !self.null_marker.is_finite() {
            return Err(CalibError::InputShape("null marker must be finite".to_string()));
        }
        Ok(())
    }
}

/// Identifies one transformation equation (band pair).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairLabel {
    /// 1-based equation number, in band order.
    pub number: usize,
    /// Axis label of the color, e.g. `U_ins - B_ins`.
    pub x_label: String,
    /// Axis label of the zero-point residual, e.g. `U_std - U_ins`.
    pub y_label: String,
}

impl std::fmt::Display for PairLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Equation[{}]", self.number)
    }
}

/// Line parameters of `y = a·x + b`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FitParams {
    pub a: f64,
    pub b: f64,
}

impl FitParams {
    pub fn new(a: f64, b: f64) -> Self {
        Self { a, b }
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.a * x + self.b
    }

    pub fn is_finite(&self) -> bool {
        self.a.is_finite() && self.b.is_finite()
    }
}

/// Read-only snapshot of a frozen pair.
///
/// Carries everything the reporting side needs: coefficients and statistics
/// for the log record, plus the points and mask for plots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub label: PairLabel,
    pub params: FitParams,
    /// Number of retained points.
    pub n: usize,
    pub rms: f64,
    pub mask: Vec<bool>,
    /// Object indices (into the catalog) of each point.
    pub rows: Vec<usize>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub err_x: Vec<f64>,
    pub err_y: Vec<f64>,
}

/// Standardized magnitudes for one band.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardizedBand {
    pub label: String,
    pub mag: Vec<f64>,
    /// The instrumental error, passed through unchanged.
    pub err: Vec<f64>,
}

/// Output table: one row per object, `(mag, err)` per band.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardizedTable {
    pub ids: Vec<String>,
    pub bands: Vec<StandardizedBand>,
    pub null_marker: f64,
}
