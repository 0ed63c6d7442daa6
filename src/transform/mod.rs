//! Apply frozen transformation equations to instrumental magnitudes.
//!
//! For band `i` with neighbour `i + 1`:
//!
//! ```text
//! std_i = ins_i + A_i (ins_i - ins_{i+1}) + B_i
//! ```
//!
//! The last band has no right neighbour and uses the previous color instead:
//!
//! ```text
//! std_last = ins_last + A_last (ins_{last-1} - ins_last) + B_last
//! ```
//!
//! Every object is transformed, calibration star or not. An object whose two
//! contributing instrumental magnitudes are not both present gets the null
//! marker.

use tracing::debug;

use crate::domain::{
    CalibConfig, CalibrationResult, Catalog, FitParams, StandardizedBand, StandardizedTable, is_null,
};
use crate::error::CalibError;

#[derive(Debug, Clone)]
pub struct MagnitudeTransformer {
    coefficients: Vec<FitParams>,
    null_marker: f64,
    min_error: f64,
}

impl MagnitudeTransformer {
    /// One frozen result per band, in band order.
    pub fn new(results: &[CalibrationResult], config: &CalibConfig) -> Result<Self, CalibError> {
        if results.len() < 2 {
            return Err(CalibError::InputShape(format!(
                "need results for at least 2 bands, got {}",
                results.len()
            )));
        }
        Ok(Self {
            coefficients: results.iter().map(|r| r.params).collect(),
            null_marker: config.null_marker,
            min_error: config.min_error,
        })
    }

    /// Standardize every band of `catalog`.
    ///
    /// The error column is the instrumental error, floored at the minimum
    /// error; nulls stay nulls.
    pub fn apply(&self, catalog: &Catalog) -> Result<StandardizedTable, CalibError> {
        let bands = &catalog.bands;
        if bands.len() != self.coefficients.len() {
            return Err(CalibError::InputShape(format!(
                "{} bands but {} transformation equations",
                bands.len(),
                self.coefficients.len()
            )));
        }

        let last = bands.len() - 1;
        let mut out = Vec::with_capacity(bands.len());
        for (i, band) in bands.iter().enumerate() {
            let (blue, red) = if i < last {
                (&band.ins, &bands[i + 1].ins)
            } else {
                (&bands[last - 1].ins, &band.ins)
            };
            let mag = self.transform_band(&band.ins, blue, red, self.coefficients[i]);

            let err = band
                .ins_err
                .iter()
                .map(|&e| if is_null(e, self.null_marker) { e } else { e.max(self.min_error) })
                .collect();

            let converted = mag.iter().filter(|&&m| !is_null(m, self.null_marker)).count();
            debug!(band = %band.label, converted, total = mag.len(), "standardized band");

            out.push(StandardizedBand {
                label: band.label.clone(),
                mag,
                err,
            });
        }

        Ok(StandardizedTable {
            ids: catalog.ids.clone(),
            bands: out,
            null_marker: self.null_marker,
        })
    }

    /// `ins + A·(blue − red) + B` per object; null unless both color terms exist.
    fn transform_band(&self, ins: &[f64], blue: &[f64], red: &[f64], p: FitParams) -> Vec<f64> {
        ins.iter()
            .zip(blue.iter().zip(red))
            .map(|(&m, (&b, &r))| {
                if is_null(b, self.null_marker) || is_null(r, self.null_marker) {
                    self.null_marker
                } else {
                    m + p.predict(b - r)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Band, DEFAULT_NULL_MARKER as NULL, PairLabel};

    fn result(number: usize, a: f64, b: f64) -> CalibrationResult {
        CalibrationResult {
            label: PairLabel {
                number,
                x_label: String::new(),
                y_label: String::new(),
            },
            params: FitParams::new(a, b),
            n: 0,
            rms: 0.0,
            mask: vec![],
            rows: vec![],
            x: vec![],
            y: vec![],
            err_x: vec![],
            err_y: vec![],
        }
    }

    fn catalog() -> Catalog {
        let ids = vec!["1".into(), "2".into(), "3".into()];
        let unknown = vec![NULL; 3];
        let u = Band::new("U", vec![15.0, NULL, 14.0], vec![0.02, 0.02, 0.00001], unknown.clone(), unknown.clone()).unwrap();
        let b = Band::new("B", vec![14.0, 13.0, 13.5], vec![0.01; 3], unknown.clone(), unknown.clone()).unwrap();
        let v = Band::new("V", vec![13.5, 12.5, NULL], vec![0.01, 0.01, NULL], unknown.clone(), unknown).unwrap();
        Catalog::new(ids, vec![u, b, v]).unwrap()
    }

    fn transformer() -> MagnitudeTransformer {
        let results = [result(1, 0.1, 0.2), result(2, -0.05, 0.3), result(3, 0.02, -0.1)];
        MagnitudeTransformer::new(&results, &CalibConfig::default()).unwrap()
    }

    #[test]
    fn interior_and_boundary_equations() {
        let table = transformer().apply(&catalog()).unwrap();
        // U: 15 + 0.1·(15 − 14) + 0.2
        assert!((table.bands[0].mag[0] - 15.3).abs() < 1e-12);
        // B: 14 − 0.05·(14 − 13.5) + 0.3
        assert!((table.bands[1].mag[0] - 14.275).abs() < 1e-12);
        // V uses the B − V color: 13.5 + 0.02·(14 − 13.5) − 0.1
        assert!((table.bands[2].mag[0] - 13.41).abs() < 1e-12);
    }

    #[test]
    fn missing_color_term_propagates_null() {
        let table = transformer().apply(&catalog()).unwrap();
        // Object 2 lacks U: only the U equation is affected.
        assert_eq!(table.bands[0].mag[1], NULL);
        assert!((table.bands[1].mag[1] - (13.0 - 0.05 * 0.5 + 0.3)).abs() < 1e-12);
        // Object 3 lacks V: both B (needs V) and V are null, U survives.
        assert_eq!(table.bands[1].mag[2], NULL);
        assert_eq!(table.bands[2].mag[2], NULL);
        assert!(table.bands[0].mag[2] != NULL);
    }

    #[test]
    fn errors_pass_through_with_floor() {
        let table = transformer().apply(&catalog()).unwrap();
        assert_eq!(table.bands[0].err, vec![0.02, 0.02, crate::domain::DEFAULT_MIN_ERROR]);
        assert_eq!(table.bands[2].err[2], NULL);
        assert_eq!(table.ids, catalog().ids);
    }

    #[test]
    fn band_count_must_match() {
        let results = [result(1, 0.0, 0.0), result(2, 0.0, 0.0)];
        let t = MagnitudeTransformer::new(&results, &CalibConfig::default()).unwrap();
        assert!(matches!(t.apply(&catalog()), Err(CalibError::InputShape(_))));
    }
}
