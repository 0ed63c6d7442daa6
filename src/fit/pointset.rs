//! Per-pair point sets: (color, Δmag) with errors for every complete object.
//!
//! For bands `i` and `j = i + 1`:
//!
//! - `x = ins_i - ins_j`, `err_x = sqrt(ierr_i² + ierr_j²)`
//! - `y = std_i - ins_i`, `err_y = sqrt(serr_i² + ierr_i²)`
//!
//! Only objects valid in both bands contribute. The last band has no
//! neighbour to form a fresh color, so its set reuses the previous pair's
//! rows, `x` and `err_x` and only brings its own `y` / `err_y`.

use tracing::debug;

use crate::domain::{Band, CalibConfig, Catalog, PairLabel, is_null};
use crate::error::CalibError;

/// Immutable table of points for one transformation equation.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSet {
    label: PairLabel,
    rows: Vec<usize>,
    x: Vec<f64>,
    err_x: Vec<f64>,
    y: Vec<f64>,
    err_y: Vec<f64>,
}

impl PointSet {
    /// Assemble a point set from already derived columns.
    pub fn new(
        label: PairLabel,
        rows: Vec<usize>,
        x: Vec<f64>,
        err_x: Vec<f64>,
        y: Vec<f64>,
        err_y: Vec<f64>,
    ) -> Result<Self, CalibError> {
        let n = x.len();
        if rows.len() != n || err_x.len() != n || y.len() != n || err_y.len() != n {
            return Err(CalibError::InputShape(format!(
                "{label}: point columns have different lengths"
            )));
        }
        Ok(Self {
            label,
            rows,
            x,
            err_x,
            y,
            err_y,
        })
    }

    pub fn label(&self) -> &PairLabel {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Catalog object index of each point.
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn err_x(&self) -> &[f64] {
        &self.err_x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn err_y(&self) -> &[f64] {
        &self.err_y
    }

    /// Columns restricted to `mask == true`, in point order.
    pub fn select(&self, mask: &[bool]) -> MaskedColumns {
        let mut out = MaskedColumns::with_capacity(mask.iter().filter(|&&k| k).count());
        for (i, _) in mask.iter().enumerate().filter(|(_, kept)| **kept) {
            out.x.push(self.x[i]);
            out.err_x.push(self.err_x[i]);
            out.y.push(self.y[i]);
            out.err_y.push(self.err_y[i]);
        }
        out
    }
}

/// Kept subset of a point set, laid out for the solver.
#[derive(Debug, Clone, Default)]
pub struct MaskedColumns {
    pub x: Vec<f64>,
    pub err_x: Vec<f64>,
    pub y: Vec<f64>,
    pub err_y: Vec<f64>,
}

impl MaskedColumns {
    fn with_capacity(n: usize) -> Self {
        Self {
            x: Vec::with_capacity(n),
            err_x: Vec::with_capacity(n),
            y: Vec::with_capacity(n),
            err_y: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Build one point set per band (N sets for N bands), in band order.
///
/// Fails with `InsufficientPoints` when any set ends up with fewer than two
/// rows, before any fitting happens.
pub fn build_point_sets(catalog: &Catalog, config: &CalibConfig) -> Result<Vec<PointSet>, CalibError> {
    let bands = &catalog.bands;
    if bands.len() < 2 {
        return Err(CalibError::InputShape(format!(
            "need at least 2 bands, got {}",
            bands.len()
        )));
    }

    let floor = |v: f64| v.max(config.min_error);
    let mut sets: Vec<PointSet> = Vec::with_capacity(bands.len());

    for (i, pair) in bands.windows(2).enumerate() {
        let (bi, bj) = (&pair[0], &pair[1]);
        let rows: Vec<usize> = (0..catalog.n_objects())
            .filter(|&k| bi.is_valid(k, config.null_marker) && bj.is_valid(k, config.null_marker))
            .collect();

        let x = rows.iter().map(|&k| bi.ins[k] - bj.ins[k]).collect();
        let err_x = rows
            .iter()
            .map(|&k| floor(bi.ins_err[k]).hypot(floor(bj.ins_err[k])))
            .collect();
        let (y, err_y) = zero_point_columns(bi, &rows, config.min_error);

        let label = PairLabel {
            number: i + 1,
            x_label: format!("{}_ins - {}_ins", bi.label, bj.label),
            y_label: format!("{}_std - {}_ins", bi.label, bi.label),
        };
        sets.push(PointSet::new(label, rows, x, err_x, y, err_y)?);
    }

    // Boundary set: same objects and color as the last interior pair.
    let last_band = &bands[bands.len() - 1];
    let prev = &sets[sets.len() - 1];
    debug_assert!(prev.rows.iter().all(|&k| !is_null(last_band.ins[k], config.null_marker)));
    let (y, err_y) = zero_point_columns(last_band, &prev.rows, config.min_error);
    let label = PairLabel {
        number: bands.len(),
        x_label: prev.label.x_label.clone(),
        y_label: format!("{}_std - {}_ins", last_band.label, last_band.label),
    };
    let boundary = PointSet::new(
        label,
        prev.rows.clone(),
        prev.x.clone(),
        prev.err_x.clone(),
        y,
        err_y,
    )?;
    sets.push(boundary);

    for set in &sets {
        debug!(pair = %set.label, rows = set.len(), "built point set");
        if set.len() < 2 {
            return Err(CalibError::InsufficientPoints {
                pair: set.label.to_string(),
                n: set.len(),
            });
        }
    }

    Ok(sets)
}

fn zero_point_columns(band: &Band, rows: &[usize], min_error: f64) -> (Vec<f64>, Vec<f64>) {
    let y = rows.iter().map(|&k| band.std[k] - band.ins[k]).collect();
    let err_y = rows
        .iter()
        .map(|&k| band.std_err[k].max(min_error).hypot(band.ins_err[k].max(min_error)))
        .collect();
    (y, err_y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DEFAULT_NULL_MARKER as NULL;

    fn catalog() -> Catalog {
        let ids = (1..=4).map(|i| i.to_string()).collect();
        let u = Band::new(
            "U",
            vec![14.0, 15.0, NULL, 13.5],
            vec![0.01, 0.02, 0.02, 0.0],
            vec![14.2, 15.1, 15.3, 13.6],
            vec![0.01, 0.01, 0.01, 0.01],
        )
        .unwrap();
        let b = Band::new(
            "B",
            vec![13.0, 14.2, 14.0, 12.9],
            vec![0.01, 0.01, 0.01, 0.01],
            vec![13.1, 14.25, 14.1, 13.0],
            vec![0.02, 0.02, 0.02, NULL],
        )
        .unwrap();
        let v = Band::new(
            "V",
            vec![12.5, 13.8, 13.6, 12.4],
            vec![0.01, 0.01, 0.01, 0.01],
            vec![12.6, 13.85, 13.7, 12.45],
            vec![0.01, 0.01, 0.01, 0.01],
        )
        .unwrap();
        Catalog::new(ids, vec![u, b, v]).unwrap()
    }

    #[test]
    fn one_set_per_band_with_shared_boundary_color() {
        let sets = build_point_sets(&catalog(), &CalibConfig::default()).unwrap();
        assert_eq!(sets.len(), 3);

        let (prev, last) = (&sets[1], &sets[2]);
        assert_eq!(prev.x(), last.x());
        assert_eq!(prev.err_x(), last.err_x());
        assert_eq!(prev.rows(), last.rows());
        assert_eq!(last.label().x_label, "B_ins - V_ins");
        assert_eq!(last.label().y_label, "V_std - V_ins");
        assert!((last.y()[0] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn incomplete_objects_are_dropped_per_pair() {
        let sets = build_point_sets(&catalog(), &CalibConfig::default()).unwrap();
        // Object 3 has a null U magnitude, object 4 a null B standard error.
        assert_eq!(sets[0].rows(), &[0, 1]);
        assert_eq!(sets[1].rows(), &[0, 1, 2]);
        assert!((sets[0].x()[0] - 1.0).abs() < 1e-12);
        assert!((sets[0].y()[1] - 0.1).abs() < 1e-9);
    }

    #[test]
    fn errors_are_floored_before_combining() {
        let mut cat = catalog();
        cat.bands[0].ins_err[0] = 0.0;
        cat.bands[1].ins_err[0] = 0.0;
        let config = CalibConfig::default();
        let sets = build_point_sets(&cat, &config).unwrap();
        let expected = config.min_error * 2f64.sqrt();
        assert!((sets[0].err_x()[0] - expected).abs() < 1e-15);
        assert!(sets.iter().all(|s| s.err_x().iter().chain(s.err_y()).all(|&e| e >= config.min_error)));
    }

    #[test]
    fn too_few_complete_rows_fails_fast() {
        let mut cat = catalog();
        cat.bands[0].ins[1] = NULL;
        let err = build_point_sets(&cat, &CalibConfig::default()).unwrap_err();
        assert_eq!(
            err,
            CalibError::InsufficientPoints {
                pair: "Equation[1]".to_string(),
                n: 1
            }
        );
    }
}
