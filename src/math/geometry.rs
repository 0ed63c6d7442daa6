//! Point-to-line geometry shared by the RMS statistic and sigma clipping.

use crate::domain::FitParams;

/// Orthogonal distance between `(x, y)` and the line `y = a·x + b`.
pub fn orthogonal_distance(p: FitParams, x: f64, y: f64) -> f64 {
    (p.a * x - y + p.b).abs() / (p.a * p.a + 1.0).sqrt()
}

/// Statistical weight of a point with errors `(err_x, err_y)`.
pub fn point_weight(err_x: f64, err_y: f64) -> f64 {
    1.0 / (err_x * err_x + err_y * err_y).sqrt()
}
