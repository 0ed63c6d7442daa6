//! Per-equation SVG figures.
//!
//! Each figure shows the kept points with their error bars, the rejected
//! points faded, and the fitted line over the kept color range. The frame
//! follows the kept points (5% color margin, 40% residual margin).

use std::error::Error;
use std::path::Path;

use plotters::prelude::*;
use tracing::info;

use crate::domain::CalibrationResult;
use crate::error::AppError;
use crate::report::format_equation_title;

pub const FIGURE_SIZE: (u32, u32) = (1600, 900);

/// Write one figure per result; `path_for` maps an equation number to a file.
pub fn write_figures(
    results: &[CalibrationResult],
    path_for: impl Fn(usize) -> std::path::PathBuf,
) -> Result<Vec<std::path::PathBuf>, AppError> {
    let mut written = Vec::with_capacity(results.len());
    for r in results {
        let path = path_for(r.label.number);
        render_equation_svg(&path, r)
            .map_err(|e| AppError::new(2, format!("Failed to draw figure '{}': {e}", path.display())))?;
        info!(path = %path.display(), equation = %r.label, "wrote figure");
        written.push(path);
    }
    Ok(written)
}

pub fn render_equation_svg(path: &Path, r: &CalibrationResult) -> Result<(), Box<dyn Error>> {
    let kept: Vec<usize> = (0..r.x.len()).filter(|&i| r.mask[i]).collect();
    let framed: Vec<usize> = if kept.is_empty() { (0..r.x.len()).collect() } else { kept.clone() };

    let (x0, x1) = bounds(framed.iter().map(|&i| r.x[i]), 0.05);
    let (y0, y1) = bounds(framed.iter().map(|&i| r.y[i]), 0.4);

    let root = SVGBackend::new(path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(format_equation_title(r), ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(90)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .x_desc(r.label.x_label.as_str())
        .y_desc(r.label.y_label.as_str())
        .axis_desc_style(("sans-serif", 22))
        .label_style(("sans-serif", 16))
        .x_labels(10)
        .y_labels(10)
        .draw()?;

    let kept_color = BLUE.mix(0.6);
    chart.draw_series(kept.iter().map(|&i| {
        ErrorBar::new_vertical(r.x[i], r.y[i] - r.err_y[i], r.y[i], r.y[i] + r.err_y[i], BLUE.mix(0.25), 6)
    }))?;
    chart.draw_series(kept.iter().map(|&i| {
        ErrorBar::new_horizontal(r.y[i], r.x[i] - r.err_x[i], r.x[i], r.x[i] + r.err_x[i], BLUE.mix(0.25), 6)
    }))?;
    chart.draw_series(kept.iter().map(|&i| Circle::new((r.x[i], r.y[i]), 4, kept_color.filled())))?;
    chart.draw_series(
        (0..r.x.len())
            .filter(|&i| !r.mask[i])
            .map(|i| Cross::new((r.x[i], r.y[i]), 4, RED.mix(0.4))),
    )?;

    let (lx0, lx1) = bounds(kept.iter().map(|&i| r.x[i]), 0.0);
    chart.draw_series(LineSeries::new(
        [lx0, lx1].into_iter().map(|x| (x, r.params.predict(x))),
        RED.mix(0.5).stroke_width(2),
    ))?;

    root.present()?;
    Ok(())
}

/// Min/max padded by `margin` of the span; a unit window around a single value.
fn bounds(values: impl Iterator<Item = f64>, margin: f64) -> (f64, f64) {
    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for v in values.filter(|v| v.is_finite()) {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    let pad = (hi - lo).abs() * margin;
    if pad > 0.0 { (lo - pad, hi + pad) } else if hi > lo { (lo, hi) } else { (lo - 0.5, hi + 0.5) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitParams, PairLabel};

    #[test]
    fn writes_svg_with_title() {
        let r = CalibrationResult {
            label: PairLabel {
                number: 2,
                x_label: "B_ins - V_ins".to_string(),
                y_label: "B_std - B_ins".to_string(),
            },
            params: FitParams::new(0.05, 0.2),
            n: 3,
            rms: 0.004,
            mask: vec![true, true, true, false],
            rows: vec![0, 1, 2, 3],
            x: vec![0.1, 0.4, 0.8, 0.5],
            y: vec![0.205, 0.219, 0.241, 0.6],
            err_x: vec![0.01; 4],
            err_y: vec![0.01; 4],
        };
        let dir = std::env::temp_dir();
        let path = dir.join(format!("stdphot-fig-{}.svg", std::process::id()));
        let written = write_figures(std::slice::from_ref(&r), |_| path.clone()).unwrap();
        let svg = std::fs::read_to_string(&written[0]).unwrap();
        let _ = std::fs::remove_file(&path);
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Equation[2]"));
    }

    #[test]
    fn bounds_handle_degenerate_ranges() {
        assert_eq!(bounds([1.0, 1.0].into_iter(), 0.05), (0.5, 1.5));
        assert_eq!(bounds(std::iter::empty(), 0.05), (0.0, 1.0));
        let (lo, hi) = bounds([0.0, 2.0].into_iter(), 0.05);
        assert!((lo + 0.1).abs() < 1e-12 && (hi - 2.1).abs() < 1e-12);
    }
}
