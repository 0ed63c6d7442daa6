//! Formatted text output: terminal summary, log records, output table rows.
//!
//! We keep formatting code in one place so:
//! - the fitting code stays free of layout concerns
//! - the fixed-column file formats are defined exactly once

use std::path::Path;

use crate::domain::{CalibConfig, CalibrationResult, Catalog, StandardizedTable, is_null};

/// First line of the calibration log.
pub const LOG_HEADER: &str = "# Eq_num  A_coeff  B_coeff  N_stars  RMS";

/// One log line: equation number, A, B, N, RMS.
pub fn format_log_record(r: &CalibrationResult) -> String {
    format!(
        "{:>2} {:8.4} {:8.4} {:6} {:7.4}",
        r.label.number, r.params.a, r.params.b, r.n, r.rms
    )
}

/// One output line: identifier, then `mag err` per band.
pub fn format_table_row(table: &StandardizedTable, row: usize) -> String {
    let mut line = format!("{:>7}", table.ids[row]);
    for band in &table.bands {
        line.push_str(&format!(" {:10.4} {:7.4}", band.mag[row], band.err[row]));
    }
    line
}

/// Line equation as shown in figure titles: `y = 0.0312 x - 0.4120`.
pub fn format_line(r: &CalibrationResult) -> String {
    let sign = if r.params.b < 0.0 { '-' } else { '+' };
    format!("y = {:.4} x {sign} {:.4}", r.params.a, r.params.b.abs())
}

/// Figure title for one equation.
pub fn format_equation_title(r: &CalibrationResult) -> String {
    format!(
        "{} --- {} ------ RMS = {:.4} --- N = {}",
        r.label,
        format_line(r),
        r.rms,
        r.n
    )
}

/// Terminal summary of a finished run.
pub fn format_run_summary(
    input: Option<&Path>,
    catalog: &Catalog,
    config: &CalibConfig,
    results: &[CalibrationResult],
    table: &StandardizedTable,
) -> String {
    let mut out = String::new();

    out.push_str("=== stdphot - standard magnitude calibration ===\n");
    if let Some(path) = input {
        out.push_str(&format!("Input: {}\n", path.display()));
    }
    out.push_str(&format!(
        "Objects: {} | bands: {}\n",
        catalog.n_objects(),
        catalog.labels().join(" ")
    ));
    let mode = if config.interactive { "interactive" } else { "batch" };
    out.push_str(&format!(
        "Mode: {mode} | sigma={} | iterations={}\n",
        config.sigma_factor, config.iterations
    ));

    out.push_str("\nEquations:\n");
    out.push_str(&format!(
        "{:<12} {:<18} {:>9} {:>9} {:>9} {:>8}\n",
        "equation", "color", "A", "B", "N", "RMS"
    ));
    out.push_str(&format!(
        "{:-<12} {:-<18} {:->9} {:->9} {:->9} {:->8}\n",
        "", "", "", "", "", ""
    ));
    for r in results {
        out.push_str(&format!(
            "{:<12} {:<18} {:>9.4} {:>9.4} {:>9} {:>8.4}\n",
            r.label.to_string(),
            truncate(&r.label.x_label, 18),
            r.params.a,
            r.params.b,
            format!("{}/{}", r.n, r.mask.len()),
            r.rms
        ));
    }

    let rejected = format_rejected(results, &catalog.ids);
    if !rejected.is_empty() {
        out.push_str("\nRejected objects:\n");
        out.push_str(&rejected);
    }

    out.push_str("\nStandardized:\n");
    for band in &table.bands {
        let converted = band.mag.iter().filter(|&&m| !is_null(m, table.null_marker)).count();
        out.push_str(&format!("  {:<6} {converted}/{}\n", band.label, band.mag.len()));
    }

    out
}

/// Identifiers of the points each equation left out, one line per equation.
pub fn format_rejected(results: &[CalibrationResult], ids: &[String]) -> String {
    let mut out = String::new();
    for r in results {
        let rejected: Vec<&str> = r
            .mask
            .iter()
            .zip(&r.rows)
            .filter(|(kept, _)| !**kept)
            .filter_map(|(_, &row)| ids.get(row).map(String::as_str))
            .collect();
        if !rejected.is_empty() {
            out.push_str(&format!("  {}: {}\n", r.label, rejected.join(", ")));
        }
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
