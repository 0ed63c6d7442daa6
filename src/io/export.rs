//! Output table and calibration log writers.
//!
//! Both files are fixed-column text so they stay readable by the same tools
//! that read the input table.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::domain::{CalibrationResult, StandardizedTable};
use crate::error::AppError;
use crate::report::{LOG_HEADER, format_log_record, format_table_row};

/// Resolved destinations of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub table: PathBuf,
    pub log: PathBuf,
}

impl OutputPaths {
    /// Derive the log path from the requested output path.
    ///
    /// `out.dat` gives `out.dat` + `out.log`. If the request already ends in
    /// `.log`, the table goes to the name without the extension and the log
    /// takes the requested name.
    pub fn from_output(output: &Path) -> Self {
        let is_log = output.extension().is_some_and(|ext| ext == "log");
        if is_log {
            Self {
                table: output.with_extension(""),
                log: output.to_path_buf(),
            }
        } else {
            Self {
                table: output.to_path_buf(),
                log: output.with_extension("log"),
            }
        }
    }

    /// Figure path for equation `number`: dots in the table's file name
    /// become underscores, e.g. `out_dat-equation-2.svg`.
    pub fn figure(&self, number: usize) -> PathBuf {
        let name = self
            .table
            .file_name()
            .map(|n| n.to_string_lossy().replace('.', "_"))
            .unwrap_or_else(|| "output".to_string());
        self.table.with_file_name(format!("{name}-equation-{number}.svg"))
    }

    /// Refuse destinations that would overwrite `input`.
    pub fn check_not_input(&self, input: &Path) -> Result<(), AppError> {
        for dest in [&self.table, &self.log] {
            if same_file(dest, input) {
                return Err(AppError::new(
                    2,
                    format!("Output '{}' would overwrite the input table", dest.display()),
                ));
            }
        }
        Ok(())
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Write the standardized magnitudes, one line per object.
pub fn write_table(path: &Path, table: &StandardizedTable) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create output '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);

    for row in 0..table.ids.len() {
        writeln!(out, "{}", format_table_row(table, row))
            .map_err(|e| AppError::new(2, format!("Failed to write output row: {e}")))?;
    }
    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to write output '{}': {e}", path.display())))?;

    info!(path = %path.display(), objects = table.ids.len(), "wrote standardized magnitudes");
    Ok(())
}

/// Write the per-equation summary (`Eq_num A_coeff B_coeff N_stars RMS`).
pub fn write_log(path: &Path, results: &[CalibrationResult]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create log '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "{LOG_HEADER}").map_err(|e| AppError::new(2, format!("Failed to write log header: {e}")))?;
    for r in results {
        writeln!(out, "{}", format_log_record(r))
            .map_err(|e| AppError::new(2, format!("Failed to write log record: {e}")))?;
    }
    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to write log '{}': {e}", path.display())))?;

    info!(path = %path.display(), equations = results.len(), "wrote calibration log");
    Ok(())
}
