//! Whitespace-table ingest.
//!
//! This module turns a photometry table into a `Catalog`:
//!
//! ```text
//! # no_star U_ins U_ierr U_std U_serr B_ins B_ierr B_std B_serr ...
//!       1  14.203 0.011  14.512 0.008  13.902 0.009  ...
//! ```
//!
//! Design goals:
//! - **Strict layout**: one identifier column plus four columns per band
//! - **Header-driven labels** when the header names `*_ins` columns
//! - **Line-numbered errors** for malformed rows
//! - **No fitting logic here**

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::domain::Catalog;
use crate::error::{AppError, CalibError};
use crate::io::columns::ColumnSpec;

/// Column-name suffixes of one band, in file order.
pub const BAND_SUFFIXES: [&str; 4] = ["_ins", "_ierr", "_std", "_serr"];

/// Ingest output: the catalog plus what the header told us.
#[derive(Debug, Clone)]
pub struct IngestedCatalog {
    pub catalog: Catalog,
    /// Name of the identifier column (`"id"` when the file has no header).
    pub identifier: String,
    /// Whether band labels came from the header or were assigned by position.
    pub labels_from_header: bool,
    pub rows_read: usize,
}

/// Where each value lives in a data row (0-based field indexes).
#[derive(Debug, Clone, PartialEq)]
struct Layout {
    identifier: String,
    id_field: usize,
    labels: Vec<String>,
    /// `[ins, ins_err, std, std_err]` field index per band.
    band_fields: Vec<[usize; 4]>,
    from_header: bool,
}

/// Load a catalog from `path`.
pub fn load_catalog(path: &Path, columns: Option<&ColumnSpec>) -> Result<IngestedCatalog, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to read input '{}': {e}", path.display())))?;
    let ingested = parse_catalog(&text, columns)?;
    info!(
        path = %path.display(),
        objects = ingested.catalog.n_objects(),
        bands = ingested.catalog.bands.len(),
        "loaded catalog"
    );
    Ok(ingested)
}

/// Parse the text of a photometry table.
pub fn parse_catalog(text: &str, columns: Option<&ColumnSpec>) -> Result<IngestedCatalog, CalibError> {
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l.trim()));

    let header: Option<Vec<String>> = match text.lines().next().map(str::trim_start) {
        Some(first) if first.starts_with('#') => {
            lines.next();
            Some(first.replace('#', " ").split_whitespace().map(str::to_string).collect())
        }
        _ => None,
    };

    let rows: Vec<(usize, Vec<&str>)> = lines
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
        .map(|(n, l)| (n, l.split_whitespace().collect()))
        .collect();

    let width = match (&header, rows.first()) {
        (Some(h), _) if !h.is_empty() => h.len(),
        (_, Some((_, fields))) => fields.len(),
        _ => return Err(CalibError::InputShape("input table is empty".to_string())),
    };

    let spec = match columns {
        Some(spec) => spec.clone(),
        None => ColumnSpec::all(width),
    };
    let n_bands = spec.band_count()?;
    if let Some(&idx) = spec.indexes().iter().find(|&&i| i >= width) {
        return Err(CalibError::InputShape(format!(
            "column {} selected but the table has only {width} columns",
            idx + 1
        )));
    }

    let layout = match &header {
        Some(names) if names.len() == width && spec.indexes().iter().any(|&i| names[i].ends_with(BAND_SUFFIXES[0])) => {
            header_layout(names, &spec)?
        }
        _ => positional_layout(&spec, n_bands),
    };
    debug!(identifier = %layout.identifier, labels = ?layout.labels, "resolved column layout");

    let mut ids = Vec::with_capacity(rows.len());
    let mut values: Vec<Vec<f64>> = vec![Vec::with_capacity(rows.len()); n_bands * 4];
    for (line, fields) in &rows {
        if fields.len() < width {
            return Err(CalibError::InputShape(format!(
                "line {line}: expected {width} fields, got {}",
                fields.len()
            )));
        }
        ids.push(fields[layout.id_field].to_string());
        for (b, quad) in layout.band_fields.iter().enumerate() {
            for (k, &field) in quad.iter().enumerate() {
                values[4 * b + k].push(parse_value(fields[field], *line, field)?);
            }
        }
    }

    let catalog = Catalog::from_columns(ids, &layout.labels, values)?;
    Ok(IngestedCatalog {
        catalog,
        identifier: layout.identifier,
        labels_from_header: layout.from_header,
        rows_read: rows.len(),
    })
}

/// Band labels from `<band>_ins` names; the leftover column is the identifier.
fn header_layout(names: &[String], spec: &ColumnSpec) -> Result<Layout, CalibError> {
    let selected: Vec<(usize, &str)> = spec.indexes().iter().map(|&i| (i, names[i].as_str())).collect();
    let labels: Vec<String> = selected
        .iter()
        .filter_map(|(_, name)| name.strip_suffix(BAND_SUFFIXES[0]))
        .map(str::to_string)
        .collect();

    let mut used = Vec::with_capacity(labels.len() * 4);
    let mut band_fields = Vec::with_capacity(labels.len());
    for label in &labels {
        let mut quad = [0usize; 4];
        for (slot, suffix) in quad.iter_mut().zip(BAND_SUFFIXES) {
            let wanted = format!("{label}{suffix}");
            let (field, _) = selected
                .iter()
                .find(|(_, name)| *name == wanted)
                .ok_or_else(|| CalibError::InputShape(format!("there is no '{wanted}' in the file header")))?;
            *slot = *field;
            used.push(*field);
        }
        band_fields.push(quad);
    }

    let leftover: Vec<&(usize, &str)> = selected.iter().filter(|(i, _)| !used.contains(i)).collect();
    let [(id_field, identifier)] = leftover.as_slice() else {
        return Err(CalibError::InputShape(format!(
            "expected exactly one identifier column besides the band columns, found {}",
            leftover.len()
        )));
    };

    Ok(Layout {
        identifier: identifier.to_string(),
        id_field: *id_field,
        labels,
        band_fields,
        from_header: true,
    })
}

/// Identifier first, then one quadruple per band, named `B1..Bn`.
fn positional_layout(spec: &ColumnSpec, n_bands: usize) -> Layout {
    let idx = spec.indexes();
    Layout {
        identifier: "id".to_string(),
        id_field: idx[0],
        labels: (1..=n_bands).map(|b| format!("B{b}")).collect(),
        band_fields: idx[1..]
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect(),
        from_header: false,
    }
}

fn parse_value(s: &str, line: usize, field: usize) -> Result<f64, CalibError> {
    s.parse::<f64>().map_err(|_| {
        CalibError::InputShape(format!("line {line}, column {}: invalid number '{s}'", field + 1))
    })
}
