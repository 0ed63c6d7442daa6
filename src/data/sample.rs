//! Synthetic photometry catalogs with known transformation coefficients.
//!
//! Instrumental magnitudes are drawn first (a red-ward reference band plus
//! random colors), standard magnitudes follow from the per-pair `(A, B)` of
//! the transformation equations, and Gaussian noise is added with the
//! per-object errors. A fraction of instrumental readings is null-marked and
//! a fraction of objects are field stars without standard magnitudes.

use std::collections::hash_map::DefaultHasher;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Band, Catalog, DEFAULT_NULL_MARKER, FitParams};
use crate::error::AppError;
use crate::io::BAND_SUFFIXES;

/// Reference-band magnitude range of generated objects.
const MAG_RANGE: (f64, f64) = (11.0, 16.5);
/// Range of each adjacent-band color.
const COLOR_RANGE: (f64, f64) = (-0.3, 1.6);
const INS_ERR_RANGE: (f64, f64) = (0.004, 0.03);
const STD_ERR_RANGE: (f64, f64) = (0.003, 0.02);

#[derive(Debug, Clone, PartialEq)]
pub struct SynthOptions {
    pub bands: Vec<String>,
    pub objects: usize,
    pub seed: u64,
    /// Probability that one instrumental reading is null-marked.
    pub null_fraction: f64,
    /// Probability that an object has no standard magnitudes at all.
    pub field_fraction: f64,
    /// Probability that one standard magnitude is off by `outlier_offset`.
    pub outlier_fraction: f64,
    pub outlier_offset: f64,
    /// Per-equation coefficients; defaults are used when `None`.
    pub coefficients: Option<Vec<FitParams>>,
    pub null_marker: f64,
}

impl Default for SynthOptions {
    fn default() -> Self {
        Self {
            bands: ["U", "B", "V"].iter().map(|s| s.to_string()).collect(),
            objects: 200,
            seed: 42,
            null_fraction: 0.02,
            field_fraction: 0.1,
            outlier_fraction: 0.03,
            outlier_offset: 0.8,
            coefficients: None,
            null_marker: DEFAULT_NULL_MARKER,
        }
    }
}

/// A generated catalog together with the coefficients it was drawn from.
#[derive(Debug, Clone)]
pub struct SynthCatalog {
    pub catalog: Catalog,
    pub truth: Vec<FitParams>,
}

/// Coefficients used when none are given: small alternating color terms and
/// zero points drifting with band index.
pub fn default_coefficients(n_bands: usize) -> Vec<FitParams> {
    (0..n_bands)
        .map(|i| {
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            FitParams::new(sign * (0.03 + 0.01 * i as f64), -0.4 + 0.15 * i as f64)
        })
        .collect()
}

pub fn generate_catalog(options: &SynthOptions) -> Result<SynthCatalog, AppError> {
    let n_bands = options.bands.len();
    if n_bands < 2 {
        return Err(AppError::new(2, "Synthetic catalogs need at least 2 bands."));
    }
    if options.objects == 0 {
        return Err(AppError::new(2, "Object count must be > 0."));
    }
    for (name, p) in [
        ("null fraction", options.null_fraction),
        ("field fraction", options.field_fraction),
        ("outlier fraction", options.outlier_fraction),
    ] {
        if !(0.0..1.0).contains(&p) {
            return Err(AppError::new(2, format!("Invalid {name} {p}: expected a value in [0, 1).")));
        }
    }
    let truth = match &options.coefficients {
        Some(c) if c.len() != n_bands => {
            return Err(AppError::new(
                2,
                format!("{} coefficient pairs given for {n_bands} bands.", c.len()),
            ));
        }
        Some(c) => c.clone(),
        None => default_coefficients(n_bands),
    };

    let mut rng = StdRng::seed_from_u64(sample_seed(options));
    let normal = Normal::new(0.0, 1.0).map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;
    let null = options.null_marker;

    let mut columns: Vec<[Vec<f64>; 4]> = (0..n_bands)
        .map(|_| std::array::from_fn(|_| Vec::with_capacity(options.objects)))
        .collect();

    for _ in 0..options.objects {
        // Noise-free instrumental magnitudes, built from the reddest band.
        let mut ins = vec![0.0; n_bands];
        ins[n_bands - 1] = rng.gen_range(MAG_RANGE.0..MAG_RANGE.1);
        for i in (0..n_bands - 1).rev() {
            ins[i] = ins[i + 1] + rng.gen_range(COLOR_RANGE.0..COLOR_RANGE.1);
        }

        let field_star = rng.gen_bool(options.field_fraction);
        for (i, cols) in columns.iter_mut().enumerate() {
            let (c0, c1) = if i + 1 < n_bands { (i, i + 1) } else { (i - 1, i) };
            let std_mag = ins[i] + truth[i].predict(ins[c0] - ins[c1]);

            let ins_err = rng.gen_range(INS_ERR_RANGE.0..INS_ERR_RANGE.1);
            let std_err = rng.gen_range(STD_ERR_RANGE.0..STD_ERR_RANGE.1);
            let ins_obs = ins[i] + ins_err * normal.sample(&mut rng);
            let mut std_obs = std_mag + std_err * normal.sample(&mut rng);
            if rng.gen_bool(options.outlier_fraction) {
                std_obs += options.outlier_offset;
            }

            if rng.gen_bool(options.null_fraction) {
                cols[0].push(null);
                cols[1].push(null);
            } else {
                cols[0].push(ins_obs);
                cols[1].push(ins_err);
            }
            if field_star {
                cols[2].push(null);
                cols[3].push(null);
            } else {
                cols[2].push(std_obs);
                cols[3].push(std_err);
            }
        }
    }

    let bands = options
        .bands
        .iter()
        .zip(columns)
        .map(|(label, [ins, ins_err, std, std_err])| Band::new(label.clone(), ins, ins_err, std, std_err))
        .collect::<Result<Vec<_>, _>>()?;
    let ids = (1..=options.objects).map(|i| i.to_string()).collect();
    let catalog = Catalog::new(ids, bands)?;

    Ok(SynthCatalog { catalog, truth })
}

/// Render a catalog as a whitespace table with a `#` header, readable by
/// the ingest module.
pub fn format_catalog_text(catalog: &Catalog) -> String {
    let mut out = String::from("# no_star");
    for band in &catalog.bands {
        for suffix in BAND_SUFFIXES {
            let _ = write!(out, " {}{suffix}", band.label);
        }
    }
    out.push('\n');

    for (row, id) in catalog.ids.iter().enumerate() {
        let _ = write!(out, "{id:>7}");
        for band in &catalog.bands {
            let _ = write!(
                out,
                " {:9.4} {:7.4} {:9.4} {:7.4}",
                band.ins[row], band.ins_err[row], band.std[row], band.std_err[row]
            );
        }
        out.push('\n');
    }
    out
}

fn sample_seed(options: &SynthOptions) -> u64 {
    let mut hasher = DefaultHasher::new();
    options.seed.hash(&mut hasher);
    options.objects.hash(&mut hasher);
    options.bands.hash(&mut hasher);
    hasher.finish()
}
