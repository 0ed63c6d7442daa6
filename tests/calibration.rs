use std::fs;
use std::path::PathBuf;

use std_photometry::app::pipeline::{calibrate, prepare_chain};
use std_photometry::data::{SynthOptions, format_catalog_text, generate_catalog};
use std_photometry::domain::{Band, CalibConfig, Catalog, DEFAULT_NULL_MARKER, FitParams, is_null};
use std_photometry::error::CalibError;
use std_photometry::fit::{FitChain, FitState, build_point_sets};
use std_photometry::io::{
    FitsFile, OutputPaths, load_catalog, read_fits_json, write_fits_json, write_log, write_table,
};
use std_photometry::math::OdrOptions;

const NULL: f64 = DEFAULT_NULL_MARKER;
const TRUTH: [(f64, f64); 3] = [(0.01, 0.02), (-0.03, 0.15), (0.02, -0.1)];

/// U, B, V for five objects; object 3 has no U reading. Residuals of
/// ±0.002 are arranged so they cancel in slope and zero point.
fn ubv_catalog() -> Catalog {
    let v_ins = [12.0, 12.5, 13.0, 13.5, 14.0];
    let bv = [0.2, 0.4, 0.6, 0.8, 1.0];
    let ub = [0.1, 0.5, f64::NAN, 0.9, 1.3];
    let u_offsets = [0.002, -0.002, 0.0, -0.002, 0.002];
    let bv_offsets = [0.002, -0.002, 0.0, -0.002, 0.002];

    let b_ins: Vec<f64> = (0..5).map(|k| v_ins[k] + bv[k]).collect();
    let u_ins: Vec<f64> = (0..5)
        .map(|k| if ub[k].is_nan() { NULL } else { b_ins[k] + ub[k] })
        .collect();

    let eq = |(a, b): (f64, f64), x: f64| a * x + b;
    let u_std: Vec<f64> = (0..5)
        .map(|k| if ub[k].is_nan() { 15.0 } else { u_ins[k] + eq(TRUTH[0], ub[k]) + u_offsets[k] })
        .collect();
    let b_std: Vec<f64> = (0..5).map(|k| b_ins[k] + eq(TRUTH[1], bv[k]) + bv_offsets[k]).collect();
    let v_std: Vec<f64> = (0..5).map(|k| v_ins[k] + eq(TRUTH[2], bv[k]) + bv_offsets[k]).collect();

    let err = vec![0.01; 5];
    let u_ierr: Vec<f64> = u_ins.iter().map(|&m| if m == NULL { NULL } else { 0.01 }).collect();
    let bands = vec![
        Band::new("U", u_ins, u_ierr, u_std, err.clone()).unwrap(),
        Band::new("B", b_ins, err.clone(), b_std, err.clone()).unwrap(),
        Band::new("V", v_ins.to_vec(), err.clone(), v_std, err).unwrap(),
    ];
    let ids = (1..=5).map(|i| i.to_string()).collect();
    Catalog::new(ids, bands).unwrap()
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("stdphot-{}-{name}", std::process::id()))
}

#[test]
fn ubv_scenario_recovers_generating_constants() {
    let catalog = ubv_catalog();
    let run = calibrate(&catalog, &CalibConfig::default()).unwrap();

    assert_eq!(run.results.len(), 3);
    assert_eq!(run.results[0].n, 4);
    assert_eq!(run.results[1].n, 5);
    for (r, &(a, b)) in run.results.iter().zip(&TRUTH) {
        assert!(r.rms > 0.0);
        assert!((r.params.a - a).abs() < r.rms, "{}: A = {} vs {a}", r.label, r.params.a);
        assert!((r.params.b - b).abs() < r.rms, "{}: B = {} vs {b}", r.label, r.params.b);
    }

    // Object 3 has a null U: its U is null, B and V are converted.
    let table = &run.table;
    assert!(is_null(table.bands[0].mag[2], NULL));
    assert!(!is_null(table.bands[1].mag[2], NULL));
    assert!(!is_null(table.bands[2].mag[2], NULL));

    // Converted magnitudes land on the standard values within the residuals.
    for (band, out) in catalog.bands.iter().zip(&table.bands) {
        for k in [0, 1, 3, 4] {
            assert!((out.mag[k] - band.std[k]).abs() < 0.005, "{} row {k}", band.label);
        }
    }
}

#[test]
fn last_pair_shares_the_previous_color() {
    let catalog = ubv_catalog();
    let sets = build_point_sets(&catalog, &CalibConfig::default()).unwrap();
    assert_eq!(sets.len(), 3);
    assert_eq!(sets[2].x(), sets[1].x());
    assert_eq!(sets[2].err_x(), sets[1].err_x());
    assert_eq!(sets[2].rows(), sets[1].rows());
    assert_ne!(sets[2].y(), sets[1].y());
}

#[test]
fn zero_iterations_keep_the_zeroth_pass() {
    let catalog = ubv_catalog();
    let config = CalibConfig::default();
    let sets = build_point_sets(&catalog, &config).unwrap();
    let chain = prepare_chain(&catalog, &config).unwrap();

    for (pair, set) in chain.pairs().iter().zip(&sets) {
        let zeroth = FitState::zeroth_pass(set, &OdrOptions::default()).unwrap();
        assert_eq!(pair.state().params, zeroth.params);
        assert_eq!(pair.state().n, zeroth.n);
        assert_eq!(pair.state().rms, zeroth.rms);
        assert!(pair.state().mask.iter().all(|&kept| kept));
    }
}

#[test]
fn frozen_pairs_reject_refit_and_toggle() {
    let mut chain = FitChain::from_catalog(&ubv_catalog(), CalibConfig::default()).unwrap();
    let frozen = chain.finish(1).unwrap();
    assert_eq!(frozen.n, 5);

    assert!(matches!(chain.refit(1), Err(CalibError::AlreadyFrozen { .. })));
    assert!(matches!(chain.toggle_point(1, 0), Err(CalibError::AlreadyFrozen { .. })));
    assert!(matches!(chain.iterate(1), Err(CalibError::AlreadyFrozen { .. })));

    // Finishing again is a no-op, and other pairs stay editable.
    assert_eq!(chain.finish(1).unwrap(), frozen);
    let state = chain.toggle_point(0, 0).unwrap();
    assert_eq!(state.n, 3);
    assert!(chain.results().is_none());
}

#[test]
fn single_point_pair_fails_before_fitting() {
    let mut catalog = ubv_catalog();
    for k in 1..5 {
        catalog.bands[0].std[k] = NULL;
    }
    let err = calibrate(&catalog, &CalibConfig::default()).unwrap_err();
    assert_eq!(
        err,
        CalibError::InsufficientPoints {
            pair: "Equation[1]".to_string(),
            n: 1
        }
    );
}

#[test]
fn synthetic_catalog_round_trip_through_files() {
    let options = SynthOptions {
        objects: 300,
        seed: 11,
        ..SynthOptions::default()
    };
    let synth = generate_catalog(&options).unwrap();

    let input = temp_path("synth.dat");
    fs::write(&input, format_catalog_text(&synth.catalog)).unwrap();
    let ingested = load_catalog(&input, None).unwrap();
    assert_eq!(ingested.catalog.labels(), vec!["U", "B", "V"]);

    let config = CalibConfig {
        iterations: 3,
        ..CalibConfig::default()
    };
    let run = calibrate(&ingested.catalog, &config).unwrap();
    for (r, truth) in run.results.iter().zip(&synth.truth) {
        assert!((r.params.a - truth.a).abs() < 0.02, "{}: A = {} vs {}", r.label, r.params.a, truth.a);
        assert!((r.params.b - truth.b).abs() < 0.02, "{}: B = {} vs {}", r.label, r.params.b, truth.b);
        assert!(r.n < r.mask.len(), "{}: outliers should be clipped", r.label);
    }

    let paths = OutputPaths::from_output(&temp_path("synth.std"));
    write_table(&paths.table, &run.table).unwrap();
    write_log(&paths.log, &run.results).unwrap();

    let table = fs::read_to_string(&paths.table).unwrap();
    assert_eq!(table.lines().count(), 300);
    let log = fs::read_to_string(&paths.log).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("# Eq_num"));
    assert!(lines[3].starts_with(" 3 "));

    let json = temp_path("fits.json");
    let fits = FitsFile::new(Some(input.as_path()), ingested.catalog.labels(), &config, run.results.clone());
    write_fits_json(&json, &fits).unwrap();
    let back = read_fits_json(&json).unwrap();
    assert_eq!(back.equations.len(), 3);
    for (b, r) in back.equations.iter().zip(&run.results) {
        assert_eq!(b.mask, r.mask);
        assert_eq!(b.n, r.n);
        assert!((b.params.a - r.params.a).abs() < 1e-12);
        assert!((b.params.b - r.params.b).abs() < 1e-12);
    }
    assert_eq!(back.settings.iterations, 3);

    for path in [&input, &paths.table, &paths.log, &json] {
        let _ = fs::remove_file(path);
    }
}

#[test]
fn explicit_coefficients_are_recovered_without_outliers() {
    let truth = vec![FitParams::new(0.05, -0.2), FitParams::new(-0.02, 0.3)];
    let options = SynthOptions {
        bands: vec!["B".to_string(), "V".to_string()],
        objects: 150,
        outlier_fraction: 0.0,
        coefficients: Some(truth.clone()),
        ..SynthOptions::default()
    };
    let synth = generate_catalog(&options).unwrap();
    let run = calibrate(&synth.catalog, &CalibConfig::default()).unwrap();
    for (r, t) in run.results.iter().zip(&truth) {
        assert!((r.params.a - t.a).abs() < 0.01);
        assert!((r.params.b - t.b).abs() < 0.01);
    }
}
