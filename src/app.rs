//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - loads the input table
//! - runs the calibration (batch or reviewed in the TUI)
//! - prints the summary and writes the output files

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{debug, info};

use crate::cli::{CalibrateArgs, Command, PlotArgs, SynthArgs};
use crate::data::{SynthOptions, format_catalog_text, generate_catalog};
use crate::error::AppError;
use crate::io::{FitsFile, OutputPaths, load_catalog, read_fits_json, write_fits_json, write_log, write_table};

pub mod pipeline;

/// Entry point for the `stdphot` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env file is the normal case.
    let _ = dotenvy::dotenv();

    // `stdphot table.dat -i 3` behaves like `stdphot calibrate table.dat -i 3`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);
    crate::logging::init(cli.verbosity());

    match cli.command {
        Command::Calibrate(args) => handle_calibrate(args),
        Command::Synth(args) => handle_synth(args),
        Command::Plot(args) => handle_plot(args),
    }
}

fn handle_calibrate(args: CalibrateArgs) -> Result<(), AppError> {
    let input = match &args.input {
        Some(path) => path.clone(),
        None => crate::cli::picker::prompt_for_table_path()?,
    };
    let config = args.calib_config();
    config.validate()?;

    let paths = OutputPaths::from_output(&output_path(&args, &input));
    paths.check_not_input(&input)?;
    let ingested = load_catalog(&input, args.columns.as_ref())?;
    let catalog = ingested.catalog;
    debug!(
        identifier = %ingested.identifier,
        labels_from_header = ingested.labels_from_header,
        rows = ingested.rows_read,
        "ingested table"
    );

    let source = input.display().to_string();
    let run = pipeline::calibrate_with_review(&catalog, &config, |chain| {
        crate::tui::run(chain, args.error_bars, &source)
    })?;

    println!(
        "{}",
        crate::report::format_run_summary(Some(input.as_path()), &catalog, &config, &run.results, &run.table)
    );

    if args.plot {
        for r in &run.results {
            println!("{}", crate::plot::render_ascii_plot(r, args.width, args.height));
        }
    }

    write_table(&paths.table, &run.table)?;
    write_log(&paths.log, &run.results)?;
    if args.figures {
        crate::plot::write_figures(&run.results, |n| paths.figure(n))?;
    }
    if let Some(path) = &args.export_fits {
        let fits = FitsFile::new(Some(input.as_path()), catalog.labels(), &config, run.results.clone());
        write_fits_json(path, &fits)?;
        info!(path = %path.display(), "wrote fit summary");
    }

    Ok(())
}

/// `--output`, or the input with a `.std` extension. Inputs whose table or
/// log would land on themselves get `.std.out` instead.
fn output_path(args: &CalibrateArgs, input: &Path) -> PathBuf {
    if let Some(output) = &args.output {
        return output.clone();
    }
    let std = input.with_extension("std");
    if OutputPaths::from_output(&std).check_not_input(input).is_ok() {
        std
    } else {
        input.with_extension("std.out")
    }
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let options = SynthOptions {
        bands: args.bands,
        objects: args.objects,
        seed: args.seed,
        null_fraction: args.null_fraction,
        field_fraction: args.field_fraction,
        outlier_fraction: args.outlier_fraction,
        ..SynthOptions::default()
    };
    let synth = generate_catalog(&options)?;
    fs::write(&args.output, format_catalog_text(&synth.catalog))
        .map_err(|e| AppError::new(2, format!("Failed to write '{}': {e}", args.output.display())))?;

    info!(path = %args.output.display(), objects = options.objects, "wrote synthetic catalog");
    for (i, p) in synth.truth.iter().enumerate() {
        println!("Equation[{}]  A = {:8.4}  B = {:8.4}", i + 1, p.a, p.b);
    }
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let fits = read_fits_json(&args.fits)?;
    if args.ascii {
        for r in &fits.equations {
            println!("{}", crate::plot::render_ascii_plot(r, args.width, args.height));
        }
        return Ok(());
    }

    let paths = OutputPaths::from_output(&args.fits);
    let written = crate::plot::write_figures(&fits.equations, |n| paths.figure(n))?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

/// Rewrite argv so `stdphot` defaults to `stdphot calibrate`.
///
/// Rules:
/// - `stdphot`                        -> `stdphot calibrate` (picker)
/// - `stdphot table.dat ...`          -> `stdphot calibrate table.dat ...`
/// - `stdphot -i 3 ...`               -> `stdphot calibrate -i 3 ...`
/// - `stdphot --help/--version/-h`    -> unchanged
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("calibrate".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    let is_subcommand = matches!(arg1.as_str(), "calibrate" | "synth" | "plot");
    if is_top_level_help_or_version || is_subcommand {
        return argv;
    }

    // Global flags stay in front; anything else starts the calibrate args.
    let first_other = argv
        .iter()
        .skip(1)
        .position(|a| !is_global_flag(a))
        .map(|p| p + 1);
    match first_other {
        Some(idx) if matches!(argv[idx].as_str(), "calibrate" | "synth" | "plot") => {}
        Some(idx) => argv.insert(idx, "calibrate".to_string()),
        None => argv.push("calibrate".to_string()),
    }
    argv
}

fn is_global_flag(arg: &str) -> bool {
    match arg {
        "-q" | "--quiet" | "--verbose" => true,
        _ => arg.strip_prefix('-').is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c == 'v')),
    }
}
