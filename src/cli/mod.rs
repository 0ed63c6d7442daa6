//! Command-line parsing for the standard-photometry calibrator.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the fitting code.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::domain::{CalibConfig, DEFAULT_MIN_ERROR, DEFAULT_NULL_MARKER, DEFAULT_SIGMA_FACTOR};
use crate::io::ColumnSpec;

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "stdphot",
    version,
    about = "Instrumental-to-standard magnitude calibration with sigma-clipped color terms"
)]
pub struct Cli {
    /// More log output (-v debug, -vv trace). `RUST_LOG` overrides.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors.
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Log verbosity: -1 quiet, 0 default, then one step per `-v`.
    pub fn verbosity(&self) -> i8 {
        if self.quiet { -1 } else { self.verbose.min(2) as i8 }
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit the transformation equations and write standardized magnitudes.
    Calibrate(CalibrateArgs),
    /// Write a synthetic catalog with known color terms.
    Synth(SynthArgs),
    /// Redraw figures from a fit summary written by `--export-fits`.
    Plot(PlotArgs),
}

/// Options for a calibration run.
#[derive(Debug, Parser, Clone)]
pub struct CalibrateArgs {
    /// Input photometry table. A picker is offered when omitted.
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Output table; the fit log goes next to it with a `.log` extension.
    /// Defaults to the input with a `.std` extension.
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Columns to read: 1-based numbers or increasing ranges, e.g. "1 3:14".
    #[arg(short = 'c', long, value_parser = parse_columns)]
    pub columns: Option<ColumnSpec>,

    /// Clipping threshold in units of the RMS.
    #[arg(short = 's', long, env = "STDPHOT_SIGMA", default_value_t = DEFAULT_SIGMA_FACTOR)]
    pub sigma: f64,

    /// Automatic refit/clip iterations per equation (negative counts are negated).
    #[arg(
        short = 'i',
        long,
        env = "STDPHOT_ITERATIONS",
        default_value_t = 0,
        allow_negative_numbers = true
    )]
    pub iterations: i64,

    /// Review every equation in the terminal UI before writing output.
    #[arg(short = 'I', long)]
    pub interactive: bool,

    /// Start the review with error bars shown.
    #[arg(short = 'e', long)]
    pub error_bars: bool,

    /// Value marking a missing magnitude or error.
    #[arg(long, env = "STDPHOT_NULL_MARKER", default_value_t = DEFAULT_NULL_MARKER)]
    pub null_marker: f64,

    /// Floor applied to every error before weighting.
    #[arg(long, env = "STDPHOT_MIN_ERROR", default_value_t = DEFAULT_MIN_ERROR)]
    pub min_error: f64,

    /// Write one SVG figure per equation next to the output table.
    #[arg(long)]
    pub figures: bool,

    /// Export the fitted equations (coefficients, points, masks) to JSON.
    #[arg(long = "export-fits", value_name = "JSON")]
    pub export_fits: Option<PathBuf>,

    /// Print an ASCII plot of every equation.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 18)]
    pub height: usize,
}

impl CalibrateArgs {
    pub fn calib_config(&self) -> CalibConfig {
        CalibConfig {
            sigma_factor: self.sigma,
            iterations: self.iterations.unsigned_abs() as usize,
            interactive: self.interactive,
            null_marker: self.null_marker,
            min_error: self.min_error,
        }
    }
}

/// Options for synthetic catalog generation.
#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    /// Where to write the catalog.
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Band labels, bluest first.
    #[arg(long, value_delimiter = ',', default_value = "U,B,V")]
    pub bands: Vec<String>,

    /// Number of objects.
    #[arg(short = 'n', long, default_value_t = 200)]
    pub objects: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Probability of a null instrumental reading.
    #[arg(long, default_value_t = 0.02)]
    pub null_fraction: f64,

    /// Probability of an object without standard magnitudes.
    #[arg(long, default_value_t = 0.1)]
    pub field_fraction: f64,

    /// Probability of a standard magnitude shifted by 0.8 mag.
    #[arg(long, default_value_t = 0.03)]
    pub outlier_fraction: f64,
}

/// Options for plotting a saved fit summary.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Fit summary produced by `stdphot calibrate --export-fits`.
    #[arg(value_name = "JSON")]
    pub fits: PathBuf,

    /// Print ASCII plots instead of writing SVG figures.
    #[arg(long)]
    pub ascii: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 18)]
    pub height: usize,
}

fn parse_columns(s: &str) -> Result<ColumnSpec, String> {
    ColumnSpec::parse(s).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibrate_flags_build_config() {
        let cli = Cli::parse_from(["stdphot", "calibrate", "in.dat", "-s", "2.5", "-i", "-3", "-c", "1 2:9"]);
        let Command::Calibrate(args) = cli.command else {
            panic!("expected calibrate");
        };
        let config = args.calib_config();
        assert_eq!(config.iterations, 3);
        assert!((config.sigma_factor - 2.5).abs() < 1e-12);
        assert_eq!(args.columns.map(|c| c.len()), Some(9));
    }

    #[test]
    fn verbosity_levels() {
        let cli = Cli::parse_from(["stdphot", "-vv", "synth", "out.dat"]);
        assert_eq!(cli.verbosity(), 2);
        let cli = Cli::parse_from(["stdphot", "synth", "out.dat", "-q", "--bands", "B,V,R,I"]);
        assert_eq!(cli.verbosity(), -1);
        let Command::Synth(args) = cli.command else {
            panic!("expected synth");
        };
        assert_eq!(args.bands, vec!["B", "V", "R", "I"]);
    }
}
