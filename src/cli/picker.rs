//! Interactive input-table picker.
//!
//! Used when `stdphot calibrate` is run without an input path: the working
//! tree is searched for photometry tables (`*.dat`, `*.txt`) and the operator
//! picks one by number or types a path.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// Directory recursion depth of the search.
const DEFAULT_SEARCH_DEPTH: usize = 4;

/// Extensions offered by the picker.
pub const TABLE_EXTENSIONS: [&str; 2] = ["dat", "txt"];

/// Prompt on stdin/stdout for an input table.
///
/// Accepts a number from the list or an explicit path; `q` cancels.
pub fn prompt_for_table_path() -> Result<PathBuf, AppError> {
    let files = discover_tables(Path::new("."));
    if files.is_empty() {
        return Err(AppError::new(
            2,
            "No .dat or .txt tables found. Provide one with `stdphot calibrate <table>`.",
        ));
    }

    println!("Found {} table(s):", files.len());
    for (idx, path) in files.iter().enumerate() {
        println!("{:>3}) {}", idx + 1, pretty_path(path));
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("Select a table by number (1-{}) or type a path (q to quit): ", files.len());
        io::stdout()
            .flush()
            .map_err(|e| AppError::new(2, format!("Failed to write prompt: {e}")))?;

        let input = match lines.next() {
            Some(line) => line.map_err(|e| AppError::new(2, format!("Failed to read input: {e}")))?,
            None => {
                return Err(AppError::new(
                    2,
                    "No input received. Provide a table with `stdphot calibrate <table>`.",
                ));
            }
        };

        match resolve_choice(input.trim(), &files) {
            Ok(Some(path)) => return Ok(path),
            Ok(None) => return Err(AppError::new(2, "Canceled.")),
            Err(err) => println!("{err}"),
        }
    }
}

/// Interpret one answer to the prompt. `Ok(None)` means the operator quit.
fn resolve_choice(input: &str, files: &[PathBuf]) -> Result<Option<PathBuf>, AppError> {
    if input.eq_ignore_ascii_case("q") {
        return Ok(None);
    }
    if let Ok(choice) = input.parse::<usize>() {
        return match files.get(choice.wrapping_sub(1)) {
            Some(path) => validate_table_path(path).map(Some),
            None => Err(AppError::new(
                2,
                format!("Invalid choice: {choice}. Enter a number between 1 and {}.", files.len()),
            )),
        };
    }
    validate_table_path(Path::new(input)).map(Some)
}

/// Check that `path` is an existing file. Any extension is accepted here;
/// the extension filter only applies to discovery.
pub fn validate_table_path(path: &Path) -> Result<PathBuf, AppError> {
    if !path.exists() {
        return Err(AppError::new(2, format!("Input table not found: {}", path.display())));
    }
    if path.is_dir() {
        return Err(AppError::new(
            2,
            format!("Expected a file, got a directory: {}", path.display()),
        ));
    }
    Ok(path.to_path_buf())
}

/// Tables under `root`, sorted by display path.
pub fn discover_tables(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    walk(root, 0, &mut out);
    out.sort_by_key(|p| pretty_path(p));
    out
}

fn walk(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) {
    if depth > DEFAULT_SEARCH_DEPTH {
        return;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            if !should_skip_dir(&path) {
                walk(&path, depth + 1, out);
            }
        } else if file_type.is_file() && is_table(&path) {
            out.push(path);
        }
    }
}

fn is_table(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| TABLE_EXTENSIONS.iter().any(|t| ext.eq_ignore_ascii_case(t)))
}

fn should_skip_dir(path: &Path) -> bool {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    matches!(name, ".git" | "target" | "node_modules")
}

fn pretty_path(path: &Path) -> String {
    let stripped = path.strip_prefix("./").unwrap_or(path);
    stripped.display().to_string()
}
