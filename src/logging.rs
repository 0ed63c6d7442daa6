//! Console logging setup.
//!
//! Diagnostics go to stderr through `tracing`. `RUST_LOG` overrides the level
//! derived from `-q` / `-v`. While the review TUI owns the terminal the
//! console writer is muted so log lines do not tear the alternate screen.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static CONSOLE_MUTED: AtomicBool = AtomicBool::new(false);

/// Default filter for a verbosity level: `-1` quiet, `0` info, `1` debug, `2+` trace.
pub fn default_filter(verbosity: i8) -> &'static str {
    match verbosity {
        i8::MIN..=-1 => "warn",
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are no-ops.
pub fn init(verbosity: i8) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(console_writer);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init();
}

/// Silence (or restore) console output.
pub fn mute_console(muted: bool) {
    CONSOLE_MUTED.store(muted, Ordering::Relaxed);
}

fn console_writer() -> Box<dyn Write> {
    if CONSOLE_MUTED.load(Ordering::Relaxed) {
        Box::new(io::sink())
    } else {
        Box::new(io::stderr())
    }
}
