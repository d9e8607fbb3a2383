//! Browser console logging for the request and session layer.
//!
//! Events from `client` (requests, cancellations, token renewals) and
//! from this crate go to the javascript console. `init_logging` uses a
//! filter that shows both at debug level.

use tracing_subscriber::{EnvFilter, prelude::*};
use tracing_web::MakeWebConsoleWriter;

const DEFAULT_FILTER: &str = "error,ui=debug,client=debug";

pub fn init_logging() {
    init_logging_with(DEFAULT_FILTER);
}

/// Install a console subscriber with the given filter directives. Later
/// calls are ignored, so every entry point may call this.
pub fn init_logging_with(directives: &str) {
    // Browsers have no clock for std::time and render ANSI codes poorly.
    let console = tracing_subscriber::fmt::layer()
        .with_writer(MakeWebConsoleWriter::new().with_pretty_level())
        .without_time()
        .with_ansi(false)
        .with_level(false)
        .with_line_number(true);

    let installed = tracing_subscriber::registry()
        .with(EnvFilter::new(directives))
        .with(console)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(directives, "Console logging ready");
    }
}
