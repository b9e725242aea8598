//! Diagnostic logging setup.

use std::io;

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Level for pluck's own crates given the number of `-v` flags.
fn level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Filter directives used when `RUST_LOG` is unset.
fn default_directives(verbosity: u8) -> String {
    let level = level(verbosity);
    format!("warn,pluck={level},pluck_oci={level}")
}

/// Installs the global subscriber. Logs go to stderr; stdout may carry file content.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbosity)));

    let layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(io::stderr)
        .with_target(false);

    tracing_subscriber::registry().with(filter).with(layer).init();
}
