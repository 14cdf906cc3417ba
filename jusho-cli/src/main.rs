//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use tracing_subscriber::EnvFilter;

fn main() {
    init_logging();
    if let Err(err) = jusho_cli::run() {
        if let Some(class) = err.class() {
            log::debug!("resolution failed with status {}", class.status_code());
        }
        eprintln!("jusho: {err}");
        std::process::exit(1);
    }
}

/// Send log records to stderr, filtered by `RUST_LOG` (default `info`).
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
