//! Diagnostic logging setup for the command-line driver.

use std::sync::Once;

static INIT: Once = Once::new();

/// Install the global subscriber once. `level` takes precedence over `RUST_LOG`.
pub fn init(level: Option<&str>) {
    INIT.call_once(|| {
        if tracing::dispatcher::has_been_set() {
            return;
        }

        let directive = match level {
            Some(l) if !l.is_empty() => l.to_string(),
            _ => std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()),
        };

        let filter = tracing_subscriber::EnvFilter::try_new(&directive).unwrap_or_else(|e| {
            eprintln!("warning: invalid log level '{}': {}; using 'warn'", directive, e);
            tracing_subscriber::EnvFilter::new("warn")
        });

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .try_init();
    });
}
