//! Structured logging configuration.
//!
//! Provides setup for observability using the `tracing` crate with:
//! - Plain text or JSON output
//! - Log levels from the command line, `RUST_LOG` overriding

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

/// Initialize tracing for the process.
///
/// `RUST_LOG` takes precedence over `level` when set. Logs go to stderr so
/// they never interleave with events printed on stdout.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed.
pub fn init_tracing(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        let json_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default().with(env_filter).with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true);

        Registry::default().with(env_filter).with(fmt_layer).init();
    }

    tracing::debug!("Tracing initialized: level={}, json={}", level, json);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_json() {
        // The only subscriber installed in this test binary
        init_tracing("debug", true);
        tracing::debug!(check = true, "Subscriber accepts structured fields");
        assert!(tracing::dispatcher::has_been_set());
    }
}
