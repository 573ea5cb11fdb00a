use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt};

static INIT_TRACING: Once = Once::new();

/// Install the global tracing subscriber. `RUST_LOG` takes precedence over `default_level`.
/// Safe to call more than once; only the first call has an effect.
pub fn init_tracing(default_level: &str) {
    INIT_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("bankledger={}", default_level)));

        // stdout is reserved for command output.
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    });
}
