//! Tracing subscriber bootstrap.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static LOG_INIT_ONCE: Once = Once::new();

/// Install a fmt subscriber filtered by `VIRGL_LOG`, falling back to
/// `RUST_LOG` and then `warn`. Safe to call more than once; an already
/// installed global subscriber wins.
pub fn init() {
    LOG_INIT_ONCE.call_once(|| {
        let filter = EnvFilter::try_from_env("VIRGL_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}
