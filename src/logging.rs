use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info,portfolio_relay=debug";

/// Install the global subscriber; `RUST_LOG` overrides the default filter
///
/// Calling it twice is harmless, the second install is ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init();
}
