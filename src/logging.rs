//! Tracing setup for applications embedding the explorer

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default directive when neither `filter` nor `RUST_LOG` is given
pub const DEFAULT_FILTER: &str = "sumo_explorer=info";

/// Filter from `filter`, then `RUST_LOG`; unparsable directives fall back to
/// [`DEFAULT_FILTER`]
pub fn env_filter(filter: Option<&str>) -> EnvFilter {
    match filter {
        Some(directives) => EnvFilter::try_new(directives).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a fmt subscriber filtered by [`env_filter`].
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(filter: Option<&str>) -> bool {
    tracing_subscriber::registry()
        .with(env_filter(filter))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
