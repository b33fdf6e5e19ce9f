use std::sync::Once;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::PageConfig;

static INIT_TRACING: Once = Once::new();

/// Install the fmt subscriber. Safe to call more than once; only the first call has effect.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();

        info!("event page tracing initialized");
    });
}

/// Page bootstrap: tracing first, then the environment-provided config.
pub fn init_page() -> PageConfig {
    init_tracing();
    PageConfig::from_env()
}
