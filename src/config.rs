use std::env;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

/// Per-resource budget before an unsettled resource is forced to an error.
pub const LOAD_TIMEOUT_MS: u64 = 10_000;

/// Budget for one outgoing API call, body included.
pub const REQUEST_TIMEOUT_MS: u64 = 15_000;

/// Message carried by a call aborted by its own timeout.
pub const TIMEOUT_MESSAGE: &str = "Request timeout, please try again.";

/// Filename used when the server omits `content-disposition`.
pub const DEFAULT_DOWNLOAD_NAME: &str = "download.csv";

/// Kind label used by `complete`/`invalid` when the caller gives none.
pub const DEFAULT_RESOURCE_KIND: &str = "asset";

/// Environment variable holding the API base URL.
pub const BASE_URL_ENV: &str = "EVENT_PAGE_URL";

/// Page-level configuration shared by the request client and the readiness tracker.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    /// API base URL as supplied by the page; may carry a trailing slash.
    pub base_url: String,
    /// Timeout applied to every outgoing call.
    pub request_timeout_ms: u64,
    /// Timeout applied to every watched resource.
    pub load_timeout_ms: u64,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            request_timeout_ms: REQUEST_TIMEOUT_MS,
            load_timeout_ms: LOAD_TIMEOUT_MS,
        }
    }
}

impl PageConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Build a config from `EVENT_PAGE_URL`, keeping the default timeouts.
    pub fn from_env() -> Self {
        match env::var(BASE_URL_ENV) {
            Ok(url) => {
                info!("{} set, api base: {}", BASE_URL_ENV, url);
                Self::new(url)
            }
            Err(_) => {
                warn!("{} not set, api calls will use relative paths", BASE_URL_ENV);
                Self::default()
            }
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Base URL with a single trailing slash removed.
    pub fn api_base(&self) -> &str {
        self.base_url.strip_suffix('/').unwrap_or(&self.base_url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }
}
