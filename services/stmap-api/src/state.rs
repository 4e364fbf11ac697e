//! Application state for the stmap API.

use metrics_exporter_prometheus::PrometheusHandle;
use stmap_core::{CoreConfig, Dispatcher};

use crate::cache::ResponseCache;

/// Shared application state.
pub struct AppState {
    /// Pipeline configuration.
    pub config: CoreConfig,

    /// Runs calls against the data root.
    pub dispatcher: Dispatcher,

    /// Encoded responses of recent calls.
    pub cache: ResponseCache,

    /// Renders the Prometheus exposition; absent when no recorder is
    /// installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: CoreConfig) -> Self {
        let dispatcher = Dispatcher::new(&config);
        let cache = ResponseCache::new(config.cache_capacity_bytes, config.stale_after);
        Self {
            config,
            dispatcher,
            cache,
            prometheus: None,
        }
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}
