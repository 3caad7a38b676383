// src/state.rs

use crate::config::AppConfig;
use crate::registry::PoolRegistry;
use std::fmt;
use tracing::info;

/// Shared application state accessible by all axum handlers.
pub struct AppState {
    pub registry: PoolRegistry,
    #[cfg(feature = "metrics")]
    pub metrics: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl AppState {
    /// Builds the registry from `config`. No metrics recorder is attached.
    pub fn new(config: &AppConfig) -> Self {
        let registry = PoolRegistry::from_config(config);
        info!(
            providers = ?registry.providers(),
            "Creating shared AppState"
        );
        Self {
            registry,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, handle: Option<metrics_exporter_prometheus::PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
