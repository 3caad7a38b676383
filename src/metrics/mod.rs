//! Metrics collection and export module
//!
//! Pools report through [`PoolMetrics`], which records into the `metrics`
//! facade when the `metrics` feature is on and does nothing otherwise.
//! The Prometheus exporter lives in [`exporters`].

#[cfg(feature = "metrics")]
pub mod exporters;
#[cfg(feature = "metrics")]
pub use exporters::{install_recorder, metrics_handler};

use crate::pool::FailureKind;

/// Per-provider metric handles for one pool.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    provider: String,
}

impl PoolMetrics {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
        }
    }

    pub fn record_selection(&self) {
        #[cfg(feature = "metrics")]
        ::metrics::counter!("key_pool_selections_total", "provider" => self.provider.clone())
            .increment(1);
    }

    pub fn record_exhausted(&self) {
        #[cfg(feature = "metrics")]
        ::metrics::counter!("key_pool_exhausted_total", "provider" => self.provider.clone())
            .increment(1);
    }

    pub fn record_failure(&self, kind: FailureKind) {
        #[cfg(feature = "metrics")]
        ::metrics::counter!(
            "key_pool_failures_total",
            "provider" => self.provider.clone(),
            "kind" => kind.as_str()
        )
        .increment(1);
        #[cfg(not(feature = "metrics"))]
        let _ = kind;
    }

    pub fn record_circuit_breaker_trip(&self, reason: &'static str) {
        #[cfg(feature = "metrics")]
        ::metrics::counter!(
            "key_pool_circuit_breaker_trips_total",
            "provider" => self.provider.clone(),
            "reason" => reason
        )
        .increment(1);
        #[cfg(not(feature = "metrics"))]
        let _ = reason;
    }

    pub fn record_recoveries(&self, recovered: usize) {
        #[cfg(feature = "metrics")]
        ::metrics::counter!("key_pool_recoveries_total", "provider" => self.provider.clone())
            .increment(recovered as u64);
        #[cfg(not(feature = "metrics"))]
        let _ = recovered;
    }

    pub fn record_healthy_keys(&self, healthy: usize) {
        #[cfg(feature = "metrics")]
        ::metrics::gauge!("key_pool_healthy_keys", "provider" => self.provider.clone())
            .set(healthy as f64);
        #[cfg(not(feature = "metrics"))]
        let _ = healthy;
    }
}
