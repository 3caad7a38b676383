//! Credential pool for one upstream provider.
//!
//! A [`KeyPool`] hands out keys round-robin among the currently available
//! ones, takes success/failure reports back, classifies failures, and keeps
//! unhealthy keys out of rotation until their cooldown has passed. It does
//! no I/O of its own.

pub mod classifier;
pub mod clock;
pub mod config;
mod selector;
pub mod status;

pub use classifier::{
    ClassifierKind, FailureClassifier, FailureKind, KeywordClassifier, StatusCodeClassifier,
    UpstreamFailure,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::PoolConfig;
pub use status::{key_id, KeyStatus, KeyStatusView};

use crate::metrics::PoolMetrics;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use selector::RoundRobin;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const MAX_LOGGED_ERROR_CHARS: usize = 200;

/// Aggregate view of a pool for dashboards and health reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub provider: String,
    pub total_keys: usize,
    pub healthy_keys: usize,
    /// Keys that `get_next_key` could hand out right now.
    pub active_keys: usize,
    pub rate_limited_keys: usize,
    pub circuit_broken_keys: usize,
    pub total_uses: u64,
    pub total_failures: u64,
    /// Mean of the per-key averages that have at least one sample.
    pub average_response_time: f64,
}

struct PoolState {
    keys: Vec<KeyStatus>,
    index: HashMap<String, usize>,
    rotation: RoundRobin,
    last_health_check: DateTime<Utc>,
}

impl PoolState {
    fn status_mut(&mut self, key: &str) -> Option<&mut KeyStatus> {
        let slot = *self.index.get(key)?;
        self.keys.get_mut(slot)
    }

    fn healthy_count(&self) -> usize {
        self.keys.iter().filter(|s| s.is_healthy).count()
    }
}

pub struct KeyPool {
    provider: String,
    max_consecutive_failures: u32,
    circuit_breaker_cooldown: Duration,
    rate_limit_cooldown: Duration,
    health_check_interval: Duration,
    classifier: Box<dyn FailureClassifier>,
    clock: Arc<dyn Clock>,
    metrics: PoolMetrics,
    state: Mutex<PoolState>,
}

fn deadline(now: DateTime<Utc>, cooldown: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(cooldown)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn truncate(message: &str, max_chars: usize) -> String {
    message.chars().take(max_chars).collect()
}

impl KeyPool {
    /// Pool using the configured classifier and the system clock.
    pub fn new(config: PoolConfig) -> Self {
        let classifier = config.classifier.build();
        Self::with_clock(config, classifier, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: PoolConfig,
        classifier: Box<dyn FailureClassifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        let (keys, index) = register_keys(&config.provider, &config.keys, now);

        info!(
            provider = %config.provider,
            valid_keys = keys.len(),
            configured_keys = config.keys.len(),
            "Initialized API key pool"
        );

        let metrics = PoolMetrics::new(config.provider.clone());
        metrics.record_healthy_keys(keys.len());

        Self {
            provider: config.provider,
            max_consecutive_failures: config.max_consecutive_failures,
            circuit_breaker_cooldown: config.circuit_breaker_cooldown,
            rate_limit_cooldown: config.rate_limit_cooldown,
            health_check_interval: config.health_check_interval,
            classifier,
            clock,
            metrics,
            state: Mutex::new(PoolState {
                keys,
                index,
                rotation: RoundRobin::default(),
                last_health_check: now,
            }),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Number of registered keys, available or not.
    pub fn key_count(&self) -> usize {
        self.state.lock().keys.len()
    }

    /// Next key to use, or `None` when every key is cooling down.
    ///
    /// Runs the passive recovery sweep first, then rotates over the keys
    /// that are available at this instant, in registration order.
    pub fn get_next_key(&self) -> Option<String> {
        let now = self.clock.now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        self.run_health_sweep(state, now);

        let available: Vec<usize> = state
            .keys
            .iter()
            .enumerate()
            .filter(|(_, status)| status.is_available(now))
            .map(|(slot, _)| slot)
            .collect();

        let Some(slot) = state.rotation.select(&available) else {
            let rate_limited = state.keys.iter().filter(|s| s.is_rate_limited(now)).count();
            let circuit_broken = state.keys.iter().filter(|s| s.is_circuit_open(now)).count();
            error!(
                provider = %self.provider,
                total_keys = state.keys.len(),
                rate_limited_keys = rate_limited,
                circuit_broken_keys = circuit_broken,
                "No API keys available"
            );
            self.metrics.record_exhausted();
            return None;
        };

        let healthy_keys = state.healthy_count();
        let status = &mut state.keys[slot];
        status.total_uses += 1;

        info!(
            event = "key_selected",
            provider = %self.provider,
            key_id = %status.key_id,
            total_uses = status.total_uses,
            healthy_keys,
            "API key selected"
        );
        self.metrics.record_selection();

        Some(status.expose_key().to_owned())
    }

    /// Record a completed call. Unknown keys are ignored.
    pub fn report_success(&self, key: &str, response_time: Duration) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let Some(status) = state.status_mut(key) else {
            debug!(provider = %self.provider, "Success reported for unknown key, ignoring");
            return;
        };

        let breaker_cleared = status.record_success(response_time, now);
        if breaker_cleared {
            info!(
                event = "circuit_breaker_cleared",
                provider = %self.provider,
                key_id = %status.key_id,
                "Circuit breaker cleared after successful call"
            );
        }

        info!(
            event = "key_success",
            provider = %self.provider,
            key_id = %status.key_id,
            response_time_ms = response_time.as_millis() as u64,
            average_response_time_ms = status.average_response_time.round() as u64,
            "API call succeeded"
        );

        if breaker_cleared {
            let healthy = state.healthy_count();
            self.metrics.record_healthy_keys(healthy);
        }
    }

    /// Record a failed call and apply the cooldown its class calls for.
    /// Unknown keys are ignored.
    pub fn report_failure(
        &self,
        key: &str,
        failure: impl Into<UpstreamFailure>,
        response_time: Option<Duration>,
    ) {
        let failure = failure.into();
        let now = self.clock.now();
        let mut state = self.state.lock();
        let Some(status) = state.status_mut(key) else {
            debug!(provider = %self.provider, "Failure reported for unknown key, ignoring");
            return;
        };

        status.record_failure(response_time, now);
        let kind = self.classifier.classify(&failure);
        let mut breaker_opened = false;

        match kind {
            FailureKind::RateLimit => {
                let until = deadline(now, self.rate_limit_cooldown);
                status.rate_limit(until);
                warn!(
                    event = "key_rate_limited",
                    provider = %self.provider,
                    key_id = %status.key_id,
                    rate_limited_until = %until,
                    "API key rate limited, cooling down"
                );
            }
            _ if kind == FailureKind::Auth
                || status.consecutive_failures >= self.max_consecutive_failures =>
            {
                let reason = if kind == FailureKind::Auth {
                    "authentication"
                } else {
                    "consecutive_failures"
                };
                let until = deadline(now, self.circuit_breaker_cooldown);
                status.open_circuit(until);
                breaker_opened = true;
                error!(
                    event = "circuit_breaker_opened",
                    provider = %self.provider,
                    key_id = %status.key_id,
                    reason,
                    consecutive_failures = status.consecutive_failures,
                    circuit_breaker_until = %until,
                    "Circuit breaker opened for API key"
                );
                self.metrics.record_circuit_breaker_trip(reason);
            }
            _ => {}
        }

        warn!(
            event = "key_failure",
            provider = %self.provider,
            key_id = %status.key_id,
            consecutive_failures = status.consecutive_failures,
            kind = %kind,
            error = %truncate(&failure.message, MAX_LOGGED_ERROR_CHARS),
            "API call failed"
        );
        self.metrics.record_failure(kind);

        if breaker_opened {
            let healthy = state.healthy_count();
            self.metrics.record_healthy_keys(healthy);
        }
    }

    /// Re-admit keys whose cooldowns have elapsed. Runs at most once per
    /// `health_check_interval`.
    fn run_health_sweep(&self, state: &mut PoolState, now: DateTime<Utc>) {
        // a clock that stepped backwards makes the sweep due at once
        let due = now
            .signed_duration_since(state.last_health_check)
            .to_std()
            .map_or(true, |elapsed| elapsed >= self.health_check_interval);
        if !due {
            return;
        }
        state.last_health_check = now;

        let mut recovered = 0;
        for status in &mut state.keys {
            let mut key_recovered = false;

            if status.lift_expired_rate_limit(now) {
                info!(
                    event = "rate_limit_recovered",
                    provider = %self.provider,
                    key_id = %status.key_id,
                    "API key rate limit lifted"
                );
                key_recovered = true;
            }

            let failures_before = status.consecutive_failures;
            if status.close_expired_circuit(now) {
                info!(
                    event = "circuit_breaker_recovered",
                    provider = %self.provider,
                    key_id = %status.key_id,
                    failures_before,
                    consecutive_failures = status.consecutive_failures,
                    "API key re-admitted after circuit breaker cooldown"
                );
                key_recovered = true;
            }

            if key_recovered {
                recovered += 1;
            }
        }

        if recovered > 0 {
            let healthy_keys = state.healthy_count();
            info!(
                provider = %self.provider,
                recovered,
                healthy_keys,
                "Health check recovered API keys"
            );
            self.metrics.record_recoveries(recovered);
            self.metrics.record_healthy_keys(healthy_keys);
        }
    }

    pub fn get_usage_stats(&self) -> UsageStats {
        let now = self.clock.now();
        let state = self.state.lock();

        let latencies: Vec<f64> = state
            .keys
            .iter()
            .map(|s| s.average_response_time)
            .filter(|avg| *avg > 0.0)
            .collect();
        let average_response_time = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<f64>() / latencies.len() as f64
        };

        UsageStats {
            provider: self.provider.clone(),
            total_keys: state.keys.len(),
            healthy_keys: state.healthy_count(),
            active_keys: state.keys.iter().filter(|s| s.is_available(now)).count(),
            rate_limited_keys: state.keys.iter().filter(|s| s.is_rate_limited(now)).count(),
            circuit_broken_keys: state.keys.iter().filter(|s| s.is_circuit_open(now)).count(),
            total_uses: state.keys.iter().map(|s| s.total_uses).sum(),
            total_failures: state.keys.iter().map(|s| s.total_failures).sum(),
            average_response_time,
        }
    }

    /// Per-key snapshots in registration order, without the raw keys.
    pub fn get_key_statuses(&self) -> Vec<KeyStatusView> {
        self.state.lock().keys.iter().map(KeyStatus::view).collect()
    }
}

impl fmt::Debug for KeyPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPool")
            .field("provider", &self.provider)
            .field("keys", &self.key_count())
            .field("max_consecutive_failures", &self.max_consecutive_failures)
            .finish_non_exhaustive()
    }
}

fn register_keys(
    provider: &str,
    keys: &[String],
    now: DateTime<Utc>,
) -> (Vec<KeyStatus>, HashMap<String, usize>) {
    let mut statuses = Vec::with_capacity(keys.len());
    let mut index = HashMap::with_capacity(keys.len());

    for (position, key) in keys.iter().enumerate() {
        if key.trim().is_empty() {
            warn!(provider, position, "Skipping blank API key entry");
            continue;
        }
        if index.contains_key(key) {
            warn!(provider, position, key_id = %key_id(key), "Skipping duplicate API key entry");
            continue;
        }
        index.insert(key.clone(), statuses.len());
        statuses.push(KeyStatus::new(key, now));
    }

    (statuses, index)
}
