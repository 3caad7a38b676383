// src/pool/status.rs

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;

const KEY_ID_PREFIX_CHARS: usize = 8;
const EMA_PREVIOUS_WEIGHT: f64 = 0.8;
const EMA_SAMPLE_WEIGHT: f64 = 0.2;

/// Redacted, log-safe form of a credential: the first eight characters
/// followed by `...`. Keys of eight characters or fewer keep all of them.
pub fn key_id(key: &str) -> String {
    let prefix: String = key.chars().take(KEY_ID_PREFIX_CHARS).collect();
    format!("{prefix}...")
}

fn as_millis_f64(duration: Duration) -> f64 {
    duration.as_micros() as f64 / 1000.0
}

/// Runtime state of a single credential inside a pool.
///
/// The raw key is held as a secret so that `Debug` output never carries it.
#[derive(Clone, Debug)]
pub struct KeyStatus {
    key: SecretString,
    pub key_id: String,
    pub is_healthy: bool,
    pub consecutive_failures: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_success_time: Option<DateTime<Utc>>,
    pub total_uses: u64,
    pub total_failures: u64,
    /// Exponential moving average in milliseconds, 0 until the first sample.
    pub average_response_time: f64,
    pub rate_limited_until: Option<DateTime<Utc>>,
    pub circuit_breaker_until: Option<DateTime<Utc>>,
}

impl KeyStatus {
    /// Create a fresh, optimistically healthy status.
    pub fn new(key: &str, now: DateTime<Utc>) -> Self {
        Self {
            key: SecretString::new(key.to_owned()),
            key_id: key_id(key),
            is_healthy: true,
            consecutive_failures: 0,
            last_failure_time: None,
            last_success_time: Some(now),
            total_uses: 0,
            total_failures: 0,
            average_response_time: 0.0,
            rate_limited_until: None,
            circuit_breaker_until: None,
        }
    }

    pub(crate) fn expose_key(&self) -> &str {
        self.key.expose_secret()
    }

    pub fn is_rate_limited(&self, now: DateTime<Utc>) -> bool {
        self.rate_limited_until.is_some_and(|until| now < until)
    }

    pub fn is_circuit_open(&self, now: DateTime<Utc>) -> bool {
        self.circuit_breaker_until.is_some_and(|until| now < until)
    }

    /// A key is available iff it is healthy and neither timer is running.
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.is_healthy && !self.is_rate_limited(now) && !self.is_circuit_open(now)
    }

    fn observe_latency(&mut self, millis: f64) {
        if self.average_response_time == 0.0 {
            self.average_response_time = millis;
        } else {
            self.average_response_time =
                self.average_response_time * EMA_PREVIOUS_WEIGHT + millis * EMA_SAMPLE_WEIGHT;
        }
    }

    /// Record a successful call. Returns `true` when this closed an open
    /// circuit breaker.
    pub fn record_success(&mut self, response_time: Duration, now: DateTime<Utc>) -> bool {
        self.is_healthy = true;
        self.consecutive_failures = 0;
        self.last_success_time = Some(now);
        self.observe_latency(as_millis_f64(response_time));
        self.circuit_breaker_until.take().is_some()
    }

    /// Bump the failure counters. Classification and the resulting
    /// cooldowns are decided by the pool.
    pub fn record_failure(&mut self, response_time: Option<Duration>, now: DateTime<Utc>) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.total_failures += 1;
        self.last_failure_time = Some(now);

        if let Some(elapsed) = response_time.filter(|d| !d.is_zero()) {
            self.observe_latency(as_millis_f64(elapsed));
        }
    }

    pub fn rate_limit(&mut self, until: DateTime<Utc>) {
        self.rate_limited_until = Some(until);
    }

    pub fn open_circuit(&mut self, until: DateTime<Utc>) {
        self.circuit_breaker_until = Some(until);
        self.is_healthy = false;
    }

    /// Clear a rate limit whose cooldown has elapsed.
    pub fn lift_expired_rate_limit(&mut self, now: DateTime<Utc>) -> bool {
        match self.rate_limited_until {
            Some(until) if now >= until => {
                self.rate_limited_until = None;
                true
            }
            _ => false,
        }
    }

    /// Close a circuit breaker whose cooldown has elapsed. The failure
    /// count is halved rather than reset, so a key that keeps failing
    /// re-trips sooner than a fresh one but not on its first new failure.
    pub fn close_expired_circuit(&mut self, now: DateTime<Utc>) -> bool {
        match self.circuit_breaker_until {
            Some(until) if now >= until => {
                self.circuit_breaker_until = None;
                self.is_healthy = true;
                self.consecutive_failures /= 2;
                true
            }
            _ => false,
        }
    }

    /// Copy of this status with the raw key stripped.
    pub fn view(&self) -> KeyStatusView {
        KeyStatusView {
            key_id: self.key_id.clone(),
            is_healthy: self.is_healthy,
            consecutive_failures: self.consecutive_failures,
            last_failure_time: self.last_failure_time,
            last_success_time: self.last_success_time,
            total_uses: self.total_uses,
            total_failures: self.total_failures,
            average_response_time: self.average_response_time,
            rate_limited_until: self.rate_limited_until,
            circuit_breaker_until: self.circuit_breaker_until,
        }
    }
}

/// Public snapshot of a [`KeyStatus`]; identifies the key only by `key_id`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyStatusView {
    pub key_id: String,
    pub is_healthy: bool,
    pub consecutive_failures: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_success_time: Option<DateTime<Utc>>,
    pub total_uses: u64,
    pub total_failures: u64,
    pub average_response_time: f64,
    pub rate_limited_until: Option<DateTime<Utc>>,
    pub circuit_breaker_until: Option<DateTime<Utc>>,
}
