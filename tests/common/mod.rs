//! Common test utilities and fixtures

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use provider_key_pool::pool::{KeyPool, KeywordClassifier, ManualClock, PoolConfig};
use std::sync::Arc;
use std::time::Duration;

pub const BREAKER_COOLDOWN: Duration = Duration::from_secs(300);
pub const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(60);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Pool configuration builder with short, predictable timings.
pub struct TestPoolBuilder {
    config: PoolConfig,
}

impl TestPoolBuilder {
    pub fn new(keys: &[&str]) -> Self {
        let mut config =
            PoolConfig::for_provider("test", keys.iter().map(|k| k.to_string()).collect());
        config.max_consecutive_failures = 3;
        config.circuit_breaker_cooldown = BREAKER_COOLDOWN;
        config.rate_limit_cooldown = RATE_LIMIT_COOLDOWN;
        config.health_check_interval = SWEEP_INTERVAL;
        Self { config }
    }

    pub fn max_failures(mut self, max: u32) -> Self {
        self.config.max_consecutive_failures = max;
        self
    }

    /// Pool driven by a manual clock starting at 2024-01-01T00:00:00Z.
    pub fn build(self) -> (KeyPool, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let pool = KeyPool::with_clock(
            self.config,
            Box::new(KeywordClassifier),
            Arc::new(clock.clone()),
        );
        (pool, clock)
    }
}

/// Draw `n` keys from the pool, panicking on exhaustion.
pub fn draw(pool: &KeyPool, n: usize) -> Vec<String> {
    (0..n)
        .map(|_| pool.get_next_key().expect("pool should have an available key"))
        .collect()
}
