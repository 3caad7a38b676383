// src/pool/config.rs

use super::ClassifierKind;
use std::fmt;
use std::time::Duration;

/// Fixed settings of one provider's pool.
#[derive(Clone, PartialEq)]
pub struct PoolConfig {
    pub provider: String,
    pub keys: Vec<String>,
    /// Non-auth failures in a row that open the circuit breaker.
    pub max_consecutive_failures: u32,
    pub circuit_breaker_cooldown: Duration,
    pub rate_limit_cooldown: Duration,
    /// Minimum time between two passive recovery sweeps.
    pub health_check_interval: Duration,
    pub classifier: ClassifierKind,
}

impl PoolConfig {
    /// Settings tuned per provider; unknown providers get the Brave values.
    pub fn for_provider(provider: impl Into<String>, keys: Vec<String>) -> Self {
        let provider = provider.into();
        let (max_consecutive_failures, breaker_secs, rate_limit_secs, sweep_secs) =
            match provider.to_ascii_lowercase().as_str() {
                "exa" => (2, 600, 120, 45),
                "perplexity" => (3, 300, 120, 30),
                _ => (3, 300, 60, 30),
            };

        Self {
            provider,
            keys,
            max_consecutive_failures,
            circuit_breaker_cooldown: Duration::from_secs(breaker_secs),
            rate_limit_cooldown: Duration::from_secs(rate_limit_secs),
            health_check_interval: Duration::from_secs(sweep_secs),
            classifier: ClassifierKind::Keyword,
        }
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("provider", &self.provider)
            .field("keys", &self.keys.len())
            .field("max_consecutive_failures", &self.max_consecutive_failures)
            .field("circuit_breaker_cooldown", &self.circuit_breaker_cooldown)
            .field("rate_limit_cooldown", &self.rate_limit_cooldown)
            .field("health_check_interval", &self.health_check_interval)
            .field("classifier", &self.classifier)
            .finish()
    }
}
