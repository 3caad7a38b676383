// src/config/app.rs

use crate::pool::{ClassifierKind, PoolConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Credentials and optional tuning for one upstream provider.
/// Unset tuning fields fall back to [`PoolConfig::for_provider`].
#[derive(Debug, Deserialize, Clone, PartialEq, Serialize, Default)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(default)]
    pub api_keys: Vec<String>,
    #[serde(default)]
    pub max_consecutive_failures: Option<u32>,
    #[serde(default)]
    pub circuit_breaker_cooldown_ms: Option<u64>,
    #[serde(default)]
    pub rate_limit_cooldown_ms: Option<u64>,
    #[serde(default)]
    pub health_check_interval_ms: Option<u64>,
    /// `keyword` (default) or `status_code`.
    #[serde(default)]
    pub classifier: Option<ClassifierKind>,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, api_keys: Vec<String>) -> Self {
        Self {
            name: name.into(),
            api_keys,
            ..Self::default()
        }
    }

    /// Pool settings for this provider: its defaults with overrides applied.
    pub fn pool_config(&self) -> PoolConfig {
        let mut pool = PoolConfig::for_provider(&self.name, self.api_keys.clone());
        if let Some(max) = self.max_consecutive_failures {
            pool.max_consecutive_failures = max;
        }
        if let Some(ms) = self.circuit_breaker_cooldown_ms {
            pool.circuit_breaker_cooldown = Duration::from_millis(ms);
        }
        if let Some(ms) = self.rate_limit_cooldown_ms {
            pool.rate_limit_cooldown = Duration::from_millis(ms);
        }
        if let Some(ms) = self.health_check_interval_ms {
            pool.health_check_interval = Duration::from_millis(ms);
        }
        if let Some(kind) = self.classifier {
            pool.classifier = kind;
        }
        pool
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl AppConfig {
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }
}
