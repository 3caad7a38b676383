// src/registry.rs

use crate::config::AppConfig;
use crate::pool::{KeyPool, PoolConfig, UsageStats};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Owns one [`KeyPool`] per provider for the lifetime of the process.
///
/// Created by application startup and shared through the application
/// state; pools are created on first access and never evicted.
#[derive(Debug, Default)]
pub struct PoolRegistry {
    pools: DashMap<String, Arc<KeyPool>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a pool already created for every configured provider.
    pub fn from_config(config: &AppConfig) -> Self {
        let registry = Self::new();
        for provider in &config.providers {
            registry.get_or_create(provider.pool_config());
        }
        info!(providers = registry.len(), "Pool registry initialized from configuration");
        registry
    }

    /// Pool for `config.provider`, created from `config` on first access.
    /// Once a pool exists the passed configuration is ignored.
    pub fn get_or_create(&self, config: PoolConfig) -> Arc<KeyPool> {
        if let Some(pool) = self.get(&config.provider) {
            return pool;
        }
        let provider = config.provider.clone();
        self.get_or_insert_with(&provider, || KeyPool::new(config))
    }

    /// Like [`get_or_create`](Self::get_or_create) with a caller-built pool,
    /// e.g. one using a custom classifier or clock.
    pub fn get_or_insert_with(&self, provider: &str, build: impl FnOnce() -> KeyPool) -> Arc<KeyPool> {
        let entry = self.pools.entry(provider.to_string()).or_insert_with(|| {
            debug!(provider, "Creating key pool on first access");
            Arc::new(build())
        });
        Arc::clone(entry.value())
    }

    pub fn get(&self, provider: &str) -> Option<Arc<KeyPool>> {
        self.pools.get(provider).map(|pool| Arc::clone(pool.value()))
    }

    /// Provider names in sorted order.
    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pools.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn all_pool_stats(&self) -> BTreeMap<String, UsageStats> {
        self.pools
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().get_usage_stats()))
            .collect()
    }

    /// Drops every pool. Meant for test isolation.
    pub fn reset_all(&self) {
        let dropped = self.pools.len();
        self.pools.clear();
        info!(dropped, "All key pools reset");
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}
