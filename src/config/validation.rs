// src/config/validation.rs

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use std::collections::HashSet;
use tracing::{debug, warn};

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &AppConfig) -> Result<()> {
        debug!("Starting configuration validation");

        if let Err(e) = Self::validate_providers(config) {
            warn!("Provider validation failed: {}", e);
            return Err(e);
        }
        debug!("Provider validation passed");

        if let Err(e) = Self::validate_server_config(config) {
            warn!("Server config validation failed: {}", e);
            return Err(e);
        }

        debug!("Configuration validation completed successfully");
        Ok(())
    }

    fn validate_providers(config: &AppConfig) -> Result<()> {
        let mut names = HashSet::new();

        for provider in &config.providers {
            if provider.name.trim().is_empty() {
                return Err(AppError::config_validation(
                    "Provider name cannot be empty",
                    Some("providers.name"),
                ));
            }

            if !names.insert(provider.name.to_ascii_lowercase()) {
                return Err(AppError::config_validation(
                    format!("Duplicate provider name: {}", provider.name),
                    Some("providers.name"),
                ));
            }

            if provider.api_keys.iter().all(|k| k.trim().is_empty()) {
                warn!("Provider '{}' has no API keys configured", provider.name);
            }

            if provider.max_consecutive_failures == Some(0) {
                return Err(AppError::config_validation(
                    format!("max_consecutive_failures for '{}' cannot be 0", provider.name),
                    Some("providers.max_consecutive_failures"),
                ));
            }

            let durations = [
                ("circuit_breaker_cooldown_ms", provider.circuit_breaker_cooldown_ms),
                ("rate_limit_cooldown_ms", provider.rate_limit_cooldown_ms),
                ("health_check_interval_ms", provider.health_check_interval_ms),
            ];
            for (field, value) in durations {
                if value == Some(0) {
                    return Err(AppError::config_validation(
                        format!("{field} for '{}' cannot be 0", provider.name),
                        Some(format!("providers.{field}")),
                    ));
                }
            }
        }

        debug!("Validated {} providers", config.providers.len());
        Ok(())
    }

    fn validate_server_config(config: &AppConfig) -> Result<()> {
        if config.server.port == 0 {
            return Err(AppError::config_validation(
                "Server port cannot be 0",
                Some("server.port"),
            ));
        }
        Ok(())
    }
}
