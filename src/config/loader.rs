// src/config/loader.rs

use crate::config::{AppConfig, ConfigValidator, ProviderConfig};
use crate::error::{AppError, Result};
use std::path::Path;
use tracing::{debug, info, warn};

const ENV_VAR_PREFIX: &str = "KEY_POOL_PROVIDER_";
const API_KEYS_SUFFIX: &str = "_API_KEYS";

/// Load configuration from file (if present), apply environment
/// overrides and validate the result.
pub fn load_config(config_path: &Path) -> Result<AppConfig> {
    let mut config = if config_path.exists() {
        info!("Loading configuration from file: {}", config_path.display());
        load_from_file(config_path)?
    } else {
        info!("Configuration file not found, using defaults");
        AppConfig::default()
    };

    override_with_env(&mut config);

    ConfigValidator::validate(&config)?;

    debug!("Configuration loaded and validated successfully");
    Ok(config)
}

fn load_from_file(config_path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(config_path).map_err(|_| AppError::ConfigNotFound {
        path: config_path.display().to_string(),
    })?;

    if content.trim().is_empty() {
        warn!("Config file '{}' is empty. Using defaults.", config_path.display());
        return Ok(AppConfig::default());
    }

    serde_yaml::from_str(&content).map_err(|e| AppError::ConfigParse {
        message: format!("Failed to parse config file: {e}"),
        line: e.location().map(|loc| loc.line()),
    })
}

fn override_with_env(config: &mut AppConfig) {
    apply_overrides(config, std::env::vars());
}

/// Extracts the provider name from `KEY_POOL_PROVIDER_{NAME}_API_KEYS`.
fn provider_from_env_key(env_key: &str) -> Option<String> {
    let name = env_key.strip_prefix(ENV_VAR_PREFIX)?.strip_suffix(API_KEYS_SUFFIX)?;
    (!name.is_empty()).then(|| name.to_ascii_lowercase())
}

/// Apply `PORT` and per-provider key variables from `vars`.
pub(crate) fn apply_overrides(config: &mut AppConfig, vars: impl IntoIterator<Item = (String, String)>) {
    for (key, value) in vars {
        if key == "PORT" {
            match value.parse::<u16>() {
                Ok(port) => {
                    info!("Overriding server port from environment variable: {}", port);
                    config.server.port = port;
                }
                Err(_) => warn!("Invalid PORT environment variable: {}", value),
            }
            continue;
        }

        let Some(provider) = provider_from_env_key(&key) else {
            continue;
        };
        let api_keys: Vec<String> = value
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        info!(
            provider = %provider,
            keys = api_keys.len(),
            "Overriding provider API keys from environment variable"
        );
        match config.providers.iter_mut().find(|p| p.name.eq_ignore_ascii_case(&provider)) {
            Some(existing) => existing.api_keys = api_keys,
            None => config.providers.push(ProviderConfig::new(provider, api_keys)),
        }
    }
}
