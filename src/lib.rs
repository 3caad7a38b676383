// src/lib.rs

pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod pool;
pub mod registry;
pub mod server;
pub mod state;

use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use pool::{KeyPool, PoolConfig, UsageStats};
pub use registry::PoolRegistry;
pub use server::create_router;
pub use state::AppState;

/// Default configuration file, used when neither the CLI nor
/// `KEY_POOL_CONFIG` name one.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Loads configuration, builds the pool registry and returns the router
/// together with the configuration it was built from.
pub fn run(config_path_override: Option<PathBuf>) -> Result<(Router, AppConfig)> {
    info!("Starting provider key pool service...");

    let app_config = setup_configuration(config_path_override)?;

    let state = AppState::new(&app_config);
    #[cfg(feature = "metrics")]
    let state = state.with_metrics(crate::metrics::install_recorder());

    info!("Application state initialized successfully.");
    Ok((create_router(Arc::new(state)), app_config))
}

/// Loads, validates and logs the application configuration.
pub fn setup_configuration(config_path_override: Option<PathBuf>) -> Result<AppConfig> {
    let config_path = config_path_override.unwrap_or_else(|| {
        std::env::var("KEY_POOL_CONFIG")
            .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
    });

    let config_path_display = config_path.display().to_string();
    let app_config = config::load_config(&config_path).map_err(|e| {
        error!(
            config.path = %config_path_display,
            error = ?e,
            "Failed to load or validate configuration. Exiting."
        );
        e
    })?;

    let total_keys: usize = app_config.providers.iter().map(|p| p.api_keys.len()).sum();
    let provider_names: Vec<&str> = app_config.providers.iter().map(|p| p.name.as_str()).collect();
    info!(
        config.path = %config_path_display,
        config.providers = ?provider_names,
        config.total_keys = total_keys,
        server.port = app_config.server.port,
        "Configuration loaded and validated successfully."
    );

    Ok(app_config)
}
