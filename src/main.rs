// src/main.rs

use axum::serve;
use provider_key_pool::cli::{Cli, Commands};
use provider_key_pool::{run, setup_configuration, AppError, PoolRegistry};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!(signal = "Ctrl+C", "Received signal. Initiating graceful shutdown...") },
        () = terminate => { info!(signal = "Terminate", "Received signal. Initiating graceful shutdown...") },
    }
}

fn init_tracing(cli: &Cli) {
    let env_filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_current_span(true).with_span_list(true))
            .init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Validates a configuration file and prints what the pools would hold.
fn check_config(cli: &Cli, file: Option<std::path::PathBuf>) -> Result<(), AppError> {
    let config = setup_configuration(file.or_else(|| cli.config.clone()))?;
    let registry = PoolRegistry::from_config(&config);

    for provider in registry.providers() {
        let Some(pool) = registry.get(&provider) else {
            continue;
        };
        let key_ids: Vec<String> = pool.get_key_statuses().into_iter().map(|k| k.key_id).collect();
        println!("{provider}: {} key(s) {key_ids:?}", key_ids.len());
    }
    println!("{}", serde_json::to_string_pretty(&registry.all_pool_stats())?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse_args();
    init_tracing(&cli);

    if let Some(Commands::Config { file }) = &cli.command {
        return check_config(&cli, file.clone());
    }

    let (app, config) = run(cli.config.clone()).map_err(|e| {
        eprintln!("Application setup error: {e:?}");
        e
    })?;

    let host = cli.host.clone().unwrap_or_else(|| config.server.host.clone());
    let port = cli.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{host}:{port}").parse().map_err(|e| {
        AppError::config_validation(format!("Invalid bind address {host}:{port}: {e}"), Some("server.host"))
    })?;

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!(server.address = %addr, error = ?e, "Failed to bind to address. Exiting.");
        AppError::from(e)
    })?;
    info!(server.address = %addr, "Server listening");

    serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!(error = ?e, "Server run loop encountered an error. Exiting.");
            AppError::from(e)
        })?;

    info!("Server shut down gracefully.");
    Ok(())
}
