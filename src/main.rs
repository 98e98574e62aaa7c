//! jvmwatch - JVM utilization sampler
//!
//! Attaches to a running JVM, samples its CPU, GC and memory figures on a
//! fixed interval and ships them as GELF messages or JSON lines.

use clap::Parser;
use jvmwatch::{app::App, cli::Cli, config::Config, monitor::MonitorExit};
use std::process::ExitCode;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(default_level: &str) {
    // RUST_LOG wins over the configured level. Logs go to stderr; stdout may carry snapshots.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            init_tracing("info");
            error!("Failed to load configuration: {:#}", err);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.log_level);

    info!("jvmwatch starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!(
        "Target: {} (pid {})",
        config.target.url.as_deref().unwrap_or("<not set>"),
        config
            .target
            .pid
            .map_or_else(|| "any".to_string(), |pid| pid.to_string())
    );
    info!("Interval: {}s", config.monitor.interval_seconds);
    info!("Output: {} ({})", config.output.target, config.output.format);
    if let Some(name) = &config.application.name {
        info!("Application: {}", name);
    }
    if let Some(unit) = &config.application.deployment_unit {
        info!("Deployment Unit: {}", unit);
    }
    info!(
        "Metrics: {}",
        if config.metrics.enabled {
            config.metrics.listen_address.to_string()
        } else {
            "Disabled".to_string()
        }
    );
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let app = match App::builder(config).build(shutdown_rx).await {
        Ok(app) => app,
        Err(err) => {
            error!("Failed to start: {:#}", err);
            return ExitCode::FAILURE;
        }
    };

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received. Shutting down gracefully...");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                error!("Unable to listen for the shutdown signal: {}", e);
                // Hold the sender so sampling continues.
                std::future::pending::<()>().await;
                drop(shutdown_tx);
            }
        }
    });

    match app.run().await {
        Ok(MonitorExit::Shutdown) => ExitCode::SUCCESS,
        Ok(MonitorExit::ConnectionLost) => {
            error!("Exiting: the monitored process is no longer reachable");
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("Application error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
