//! Jail monitor - geofenced occupancy and alert engine
//!
//! Tracks prisoner positions inside a zoned facility, derives per-zone
//! occupancy and raises curfew, capacity, noise and smoke alerts for
//! dashboards and the sprinkler controller.
//!
//! Module structure:
//! - `domain/` - Core types (Zone, Entity, Clock, requests, errors)
//! - `io/` - External interfaces (HTTP API, MQTT egress, Prometheus)
//! - `services/` - Business logic (Monitor, ledger, alert engine)
//! - `infra/` - Infrastructure (Config, Metrics, Broker)

use clap::Parser;
use jail_monitor::infra::{Config, Metrics};

/// Jail monitor - occupancy and alert engine
#[derive(Parser, Debug)]
#[command(name = "jail-monitor", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,
}
use jail_monitor::io::{create_egress_channel, ApiState, MqttPublisher};
use jail_monitor::services::{Monitor, Notifier};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for every position report
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git_hash = %env!("GIT_HASH"), "jail-monitor starting");

    let args = Args::parse();
    let config_path = args.config.unwrap_or_else(Config::resolve_config_path);
    let config = Config::load_from_path(&config_path);

    if config.broker_enabled() {
        jail_monitor::infra::broker::start_embedded_broker(&config);
    }

    let rules = config.alert_rules();
    info!(
        config_file = %config.config_file(),
        http = %format!("{}:{}", config.http_bind_address(), config.http_port()),
        mqtt_host = %config.mqtt_host(),
        mqtt_port = %config.mqtt_port(),
        zones = %config.catalog().len(),
        prisoners = %config.prisoners().len(),
        rest_zone = %rules.rest_zone,
        noise_threshold = %rules.noise_threshold,
        smoke_threshold = %rules.smoke_threshold,
        "config_loaded"
    );

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics = Arc::new(Metrics::new());

    // Create MQTT egress channel and publisher (if enabled)
    let notifier: Option<Arc<dyn Notifier>> = if config.mqtt_enabled() {
        let (egress_sender, egress_rx) = create_egress_channel(1000);

        let publisher = MqttPublisher::new(&config, egress_rx);
        let publisher_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            publisher.run(publisher_shutdown).await;
        });

        Some(Arc::new(egress_sender))
    } else {
        None
    };

    let monitor = Arc::new(Mutex::new(Monitor::new(&config, metrics, notifier)));
    info!("monitor_started");

    // Start metrics reporter
    let metrics_monitor = monitor.clone();
    let metrics_interval = config.metrics_interval_secs().max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            let summary = metrics_monitor.lock().metrics_summary();
            summary.log();
        }
    });

    // Handle shutdown on Ctrl+C
    let shutdown_signal = shutdown_tx;
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_signal.send(true);
    });

    // Run HTTP API until shutdown
    let state = Arc::new(ApiState { monitor, site_id: config.site_id().to_string() });
    jail_monitor::io::http_api::start_http_server(config.http_bind_address(), config.http_port(), state, shutdown_rx)
        .await?;

    info!("jail-monitor shutdown complete");
    Ok(())
}
