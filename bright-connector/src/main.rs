//! Bright Connector - cluster monitoring to Application Insights
//!
//! Startup is strict: bad configuration or an unreachable head node stops
//! the process. After that the scheduler contains every task failure.

use anyhow::{Context, Result};
use bright_connector::cli::Cli;
use bright_connector::cluster::cmdaemon::CmdaemonConnector;
use bright_connector::config::ConnectorConfig;
use bright_connector::sink::AppInsightsSink;
use bright_connector::{logging, Connector, ConnectorSettings, ScheduleSettings, Scheduler, SessionHandle};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, info_span, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let workdir = cli.workdir().context("Failed to resolve working directory")?;
    dotenvy::from_path(workdir.join(".env")).ok();

    logging::init(cli.log_format, cli.log_file.as_deref())
        .context("Failed to initialise logging")?;

    info!("Bright Connector {} starting", env!("CARGO_PKG_VERSION"));

    let config = ConnectorConfig::load(&workdir)
        .await
        .context("Failed to load configuration")?;
    if config.metrics.is_empty() {
        warn!("No metrics selected in metricsconfig.ini, records will carry Hostname and RackId only");
    }

    let factory = Arc::new(CmdaemonConnector::new(config.cmdaemon_settings()));
    let session = SessionHandle::connect(factory.as_ref())
        .await
        .context("Failed to connect to the head node")?;

    let sink = AppInsightsSink::new(
        &config.app.instrumentation_key,
        config.app.ingestion_endpoint.as_deref(),
    )
    .context("Failed to create telemetry sink")?;

    let mut settings =
        ConnectorSettings::from_intervals(cli.emit_interval, cli.refresh_interval, config.metrics);
    settings.collect_device_status = config.app.collect_device_status;

    let connector = Arc::new(Connector::new(
        session,
        factory,
        Arc::new(sink),
        settings,
        info_span!("connector", host = %config.app.bright_host_ip),
    ));

    let scheduler = Scheduler::new(
        connector,
        ScheduleSettings::from_minutes(cli.emit_interval, cli.refresh_interval),
    );

    scheduler
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Unable to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("Bright Connector stopped");
    Ok(())
}
