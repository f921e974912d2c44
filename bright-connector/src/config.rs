//! Process configuration
//!
//! Two files in the working directory:
//! - `appconfig.json`: head node address, instrumentation key, optional overrides
//! - `metricsconfig.ini`: value-less keys name the measurables to collect

use crate::cluster::cmdaemon::{CmdaemonSettings, DEFAULT_PORT};
use crate::error::{ConnectorError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const APP_CONFIG_FILE: &str = "appconfig.json";
pub const METRICS_CONFIG_FILE: &str = "metricsconfig.ini";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppConfig {
    #[serde(rename = "BrightHostIP")]
    pub bright_host_ip: String,
    pub instrumentation_key: String,
    #[serde(default = "default_port")]
    pub bright_port: u16,
    #[serde(default = "default_cert_file")]
    pub cert_file: PathBuf,
    #[serde(default = "default_key_file")]
    pub key_file: PathBuf,
    #[serde(default = "default_ca_file")]
    pub ca_file: PathBuf,
    #[serde(default)]
    pub ingestion_endpoint: Option<String>,
    #[serde(default)]
    pub collect_device_status: bool,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_cert_file() -> PathBuf {
    PathBuf::from("certs/bright-cert.pem")
}

fn default_key_file() -> PathBuf {
    PathBuf::from("certs/bright-key.key")
}

fn default_ca_file() -> PathBuf {
    PathBuf::from("certs/cacert.pem")
}

impl AppConfig {
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            debug!("appconfig.json rejected: {}", e);
            ConnectorError::Configuration("Unable to read app config file.".to_string())
        })
    }

    pub async fn load(workdir: &Path) -> Result<Self> {
        let path = workdir.join(APP_CONFIG_FILE);
        let text = tokio::fs::read_to_string(&path).await.map_err(|_| {
            ConnectorError::Configuration("Unable to locate app config file.".to_string())
        })?;
        Self::parse(&text)
    }

    /// CMDaemon settings with certificate paths resolved against `workdir`
    pub fn cmdaemon_settings(&self, workdir: &Path) -> CmdaemonSettings {
        CmdaemonSettings {
            host: self.bright_host_ip.clone(),
            port: self.bright_port,
            cert_file: workdir.join(&self.cert_file),
            key_file: workdir.join(&self.key_file),
            ca_file: workdir.join(&self.ca_file),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Collect the value-less keys of every section, in file order, without duplicates
pub fn parse_metric_selection(text: &str) -> Result<Vec<String>> {
    let mut metrics: Vec<String> = Vec::new();
    let mut in_section = false;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') {
            if !line.ends_with(']') {
                return Err(unreadable_metrics());
            }
            in_section = true;
            continue;
        }

        if !in_section {
            return Err(unreadable_metrics());
        }

        // `key = value` and `key: value` carry a value, even an empty one.
        if line.contains('=') || line.contains(':') {
            continue;
        }

        if !metrics.iter().any(|m| m == line) {
            metrics.push(line.to_string());
        }
    }

    Ok(metrics)
}

fn unreadable_metrics() -> ConnectorError {
    ConnectorError::Configuration("Unable to read metric config file.".to_string())
}

pub async fn load_metric_selection(workdir: &Path) -> Result<Vec<String>> {
    let path = workdir.join(METRICS_CONFIG_FILE);
    let text = tokio::fs::read_to_string(&path).await.map_err(|_| {
        ConnectorError::Configuration("Unable to locate metric config file.".to_string())
    })?;
    parse_metric_selection(&text)
}

/// Everything read from disk at startup
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub workdir: PathBuf,
    pub app: AppConfig,
    pub metrics: Vec<String>,
}

impl ConnectorConfig {
    pub async fn load(workdir: &Path) -> Result<Self> {
        let app = AppConfig::load(workdir).await?;
        let metrics = load_metric_selection(workdir).await?;
        info!(
            "Configuration loaded from {} ({} metric(s) selected)",
            workdir.display(),
            metrics.len()
        );
        Ok(Self { workdir: workdir.to_path_buf(), app, metrics })
    }

    pub fn cmdaemon_settings(&self) -> CmdaemonSettings {
        self.app.cmdaemon_settings(&self.workdir)
    }
}
