//! CMDaemon JSON-RPC adapter
//!
//! Every call is a `POST https://<host>:<port>/json` with a body of
//! `{"service", "call", "args"}`, authenticated by a client certificate.
//! The entity directory is pulled once per session, at connect time.

use super::{ClusterSession, MonitoringQuery, RawEntity, SessionFactory};
use crate::error::{ClusterError, ConnectorError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_PORT: u16 = 8081;

/// Where and how to reach the head node
#[derive(Debug, Clone)]
pub struct CmdaemonSettings {
    pub host: String,
    pub port: u16,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    pub ca_file: PathBuf,
    pub request_timeout: Duration,
}

impl CmdaemonSettings {
    fn endpoint(&self) -> String {
        format!("https://{}:{}/json", self.host, self.port)
    }

    fn check_files(&self) -> Result<(), ConnectorError> {
        if !self.ca_file.is_file() {
            return Err(ConnectorError::Connection(
                "CA file is not defined or not exist".to_string(),
            ));
        }
        if !self.cert_file.is_file() || !self.key_file.is_file() {
            return Err(ConnectorError::Connection(
                "PEM or KEY files are not defined or not exist".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builds [`CmdaemonSession`]s from the stored certificate pair
pub struct CmdaemonConnector {
    settings: CmdaemonSettings,
}

impl CmdaemonConnector {
    pub fn new(settings: CmdaemonSettings) -> Self {
        Self { settings }
    }

    async fn build_client(&self) -> Result<reqwest::Client, ConnectorError> {
        self.settings.check_files()?;

        let cert = tokio::fs::read(&self.settings.cert_file).await.map_err(connection)?;
        let key = tokio::fs::read(&self.settings.key_file).await.map_err(connection)?;
        let ca = tokio::fs::read(&self.settings.ca_file).await.map_err(connection)?;

        let identity = reqwest::Identity::from_pkcs8_pem(&cert, &key).map_err(connection)?;
        let ca = reqwest::Certificate::from_pem(&ca).map_err(connection)?;

        reqwest::Client::builder()
            .identity(identity)
            .add_root_certificate(ca)
            // Head node certificates name the head node, not the address we dial.
            .danger_accept_invalid_hostnames(true)
            .timeout(self.settings.request_timeout)
            .build()
            .map_err(connection)
    }
}

#[async_trait]
impl SessionFactory for CmdaemonConnector {
    async fn connect(&self) -> Result<Arc<dyn ClusterSession>, ConnectorError> {
        debug!("Connecting to CMDaemon at {}", self.settings.endpoint());

        let client = self.build_client().await?;
        let mut session = CmdaemonSession {
            client,
            endpoint: self.settings.endpoint(),
            entities: Vec::new(),
        };

        let mut entities = session.load_entities("cmdevice", "getDevices").await?;
        entities.extend(session.load_entities("cmmon", "getMonitoringMeasurables").await?);
        session.entities = entities;

        info!(
            "CMDaemon session ready - {} entities cached",
            session.entities.len()
        );
        Ok(Arc::new(session))
    }
}

pub struct CmdaemonSession {
    client: reqwest::Client,
    endpoint: String,
    entities: Vec<RawEntity>,
}

impl CmdaemonSession {
    async fn call(
        &self,
        service: &'static str,
        call: &'static str,
        args: Value,
    ) -> Result<Value, ClusterError> {
        let body = json!({ "service": service, "call": call, "args": args });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|source| ClusterError::Http { service, call, source })?;

        if !response.status().is_success() {
            return Err(ClusterError::Status {
                service,
                call,
                status: response.status().as_u16(),
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|source| ClusterError::Http { service, call, source })?;

        if let Some(message) = payload.get("errormessage").and_then(Value::as_str) {
            return Err(ClusterError::Backend(message.to_string()));
        }

        Ok(payload)
    }

    async fn load_entities(
        &self,
        service: &'static str,
        call: &'static str,
    ) -> Result<Vec<RawEntity>, ConnectorError> {
        let payload = self
            .call(service, call, json!([]))
            .await
            .map_err(|e| ConnectorError::Connection(e.to_string()))?;

        Ok(parse_directory(service, call, payload))
    }
}

/// Entries that do not fit the entity shape are skipped, not fatal
fn parse_directory(service: &str, call: &str, payload: Value) -> Vec<RawEntity> {
    let Value::Array(items) = payload else {
        warn!("{}.{} did not return a list, ignoring", service, call);
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RawEntity>(item) {
            Ok(entity) => Some(entity),
            Err(e) => {
                debug!("Skipping malformed entity from {}.{}: {}", service, call, e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl ClusterSession for CmdaemonSession {
    fn entities(&self) -> &[RawEntity] {
        &self.entities
    }

    async fn monitoring(
        &self,
        query: MonitoringQuery,
        entities: &[i64],
        measurables: &[i64],
    ) -> Result<Value, ClusterError> {
        let call = match query {
            MonitoringQuery::Latest => "getLatestMonitoringData",
            MonitoringQuery::Dump => "dumpMonitoringData",
            MonitoringQuery::SampleNow => "sampleNow",
        };
        self.call("cmmon", call, json!([entities, measurables])).await
    }

    async fn power_status(&self, devices: &[i64]) -> Result<Value, ClusterError> {
        self.call("cmdevice", "powerStatus", json!([devices])).await
    }

    async fn device_status(&self, devices: &[i64]) -> Result<Value, ClusterError> {
        self.call("cmdevice", "getStatusForDevices", json!([devices])).await
    }
}

fn connection(err: impl std::fmt::Display) -> ConnectorError {
    ConnectorError::Connection(err.to_string())
}
