//! Error taxonomy for the connector
//!
//! Startup errors (`Configuration`, `Connection`) are fatal in `main`.
//! Everything returned from a scheduled task is contained by the scheduler:
//! timeouts are soft, collaborator errors are logged as generic failures.

use std::time::Duration;

/// Errors raised by the cluster collaborator (transport or payload level)
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("HTTP error calling {service}.{call}: {source}")]
    Http {
        service: &'static str,
        call: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service}.{call} returned status {status}")]
    Status {
        service: &'static str,
        call: &'static str,
        status: u16,
    },
    #[error("CMDaemon error: {0}")]
    Backend(String),
}

/// Errors raised by the telemetry sink
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("HTTP error sending telemetry: {0}")]
    Http(#[from] reqwest::Error),
    #[error("ingestion endpoint rejected batch with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Emit Metrics unable to complete the job in {} minutes", minutes(*budget))]
    EmitTimeout { budget: Duration },
    #[error("Refresh Cluster unable to complete the job in {} minutes", minutes(*budget))]
    RefreshTimeout { budget: Duration },
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl ConnectorError {
    /// Soft failures abandon one cycle; the next tick proceeds normally
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ConnectorError::EmitTimeout { .. } | ConnectorError::RefreshTimeout { .. }
        )
    }
}

fn minutes(budget: Duration) -> u64 {
    budget.as_secs() / 60
}

pub type Result<T, E = ConnectorError> = std::result::Result<T, E>;
