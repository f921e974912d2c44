//! Telemetry sink collaborator
//!
//! Write-only, best-effort: `track` buffers one entry, `flush` delivers
//! whatever is buffered. A failed flush loses the buffered entries.

pub mod app_insights;

use crate::error::SinkError;
use crate::joiner::MetricRecord;
use async_trait::async_trait;

pub use app_insights::AppInsightsSink;

#[async_trait]
pub trait TelemetrySink: Send + Sync {
    fn track(&self, record: &MetricRecord) -> Result<(), SinkError>;

    async fn flush(&self) -> Result<(), SinkError>;
}
