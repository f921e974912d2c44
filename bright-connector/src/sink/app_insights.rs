//! Application Insights trace sink
//!
//! Each record becomes one `MessageData` trace whose message is the record's
//! JSON text, the same shape a logging handler bound to an instrumentation
//! key produces. Envelopes are buffered until [`TelemetrySink::flush`].

use super::TelemetrySink;
use crate::error::SinkError;
use crate::joiner::MetricRecord;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://dc.services.visualstudio.com/v2/track";

/// Severity "Information" in the trace schema
const SEVERITY_INFORMATION: u8 = 1;

#[derive(Debug, Serialize)]
struct Envelope {
    name: String,
    time: String,
    #[serde(rename = "iKey")]
    ikey: String,
    tags: HashMap<&'static str, String>,
    data: EnvelopeData,
}

#[derive(Debug, Serialize)]
struct EnvelopeData {
    #[serde(rename = "baseType")]
    base_type: &'static str,
    #[serde(rename = "baseData")]
    base_data: MessageData,
}

#[derive(Debug, Serialize)]
struct MessageData {
    ver: u8,
    message: String,
    #[serde(rename = "severityLevel")]
    severity_level: u8,
}

pub struct AppInsightsSink {
    client: reqwest::Client,
    endpoint: String,
    instrumentation_key: String,
    role_instance: String,
    buffer: Mutex<Vec<Envelope>>,
}

impl AppInsightsSink {
    pub fn new(instrumentation_key: &str, endpoint: Option<&str>) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.unwrap_or(DEFAULT_ENDPOINT).to_string(),
            instrumentation_key: instrumentation_key.to_string(),
            role_instance: std::env::var("HOSTNAME").unwrap_or_else(|_| "bright-connector".into()),
            buffer: Mutex::new(Vec::new()),
        })
    }

    fn envelope(&self, message: String, at: DateTime<Utc>) -> Envelope {
        let compact_key = self.instrumentation_key.replace('-', "");
        let tags = HashMap::from([
            ("ai.cloud.roleInstance", self.role_instance.clone()),
            ("ai.internal.sdkVersion", concat!("rust:", env!("CARGO_PKG_VERSION")).to_string()),
        ]);

        Envelope {
            name: format!("Microsoft.ApplicationInsights.{}.Message", compact_key),
            time: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            ikey: self.instrumentation_key.clone(),
            tags,
            data: EnvelopeData {
                base_type: "MessageData",
                base_data: MessageData {
                    ver: 2,
                    message,
                    severity_level: SEVERITY_INFORMATION,
                },
            },
        }
    }

    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }
}

#[async_trait]
impl TelemetrySink for AppInsightsSink {
    fn track(&self, record: &MetricRecord) -> Result<(), SinkError> {
        let envelope = self.envelope(record.to_json()?, Utc::now());
        self.buffer.lock().push(envelope);
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let batch = std::mem::take(&mut *self.buffer.lock());
        if batch.is_empty() {
            return Ok(());
        }

        let response = self.client.post(&self.endpoint).json(&batch).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected { status: status.as_u16(), body });
        }

        debug!("Flushed {} telemetry item(s)", batch.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::NodeRecord;
    use chrono::TimeZone;
    use serde_json::{json, Number};

    fn record() -> MetricRecord {
        let mut record = MetricRecord::seed(&NodeRecord {
            unique_key: 1,
            hostname: "node001".into(),
            rack_id: "r1".into(),
            interfaces: HashMap::new(),
        });
        record.set("CPUUser", Number::from(12));
        record
    }

    #[test]
    fn test_envelope_shape() {
        let sink = AppInsightsSink::new("0000aaaa-1111-2222-3333-444455556666", None).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let envelope = serde_json::to_value(sink.envelope(record().to_json().unwrap(), at)).unwrap();

        assert_eq!(
            envelope["name"],
            "Microsoft.ApplicationInsights.0000aaaa111122223333444455556666.Message"
        );
        assert_eq!(envelope["time"], "2024-03-01T12:00:00.000Z");
        assert_eq!(envelope["data"]["baseType"], "MessageData");
        assert_eq!(envelope["data"]["baseData"]["severityLevel"], 1);

        let message: serde_json::Value =
            serde_json::from_str(envelope["data"]["baseData"]["message"].as_str().unwrap()).unwrap();
        assert_eq!(message, json!({"Hostname": "node001", "RackId": "r1", "CPUUser": 12}));
    }

    #[test]
    fn test_track_buffers_until_flush() {
        let sink = AppInsightsSink::new("key", Some("http://127.0.0.1:9/v2/track")).unwrap();
        sink.track(&record()).unwrap();
        sink.track(&record()).unwrap();
        assert_eq!(sink.pending(), 2);
    }

    #[tokio::test]
    async fn test_flush_of_empty_buffer_is_noop() {
        let sink = AppInsightsSink::new("key", Some("http://127.0.0.1:9/v2/track")).unwrap();
        sink.flush().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_flush_drops_batch() {
        let sink = AppInsightsSink::new("key", Some("http://127.0.0.1:9/v2/track")).unwrap();
        sink.track(&record()).unwrap();
        assert!(sink.flush().await.is_err());
        assert_eq!(sink.pending(), 0);
    }
}
