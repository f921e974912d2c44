/*!
Mock telemetry sink

Records every tracked entry as JSON and counts flushes. Delivery can be made
to fail for every flush or for entries of one host.
*/

use async_trait::async_trait;
use bright_connector::error::SinkError;
use bright_connector::sink::TelemetrySink;
use bright_connector::MetricRecord;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct SinkState {
    pending: Vec<Value>,
    delivered: Vec<Value>,
    reject_host: Option<String>,
    reject_all: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockSink {
    state: Arc<Mutex<SinkState>>,
    flushes: Arc<AtomicUsize>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every flush fails and drops its batch
    pub fn reject_all(&self) {
        self.state.lock().reject_all = true;
    }

    /// Flushes carrying an entry for `hostname` fail and drop their batch
    pub fn reject_host(&self, hostname: &str) {
        self.state.lock().reject_host = Some(hostname.to_string());
    }

    pub fn delivered(&self) -> Vec<Value> {
        self.state.lock().delivered.clone()
    }

    pub fn delivered_for(&self, hostname: &str) -> Option<Value> {
        self.state
            .lock()
            .delivered
            .iter()
            .find(|entry| entry["Hostname"] == hostname)
            .cloned()
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetrySink for MockSink {
    fn track(&self, record: &MetricRecord) -> Result<(), SinkError> {
        let entry = serde_json::to_value(record)?;
        self.state.lock().pending.push(entry);
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock();
        let batch = std::mem::take(&mut state.pending);

        let rejected = state.reject_all
            || state
                .reject_host
                .as_ref()
                .is_some_and(|host| batch.iter().any(|entry| entry["Hostname"] == host.as_str()));
        if rejected {
            return Err(SinkError::Rejected { status: 503, body: "mock rejection".to_string() });
        }

        state.delivered.extend(batch);
        Ok(())
    }
}
