//! Emit and refresh task bodies
//!
//! Both are plain async functions returning a `Result`; the scheduler owns
//! concurrency, reentrancy and logging of the outcome.

use crate::cluster::SessionFactory;
use crate::error::{ConnectorError, Result};
use crate::fetcher::{
    fetch_device_status, fetch_power_status, fetch_samples, list_measurables, list_nodes,
    FetchMode,
};
use crate::joiner::{attach_status, build_records, MetricRecord};
use crate::session::SessionHandle;
use crate::sink::TelemetrySink;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info_span, warn, Instrument, Span};

#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    /// Measurable names to subscribe to
    pub metrics: Vec<String>,
    pub emit_budget: Duration,
    pub refresh_budget: Duration,
    pub freshness_window: Duration,
    pub collect_device_status: bool,
}

impl ConnectorSettings {
    /// Budgets equal the task intervals; samples older than one emit interval are stale
    pub fn from_intervals(emit_minutes: u64, refresh_minutes: u64, metrics: Vec<String>) -> Self {
        let emit = Duration::from_secs(emit_minutes.saturating_mul(60));
        Self {
            metrics,
            emit_budget: emit,
            refresh_budget: Duration::from_secs(refresh_minutes.saturating_mul(60)),
            freshness_window: emit,
            collect_device_status: false,
        }
    }
}

/// Outcome of one successful emit cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EmitSummary {
    pub nodes: usize,
    pub sent: usize,
    pub dropped: usize,
}

pub struct Connector {
    session: SessionHandle,
    factory: Arc<dyn SessionFactory>,
    sink: Arc<dyn TelemetrySink>,
    settings: ConnectorSettings,
    span: Span,
}

impl Connector {
    pub fn new(
        session: SessionHandle,
        factory: Arc<dyn SessionFactory>,
        sink: Arc<dyn TelemetrySink>,
        settings: ConnectorSettings,
        span: Span,
    ) -> Self {
        Self { session, factory, sink, settings, span }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn settings(&self) -> &ConnectorSettings {
        &self.settings
    }

    pub async fn emit_metrics(&self) -> Result<EmitSummary> {
        self.emit_cycle()
            .instrument(info_span!(parent: &self.span, "emit"))
            .await
    }

    pub async fn refresh_session(&self) -> Result<u64> {
        self.session
            .refresh(self.factory.as_ref(), self.settings.refresh_budget)
            .instrument(info_span!(parent: &self.span, "refresh"))
            .await
    }

    /// Push out anything still buffered in the sink
    pub async fn shutdown(&self) {
        if let Err(e) = self.sink.flush().instrument(self.span.clone()).await {
            warn!(parent: &self.span, "Final flush failed: {}", e);
        }
    }

    async fn emit_cycle(&self) -> Result<EmitSummary> {
        let started = Instant::now();

        let (session, nodes, measurables) = self.session.snapshot(|session| {
            let nodes = list_nodes(session.as_ref(), None);
            let measurables = list_measurables(session.as_ref(), Some(self.settings.metrics.as_slice()));
            (session.clone(), nodes, measurables)
        });
        debug!("Directory snapshot: {} nodes, {} measurables", nodes.len(), measurables.len());

        self.check_budget(started)?;

        let mode = FetchMode::Windowed(self.settings.freshness_window);
        let samples = fetch_samples(session.as_ref(), &nodes, &measurables, mode).await?;

        let mut records = build_records(&nodes, &measurables, &samples);

        if self.settings.collect_device_status {
            let devices: Vec<i64> = nodes.keys().copied().collect();
            let (power, device) = futures::try_join!(
                fetch_power_status(session.as_ref(), &devices),
                fetch_device_status(session.as_ref(), &devices),
            )?;
            attach_status(&mut records, &power, &device);
        }

        // Checked once before emitting; a slow sink does not abort the loop.
        self.check_budget(started)?;

        let mut keys: Vec<i64> = records.keys().copied().collect();
        keys.sort_unstable();

        let mut summary = EmitSummary { nodes: keys.len(), ..Default::default() };
        for key in keys {
            let record = &records[&key];
            match self.publish(record).await {
                Ok(()) => summary.sent += 1,
                Err(e) => {
                    warn!("Dropping record for {}: {}", record.hostname(), e);
                    summary.dropped += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn publish(&self, record: &MetricRecord) -> Result<()> {
        self.sink.track(record)?;
        self.sink.flush().await?;
        Ok(())
    }

    fn check_budget(&self, started: Instant) -> Result<()> {
        if started.elapsed() > self.settings.emit_budget {
            return Err(ConnectorError::EmitTimeout { budget: self.settings.emit_budget });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_intervals() {
        let settings = ConnectorSettings::from_intervals(5, 1440, vec!["CPUUser".into()]);
        assert_eq!(settings.emit_budget, Duration::from_secs(300));
        assert_eq!(settings.freshness_window, Duration::from_secs(300));
        assert_eq!(settings.refresh_budget, Duration::from_secs(86_400));
        assert!(!settings.collect_device_status);
    }

    #[test]
    fn test_huge_intervals_saturate() {
        let settings = ConnectorSettings::from_intervals(u64::MAX, 400_000_000_000_000_000, Vec::new());
        assert_eq!(settings.emit_budget, Duration::from_secs(u64::MAX));
        assert_eq!(settings.refresh_budget, Duration::from_secs(u64::MAX));
    }
}
