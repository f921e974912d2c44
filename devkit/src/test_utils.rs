/*!
Test harness for connector scenarios

Wires a `MockCluster`, a `MockSessionFactory` and a `MockSink` into a real
`Connector`, and builds `Scheduler`s on top of it.
*/

use crate::fixtures;
use crate::mock_cluster::{MockCluster, MockSessionFactory};
use crate::mock_sink::MockSink;
use bright_connector::{Connector, ConnectorSettings, ScheduleSettings, Scheduler, SessionHandle};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::info_span;

pub struct TestHarness {
    pub cluster: MockCluster,
    pub factory: Arc<MockSessionFactory>,
    pub sink: MockSink,
    pub connector: Arc<Connector>,
}

impl TestHarness {
    /// Harness over `cluster` with 5 minute emit and 1 day refresh budgets
    pub fn new(cluster: MockCluster, metrics: &[&str]) -> Self {
        let metrics = metrics.iter().map(|m| m.to_string()).collect();
        Self::with_settings(cluster, ConnectorSettings::from_intervals(5, 1440, metrics))
    }

    pub fn with_settings(cluster: MockCluster, settings: ConnectorSettings) -> Self {
        init_tracing();

        let factory = Arc::new(MockSessionFactory::new(cluster.clone()));
        let sink = MockSink::new();
        let connector = Arc::new(Connector::new(
            SessionHandle::new(Arc::new(cluster.clone())),
            factory.clone(),
            Arc::new(sink.clone()),
            settings,
            info_span!("connector", host = "mock"),
        ));

        Self { cluster, factory, sink, connector }
    }

    /// Two nodes in one rack, `CPUUser` (10) and `LoadOne` (11), fresh samples for both nodes
    pub fn two_node_cluster() -> MockCluster {
        let cluster = MockCluster::new(fixtures::directory(&[
            fixtures::node(1, "node001", "rack1"),
            fixtures::node(2, "node002", "rack1"),
            fixtures::metric(10, "CPUUser"),
            fixtures::metric(11, "LoadOne"),
        ]));
        cluster.set_monitoring(fixtures::monitoring(vec![
            fixtures::sample(1, 10, json!(12.5)),
            fixtures::sample(1, 11, json!(0.75)),
            fixtures::sample(2, 10, json!(40)),
            fixtures::sample(2, 11, json!("DOWN")),
        ]));
        cluster
    }

    pub fn scheduler(&self, emit_every: u64, refresh_every: u64) -> Scheduler {
        Scheduler::new(
            self.connector.clone(),
            ScheduleSettings {
                tick_period: Duration::from_secs(60),
                emit_every,
                refresh_every,
            },
        )
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bright_connector=debug")),
        )
        .with_test_writer()
        .try_init()
        .ok();
}
