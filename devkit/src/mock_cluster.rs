/*!
Mock cluster backend

`MockCluster` stands in for a live CMDaemon session: it serves a fixed entity
directory, answers queries with configurable payloads and records every call.
`MockSessionFactory` hands out sessions with an optional connect delay and
scripted failures.
*/

use async_trait::async_trait;
use bright_connector::cluster::{ClusterSession, MonitoringQuery, RawEntity, SessionFactory};
use bright_connector::error::{ClusterError, ConnectorError};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Monitoring {
        query: MonitoringQuery,
        entities: Vec<i64>,
        measurables: Vec<i64>,
    },
    PowerStatus(Vec<i64>),
    DeviceStatus(Vec<i64>),
}

#[derive(Debug)]
struct Responses {
    monitoring: Value,
    power: Value,
    device: Value,
    monitoring_error: Option<String>,
    query_delay: Duration,
}

/// Cloneable mock session; clones share payloads and the call log
#[derive(Debug, Clone)]
pub struct MockCluster {
    entities: Arc<Vec<RawEntity>>,
    responses: Arc<Mutex<Responses>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockCluster {
    /// `directory` is a JSON array of entity objects
    pub fn new(directory: Value) -> Self {
        let entities = serde_json::from_value(directory).unwrap_or_default();
        Self {
            entities: Arc::new(entities),
            responses: Arc::new(Mutex::new(Responses {
                monitoring: json!({"items": []}),
                power: json!([true, []]),
                device: json!([]),
                monitoring_error: None,
                query_delay: Duration::ZERO,
            })),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn empty() -> Self {
        Self::new(json!([]))
    }

    pub fn set_monitoring(&self, payload: Value) -> &Self {
        self.responses.lock().monitoring = payload;
        self
    }

    pub fn set_power_status(&self, payload: Value) -> &Self {
        self.responses.lock().power = payload;
        self
    }

    pub fn set_device_status(&self, payload: Value) -> &Self {
        self.responses.lock().device = payload;
        self
    }

    /// Make monitoring queries fail with a backend error
    pub fn fail_monitoring(&self, message: &str) -> &Self {
        self.responses.lock().monitoring_error = Some(message.to_string());
        self
    }

    /// Delay applied to every query before it answers
    pub fn set_query_delay(&self, delay: Duration) -> &Self {
        self.responses.lock().query_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn monitoring_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, MockCall::Monitoring { .. }))
            .count()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    async fn answer(&self, call: MockCall, pick: impl FnOnce(&Responses) -> Result<Value, ClusterError>) -> Result<Value, ClusterError> {
        self.calls.lock().push(call);

        let delay = self.responses.lock().query_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let responses = self.responses.lock();
        pick(&*responses)
    }
}

#[async_trait]
impl ClusterSession for MockCluster {
    fn entities(&self) -> &[RawEntity] {
        &self.entities
    }

    async fn monitoring(&self, query: MonitoringQuery, entities: &[i64], measurables: &[i64]) -> Result<Value, ClusterError> {
        let call = MockCall::Monitoring {
            query,
            entities: entities.to_vec(),
            measurables: measurables.to_vec(),
        };
        self.answer(call, |r| match &r.monitoring_error {
            Some(message) => Err(ClusterError::Backend(message.clone())),
            None => Ok(r.monitoring.clone()),
        })
        .await
    }

    async fn power_status(&self, devices: &[i64]) -> Result<Value, ClusterError> {
        self.answer(MockCall::PowerStatus(devices.to_vec()), |r| Ok(r.power.clone())).await
    }

    async fn device_status(&self, devices: &[i64]) -> Result<Value, ClusterError> {
        self.answer(MockCall::DeviceStatus(devices.to_vec()), |r| Ok(r.device.clone())).await
    }
}

/// Hands out the configured session on every connect
#[derive(Debug)]
pub struct MockSessionFactory {
    session: Mutex<MockCluster>,
    connect_delay: Mutex<Duration>,
    failures_left: AtomicUsize,
    connects: AtomicUsize,
}

impl MockSessionFactory {
    pub fn new(session: MockCluster) -> Self {
        Self {
            session: Mutex::new(session),
            connect_delay: Mutex::new(Duration::ZERO),
            failures_left: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
        }
    }

    /// Session returned by subsequent connects
    pub fn set_session(&self, session: MockCluster) {
        *self.session.lock() = session;
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock() = delay;
    }

    /// The next `count` connects fail with a connection error
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    async fn connect(&self) -> Result<Arc<dyn ClusterSession>, ConnectorError> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        let delay = *self.connect_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ConnectorError::Connection("head node unreachable".to_string()));
        }

        let session = self.session.lock().clone();
        Ok(Arc::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn test_mock_records_calls() {
        let cluster = MockCluster::new(fixtures::directory(&[fixtures::node(1, "n1", "r1")]));
        cluster.set_monitoring(json!({"items": [{"entity": 1, "measurable": 10, "value": 3}]}));

        let payload = cluster.monitoring(MonitoringQuery::Latest, &[1], &[10]).await.unwrap();
        assert_eq!(payload["items"][0]["value"], 3);
        assert_eq!(cluster.entities().len(), 1);
        assert_eq!(
            cluster.calls(),
            vec![MockCall::Monitoring {
                query: MonitoringQuery::Latest,
                entities: vec![1],
                measurables: vec![10],
            }]
        );
    }

    #[tokio::test]
    async fn test_factory_scripted_failures() {
        let factory = MockSessionFactory::new(MockCluster::empty());
        factory.fail_next(1);

        assert!(factory.connect().await.is_err());
        assert!(factory.connect().await.is_ok());
        assert_eq!(factory.connects(), 2);
    }
}
