/*!
# Connector DevKit - mocks and helpers for connector tests

- Recording mock of the cluster session and its factory
- Recording mock of the telemetry sink
- JSON builders for directory and monitoring payloads
- A harness wiring mocks into a real `Connector` and `Scheduler`
*/

pub mod fixtures;
pub mod mock_cluster;
pub mod mock_sink;
pub mod test_utils;

pub use mock_cluster::{MockCall, MockCluster, MockSessionFactory};
pub use mock_sink::MockSink;
pub use test_utils::TestHarness;
