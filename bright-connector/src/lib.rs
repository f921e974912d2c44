//! Bright Cluster Manager to Application Insights connector
//!
//! Pulls node inventory and fresh monitoring samples from a CMDaemon head
//! node on a fixed schedule, joins them into one flat record per node and
//! forwards each record to a telemetry sink.
//!
//! - `cluster`: session contract and the CMDaemon adapter
//! - `session`: swappable handle to the live session
//! - `fetcher` / `joiner`: queries and record assembly
//! - `connector` / `scheduler`: task bodies and the tick loop

pub mod cli;
pub mod cluster;
pub mod config;
pub mod connector;
pub mod error;
pub mod fetcher;
pub mod joiner;
pub mod logging;
pub mod normalize;
pub mod scheduler;
pub mod session;
pub mod sink;

pub use connector::{Connector, ConnectorSettings, EmitSummary};
pub use error::{ClusterError, ConnectorError, Result, SinkError};
pub use joiner::MetricRecord;
pub use scheduler::{ScheduleSettings, Scheduler};
pub use session::SessionHandle;
