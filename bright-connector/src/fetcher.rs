//! Inventory and sample queries against a cluster session
//!
//! Directory reads (`list_nodes`, `list_measurables`) are synchronous and
//! served from the session's cached entity directory, so they are safe to
//! run while the session lock is held. Sample and status queries go over the
//! wire and must run without the lock.
//!
//! Unexpected response shapes yield an empty map and a warning; transport
//! failures are returned to the caller.

use crate::cluster::{
    ClusterSession, DeviceStatusRecord, EntityKind, MeasurableRecord, MonitoringQuery,
    NodeRecord, PowerStatusRecord, SampleRecord,
};
use crate::error::ClusterError;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

pub type NodeMap = HashMap<i64, NodeRecord>;
pub type MeasurableMap = HashMap<i64, MeasurableRecord>;
pub type SampleMap = HashMap<i64, Vec<SampleRecord>>;

/// Which samples to pull
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Latest,
    Dump,
    Now,
    /// Latest samples whose `t1` falls inside the trailing window
    Windowed(Duration),
}

impl FetchMode {
    fn query(self) -> MonitoringQuery {
        match self {
            FetchMode::Latest | FetchMode::Windowed(_) => MonitoringQuery::Latest,
            FetchMode::Dump => MonitoringQuery::Dump,
            FetchMode::Now => MonitoringQuery::SampleNow,
        }
    }
}

pub fn list_nodes(session: &dyn ClusterSession, keywords: Option<&[String]>) -> NodeMap {
    lookup(session, EntityKind::Node, keywords)
        .filter_map(NodeRecord::from_raw)
        .map(|node| (node.unique_key, node))
        .collect()
}

pub fn list_measurables(session: &dyn ClusterSession, keywords: Option<&[String]>) -> MeasurableMap {
    lookup(session, EntityKind::MeasurableMetric, keywords)
        .filter_map(MeasurableRecord::from_raw)
        .map(|measurable| (measurable.unique_key, measurable))
        .collect()
}

fn lookup<'a>(
    session: &'a dyn ClusterSession,
    kind: EntityKind,
    keywords: Option<&'a [String]>,
) -> impl Iterator<Item = &'a crate::cluster::RawEntity> + 'a {
    session
        .entities()
        .iter()
        .filter(move |entity| entity.kind() == kind)
        .filter(move |entity| keywords.map_or(true, |k| entity.matches_keywords(k)))
}

pub async fn fetch_samples(
    session: &dyn ClusterSession,
    nodes: &NodeMap,
    measurables: &MeasurableMap,
    mode: FetchMode,
) -> Result<SampleMap, ClusterError> {
    let node_keys: Vec<i64> = nodes.keys().copied().collect();
    let measurable_keys: Vec<i64> = measurables.keys().copied().collect();

    let payload = session
        .monitoring(mode.query(), &node_keys, &measurable_keys)
        .await?;

    let samples = group_samples(&payload, mode.query());

    Ok(match mode {
        FetchMode::Windowed(window) => retain_fresh(samples, chrono::Utc::now().timestamp_millis(), window),
        _ => samples,
    })
}

fn group_samples(payload: &Value, query: MonitoringQuery) -> SampleMap {
    let Some(items) = payload.get("items").and_then(Value::as_array) else {
        warn!("{:?} monitoring response has no items list, ignoring", query);
        return SampleMap::new();
    };

    let mut grouped = SampleMap::new();
    for item in items {
        match SampleRecord::from_item(item) {
            Some(sample) => grouped.entry(sample.entity_key).or_default().push(sample),
            None => debug!("Skipping monitoring item without entity/measurable: {}", item),
        }
    }
    grouped
}

/// Keep samples with `t1 >= now - window` (boundary included)
pub fn retain_fresh(samples: SampleMap, now_ms: i64, window: Duration) -> SampleMap {
    let cutoff = now_ms - i64::try_from(window.as_millis()).unwrap_or(i64::MAX);

    samples
        .into_iter()
        .filter_map(|(node, mut list)| {
            list.retain(|sample| sample.t1 >= cutoff);
            (!list.is_empty()).then_some((node, list))
        })
        .collect()
}

pub async fn fetch_power_status(
    session: &dyn ClusterSession,
    devices: &[i64],
) -> Result<HashMap<i64, PowerStatusRecord>, ClusterError> {
    let payload = session.power_status(devices).await?;

    // The backend answers with an `[ok, items]` pair.
    let items = match payload.as_array().map(Vec::as_slice) {
        Some([Value::Bool(true), Value::Array(items)]) => items,
        _ => {
            warn!("Unexpected power status response, ignoring");
            return Ok(HashMap::new());
        }
    };

    Ok(items
        .iter()
        .filter_map(PowerStatusRecord::from_item)
        .map(|status| (status.device, status))
        .collect())
}

pub async fn fetch_device_status(
    session: &dyn ClusterSession,
    devices: &[i64],
) -> Result<HashMap<i64, DeviceStatusRecord>, ClusterError> {
    let payload = session.device_status(devices).await?;

    let Some(items) = payload.as_array() else {
        warn!("Unexpected device status response, ignoring");
        return Ok(HashMap::new());
    };

    Ok(items
        .iter()
        .filter_map(DeviceStatusRecord::from_item)
        .map(|status| (status.device, status))
        .collect())
}
