//! Join of nodes, measurables and samples into flat per-node records

use crate::cluster::{DeviceStatusRecord, NodeRecord, PowerStatusRecord};
use crate::fetcher::{MeasurableMap, NodeMap, SampleMap};
use serde::Serialize;
use serde_json::{Number, Value};
use std::collections::{BTreeMap, HashMap};

pub const HOSTNAME: &str = "Hostname";
pub const RACK_ID: &str = "RackId";

/// One telemetry entry: `{"Hostname", "RackId", <metric>: <value>, ...}`
///
/// A single flat map; a metric named like a seed key replaces the seed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricRecord {
    fields: BTreeMap<String, Value>,
    /// Node hostname for log lines, unaffected by metric names
    #[serde(skip)]
    node: String,
}

impl MetricRecord {
    pub fn seed(node: &NodeRecord) -> Self {
        let fields = BTreeMap::from([
            (HOSTNAME.to_string(), Value::String(node.hostname.clone())),
            (RACK_ID.to_string(), Value::String(node.rack_id.clone())),
        ]);
        Self { fields, node: node.hostname.clone() }
    }

    pub fn hostname(&self) -> &str {
        &self.node
    }

    pub fn set(&mut self, metric: &str, value: Number) {
        self.fields.insert(metric.to_string(), Value::Number(value));
    }

    /// Numeric value stored under `metric`
    pub fn get(&self, metric: &str) -> Option<&Number> {
        match self.fields.get(metric) {
            Some(Value::Number(n)) => Some(n),
            _ => None,
        }
    }

    /// Number of keys, seed keys included
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

pub fn build_records(
    nodes: &NodeMap,
    measurables: &MeasurableMap,
    samples: &SampleMap,
) -> HashMap<i64, MetricRecord> {
    nodes
        .iter()
        .map(|(key, node)| {
            let mut record = MetricRecord::seed(node);

            for sample in samples.get(key).into_iter().flatten() {
                let Some(name) = measurables
                    .get(&sample.measurable_key)
                    .and_then(|m| m.metric_name())
                else {
                    continue;
                };
                let Some(value) = sample.value() else {
                    continue;
                };
                // Later samples for the same metric overwrite earlier ones.
                record.set(name, value);
            }

            (*key, record)
        })
        .collect()
}

pub const POWER_STATE: &str = "PowerState";
pub const DEVICE_STATUS: &str = "DeviceStatus";

/// Add power/ping state to the records of devices present in the responses
pub fn attach_status(
    records: &mut HashMap<i64, MetricRecord>,
    power: &HashMap<i64, PowerStatusRecord>,
    device: &HashMap<i64, DeviceStatusRecord>,
) {
    for (key, record) in records.iter_mut() {
        if let Some(status) = power.get(key) {
            record.set(POWER_STATE, status.power_state.clone());
        }
        if let Some(status) = device.get(key) {
            record.set(DEVICE_STATUS, status.ping_status.clone());
        }
    }
}
