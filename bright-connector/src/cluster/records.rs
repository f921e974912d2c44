//! Typed records parsed from raw backend payloads
//!
//! This is the one place where absent or mistyped attributes resolve to
//! defaults: `"NA"` for node labels, `None` for measurable metadata, `0` for
//! sample timestamps. Nothing downstream inspects raw JSON.

use super::RawEntity;
use crate::normalize::{normalize_sample, normalize_status};
use serde_json::{Number, Value};
use std::collections::HashMap;

const NOT_AVAILABLE: &str = "NA";

#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub unique_key: i64,
    pub hostname: String,
    pub rack_id: String,
    pub interfaces: HashMap<String, String>,
}

impl NodeRecord {
    /// `None` when the entity carries no unique key (it cannot be joined)
    pub fn from_raw(entity: &RawEntity) -> Option<Self> {
        let unique_key = entity.unique_key?;

        let interfaces = entity
            .attribute("interfaces")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let name = item.get("name")?.as_str()?;
                        let ip = item.get("ip").and_then(Value::as_str).unwrap_or_default();
                        Some((name.to_string(), ip.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(NodeRecord {
            unique_key,
            hostname: label(entity.attribute("hostname")),
            rack_id: label(entity.attribute("rack")),
            interfaces,
        })
    }

    pub fn ip_address(&self, interface: &str) -> Option<&str> {
        self.interfaces.get(interface).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeasurableRecord {
    pub unique_key: i64,
    pub name: Option<String>,
    pub parameter: Option<String>,
    pub resolve_name: Option<String>,
    pub type_class: Option<String>,
}

impl MeasurableRecord {
    pub fn from_raw(entity: &RawEntity) -> Option<Self> {
        Some(MeasurableRecord {
            unique_key: entity.unique_key?,
            name: entity.name.clone(),
            parameter: text(entity.attribute("parameter")),
            resolve_name: entity.resolve_name.clone(),
            type_class: text(entity.attribute("typeClass")),
        })
    }

    /// The record key this measurable writes to, when it is fully described
    pub fn metric_name(&self) -> Option<&str> {
        match (&self.name, &self.type_class) {
            (Some(name), Some(_)) => Some(name.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub entity_key: i64,
    pub measurable_key: i64,
    pub raw_value: Value,
    pub t0: i64,
    pub t1: i64,
}

impl SampleRecord {
    /// One `items[]` entry of a monitoring response
    pub fn from_item(item: &Value) -> Option<Self> {
        let entity_key = item.get("entity").and_then(Value::as_i64)?;
        let measurable_key = item.get("measurable").and_then(Value::as_i64)?;

        Some(SampleRecord {
            entity_key,
            measurable_key,
            raw_value: item.get("value").cloned().unwrap_or(Value::Null),
            t0: item.get("t0").and_then(Value::as_i64).unwrap_or(0),
            t1: item.get("t1").and_then(Value::as_i64).unwrap_or(0),
        })
    }

    pub fn value(&self) -> Option<Number> {
        normalize_sample(&self.raw_value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PowerStatusRecord {
    pub device: i64,
    pub state: String,
    pub power_state: Number,
}

impl PowerStatusRecord {
    pub fn from_item(item: &Value) -> Option<Self> {
        let device = item.get("device").and_then(Value::as_i64)?;
        let raw = item.get("state").unwrap_or(&Value::Null);

        Some(PowerStatusRecord {
            device,
            state: raw.as_str().unwrap_or(NOT_AVAILABLE).to_string(),
            power_state: normalize_status(raw),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStatusRecord {
    pub device: i64,
    pub status: String,
    pub ping_status: Number,
}

impl DeviceStatusRecord {
    pub fn from_item(item: &Value) -> Option<Self> {
        let device = item.get("refDeviceUniqueKey").and_then(Value::as_i64)?;
        let raw = item.get("status").unwrap_or(&Value::Null);

        Some(DeviceStatusRecord {
            device,
            status: raw.as_str().unwrap_or(NOT_AVAILABLE).to_string(),
            ping_status: normalize_status(raw),
        })
    }
}

fn label(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(value: Value) -> RawEntity {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_node_defaults_to_na() {
        let node = NodeRecord::from_raw(&entity(json!({"baseType": "Node", "uniqueKey": 7}))).unwrap();
        assert_eq!(node.hostname, "NA");
        assert_eq!(node.rack_id, "NA");
        assert!(node.interfaces.is_empty());
        assert_eq!(node.ip_address("eth0"), None);
    }

    #[test]
    fn test_node_interfaces_and_rack() {
        let node = NodeRecord::from_raw(&entity(json!({
            "baseType": "Node",
            "uniqueKey": 7,
            "hostname": "node001",
            "rack": 12,
            "interfaces": [
                {"name": "eth0", "ip": "10.141.0.1"},
                {"name": "ib0", "ip": "10.149.0.1"},
                {"ip": "10.0.0.9"}
            ]
        })))
        .unwrap();

        assert_eq!(node.hostname, "node001");
        assert_eq!(node.rack_id, "12");
        assert_eq!(node.interfaces.len(), 2);
        assert_eq!(node.ip_address("ib0"), Some("10.149.0.1"));
    }

    #[test]
    fn test_entities_without_key_are_unjoinable() {
        assert!(NodeRecord::from_raw(&entity(json!({"baseType": "Node"}))).is_none());
        assert!(MeasurableRecord::from_raw(&entity(json!({"name": "CPUUser"}))).is_none());
    }

    #[test]
    fn test_measurable_needs_name_and_type() {
        let full = MeasurableRecord::from_raw(&entity(json!({
            "uniqueKey": 10, "name": "cpu_temp", "typeClass": "x", "parameter": "core0"
        })))
        .unwrap();
        assert_eq!(full.metric_name(), Some("cpu_temp"));
        assert_eq!(full.parameter.as_deref(), Some("core0"));

        let untyped = MeasurableRecord::from_raw(&entity(json!({"uniqueKey": 11, "name": "x"}))).unwrap();
        assert_eq!(untyped.metric_name(), None);

        let unnamed = MeasurableRecord::from_raw(&entity(json!({"uniqueKey": 12, "typeClass": "x"}))).unwrap();
        assert_eq!(unnamed.metric_name(), None);
    }

    #[test]
    fn test_sample_item_defaults() {
        let sample = SampleRecord::from_item(&json!({"entity": 1, "measurable": 10, "value": "UP"})).unwrap();
        assert_eq!((sample.t0, sample.t1), (0, 0));
        assert_eq!(sample.value(), Some(Number::from(1)));

        let missing_value = SampleRecord::from_item(&json!({"entity": 1, "measurable": 10})).unwrap();
        assert_eq!(missing_value.value(), None);

        assert!(SampleRecord::from_item(&json!({"entity": 1, "value": 3})).is_none());
        assert!(SampleRecord::from_item(&json!({"measurable": 1, "value": 3})).is_none());
    }

    #[test]
    fn test_power_status_falls_back_to_zero() {
        let down = PowerStatusRecord::from_item(&json!({"device": 3, "state": "DOWN"})).unwrap();
        assert_eq!(down.power_state, Number::from(0));
        assert_eq!(down.state, "DOWN");

        let odd = PowerStatusRecord::from_item(&json!({"device": 3, "state": "RESETTING"})).unwrap();
        assert_eq!(odd.power_state, Number::from(0));

        let flag = PowerStatusRecord::from_item(&json!({"device": 3, "state": true})).unwrap();
        assert_eq!(flag.power_state, Number::from(1));
        assert_eq!(flag.state, "NA");
    }

    #[test]
    fn test_device_status_keyed_by_ref_device() {
        let status = DeviceStatusRecord::from_item(&json!({"refDeviceUniqueKey": 4, "status": "UP"})).unwrap();
        assert_eq!(status.device, 4);
        assert_eq!(status.ping_status, Number::from(1));

        let missing = DeviceStatusRecord::from_item(&json!({"refDeviceUniqueKey": 4})).unwrap();
        assert_eq!(missing.ping_status, Number::from(0));
        assert_eq!(missing.status, "NA");
    }
}
