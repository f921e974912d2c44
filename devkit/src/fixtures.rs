/*!
JSON builders for CMDaemon payloads

Shapes match what `cmdevice.getDevices`, `cmmon.getMonitoringMeasurables`
and the monitoring calls return, trimmed to the fields the connector reads.
*/

use serde_json::{json, Value};

/// A compute node entity
pub fn node(unique_key: i64, hostname: &str, rack: &str) -> Value {
    json!({
        "baseType": "Device",
        "childType": "PhysicalNode",
        "uniqueKey": unique_key,
        "hostname": hostname,
        "rack": rack,
        "interfaces": [{"name": "BOOTIF", "ip": format!("10.141.0.{}", unique_key)}]
    })
}

/// A metric measurable with a type class
pub fn metric(unique_key: i64, name: &str) -> Value {
    json!({
        "baseType": "MonitoringMeasurable",
        "childType": "MonitoringMeasurableMetric",
        "uniqueKey": unique_key,
        "name": name,
        "typeClass": "cmd::Metric",
        "parameter": ""
    })
}

/// A measurable with no type class; its samples never reach a record
pub fn untyped_metric(unique_key: i64, name: &str) -> Value {
    json!({
        "baseType": "MonitoringMeasurable",
        "childType": "MonitoringMeasurableMetric",
        "uniqueKey": unique_key,
        "name": name
    })
}

pub fn directory(entities: &[Value]) -> Value {
    Value::Array(entities.to_vec())
}

/// One monitoring item stamped at `t1` (epoch milliseconds)
pub fn sample_at(entity: i64, measurable: i64, value: Value, t1: i64) -> Value {
    json!({
        "entity": entity,
        "measurable": measurable,
        "value": value,
        "t0": t1,
        "t1": t1
    })
}

/// One monitoring item stamped now
pub fn sample(entity: i64, measurable: i64, value: Value) -> Value {
    sample_at(entity, measurable, value, now_ms())
}

pub fn monitoring(items: Vec<Value>) -> Value {
    json!({ "items": items })
}

pub fn power_status(states: &[(i64, &str)]) -> Value {
    let items: Vec<Value> = states
        .iter()
        .map(|(device, state)| json!({"device": device, "state": state}))
        .collect();
    json!([true, items])
}

pub fn device_status(statuses: &[(i64, &str)]) -> Value {
    let items: Vec<Value> = statuses
        .iter()
        .map(|(device, status)| json!({"refDeviceUniqueKey": device, "status": status}))
        .collect();
    Value::Array(items)
}

/// Wall-clock milliseconds, the clock the freshness filter reads
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bright_connector::cluster::{EntityKind, NodeRecord, RawEntity};

    #[test]
    fn test_node_fixture_parses_as_node() {
        let entity: RawEntity = serde_json::from_value(node(7, "node007", "rack2")).unwrap();
        assert_eq!(entity.kind(), EntityKind::Node);

        let record = NodeRecord::from_raw(&entity).unwrap();
        assert_eq!(record.hostname, "node007");
        assert_eq!(record.ip_address("BOOTIF"), Some("10.141.0.7"));
    }

    #[test]
    fn test_metric_fixture_parses_as_measurable() {
        let entity: RawEntity = serde_json::from_value(metric(10, "CPUUser")).unwrap();
        assert_eq!(entity.kind(), EntityKind::MeasurableMetric);
    }
}
