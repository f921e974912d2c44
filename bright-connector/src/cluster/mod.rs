//! Cluster-management collaborator
//!
//! Handles:
//! - The session contract the connector consumes ([`ClusterSession`])
//! - Construction of fresh sessions from stored credentials ([`SessionFactory`])
//! - The raw entity directory shape and its typed records ([`records`])
//! - The CMDaemon JSON-RPC adapter ([`cmdaemon`])

pub mod cmdaemon;
pub mod records;

use crate::error::{ClusterError, ConnectorError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

pub use records::{
    DeviceStatusRecord, MeasurableRecord, NodeRecord, PowerStatusRecord, SampleRecord,
};

/// Monitoring query flavours offered by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitoringQuery {
    /// Last stored sample per entity/measurable pair
    Latest,
    /// Full dump of the stored samples
    Dump,
    /// Ask the backend to sample right now
    SampleNow,
}

/// Entity classes the connector cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Node,
    MeasurableMetric,
    Other,
}

/// One entry of the backend's entity directory, as received
#[derive(Debug, Clone, Deserialize)]
pub struct RawEntity {
    #[serde(rename = "baseType", default)]
    pub base_type: String,
    #[serde(rename = "childType", default)]
    pub child_type: Option<String>,
    #[serde(rename = "uniqueKey", default)]
    pub unique_key: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "resolveName", default)]
    pub resolve_name: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl RawEntity {
    pub fn kind(&self) -> EntityKind {
        let child = self.child_type.as_deref().unwrap_or_default();
        if self.base_type == "Node" || child.ends_with("Node") {
            EntityKind::Node
        } else if child == "MonitoringMeasurableMetric" {
            EntityKind::MeasurableMetric
        } else {
            EntityKind::Other
        }
    }

    /// Display name first, resolve-name only when no display name is set
    pub fn matches_keywords(&self, keywords: &[String]) -> bool {
        match (&self.name, &self.resolve_name) {
            (Some(name), _) => keywords.iter().any(|k| k == name),
            (None, Some(resolve_name)) => keywords.iter().any(|k| k == resolve_name),
            (None, None) => false,
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key).filter(|v| !v.is_null())
    }
}

/// An authenticated connection to the cluster backend.
///
/// The entity directory is loaded when the session is built, so reading it
/// never blocks. Queries go over the wire.
#[async_trait]
pub trait ClusterSession: Send + Sync {
    fn entities(&self) -> &[RawEntity];

    /// Raw payload of a monitoring query, expected to carry an `items` array
    async fn monitoring(
        &self,
        query: MonitoringQuery,
        entities: &[i64],
        measurables: &[i64],
    ) -> Result<Value, ClusterError>;

    /// Raw payload of the power-status query, expected `[ok, [..]]`
    async fn power_status(&self, devices: &[i64]) -> Result<Value, ClusterError>;

    /// Raw payload of the device-status query, expected `[..]`
    async fn device_status(&self, devices: &[i64]) -> Result<Value, ClusterError>;
}

/// Builds brand-new sessions from stored credentials
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ClusterSession>, ConnectorError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(value: Value) -> RawEntity {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_entity_kinds() {
        let node = entity(json!({"baseType": "Node", "childType": "PhysicalNode", "uniqueKey": 1}));
        let head = entity(json!({"baseType": "Device", "childType": "HeadNode", "uniqueKey": 2}));
        let metric = entity(json!({
            "baseType": "MonitoringMeasurable",
            "childType": "MonitoringMeasurableMetric",
            "uniqueKey": 3
        }));
        let switch = entity(json!({"baseType": "Device", "childType": "Switch"}));

        assert_eq!(node.kind(), EntityKind::Node);
        assert_eq!(head.kind(), EntityKind::Node);
        assert_eq!(metric.kind(), EntityKind::MeasurableMetric);
        assert_eq!(switch.kind(), EntityKind::Other);
    }

    #[test]
    fn test_keyword_match_prefers_display_name() {
        let keywords = vec!["CPUUser".to_string(), "resolved".to_string()];

        let named = entity(json!({"name": "CPUUser", "resolveName": "other"}));
        let shadowed = entity(json!({"name": "LoadOne", "resolveName": "resolved"}));
        let unnamed = entity(json!({"resolveName": "resolved"}));
        let anonymous = entity(json!({}));

        assert!(named.matches_keywords(&keywords));
        assert!(!shadowed.matches_keywords(&keywords));
        assert!(unnamed.matches_keywords(&keywords));
        assert!(!anonymous.matches_keywords(&keywords));
    }

    #[test]
    fn test_keyword_match_is_case_sensitive() {
        let keywords = vec!["cpuuser".to_string()];
        assert!(!entity(json!({"name": "CPUUser"})).matches_keywords(&keywords));
    }

    #[test]
    fn test_null_attributes_read_as_missing() {
        let node = entity(json!({"baseType": "Node", "hostname": null, "rack": "r1"}));
        assert!(node.attribute("hostname").is_none());
        assert_eq!(node.attribute("rack"), Some(&json!("r1")));
    }
}
