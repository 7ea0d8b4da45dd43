use crate::resource_id::ResourceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read-only catalogue entry describing an installable OpenShift version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenShiftVersion {
    pub id: ResourceId,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub properties: OpenShiftVersionProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenShiftVersionProperties {
    pub channel_group: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_of_life_timestamp: Option<DateTime<Utc>>,
}

impl OpenShiftVersion {
    pub fn new(id: ResourceId, properties: OpenShiftVersionProperties) -> Self {
        Self {
            name: id.name().to_string(),
            resource_type: id.resource_type().to_string(),
            id,
            properties,
        }
    }
}
