use crate::cloud_error::FieldError;
use crate::cluster::{CHANNEL_GROUPS, Cluster, DEFAULT_CHANNEL_GROUP};
use crate::provisioning::ProvisioningState;
use crate::resource::{ServiceProviderProperties, TrackedResource, impl_resource_model};
use crate::resource_id::ResourceId;
use crate::validation::{
    check_immutable, field_errors, parse_version, validate_one_of,
    validate_resource_name, validate_version,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

pub const TAINT_EFFECTS: &[&str] = &["NoSchedule", "PreferNoSchedule", "NoExecute"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
pub struct NodePool {
    #[serde(flatten)]
    pub resource: TrackedResource,
    #[serde(default)]
    #[validate(nested)]
    pub properties: NodePoolProperties,
    #[serde(skip)]
    pub service: ServiceProviderProperties,
}

impl_resource_model!(NodePool);

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Taint {
    #[validate(length(min = 1, message = "Taint key cannot be empty"))]
    pub key: String,
    #[serde(default)]
    pub value: String,
    pub effect: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NodePoolProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 64, max = 2048, message = "OS disk size must be between 64 and 2048 GiB"))]
    pub os_disk_size_gib: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0, max = 200, message = "Replicas must be between 0 and 200"))]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0, message = "Autoscaling minimum must not be negative"))]
    pub autoscaling_min: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 200, message = "Autoscaling maximum must be between 1 and 200"))]
    pub autoscaling_max: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_repair: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(nested)]
    pub taints: Vec<Taint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0, max = 10080, message = "Node drain timeout must be between 0 and 10080 minutes"))]
    pub node_drain_timeout_minutes: Option<i32>,
}

impl NodePool {
    pub fn with_defaults(id: &ResourceId, location: &str) -> Self {
        Self {
            resource: TrackedResource::for_id(id, location),
            properties: NodePoolProperties {
                channel_group: Some(DEFAULT_CHANNEL_GROUP.to_string()),
                os_disk_size_gib: Some(64),
                auto_repair: Some(true),
                ..Default::default()
            },
            service: ServiceProviderProperties::default(),
        }
    }

    pub fn carry_forward_from(&mut self, old: &NodePool) {
        let (p, o) = (&mut self.properties, &old.properties);
        if p.version_id.as_deref().unwrap_or_default().is_empty() {
            p.version_id = o.version_id.clone();
        }
        if p.subnet_id.as_deref().unwrap_or_default().is_empty() {
            p.subnet_id = o.subnet_id.clone();
        }
        p.provisioning_state = o.provisioning_state;
        self.resource.system_data = old.resource.system_data.clone();
        self.service = old.service.clone();
    }
}

pub fn validate_node_pool_create(node_pool: &NodePool) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if let Err(e) = node_pool.validate() {
        errors.extend(field_errors("", &e));
    }
    if let Some(name) = &node_pool.resource.name {
        validate_resource_name(name, 3, 15, false, &mut errors);
    }
    let p = &node_pool.properties;
    validate_version("properties.versionId", p.version_id.as_deref(), &mut errors);
    validate_one_of(
        "properties.channelGroup",
        p.channel_group.as_deref(),
        CHANNEL_GROUPS,
        &mut errors,
    );
    if p.vm_size.as_deref().unwrap_or_default().is_empty() {
        errors.push(FieldError::new(
            "properties.vmSize",
            "Missing required field 'vmSize'",
        ));
    }
    for (i, taint) in p.taints.iter().enumerate() {
        validate_one_of(
            &format!("properties.taints[{i}].effect"),
            Some(taint.effect.as_str()),
            TAINT_EFFECTS,
            &mut errors,
        );
    }
    match (p.autoscaling_min, p.autoscaling_max) {
        (Some(min), Some(max)) if min > max => errors.push(FieldError::new(
            "properties.autoscalingMin",
            format!("Autoscaling minimum {min} exceeds maximum {max}"),
        )),
        (Some(_), None) | (None, Some(_)) => errors.push(FieldError::new(
            "properties.autoscalingMax",
            "Autoscaling requires both a minimum and a maximum",
        )),
        _ => {}
    }
    if p.autoscaling_max.is_some() && p.replicas.unwrap_or(0) != 0 {
        errors.push(FieldError::new(
            "properties.replicas",
            "Replicas cannot be set when autoscaling is enabled",
        ));
    }
    errors
}

pub fn validate_node_pool_update(new: &NodePool, old: &NodePool) -> Vec<FieldError> {
    let mut errors = validate_node_pool_create(new);
    let (n, o) = (&new.properties, &old.properties);
    check_immutable("properties.subnetId", &o.subnet_id, &n.subnet_id, &mut errors);
    check_immutable("properties.vmSize", &o.vm_size, &n.vm_size, &mut errors);
    check_immutable(
        "properties.osDiskSizeGib",
        &o.os_disk_size_gib,
        &n.os_disk_size_gib,
        &mut errors,
    );
    check_immutable(
        "properties.availabilityZone",
        &o.availability_zone,
        &n.availability_zone,
        &mut errors,
    );
    errors
}

/// Cross-checks a node pool against the cluster it belongs to.
pub fn admit_node_pool(node_pool: &NodePool, cluster: &Cluster) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let (np, cp) = (&node_pool.properties, &cluster.properties);

    if let (Some(a), Some(b)) = (&np.channel_group, &cp.channel_group) {
        if !a.eq_ignore_ascii_case(b) {
            errors.push(FieldError::new(
                "properties.channelGroup",
                format!("Node pool channel group '{a}' must match cluster channel group '{b}'"),
            ));
        }
    }

    let np_version = np.version_id.as_deref().and_then(parse_version);
    let cluster_version = cp.version_id.as_deref().and_then(parse_version);
    if let (Some(nv), Some(cv)) = (np_version, cluster_version) {
        if nv > cv {
            errors.push(FieldError::new(
                "properties.versionId",
                format!(
                    "Node pool version {}.{} cannot exceed cluster version {}.{}",
                    nv.0, nv.1, cv.0, cv.1
                ),
            ));
        }
    }
    errors
}
