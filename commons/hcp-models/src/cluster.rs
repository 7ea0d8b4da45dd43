use crate::cloud_error::FieldError;
use crate::provisioning::ProvisioningState;
use crate::resource::{
    ManagedServiceIdentity, ServiceProviderProperties, TrackedResource,
    impl_resource_model,
};
use crate::resource_id::ResourceId;
use crate::validation::{
    check_immutable, field_errors, validate_cidr, validate_one_of,
    validate_resource_name, validate_version,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

pub const DEFAULT_VERSION: &str = "4.19";
pub const DEFAULT_CHANNEL_GROUP: &str = "stable";
pub const CHANNEL_GROUPS: &[&str] = &["stable", "candidate", "fast", "nightly"];
pub const NETWORK_TYPES: &[&str] = &["OVNKubernetes", "Other"];
pub const VISIBILITIES: &[&str] = &["Public", "Private"];
pub const OUTBOUND_TYPES: &[&str] = &["LoadBalancer"];

/// Managed control-plane cluster, with every property flattened and optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
pub struct Cluster {
    #[serde(flatten)]
    pub resource: TrackedResource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<ManagedServiceIdentity>,
    #[serde(default)]
    #[validate(nested)]
    pub properties: ClusterProperties,
    #[serde(skip)]
    pub service: ServiceProviderProperties,
}

impl_resource_model!(Cluster, identity);

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_base_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 15, message = "DNS base domain prefix must be at most 15 characters"))]
    pub dns_base_domain_prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 23, max = 26, message = "Host prefix must be between 23 and 26"))]
    pub host_prefix: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_visibility: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_resource_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_security_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_url: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub control_plane_operators: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data_plane_operators: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_managed_identity: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trusted_ca: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0, message = "Max node provision time must not be negative"))]
    pub autoscaling_max_node_provision_time_seconds: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0, message = "Max pod grace period must not be negative"))]
    pub autoscaling_max_pod_grace_period_seconds: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling_pod_priority_threshold: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0, message = "Max nodes total must not be negative"))]
    pub autoscaling_max_nodes_total: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0, max = 10080, message = "Node drain timeout must be between 0 and 10080 minutes"))]
    pub node_drain_timeout_minutes: Option<i32>,
}

impl Cluster {
    /// Static defaults applied before a create body is decoded onto the model.
    pub fn with_defaults(id: &ResourceId, location: &str) -> Self {
        Self {
            resource: TrackedResource::for_id(id, location),
            identity: None,
            properties: ClusterProperties {
                version_id: Some(DEFAULT_VERSION.to_string()),
                channel_group: Some(DEFAULT_CHANNEL_GROUP.to_string()),
                network_type: Some("OVNKubernetes".to_string()),
                pod_cidr: Some("10.128.0.0/14".to_string()),
                service_cidr: Some("172.30.0.0/16".to_string()),
                machine_cidr: Some("10.0.0.0/16".to_string()),
                host_prefix: Some(23),
                api_visibility: Some("Public".to_string()),
                outbound_type: Some("LoadBalancer".to_string()),
                autoscaling_max_node_provision_time_seconds: Some(900),
                autoscaling_max_pod_grace_period_seconds: Some(600),
                autoscaling_pod_priority_threshold: Some(-10),
                node_drain_timeout_minutes: Some(0),
                ..Default::default()
            },
            service: ServiceProviderProperties::default(),
        }
    }

    /// Fills create-time values that are generated rather than defaulted.
    pub fn fill_dynamic_defaults(&mut self) {
        let name = self.resource.name.clone().unwrap_or_default();
        let p = &mut self.properties;
        if p.dns_base_domain_prefix.as_deref().unwrap_or_default().is_empty() {
            let mut prefix: String = name
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .take(10)
                .collect::<String>()
                .to_lowercase();
            prefix.push_str(&random_suffix());
            p.dns_base_domain_prefix = Some(prefix);
        }
        if p.managed_resource_group.as_deref().unwrap_or_default().is_empty() {
            p.managed_resource_group = Some(format!(
                "arohcp-{}-{}",
                name.to_lowercase().chars().take(45).collect::<String>(),
                uuid::Uuid::new_v4()
            ));
        }
    }

    /// Carries generated create-time values and read-only values from the
    /// previous state so a repeated PUT is idempotent.
    pub fn carry_forward_from(&mut self, old: &Cluster) {
        let (p, o) = (&mut self.properties, &old.properties);
        if p.version_id.as_deref().unwrap_or_default().is_empty() {
            p.version_id = o.version_id.clone();
        }
        if p.dns_base_domain_prefix.as_deref().unwrap_or_default().is_empty() {
            p.dns_base_domain_prefix = o.dns_base_domain_prefix.clone();
        }
        if p.managed_resource_group.as_deref().unwrap_or_default().is_empty() {
            p.managed_resource_group = o.managed_resource_group.clone();
        }
        p.provisioning_state = o.provisioning_state;
        p.dns_base_domain = o.dns_base_domain.clone();
        p.console_url = o.console_url.clone();
        p.api_url = o.api_url.clone();
        p.issuer_url = o.issuer_url.clone();
        self.resource.system_data = old.resource.system_data.clone();
        self.service = old.service.clone();
    }
}

fn random_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..4].to_string()
}

pub fn validate_cluster_create(cluster: &Cluster) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if let Err(e) = cluster.validate() {
        errors.extend(field_errors("", &e));
    }
    if let Some(name) = &cluster.resource.name {
        validate_resource_name(name, 3, 54, false, &mut errors);
    }
    let p = &cluster.properties;
    validate_version("properties.versionId", p.version_id.as_deref(), &mut errors);
    validate_one_of(
        "properties.channelGroup",
        p.channel_group.as_deref(),
        CHANNEL_GROUPS,
        &mut errors,
    );
    validate_one_of(
        "properties.networkType",
        p.network_type.as_deref(),
        NETWORK_TYPES,
        &mut errors,
    );
    validate_one_of(
        "properties.apiVisibility",
        p.api_visibility.as_deref(),
        VISIBILITIES,
        &mut errors,
    );
    validate_one_of(
        "properties.outboundType",
        p.outbound_type.as_deref(),
        OUTBOUND_TYPES,
        &mut errors,
    );
    validate_cidr("properties.podCidr", p.pod_cidr.as_deref(), &mut errors);
    validate_cidr("properties.serviceCidr", p.service_cidr.as_deref(), &mut errors);
    validate_cidr("properties.machineCidr", p.machine_cidr.as_deref(), &mut errors);
    if let Some(subnet) = &p.subnet_id {
        if ResourceId::parse(subnet).is_err() {
            errors.push(FieldError::new(
                "properties.subnetId",
                format!("Invalid subnet resource ID '{subnet}'"),
            ));
        }
    }
    errors
}

pub fn validate_cluster_update(new: &Cluster, old: &Cluster) -> Vec<FieldError> {
    let mut errors = validate_cluster_create(new);
    let (n, o) = (&new.properties, &old.properties);
    check_immutable(
        "properties.dnsBaseDomainPrefix",
        &o.dns_base_domain_prefix,
        &n.dns_base_domain_prefix,
        &mut errors,
    );
    check_immutable("properties.networkType", &o.network_type, &n.network_type, &mut errors);
    check_immutable("properties.podCidr", &o.pod_cidr, &n.pod_cidr, &mut errors);
    check_immutable("properties.serviceCidr", &o.service_cidr, &n.service_cidr, &mut errors);
    check_immutable("properties.machineCidr", &o.machine_cidr, &n.machine_cidr, &mut errors);
    check_immutable("properties.hostPrefix", &o.host_prefix, &n.host_prefix, &mut errors);
    check_immutable(
        "properties.managedResourceGroup",
        &o.managed_resource_group,
        &n.managed_resource_group,
        &mut errors,
    );
    check_immutable("properties.subnetId", &o.subnet_id, &n.subnet_id, &mut errors);
    check_immutable("properties.outboundType", &o.outbound_type, &n.outbound_type, &mut errors);
    check_immutable("properties.apiVisibility", &o.api_visibility, &n.api_visibility, &mut errors);
    errors
}
