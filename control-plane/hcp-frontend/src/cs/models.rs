//! Wire shapes of the upstream control plane API.
//!
//! Every field is optional and omitted when unset; the upstream service
//! treats an absent field as "leave unchanged" on update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsRef {
    pub id: String,
}

impl CsRef {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsEnabled {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsVersion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_group: Option<String>,
    /// Set only on entries of the versions catalogue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_of_life_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsValue {
    pub unit: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsNetwork {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_prefix: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsClusterApi {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listening: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsUrl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsDns {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_domain: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsManagedIdentity {
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
}

impl CsManagedIdentity {
    pub fn new(resource_id: &str) -> Self {
        Self {
            resource_id: resource_id.to_string(),
            client_id: None,
            principal_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsManagedIdentities {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub control_plane_operators_managed_identities: BTreeMap<String, CsManagedIdentity>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data_plane_operators_managed_identities: BTreeMap<String, CsManagedIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_managed_identity: Option<CsManagedIdentity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsOperatorsAuthentication {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_identities: Option<CsManagedIdentities>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsOutboundConnectivity {
    pub outbound_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsAzure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_resource_group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_security_group_resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes_outbound_connectivity: Option<CsOutboundConnectivity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operators_authentication: Option<CsOperatorsAuthentication>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsProxy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_proxy: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsResourceLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_nodes_total: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsClusterAutoscaler {
    /// Duration string such as `15m`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_node_provision_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pod_grace_period: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_priority_threshold: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_limits: Option<CsResourceLimits>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsCluster {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavour: Option<CsRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<CsRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_provider: Option<CsRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<CsRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hypershift: Option<CsEnabled>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ccs: Option<CsEnabled>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<CsVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<CsNetwork>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<CsClusterApi>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console: Option<CsUrl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<CsDns>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<CsAzure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<CsProxy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_trust_bundle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaler: Option<CsClusterAutoscaler>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_drain_grace_period: Option<CsValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsOsDisk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_gibibytes: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsAzureNodePool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_disk: Option<CsOsDisk>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsNodePoolAutoscaling {
    pub min_replica: i32,
    pub max_replica: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsTaint {
    pub key: String,
    #[serde(default)]
    pub value: String,
    pub effect: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsNodePool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<CsVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_node_pool: Option<CsAzureNodePool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_repair: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<CsNodePoolAutoscaling>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taints: Option<Vec<CsTaint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_drain_grace_period: Option<CsValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsTokenIssuer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audiences: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsClientComponent {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsClientConfig {
    pub id: String,
    pub component: CsClientComponent,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_scopes: Vec<String>,
    #[serde(rename = "type")]
    pub client_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsUsernameClaim {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_policy: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsGroupsClaim {
    pub claim: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsClaimMappings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<CsUsernameClaim>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<CsGroupsClaim>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsValidationRule {
    pub claim: String,
    pub required_value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsClaim {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mappings: Option<CsClaimMappings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_rules: Option<Vec<CsValidationRule>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsExternalAuth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<CsTokenIssuer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clients: Option<Vec<CsClientConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<CsClaim>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsBreakGlassCredential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// One page of a list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsList<T> {
    #[serde(default)]
    pub page: usize,
    #[serde(default)]
    pub size: usize,
    #[serde(default)]
    pub total: usize,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CsErrorBody {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub reason: String,
}
