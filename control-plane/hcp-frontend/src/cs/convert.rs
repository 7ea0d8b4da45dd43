//! Translation between the flat internal models and the nested upstream
//! wire shapes. One function per kind and direction.

use super::models::*;
use super::ControlPlaneResult;
use crate::errors::ControlPlaneError;
use chrono::{DateTime, Utc};
use hcp_models::{
    Cluster, ClusterProperties, ExternalAuth, ExternalAuthClient, ExternalAuthProperties,
    InternalId, ManagedServiceIdentity, NodePool, NodePoolProperties, OpenShiftVersion,
    OpenShiftVersionProperties, RequiredClaim, ResourceId, Taint, TrackedResource,
    UserAssignedIdentity,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const VERSION_PREFIX: &str = "openshift-v";

const FLAVOUR_ID: &str = "osd-4";
const CLOUD_PROVIDER: &str = "azure";
const PRODUCT_ID: &str = "aro";
const NODE_DRAIN_UNIT: &str = "minutes";
const OUTBOUND_LOAD_BALANCER: &str = "load_balancer";
const LISTENING_EXTERNAL: &str = "external";
const LISTENING_INTERNAL: &str = "internal";

/// `4.19` becomes `openshift-v4.19.0`; a patch level already present is kept.
pub fn version_to_cs(version: &str) -> String {
    let bare = version.strip_prefix(VERSION_PREFIX).unwrap_or(version);
    let mut parts: Vec<&str> = bare.split('.').collect();
    while parts.len() < 3 {
        parts.push("0");
    }
    format!("{VERSION_PREFIX}{}", parts.join("."))
}

pub fn version_from_cs(version: &str) -> String {
    version.replacen(VERSION_PREFIX, "", 1)
}

/// Strips the prefix and truncates to `major.minor`.
pub fn version_from_cs_xy(version: &str) -> String {
    let bare = version_from_cs(version);
    let parts: Vec<&str> = bare.split('.').collect();
    if parts.len() >= 2 {
        format!("{}.{}", parts[0], parts[1])
    } else {
        bare
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

fn visibility_to_listening(visibility: &str) -> ControlPlaneResult<String> {
    match visibility {
        "Public" => Ok(LISTENING_EXTERNAL.to_string()),
        "Private" => Ok(LISTENING_INTERNAL.to_string()),
        other => Err(ControlPlaneError::Conversion(format!(
            "API visibility '{other}'"
        ))),
    }
}

fn listening_to_visibility(listening: &str) -> ControlPlaneResult<Option<String>> {
    match listening {
        "" => Ok(None),
        LISTENING_EXTERNAL => Ok(Some("Public".to_string())),
        LISTENING_INTERNAL => Ok(Some("Private".to_string())),
        other => Err(ControlPlaneError::Conversion(format!("listening method '{other}'"))),
    }
}

fn outbound_to_cs(outbound: &str) -> ControlPlaneResult<String> {
    match outbound {
        "LoadBalancer" => Ok(OUTBOUND_LOAD_BALANCER.to_string()),
        other => Err(ControlPlaneError::Conversion(format!("outbound type '{other}'"))),
    }
}

fn outbound_from_cs(outbound: &str) -> ControlPlaneResult<Option<String>> {
    match outbound {
        "" => Ok(None),
        OUTBOUND_LOAD_BALANCER => Ok(Some("LoadBalancer".to_string())),
        other => Err(ControlPlaneError::Conversion(format!("outbound type '{other}'"))),
    }
}

fn prefix_policy_to_cs(policy: &str) -> ControlPlaneResult<String> {
    match policy {
        "Prefix" | "NoPrefix" => Ok(policy.to_string()),
        "None" | "" => Ok(String::new()),
        other => Err(ControlPlaneError::Conversion(format!(
            "username prefix policy '{other}'"
        ))),
    }
}

fn prefix_policy_from_cs(policy: &str) -> ControlPlaneResult<String> {
    match policy {
        "Prefix" | "NoPrefix" => Ok(policy.to_string()),
        "" => Ok("None".to_string()),
        other => Err(ControlPlaneError::Conversion(format!(
            "username prefix policy '{other}'"
        ))),
    }
}

fn client_type_to_cs(client_type: &str) -> ControlPlaneResult<String> {
    match client_type {
        "Confidential" | "Public" => Ok(client_type.to_lowercase()),
        other => Err(ControlPlaneError::Conversion(format!("client type '{other}'"))),
    }
}

fn client_type_from_cs(client_type: &str) -> ControlPlaneResult<String> {
    match client_type {
        "confidential" => Ok("Confidential".to_string()),
        "public" => Ok("Public".to_string()),
        other => Err(ControlPlaneError::Conversion(format!("client type '{other}'"))),
    }
}

fn drain_period(minutes: i32) -> CsValue {
    CsValue {
        unit: NODE_DRAIN_UNIT.to_string(),
        value: f64::from(minutes),
    }
}

fn drain_minutes(period: &Option<CsValue>) -> Option<i32> {
    period
        .as_ref()
        .filter(|p| p.unit == NODE_DRAIN_UNIT)
        .map(|p| p.value as i32)
}

/// Parses durations such as `15m`, `900s` or `1.5h` into whole seconds.
fn parse_duration_seconds(value: &str) -> ControlPlaneResult<i32> {
    let invalid = || ControlPlaneError::Conversion(format!("duration '{value}'"));
    let split = value
        .find(|c: char| c.is_ascii_alphabetic())
        .ok_or_else(invalid)?;
    let (number, unit) = value.split_at(split);
    let number: f64 = number.parse().map_err(|_| invalid())?;
    let scale = match unit {
        "s" => 1.0,
        "m" => 60.0,
        "h" => 3600.0,
        _ => return Err(invalid()),
    };
    Ok((number * scale) as i32)
}

/// Request context that only matters when a cluster is first created.
#[derive(Debug, Clone, Default)]
pub struct ClusterCreateContext {
    pub tenant_id: String,
    pub subscription_id: String,
    pub resource_group: String,
}

pub fn cluster_autoscaler_to_cs(cluster: &Cluster) -> CsClusterAutoscaler {
    let p = &cluster.properties;
    CsClusterAutoscaler {
        max_node_provision_time: p
            .autoscaling_max_node_provision_time_seconds
            .map(|secs| format!("{}m", f64::from(secs) / 60.0)),
        max_pod_grace_period: p.autoscaling_max_pod_grace_period_seconds,
        pod_priority_threshold: p.autoscaling_pod_priority_threshold,
        resource_limits: Some(CsResourceLimits {
            max_nodes_total: p.autoscaling_max_nodes_total,
        }),
    }
}

fn managed_identities_to_cs(p: &ClusterProperties) -> CsManagedIdentities {
    let to_map = |ops: &BTreeMap<String, String>| {
        ops.iter()
            .map(|(name, id)| (name.clone(), CsManagedIdentity::new(id)))
            .collect()
    };
    CsManagedIdentities {
        control_plane_operators_managed_identities: to_map(&p.control_plane_operators),
        data_plane_operators_managed_identities: to_map(&p.data_plane_operators),
        service_managed_identity: non_empty(&p.service_managed_identity)
            .map(|id| CsManagedIdentity::new(&id)),
    }
}

/// Builds the upstream payload. On update, fields the upstream rejects as
/// immutable are left out and optional proxy settings are sent explicitly
/// empty so they can be cleared; on create empty values are omitted.
pub fn cluster_to_cs(
    cluster: &Cluster,
    ctx: &ClusterCreateContext,
    updating: bool,
) -> ControlPlaneResult<CsCluster> {
    let p = &cluster.properties;
    let name = cluster
        .resource
        .name
        .clone()
        .unwrap_or_default()
        .to_lowercase();
    let mut cs = CsCluster {
        node_drain_grace_period: Some(drain_period(p.node_drain_timeout_minutes.unwrap_or(0))),
        ..Default::default()
    };

    if updating {
        cs.proxy = Some(CsProxy {
            http_proxy: Some(p.http_proxy.clone().unwrap_or_default()),
            https_proxy: Some(p.https_proxy.clone().unwrap_or_default()),
            no_proxy: Some(p.no_proxy.clone().unwrap_or_default()),
        });
        cs.additional_trust_bundle = Some(p.trusted_ca.clone().unwrap_or_default());
        return Ok(cs);
    }

    let proxy = CsProxy {
        http_proxy: non_empty(&p.http_proxy),
        https_proxy: non_empty(&p.https_proxy),
        no_proxy: non_empty(&p.no_proxy),
    };
    if proxy != CsProxy::default() {
        cs.proxy = Some(proxy);
    }
    cs.additional_trust_bundle = non_empty(&p.trusted_ca);

    let channel_group = p.channel_group.clone();
    cs.name = Some(name.clone());
    cs.flavour = Some(CsRef::new(FLAVOUR_ID));
    cs.region = cluster.resource.location.as_deref().map(CsRef::new);
    cs.cloud_provider = Some(CsRef::new(CLOUD_PROVIDER));
    cs.product = Some(CsRef::new(PRODUCT_ID));
    cs.hypershift = Some(CsEnabled { enabled: true });
    cs.ccs = Some(CsEnabled { enabled: true });
    cs.version = Some(CsVersion {
        id: p.version_id.as_deref().map(version_to_cs),
        channel_group,
        ..Default::default()
    });
    cs.network = Some(CsNetwork {
        network_type: p.network_type.clone(),
        pod_cidr: p.pod_cidr.clone(),
        service_cidr: p.service_cidr.clone(),
        machine_cidr: p.machine_cidr.clone(),
        host_prefix: p.host_prefix,
    });
    cs.api = Some(CsClusterApi {
        url: None,
        listening: p
            .api_visibility
            .as_deref()
            .map(visibility_to_listening)
            .transpose()?,
    });
    cs.domain_prefix = non_empty(&p.dns_base_domain_prefix);
    cs.azure = Some(CsAzure {
        tenant_id: Some(ctx.tenant_id.clone()).filter(|t| !t.is_empty()),
        subscription_id: Some(ctx.subscription_id.to_lowercase()),
        resource_group_name: Some(ctx.resource_group.to_lowercase()),
        resource_name: Some(name),
        managed_resource_group_name: non_empty(&p.managed_resource_group),
        subnet_resource_id: non_empty(&p.subnet_id),
        network_security_group_resource_id: non_empty(&p.network_security_group_id),
        nodes_outbound_connectivity: p
            .outbound_type
            .as_deref()
            .map(outbound_to_cs)
            .transpose()?
            .map(|outbound_type| CsOutboundConnectivity { outbound_type }),
        operators_authentication: Some(CsOperatorsAuthentication {
            managed_identities: Some(managed_identities_to_cs(p)),
        }),
    });
    cs.autoscaler = Some(cluster_autoscaler_to_cs(cluster));
    Ok(cs)
}

/// Rebuilds the internal model from upstream state. Provisioning state and
/// the other locally owned fields are left unset for the overlay to fill.
pub fn cluster_from_cs(
    id: &ResourceId,
    location: &str,
    cs: &CsCluster,
) -> ControlPlaneResult<Cluster> {
    let version = cs.version.clone().unwrap_or_default();
    let network = cs.network.clone().unwrap_or_default();
    let azure = cs.azure.clone().unwrap_or_default();
    let api = cs.api.clone().unwrap_or_default();
    let proxy = cs.proxy.clone().unwrap_or_default();
    let autoscaler = cs.autoscaler.clone().unwrap_or_default();

    let mut properties = ClusterProperties {
        version_id: version.id.as_deref().map(version_from_cs_xy),
        channel_group: version.channel_group,
        dns_base_domain: cs.dns.as_ref().and_then(|d| d.base_domain.clone()),
        dns_base_domain_prefix: cs.domain_prefix.clone(),
        network_type: network.network_type,
        pod_cidr: network.pod_cidr,
        service_cidr: network.service_cidr,
        machine_cidr: network.machine_cidr,
        host_prefix: network.host_prefix,
        console_url: cs.console.as_ref().and_then(|c| c.url.clone()),
        api_url: api.url,
        api_visibility: listening_to_visibility(api.listening.as_deref().unwrap_or_default())?,
        managed_resource_group: azure.managed_resource_group_name,
        subnet_id: azure.subnet_resource_id,
        outbound_type: match azure.nodes_outbound_connectivity {
            Some(o) => outbound_from_cs(&o.outbound_type)?,
            None => None,
        },
        network_security_group_id: azure.network_security_group_resource_id,
        http_proxy: non_empty(&proxy.http_proxy),
        https_proxy: non_empty(&proxy.https_proxy),
        no_proxy: non_empty(&proxy.no_proxy),
        trusted_ca: non_empty(&cs.additional_trust_bundle),
        autoscaling_max_node_provision_time_seconds: autoscaler
            .max_node_provision_time
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(parse_duration_seconds)
            .transpose()?,
        autoscaling_max_pod_grace_period_seconds: autoscaler.max_pod_grace_period,
        autoscaling_pod_priority_threshold: autoscaler.pod_priority_threshold,
        autoscaling_max_nodes_total: autoscaler.resource_limits.and_then(|l| l.max_nodes_total),
        node_drain_timeout_minutes: Some(drain_minutes(&cs.node_drain_grace_period).unwrap_or(0)),
        ..Default::default()
    };

    // Control-plane operator and service identities also populate the
    // top-level user-assigned map; data-plane identities do not.
    let mut user_assigned = BTreeMap::new();
    let managed = azure
        .operators_authentication
        .and_then(|a| a.managed_identities)
        .unwrap_or_default();
    for (operator, identity) in managed.control_plane_operators_managed_identities {
        user_assigned.insert(identity.resource_id.clone(), user_assigned_of(&identity));
        properties
            .control_plane_operators
            .insert(operator, identity.resource_id);
    }
    for (operator, identity) in managed.data_plane_operators_managed_identities {
        properties
            .data_plane_operators
            .insert(operator, identity.resource_id);
    }
    if let Some(identity) = managed
        .service_managed_identity
        .filter(|i| !i.resource_id.is_empty())
    {
        user_assigned.insert(identity.resource_id.clone(), user_assigned_of(&identity));
        properties.service_managed_identity = Some(identity.resource_id);
    }

    let mut cluster = Cluster {
        resource: TrackedResource::for_id(id, location),
        identity: None,
        properties,
        service: Default::default(),
    };
    if !user_assigned.is_empty() {
        cluster.identity = Some(ManagedServiceIdentity {
            user_assigned_identities: user_assigned,
            ..Default::default()
        });
    }
    cluster.service.internal_id = cs.href.as_deref().and_then(|h| InternalId::parse(h).ok());
    Ok(cluster)
}

fn user_assigned_of(identity: &CsManagedIdentity) -> UserAssignedIdentity {
    UserAssignedIdentity {
        client_id: identity.client_id.clone(),
        principal_id: identity.principal_id.clone(),
    }
}

pub fn node_pool_to_cs(node_pool: &NodePool, updating: bool) -> CsNodePool {
    let p = &node_pool.properties;
    let mut cs = CsNodePool {
        labels: Some(p.labels.clone()),
        node_drain_grace_period: p.node_drain_timeout_minutes.map(drain_period),
        ..Default::default()
    };

    match (p.autoscaling_min, p.autoscaling_max) {
        (Some(min), Some(max)) => {
            cs.autoscaling = Some(CsNodePoolAutoscaling {
                min_replica: min,
                max_replica: max,
            })
        }
        _ => cs.replicas = Some(p.replicas.unwrap_or(0)),
    }

    let taints: Vec<CsTaint> = p
        .taints
        .iter()
        .map(|t| CsTaint {
            key: t.key.clone(),
            value: t.value.clone(),
            effect: t.effect.clone(),
        })
        .collect();
    if updating || !taints.is_empty() {
        cs.taints = Some(taints);
    }

    if !updating {
        let name = node_pool
            .resource
            .name
            .clone()
            .unwrap_or_default()
            .to_lowercase();
        cs.id = Some(name.clone());
        cs.version = Some(CsVersion {
            id: p.version_id.as_deref().map(version_to_cs),
            channel_group: p.channel_group.clone(),
            ..Default::default()
        });
        cs.subnet = non_empty(&p.subnet_id);
        cs.azure_node_pool = Some(CsAzureNodePool {
            resource_name: Some(name),
            vm_size: p.vm_size.clone(),
            os_disk: Some(CsOsDisk {
                size_gibibytes: p.os_disk_size_gib,
            }),
        });
        cs.availability_zone = non_empty(&p.availability_zone);
        cs.auto_repair = p.auto_repair;
    }
    cs
}

pub fn node_pool_from_cs(
    id: &ResourceId,
    location: &str,
    cs: &CsNodePool,
) -> ControlPlaneResult<NodePool> {
    let version = cs.version.clone().unwrap_or_default();
    let azure = cs.azure_node_pool.clone().unwrap_or_default();
    let properties = NodePoolProperties {
        provisioning_state: None,
        version_id: version.id.as_deref().map(version_from_cs),
        channel_group: version.channel_group,
        subnet_id: non_empty(&cs.subnet),
        vm_size: azure.vm_size,
        os_disk_size_gib: azure.os_disk.and_then(|d| d.size_gibibytes),
        availability_zone: non_empty(&cs.availability_zone),
        replicas: cs.replicas,
        autoscaling_min: cs.autoscaling.as_ref().map(|a| a.min_replica),
        autoscaling_max: cs.autoscaling.as_ref().map(|a| a.max_replica),
        auto_repair: cs.auto_repair,
        labels: cs.labels.clone().unwrap_or_default(),
        taints: cs
            .taints
            .iter()
            .flatten()
            .map(|t| Taint {
                key: t.key.clone(),
                value: t.value.clone(),
                effect: t.effect.clone(),
            })
            .collect(),
        node_drain_timeout_minutes: drain_minutes(&cs.node_drain_grace_period),
    };
    let mut node_pool = NodePool {
        resource: TrackedResource::for_id(id, location),
        properties,
        service: Default::default(),
    };
    node_pool.service.internal_id = cs.href.as_deref().and_then(|h| InternalId::parse(h).ok());
    Ok(node_pool)
}

pub fn external_auth_to_cs(auth: &ExternalAuth, updating: bool) -> ControlPlaneResult<CsExternalAuth> {
    let p = &auth.properties;
    let clients = p
        .clients
        .iter()
        .map(|c| {
            Ok(CsClientConfig {
                id: c.client_id.clone(),
                component: CsClientComponent {
                    name: c.component_name.clone(),
                    namespace: c.component_namespace.clone(),
                },
                extra_scopes: c.extra_scopes.clone(),
                client_type: client_type_to_cs(&c.client_type)?,
            })
        })
        .collect::<ControlPlaneResult<Vec<_>>>()?;

    let groups = non_empty(&p.groups_claim).map(|claim| CsGroupsClaim {
        claim,
        prefix: p.groups_prefix.clone(),
    });

    Ok(CsExternalAuth {
        id: (!updating).then(|| {
            auth.resource
                .name
                .clone()
                .unwrap_or_default()
                .to_lowercase()
        }),
        href: None,
        issuer: Some(CsTokenIssuer {
            url: p.issuer_url.clone(),
            ca: p.issuer_ca.clone(),
            audiences: p.issuer_audiences.clone(),
        }),
        clients: Some(clients),
        claim: Some(CsClaim {
            mappings: Some(CsClaimMappings {
                user_name: Some(CsUsernameClaim {
                    claim: p.username_claim.clone(),
                    prefix: p.username_prefix.clone(),
                    prefix_policy: Some(prefix_policy_to_cs(
                        p.username_prefix_policy.as_deref().unwrap_or_default(),
                    )?),
                }),
                groups,
            }),
            validation_rules: Some(
                p.validation_rules
                    .iter()
                    .map(|r| CsValidationRule {
                        claim: r.claim.clone(),
                        required_value: r.required_value.clone(),
                    })
                    .collect(),
            ),
        }),
    })
}

pub fn external_auth_from_cs(id: &ResourceId, cs: &CsExternalAuth) -> ControlPlaneResult<ExternalAuth> {
    let issuer = cs.issuer.clone().unwrap_or_default();
    let claim = cs.claim.clone().unwrap_or_default();
    let mappings = claim.mappings.unwrap_or_default();
    let user_name = mappings.user_name.unwrap_or_default();

    let clients = cs
        .clients
        .iter()
        .flatten()
        .map(|c| {
            Ok(ExternalAuthClient {
                component_name: c.component.name.clone(),
                component_namespace: c.component.namespace.clone(),
                client_id: c.id.clone(),
                extra_scopes: c.extra_scopes.clone(),
                client_type: client_type_from_cs(&c.client_type)?,
            })
        })
        .collect::<ControlPlaneResult<Vec<_>>>()?;

    let properties = ExternalAuthProperties {
        provisioning_state: None,
        issuer_url: issuer.url,
        issuer_audiences: issuer.audiences,
        issuer_ca: issuer.ca,
        clients,
        username_claim: user_name.claim,
        username_prefix: non_empty(&user_name.prefix),
        username_prefix_policy: Some(prefix_policy_from_cs(
            user_name.prefix_policy.as_deref().unwrap_or_default(),
        )?),
        groups_claim: mappings.groups.as_ref().map(|g| g.claim.clone()),
        groups_prefix: mappings.groups.and_then(|g| g.prefix),
        validation_rules: claim
            .validation_rules
            .unwrap_or_default()
            .into_iter()
            .map(|r| RequiredClaim {
                claim: r.claim,
                required_value: r.required_value,
            })
            .collect(),
    };

    let mut resource = TrackedResource::for_id(id, "");
    resource.location = None;
    let mut auth = ExternalAuth {
        resource,
        properties,
        service: Default::default(),
    };
    auth.service.internal_id = cs.href.as_deref().and_then(|h| InternalId::parse(h).ok());
    Ok(auth)
}

/// Issued break-glass credential as returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdminCredential {
    pub kubeconfig: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_timestamp: Option<DateTime<Utc>>,
}

pub fn credential_from_cs(cs: &CsBreakGlassCredential) -> AdminCredential {
    AdminCredential {
        kubeconfig: cs.kubeconfig.clone().unwrap_or_default(),
        expiration_timestamp: cs.expiration_timestamp,
    }
}

/// Catalogue name for an upstream version; `None` when it carries no id.
pub fn version_name(cs: &CsVersion) -> Option<String> {
    cs.id.as_deref().map(version_from_cs)
}

/// `4.19.0` becomes `openshift-v4.19.0`, taken verbatim otherwise.
pub fn version_name_to_cs(name: &str) -> String {
    if name.starts_with(VERSION_PREFIX) {
        name.to_string()
    } else {
        format!("{VERSION_PREFIX}{name}")
    }
}

pub fn openshift_version_from_cs(id: ResourceId, cs: &CsVersion) -> OpenShiftVersion {
    OpenShiftVersion::new(
        id,
        OpenShiftVersionProperties {
            channel_group: cs.channel_group.clone().unwrap_or_default(),
            enabled: cs.enabled.unwrap_or(false),
            end_of_life_timestamp: cs.end_of_life_timestamp,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_id() -> ResourceId {
        ResourceId::cluster("SUB", "RG", "Dev")
    }

    fn ctx() -> ClusterCreateContext {
        ClusterCreateContext {
            tenant_id: "tenant".into(),
            subscription_id: "SUB".into(),
            resource_group: "RG".into(),
        }
    }

    #[test]
    fn versions_gain_and_lose_prefix() {
        assert_eq!(version_to_cs("4.19"), "openshift-v4.19.0");
        assert_eq!(version_to_cs("openshift-v4.19.2"), "openshift-v4.19.2");
        assert_eq!(version_from_cs_xy("openshift-v4.19.2"), "4.19");
        assert_eq!(version_from_cs("openshift-v4.18.1"), "4.18.1");
    }

    #[test]
    fn catalogue_versions_drop_the_prefix() {
        let cs = CsVersion {
            id: Some("openshift-v4.19.0".into()),
            channel_group: Some("candidate".into()),
            enabled: Some(true),
            ..Default::default()
        };
        let name = version_name(&cs).unwrap();
        assert_eq!(name, "4.19.0");
        assert_eq!(version_name_to_cs(&name), "openshift-v4.19.0");
        assert_eq!(version_name_to_cs("openshift-v4.18.2"), "openshift-v4.18.2");

        let version =
            openshift_version_from_cs(ResourceId::openshift_version("SUB", "eastus", &name), &cs);
        assert_eq!(version.name, "4.19.0");
        assert_eq!(version.properties.channel_group, "candidate");
        assert!(version.properties.enabled);
        assert!(version.properties.end_of_life_timestamp.is_none());
    }

    #[test]
    fn durations_parse_common_units() {
        assert_eq!(parse_duration_seconds("15m").unwrap(), 900);
        assert_eq!(parse_duration_seconds("1.5m").unwrap(), 90);
        assert_eq!(parse_duration_seconds("30s").unwrap(), 30);
        assert!(parse_duration_seconds("soon").is_err());
    }

    #[test]
    fn create_payload_carries_platform_fields() {
        let mut cluster = Cluster::with_defaults(&cluster_id(), "eastus");
        cluster.properties.control_plane_operators =
            BTreeMap::from([("ingress".into(), "/subscriptions/s/mi/ingress".into())]);
        let cs = cluster_to_cs(&cluster, &ctx(), false).unwrap();

        assert_eq!(cs.name.as_deref(), Some("dev"));
        assert_eq!(cs.version.unwrap().id.as_deref(), Some("openshift-v4.19.0"));
        assert_eq!(cs.api.unwrap().listening.as_deref(), Some("external"));
        let azure = cs.azure.unwrap();
        assert_eq!(azure.subscription_id.as_deref(), Some("sub"));
        assert_eq!(
            azure.nodes_outbound_connectivity.unwrap().outbound_type,
            "load_balancer"
        );
        assert!(cs.proxy.is_none());
        assert_eq!(
            cs.autoscaler.unwrap().max_node_provision_time.as_deref(),
            Some("15m")
        );
    }

    #[test]
    fn update_payload_omits_immutables_and_clears_proxy() {
        let cluster = Cluster::with_defaults(&cluster_id(), "eastus");
        let cs = cluster_to_cs(&cluster, &ctx(), true).unwrap();
        assert!(cs.name.is_none());
        assert!(cs.network.is_none());
        assert!(cs.azure.is_none());
        let proxy = cs.proxy.unwrap();
        assert_eq!(proxy.http_proxy.as_deref(), Some(""));
        assert_eq!(cs.additional_trust_bundle.as_deref(), Some(""));

        let json = serde_json::to_value(&proxy).unwrap();
        assert_eq!(json["no_proxy"], "");
    }

    #[test]
    fn identities_are_rebuilt_from_upstream() {
        let mut managed = CsManagedIdentities::default();
        managed.control_plane_operators_managed_identities.insert(
            "ingress".into(),
            CsManagedIdentity {
                resource_id: "/mi/ingress".into(),
                client_id: Some("c1".into()),
                principal_id: Some("p1".into()),
            },
        );
        managed
            .data_plane_operators_managed_identities
            .insert("disk".into(), CsManagedIdentity::new("/mi/disk"));
        let cs = CsCluster {
            href: Some("/api/aro_hcp/v1alpha1/clusters/abc".into()),
            api: Some(CsClusterApi {
                url: Some("https://api".into()),
                listening: Some("internal".into()),
            }),
            azure: Some(CsAzure {
                operators_authentication: Some(CsOperatorsAuthentication {
                    managed_identities: Some(managed),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        let cluster = cluster_from_cs(&cluster_id(), "eastus", &cs).unwrap();
        let identity = cluster.identity.unwrap();
        assert_eq!(identity.user_assigned_identities.len(), 1);
        assert_eq!(
            identity.user_assigned_identities["/mi/ingress"].principal_id.as_deref(),
            Some("p1")
        );
        assert_eq!(cluster.properties.data_plane_operators["disk"], "/mi/disk");
        assert_eq!(cluster.properties.api_visibility.as_deref(), Some("Private"));
        assert_eq!(cluster.service.internal_id.unwrap().id(), "abc");
    }

    #[test]
    fn node_pool_update_sends_only_mutable_fields() {
        let id = cluster_id().child("nodePools", "Workers");
        let mut np = NodePool::with_defaults(&id, "eastus");
        np.properties.vm_size = Some("Standard_D8s_v3".into());
        np.properties.autoscaling_min = Some(1);
        np.properties.autoscaling_max = Some(3);

        let create = node_pool_to_cs(&np, false);
        assert_eq!(create.id.as_deref(), Some("workers"));
        assert!(create.replicas.is_none());
        assert!(create.taints.is_none());

        let update = node_pool_to_cs(&np, true);
        assert!(update.id.is_none() && update.azure_node_pool.is_none());
        assert_eq!(update.taints, Some(vec![]));
    }

    #[test]
    fn external_auth_policy_and_client_types_map() {
        let id = cluster_id().child("externalAuths", "entra");
        let mut auth = ExternalAuth::with_defaults(&id);
        auth.properties.issuer_url = Some("https://login.example.com".into());
        auth.properties.clients.push(ExternalAuthClient {
            component_name: "console".into(),
            component_namespace: "openshift-console".into(),
            client_id: "abc".into(),
            extra_scopes: vec![],
            client_type: "Confidential".into(),
        });

        let cs = external_auth_to_cs(&auth, false).unwrap();
        let clients = cs.clients.clone().unwrap();
        assert_eq!(clients[0].client_type, "confidential");
        let user_name = cs
            .claim
            .clone()
            .unwrap()
            .mappings
            .unwrap()
            .user_name
            .unwrap();
        assert_eq!(user_name.prefix_policy.as_deref(), Some(""));

        let back = external_auth_from_cs(&id, &cs).unwrap();
        assert_eq!(back.properties.username_prefix_policy.as_deref(), Some("None"));
        assert_eq!(back.properties.clients[0].client_type, "Confidential");
        assert!(back.resource.location.is_none());
    }
}
