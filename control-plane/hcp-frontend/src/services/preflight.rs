use crate::api_version::ApiVersionRegistry;
use crate::errors::FrontendError;
use crate::merge::apply_body;
use hcp_models::{
    CloudErrorBody, Cluster, ExternalAuth, FieldError, NodePool, ResourceId, ResourceKind,
    ResourceModel, ResourceType, codes, validate_cluster_create, validate_external_auth_create,
    validate_node_pool_create,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct PreflightRequest {
    #[serde(default)]
    pub resources: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreflightStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightResponse {
    pub status: PreflightStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CloudErrorBody>,
}

/// Header of one template resource; the rest of the entry is the body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreflightResource {
    name: String,
    #[serde(rename = "type")]
    resource_type: String,
    api_version: String,
}

/// Static validation of resources in a template before deployment.
pub struct PreflightService {
    versions: Arc<ApiVersionRegistry>,
    location: String,
}

impl PreflightService {
    pub fn new(versions: Arc<ApiVersionRegistry>, location: &str) -> Self {
        Self {
            versions,
            location: location.to_string(),
        }
    }

    /// Best effort: entries that cannot be checked are skipped rather than
    /// reported.
    pub fn validate(
        &self,
        subscription_id: &str,
        resource_group: &str,
        request: &PreflightRequest,
    ) -> PreflightResponse {
        let mut failures = Vec::new();
        for (index, raw) in request.resources.iter().enumerate() {
            if contains_template_expression(raw) {
                debug!(index, "skipping resource with template expressions");
                continue;
            }
            let header: PreflightResource = match serde_json::from_value(raw.clone()) {
                Ok(header) => header,
                Err(e) => {
                    warn!(index, error = %e, "skipping malformed preflight resource");
                    continue;
                }
            };
            if !self.versions.is_supported(&header.api_version) {
                warn!(index, api_version = %header.api_version, "unrecognized API version");
                continue;
            }
            let Some(kind) =
                ResourceType::parse(&header.resource_type).and_then(|rt| ResourceKind::from_resource_type(&rt))
            else {
                continue;
            };
            let Some(id) = resource_id(subscription_id, resource_group, kind, &header.name) else {
                warn!(index, name = %header.name, "skipping preflight resource with malformed name");
                continue;
            };

            let body = strip_template_members(raw);
            let errors = match kind {
                ResourceKind::Cluster => check(
                    Cluster::with_defaults(&id, &self.location),
                    &body,
                    &id,
                    |cluster| {
                        cluster.fill_dynamic_defaults();
                        validate_cluster_create(cluster)
                    },
                ),
                ResourceKind::NodePool => check(
                    NodePool::with_defaults(&id, &self.location),
                    &body,
                    &id,
                    |pool| validate_node_pool_create(pool),
                ),
                ResourceKind::ExternalAuth => check(
                    ExternalAuth::with_defaults(&id),
                    &body,
                    &id,
                    |auth| validate_external_auth_create(auth),
                ),
            };
            if !errors.is_empty() {
                failures.push(
                    CloudErrorBody::new(
                        codes::INVALID_REQUEST_CONTENT,
                        format!("Content validation failed for '{}'", header.name),
                    )
                    .with_target(header.name.clone())
                    .with_details(errors.iter().map(CloudErrorBody::from).collect()),
                );
            }
        }

        if failures.is_empty() {
            PreflightResponse {
                status: PreflightStatus::Succeeded,
                error: None,
            }
        } else {
            PreflightResponse {
                status: PreflightStatus::Failed,
                error: Some(
                    CloudErrorBody::new(
                        codes::PREFLIGHT_VALIDATION_FAILED,
                        "Preflight validation failed for one or more resources",
                    )
                    .with_details(failures),
                ),
            }
        }
    }
}

fn check<M>(
    base: M,
    body: &Value,
    id: &ResourceId,
    validate: impl FnOnce(&mut M) -> Vec<FieldError>,
) -> Vec<FieldError>
where
    M: ResourceModel + Serialize + DeserializeOwned,
{
    match apply_body(&base, body, id) {
        Ok(mut model) => validate(&mut model),
        Err(FrontendError::Validation(errors)) => errors,
        Err(e) => vec![FieldError::new("", e.to_string())],
    }
}

/// Template resources name children as `cluster/child`.
fn resource_id(
    subscription_id: &str,
    resource_group: &str,
    kind: ResourceKind,
    name: &str,
) -> Option<ResourceId> {
    let parts: Vec<&str> = name.split('/').collect();
    let child_type = match kind {
        ResourceKind::Cluster => {
            return match parts.as_slice() {
                [cluster] if !cluster.is_empty() => {
                    Some(ResourceId::cluster(subscription_id, resource_group, cluster))
                }
                _ => None,
            };
        }
        ResourceKind::NodePool => hcp_models::NODE_POOL_TYPE_NAME,
        ResourceKind::ExternalAuth => hcp_models::EXTERNAL_AUTH_TYPE_NAME,
    };
    match parts.as_slice() {
        [cluster, child] if !cluster.is_empty() && !child.is_empty() => Some(
            ResourceId::cluster(subscription_id, resource_group, cluster).child(child_type, child),
        ),
        _ => None,
    }
}

/// Members of a template entry that are not part of the resource body.
const TEMPLATE_MEMBERS: &[&str] = &["name", "type", "apiVersion", "dependsOn", "condition", "copy", "comments"];

fn strip_template_members(raw: &Value) -> Value {
    let mut body = raw.clone();
    if let Value::Object(members) = &mut body {
        for member in TEMPLATE_MEMBERS {
            members.remove(*member);
        }
    }
    body
}

/// True if any string in `value` is a template language expression:
/// wrapped in brackets, and not escaped with a leading `[[`.
fn contains_template_expression(value: &Value) -> bool {
    match value {
        Value::String(s) => {
            let s = s.trim();
            s.starts_with('[') && s.ends_with(']') && !s.starts_with("[[")
        }
        Value::Array(items) => items.iter().any(contains_template_expression),
        Value::Object(members) => members.values().any(contains_template_expression),
        _ => false,
    }
}
