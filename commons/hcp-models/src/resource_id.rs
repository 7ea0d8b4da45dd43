//! Hierarchical, case-preserving resource paths.
//!
//! A path looks like
//! `/subscriptions/{sub}/resourceGroups/{rg}/providers/{namespace}/{type}/{name}[/{type}/{name}...]`.
//! Comparisons ignore case; the original spelling is kept for display.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

pub const PROVIDER_NAMESPACE: &str = "Microsoft.RedHatOpenShift";
pub const RESOURCES_NAMESPACE: &str = "Microsoft.Resources";
pub const CLUSTER_TYPE_NAME: &str = "hcpOpenShiftClusters";
pub const NODE_POOL_TYPE_NAME: &str = "nodePools";
pub const EXTERNAL_AUTH_TYPE_NAME: &str = "externalAuths";
pub const OPERATION_STATUS_TYPE_NAME: &str = "hcpOperationStatuses";
pub const OPERATION_RESULT_TYPE_NAME: &str = "hcpOperationResults";
pub const LOCATIONS_TYPE_NAME: &str = "locations";
pub const VERSION_TYPE_NAME: &str = "hcpOpenShiftVersions";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ResourceIdError {
    #[error("invalid resource ID '{0}': must start with /subscriptions/")]
    MissingSubscription(String),

    #[error("invalid resource ID '{0}': {1}")]
    Malformed(String, &'static str),
}

/// Fully qualified resource type, e.g. `Microsoft.RedHatOpenShift/hcpOpenShiftClusters/nodePools`.
#[derive(Debug, Clone)]
pub struct ResourceType {
    pub namespace: String,
    pub types: Vec<String>,
}

impl ResourceType {
    pub fn new(namespace: &str, types: &[&str]) -> Self {
        Self {
            namespace: namespace.to_string(),
            types: types.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn cluster() -> Self {
        Self::new(PROVIDER_NAMESPACE, &[CLUSTER_TYPE_NAME])
    }

    pub fn node_pool() -> Self {
        Self::new(PROVIDER_NAMESPACE, &[CLUSTER_TYPE_NAME, NODE_POOL_TYPE_NAME])
    }

    pub fn external_auth() -> Self {
        Self::new(
            PROVIDER_NAMESPACE,
            &[CLUSTER_TYPE_NAME, EXTERNAL_AUTH_TYPE_NAME],
        )
    }

    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split('/').filter(|p| !p.is_empty());
        let namespace = parts.next()?.to_string();
        let types: Vec<String> = parts.map(|p| p.to_string()).collect();
        if types.is_empty() {
            return None;
        }
        Some(Self { namespace, types })
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.types.join("/"))
    }
}

impl PartialEq for ResourceType {
    fn eq(&self, other: &Self) -> bool {
        self.to_string().eq_ignore_ascii_case(&other.to_string())
    }
}

impl Eq for ResourceType {}

/// The three resource kinds this provider manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Cluster,
    NodePool,
    ExternalAuth,
}

impl ResourceKind {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            ResourceKind::Cluster => ResourceType::cluster(),
            ResourceKind::NodePool => ResourceType::node_pool(),
            ResourceKind::ExternalAuth => ResourceType::external_auth(),
        }
    }

    pub fn from_resource_type(rt: &ResourceType) -> Option<Self> {
        [
            ResourceKind::Cluster,
            ResourceKind::NodePool,
            ResourceKind::ExternalAuth,
        ]
        .into_iter()
        .find(|kind| kind.resource_type() == *rt)
    }
}

#[derive(Debug, Clone)]
pub struct ResourceId {
    subscription_id: String,
    resource_group: Option<String>,
    namespace: Option<String>,
    segments: Vec<(String, String)>,
    raw: String,
}

impl ResourceId {
    pub fn parse(input: &str) -> Result<Self, ResourceIdError> {
        let trimmed = input.trim().trim_end_matches('/');
        let parts: Vec<&str> = trimmed.split('/').skip(1).collect();
        if !trimmed.starts_with('/')
            || parts.len() < 2
            || !parts[0].eq_ignore_ascii_case("subscriptions")
            || parts[1].is_empty()
        {
            return Err(ResourceIdError::MissingSubscription(input.to_string()));
        }

        let subscription_id = parts[1].to_string();
        let mut rest = &parts[2..];
        let mut resource_group = None;

        if let Some(first) = rest.first() {
            if first.eq_ignore_ascii_case("resourceGroups") {
                let name = rest.get(1).filter(|n| !n.is_empty()).ok_or(
                    ResourceIdError::Malformed(
                        input.to_string(),
                        "missing resource group name",
                    ),
                )?;
                resource_group = Some(name.to_string());
                rest = &rest[2..];
            }
        }

        let mut namespace = None;
        let mut segments = Vec::new();
        if !rest.is_empty() {
            if !rest[0].eq_ignore_ascii_case("providers") || rest.len() < 2 {
                return Err(ResourceIdError::Malformed(
                    input.to_string(),
                    "expected providers/{namespace}",
                ));
            }
            namespace = Some(rest[1].to_string());
            let pairs = &rest[2..];
            if pairs.is_empty() || pairs.len() % 2 != 0 {
                return Err(ResourceIdError::Malformed(
                    input.to_string(),
                    "expected {type}/{name} pairs",
                ));
            }
            for pair in pairs.chunks(2) {
                if pair[0].is_empty() || pair[1].is_empty() {
                    return Err(ResourceIdError::Malformed(
                        input.to_string(),
                        "empty type or name segment",
                    ));
                }
                segments.push((pair[0].to_string(), pair[1].to_string()));
            }
        }

        Ok(Self::from_parts(subscription_id, resource_group, namespace, segments))
    }

    fn from_parts(
        subscription_id: String,
        resource_group: Option<String>,
        namespace: Option<String>,
        segments: Vec<(String, String)>,
    ) -> Self {
        let mut raw = format!("/subscriptions/{subscription_id}");
        if let Some(rg) = &resource_group {
            raw.push_str("/resourceGroups/");
            raw.push_str(rg);
        }
        if let Some(ns) = &namespace {
            raw.push_str("/providers/");
            raw.push_str(ns);
            for (t, n) in &segments {
                raw.push('/');
                raw.push_str(t);
                raw.push('/');
                raw.push_str(n);
            }
        }
        Self {
            subscription_id,
            resource_group,
            namespace,
            segments,
            raw,
        }
    }

    pub fn subscription(subscription_id: &str) -> Self {
        Self::from_parts(subscription_id.to_string(), None, None, Vec::new())
    }

    pub fn resource_group(subscription_id: &str, resource_group: &str) -> Self {
        Self::from_parts(
            subscription_id.to_string(),
            Some(resource_group.to_string()),
            None,
            Vec::new(),
        )
    }

    pub fn cluster(subscription_id: &str, resource_group: &str, name: &str) -> Self {
        Self::from_parts(
            subscription_id.to_string(),
            Some(resource_group.to_string()),
            Some(PROVIDER_NAMESPACE.to_string()),
            vec![(CLUSTER_TYPE_NAME.to_string(), name.to_string())],
        )
    }

    pub fn operation_status(
        subscription_id: &str,
        location: &str,
        operation_name: &str,
    ) -> Self {
        Self::from_parts(
            subscription_id.to_string(),
            None,
            Some(PROVIDER_NAMESPACE.to_string()),
            vec![
                (LOCATIONS_TYPE_NAME.to_string(), location.to_string()),
                (
                    OPERATION_STATUS_TYPE_NAME.to_string(),
                    operation_name.to_string(),
                ),
            ],
        )
    }

    /// Entry of the per-location OpenShift versions catalogue.
    pub fn openshift_version(subscription_id: &str, location: &str, version: &str) -> Self {
        Self::from_parts(
            subscription_id.to_string(),
            None,
            Some(PROVIDER_NAMESPACE.to_string()),
            vec![
                (LOCATIONS_TYPE_NAME.to_string(), location.to_string()),
                (VERSION_TYPE_NAME.to_string(), version.to_string()),
            ],
        )
    }

    /// Nested resource under this one, in the same provider namespace.
    pub fn child(&self, type_name: &str, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push((type_name.to_string(), name.to_string()));
        Self::from_parts(
            self.subscription_id.clone(),
            self.resource_group.clone(),
            Some(
                self.namespace
                    .clone()
                    .unwrap_or_else(|| PROVIDER_NAMESPACE.to_string()),
            ),
            segments,
        )
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Lowercased form, used as a storage key.
    pub fn key(&self) -> String {
        self.raw.to_lowercase()
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn resource_group_name(&self) -> Option<&str> {
        self.resource_group.as_deref()
    }

    pub fn provider_namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(RESOURCES_NAMESPACE)
    }

    pub fn name(&self) -> &str {
        if let Some((_, name)) = self.segments.last() {
            name
        } else if let Some(rg) = &self.resource_group {
            rg
        } else {
            &self.subscription_id
        }
    }

    pub fn location(&self) -> Option<&str> {
        self.segments
            .iter()
            .find(|(t, _)| t.eq_ignore_ascii_case(LOCATIONS_TYPE_NAME))
            .map(|(_, n)| n.as_str())
    }

    pub fn resource_type(&self) -> ResourceType {
        if !self.segments.is_empty() {
            ResourceType {
                namespace: self.provider_namespace().to_string(),
                types: self.segments.iter().map(|(t, _)| t.clone()).collect(),
            }
        } else if self.resource_group.is_some() {
            ResourceType::new(RESOURCES_NAMESPACE, &["resourceGroups"])
        } else {
            ResourceType::new(RESOURCES_NAMESPACE, &["subscriptions"])
        }
    }

    pub fn kind(&self) -> Option<ResourceKind> {
        ResourceKind::from_resource_type(&self.resource_type())
    }

    pub fn parent(&self) -> Option<ResourceId> {
        if self.segments.len() > 1 {
            let mut segments = self.segments.clone();
            segments.pop();
            Some(Self::from_parts(
                self.subscription_id.clone(),
                self.resource_group.clone(),
                self.namespace.clone(),
                segments,
            ))
        } else if !self.segments.is_empty() {
            Some(match &self.resource_group {
                Some(rg) => Self::resource_group(&self.subscription_id, rg),
                None => Self::subscription(&self.subscription_id),
            })
        } else if self.resource_group.is_some() {
            Some(Self::subscription(&self.subscription_id))
        } else {
            None
        }
    }

    /// True if `self` is nested (at any depth) under `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &ResourceId) -> bool {
        let key = self.key();
        let prefix = ancestor.key();
        key.len() > prefix.len()
            && key.starts_with(&prefix)
            && key.as_bytes()[prefix.len()] == b'/'
    }
}

impl PartialEq for ResourceId {
    fn eq(&self, other: &Self) -> bool {
        self.raw.eq_ignore_ascii_case(&other.raw)
    }
}

impl Eq for ResourceId {}

impl Hash for ResourceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for ResourceId {
    type Err = ResourceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ResourceId::parse(&s).map_err(serde::de::Error::custom)
    }
}
