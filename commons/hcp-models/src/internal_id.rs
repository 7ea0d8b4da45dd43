use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const CLUSTERS_MGMT_PREFIX: &str = "/api/clusters_mgmt/v1";
pub const ARO_HCP_PREFIX: &str = "/api/aro_hcp/v1alpha1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalIdKind {
    Cluster,
    NodePool,
    ExternalAuth,
    BreakGlassCredential,
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("invalid internal ID '{0}'")]
pub struct InternalIdError(pub String);

/// Opaque handle into the external control plane, parsed from the `href`
/// the control plane returns for a created object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InternalId {
    kind: InternalIdKind,
    path: String,
}

impl InternalId {
    pub fn parse(href: &str) -> Result<Self, InternalIdError> {
        let path = href.trim().trim_end_matches('/');
        let rest = path
            .strip_prefix(ARO_HCP_PREFIX)
            .or_else(|| path.strip_prefix(CLUSTERS_MGMT_PREFIX))
            .ok_or_else(|| InternalIdError(href.to_string()))?;

        let parts: Vec<&str> = rest.split('/').skip(1).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(InternalIdError(href.to_string()));
        }
        let kind = match parts.as_slice() {
            ["clusters", _] => InternalIdKind::Cluster,
            ["clusters", _, "node_pools", _] => InternalIdKind::NodePool,
            ["clusters", _, "external_auth_config", "external_auths", _] => {
                InternalIdKind::ExternalAuth
            }
            ["clusters", _, "break_glass_credentials", _] => {
                InternalIdKind::BreakGlassCredential
            }
            _ => return Err(InternalIdError(href.to_string())),
        };
        Ok(Self {
            kind,
            path: path.to_string(),
        })
    }

    pub fn cluster(id: &str) -> Self {
        Self {
            kind: InternalIdKind::Cluster,
            path: format!("{ARO_HCP_PREFIX}/clusters/{id}"),
        }
    }

    pub fn kind(&self) -> InternalIdKind {
        self.kind
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Identifier of the object itself (last path segment).
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    /// Identifier of the owning cluster; for cluster handles, the cluster itself.
    pub fn cluster_id(&self) -> &str {
        let mut parts = self.path.split('/');
        while let Some(p) = parts.next() {
            if p == "clusters" {
                return parts.next().unwrap_or_default();
            }
        }
        ""
    }
}

impl fmt::Display for InternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl Serialize for InternalId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.path)
    }
}

impl<'de> Deserialize<'de> for InternalId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        InternalId::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_kind() {
        let c = InternalId::parse("/api/aro_hcp/v1alpha1/clusters/abc").unwrap();
        assert_eq!(c.kind(), InternalIdKind::Cluster);
        assert_eq!(c.id(), "abc");

        let np =
            InternalId::parse("/api/aro_hcp/v1alpha1/clusters/abc/node_pools/np1")
                .unwrap();
        assert_eq!(np.kind(), InternalIdKind::NodePool);
        assert_eq!(np.cluster_id(), "abc");
        assert_eq!(np.id(), "np1");

        let ea = InternalId::parse(
            "/api/aro_hcp/v1alpha1/clusters/abc/external_auth_config/external_auths/ea",
        )
        .unwrap();
        assert_eq!(ea.kind(), InternalIdKind::ExternalAuth);

        let bg = InternalId::parse(
            "/api/clusters_mgmt/v1/clusters/abc/break_glass_credentials/x",
        )
        .unwrap();
        assert_eq!(bg.kind(), InternalIdKind::BreakGlassCredential);
    }

    #[test]
    fn rejects_unknown_paths() {
        assert!(InternalId::parse("/api/other/v1/clusters/abc").is_err());
        assert!(InternalId::parse("/api/aro_hcp/v1alpha1/clusters/").is_err());
        assert!(InternalId::parse("/api/aro_hcp/v1alpha1/widgets/abc").is_err());
    }
}
