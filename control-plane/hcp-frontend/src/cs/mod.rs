//! Client for the upstream control plane that actually provisions clusters.

pub mod convert;
pub mod http;
pub mod memory;
pub mod models;

pub use http::HttpControlPlaneClient;
pub use memory::{Call, CallKind, CallVerb, MemoryControlPlane};
pub use models::*;

use crate::errors::ControlPlaneError;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use hcp_models::InternalId;

pub type ControlPlaneResult<T> = Result<T, ControlPlaneError>;

/// Stream of listed objects. An error may follow items already yielded.
pub type ControlPlaneStream<'a, T> = BoxStream<'a, ControlPlaneResult<T>>;

/// Stateless façade over the upstream API: one method per kind and verb.
///
/// List methods are restricted to the given id set; an empty set yields
/// nothing without contacting the upstream service. The versions catalogue
/// is listed whole.
#[async_trait]
pub trait ControlPlaneClient: Send + Sync {
    async fn get_cluster(&self, id: &InternalId) -> ControlPlaneResult<CsCluster>;
    async fn create_cluster(&self, cluster: &CsCluster) -> ControlPlaneResult<CsCluster>;
    async fn update_cluster(
        &self,
        id: &InternalId,
        cluster: &CsCluster,
    ) -> ControlPlaneResult<CsCluster>;
    async fn update_cluster_autoscaler(
        &self,
        id: &InternalId,
        autoscaler: &CsClusterAutoscaler,
    ) -> ControlPlaneResult<CsClusterAutoscaler>;
    async fn delete_cluster(&self, id: &InternalId) -> ControlPlaneResult<()>;
    fn list_clusters(&self, ids: Vec<InternalId>) -> ControlPlaneStream<'_, CsCluster>;

    async fn get_node_pool(&self, id: &InternalId) -> ControlPlaneResult<CsNodePool>;
    async fn create_node_pool(
        &self,
        cluster: &InternalId,
        node_pool: &CsNodePool,
    ) -> ControlPlaneResult<CsNodePool>;
    async fn update_node_pool(
        &self,
        id: &InternalId,
        node_pool: &CsNodePool,
    ) -> ControlPlaneResult<CsNodePool>;
    async fn delete_node_pool(&self, id: &InternalId) -> ControlPlaneResult<()>;
    fn list_node_pools(
        &self,
        cluster: &InternalId,
        ids: Vec<InternalId>,
    ) -> ControlPlaneStream<'_, CsNodePool>;

    async fn get_external_auth(&self, id: &InternalId) -> ControlPlaneResult<CsExternalAuth>;
    async fn create_external_auth(
        &self,
        cluster: &InternalId,
        external_auth: &CsExternalAuth,
    ) -> ControlPlaneResult<CsExternalAuth>;
    async fn update_external_auth(
        &self,
        id: &InternalId,
        external_auth: &CsExternalAuth,
    ) -> ControlPlaneResult<CsExternalAuth>;
    async fn delete_external_auth(&self, id: &InternalId) -> ControlPlaneResult<()>;
    fn list_external_auths(
        &self,
        cluster: &InternalId,
        ids: Vec<InternalId>,
    ) -> ControlPlaneStream<'_, CsExternalAuth>;

    async fn issue_break_glass_credential(
        &self,
        cluster: &InternalId,
    ) -> ControlPlaneResult<CsBreakGlassCredential>;
    async fn get_break_glass_credential(
        &self,
        id: &InternalId,
    ) -> ControlPlaneResult<CsBreakGlassCredential>;
    async fn revoke_break_glass_credentials(&self, cluster: &InternalId) -> ControlPlaneResult<()>;

    /// `name` may carry the `openshift-v` prefix or not.
    async fn get_version(&self, name: &str) -> ControlPlaneResult<CsVersion>;
    fn list_versions(&self) -> ControlPlaneStream<'_, CsVersion>;
}

/// Parses the `href` the control plane returned for a created object.
pub fn internal_id_of(href: Option<&str>) -> ControlPlaneResult<InternalId> {
    let href = href.ok_or_else(|| {
        ControlPlaneError::InvalidResponse("response carries no href".to_string())
    })?;
    InternalId::parse(href).map_err(|e| ControlPlaneError::InvalidResponse(e.to_string()))
}
