use super::ServiceDeps;
use super::context::RequestContext;
use super::engine::{KindAdapter, ResourceService};
use crate::cs::convert::{cluster_from_cs, node_pool_from_cs, node_pool_to_cs};
use crate::cs::{ControlPlaneClient, ControlPlaneResult, ControlPlaneStream, CsNodePool};
use crate::errors::{ControlPlaneError, FrontendError, FrontendResult};
use crate::merge::{CHILD_LOCAL_FIELDS, LocalField};
use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use hcp_models::{
    FieldError, InternalId, NodePool, ResourceId, ResourceKind, admit_node_pool,
    validate_node_pool_create, validate_node_pool_update,
};
use std::sync::Arc;

pub struct NodePoolAdapter {
    control_plane: Arc<dyn ControlPlaneClient>,
}

impl NodePoolAdapter {
    pub fn new(control_plane: Arc<dyn ControlPlaneClient>) -> Self {
        Self { control_plane }
    }
}

fn missing_parent() -> ControlPlaneError {
    ControlPlaneError::Configuration("node pool request without a parent cluster".to_string())
}

#[async_trait]
impl KindAdapter for NodePoolAdapter {
    type Model = NodePool;
    type External = CsNodePool;

    fn kind(&self) -> ResourceKind {
        ResourceKind::NodePool
    }

    fn local_fields(&self) -> &'static [LocalField] {
        CHILD_LOCAL_FIELDS
    }

    fn defaults(&self, id: &ResourceId, location: &str) -> NodePool {
        NodePool::with_defaults(id, location)
    }

    fn carry_forward(&self, model: &mut NodePool, old: &NodePool) {
        model.carry_forward_from(old);
    }

    fn validate_create(&self, model: &NodePool) -> Vec<FieldError> {
        validate_node_pool_create(model)
    }

    fn validate_update(&self, model: &NodePool, old: &NodePool) -> Vec<FieldError> {
        validate_node_pool_update(model, old)
    }

    /// Node pools inherit the cluster version when none is given and may
    /// not run ahead of it.
    async fn admit(
        &self,
        id: &ResourceId,
        model: &mut NodePool,
        parent: Option<&InternalId>,
    ) -> FrontendResult<Vec<FieldError>> {
        let (Some(parent), Some(cluster_id)) = (parent, id.parent()) else {
            return Err(FrontendError::Internal(format!(
                "node pool {id} has no parent cluster"
            )));
        };
        let external = self.control_plane.get_cluster(parent).await?;
        let location = model.resource.location.clone().unwrap_or_default();
        let cluster = cluster_from_cs(&cluster_id, &location, &external)?;
        if model.properties.version_id.as_deref().unwrap_or_default().is_empty() {
            model.properties.version_id = cluster.properties.version_id.clone();
        }
        Ok(admit_node_pool(model, &cluster))
    }

    fn href(external: &CsNodePool) -> Option<&str> {
        external.href.as_deref()
    }

    fn from_external(
        &self,
        id: &ResourceId,
        location: &str,
        external: &CsNodePool,
    ) -> ControlPlaneResult<NodePool> {
        node_pool_from_cs(id, location, external)
    }

    async fn get_external(&self, id: &InternalId) -> ControlPlaneResult<CsNodePool> {
        self.control_plane.get_node_pool(id).await
    }

    async fn create_external(
        &self,
        _ctx: &RequestContext,
        _id: &ResourceId,
        parent: Option<&InternalId>,
        model: &NodePool,
    ) -> ControlPlaneResult<CsNodePool> {
        let parent = parent.ok_or_else(missing_parent)?;
        self.control_plane
            .create_node_pool(parent, &node_pool_to_cs(model, false))
            .await
    }

    async fn update_external(&self, id: &InternalId, model: &NodePool) -> ControlPlaneResult<CsNodePool> {
        self.control_plane
            .update_node_pool(id, &node_pool_to_cs(model, true))
            .await
    }

    async fn delete_external(&self, id: &InternalId) -> ControlPlaneResult<()> {
        self.control_plane.delete_node_pool(id).await
    }

    fn list_external(
        &self,
        parent: Option<&InternalId>,
        ids: Vec<InternalId>,
    ) -> ControlPlaneStream<'_, CsNodePool> {
        match parent {
            Some(parent) => self.control_plane.list_node_pools(parent, ids),
            None => stream::once(async { Err(missing_parent()) }).boxed(),
        }
    }
}

pub type NodePoolService = ResourceService<NodePoolAdapter>;

impl ResourceService<NodePoolAdapter> {
    pub fn for_node_pools(deps: ServiceDeps) -> Self {
        Self::new(NodePoolAdapter::new(deps.control_plane.clone()), deps)
    }
}
