use super::ServiceDeps;
use super::context::RequestContext;
use super::engine::{KindAdapter, ResourceService};
use crate::cs::convert::{
    AdminCredential, ClusterCreateContext, cluster_autoscaler_to_cs, cluster_from_cs,
    cluster_to_cs, credential_from_cs,
};
use crate::cs::{ControlPlaneClient, ControlPlaneResult, ControlPlaneStream, CsCluster, internal_id_of};
use crate::errors::{FrontendError, FrontendResult};
use crate::merge::{CLUSTER_LOCAL_FIELDS, LocalField};
use async_trait::async_trait;
use hcp_models::{
    Cluster, FieldError, InternalId, OperationRequest, ResourceId, ResourceKind,
    validate_cluster_create, validate_cluster_update,
};
use hcp_storage::{DocumentStore, OperationFilter, OperationStorage};
use std::sync::Arc;
use tracing::info;

/// Seconds a caller should wait while a credential revocation runs.
const REVOKE_RETRY_AFTER: u64 = 10;

pub struct ClusterAdapter {
    control_plane: Arc<dyn ControlPlaneClient>,
}

impl ClusterAdapter {
    pub fn new(control_plane: Arc<dyn ControlPlaneClient>) -> Self {
        Self { control_plane }
    }
}

#[async_trait]
impl KindAdapter for ClusterAdapter {
    type Model = Cluster;
    type External = CsCluster;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Cluster
    }

    fn local_fields(&self) -> &'static [LocalField] {
        CLUSTER_LOCAL_FIELDS
    }

    fn defaults(&self, id: &ResourceId, location: &str) -> Cluster {
        Cluster::with_defaults(id, location)
    }

    fn prepare_create(&self, model: &mut Cluster) {
        model.fill_dynamic_defaults();
    }

    fn carry_forward(&self, model: &mut Cluster, old: &Cluster) {
        model.carry_forward_from(old);
    }

    fn validate_create(&self, model: &Cluster) -> Vec<FieldError> {
        validate_cluster_create(model)
    }

    fn validate_update(&self, model: &Cluster, old: &Cluster) -> Vec<FieldError> {
        validate_cluster_update(model, old)
    }

    fn href(external: &CsCluster) -> Option<&str> {
        external.href.as_deref()
    }

    fn from_external(
        &self,
        id: &ResourceId,
        location: &str,
        external: &CsCluster,
    ) -> ControlPlaneResult<Cluster> {
        cluster_from_cs(id, location, external)
    }

    async fn get_external(&self, id: &InternalId) -> ControlPlaneResult<CsCluster> {
        self.control_plane.get_cluster(id).await
    }

    async fn create_external(
        &self,
        ctx: &RequestContext,
        id: &ResourceId,
        _parent: Option<&InternalId>,
        model: &Cluster,
    ) -> ControlPlaneResult<CsCluster> {
        let create = ClusterCreateContext {
            tenant_id: ctx.tenant_id.clone(),
            subscription_id: id.subscription_id().to_string(),
            resource_group: id.resource_group_name().unwrap_or_default().to_string(),
        };
        let cluster = cluster_to_cs(model, &create, false)?;
        self.control_plane.create_cluster(&cluster).await
    }

    async fn update_external(&self, id: &InternalId, model: &Cluster) -> ControlPlaneResult<CsCluster> {
        let cluster = cluster_to_cs(model, &ClusterCreateContext::default(), true)?;
        let autoscaler = self
            .control_plane
            .update_cluster_autoscaler(id, &cluster_autoscaler_to_cs(model))
            .await?;
        let mut updated = self.control_plane.update_cluster(id, &cluster).await?;
        updated.autoscaler = Some(autoscaler);
        Ok(updated)
    }

    async fn delete_external(&self, id: &InternalId) -> ControlPlaneResult<()> {
        self.control_plane.delete_cluster(id).await
    }

    fn list_external(
        &self,
        _parent: Option<&InternalId>,
        ids: Vec<InternalId>,
    ) -> ControlPlaneStream<'_, CsCluster> {
        self.control_plane.list_clusters(ids)
    }
}

pub type ClusterService = ResourceService<ClusterAdapter>;

impl ResourceService<ClusterAdapter> {
    pub fn for_clusters(deps: ServiceDeps) -> Self {
        Self::new(ClusterAdapter::new(deps.control_plane.clone()), deps)
    }

    async fn active_revocations(&self, id: &ResourceId) -> FrontendResult<usize> {
        let filter = OperationFilter::for_resource(id).requests(&[OperationRequest::RevokeCredentials]);
        Ok(self
            .deps
            .store
            .list_active_operations(id.subscription_id(), &filter)
            .await?
            .len())
    }

    /// Issues a break-glass credential. The operation tracks the
    /// credential, not the cluster, so the cluster's state is untouched.
    pub async fn request_credential(&self, ctx: &RequestContext, id: &ResourceId) -> FrontendResult<()> {
        self.leased(id, self.request_credential_unleased(ctx, id)).await
    }

    async fn request_credential_unleased(&self, ctx: &RequestContext, id: &ResourceId) -> FrontendResult<()> {
        let record = self.existing_record(id).await?;
        let id = &record.external_id;
        self.deps
            .conflicts
            .check(
                OperationRequest::RequestCredential,
                id,
                Some(record.provisioning_state),
            )
            .await?;
        if self.active_revocations(id).await? > 0 {
            return Err(FrontendError::conflict_retry(
                "Cannot request credential while credentials are being revoked",
                REVOKE_RETRY_AFTER,
            ));
        }

        let cluster = Self::internal_of(&record)?;
        let credential = self.deps.control_plane.issue_break_glass_credential(&cluster).await?;
        let credential_id = internal_id_of(credential.href.as_deref())?;
        info!(resource_id = %id, credential = %credential_id.path(), "issued break-glass credential");

        let mut tx = self.deps.store.new_transaction(id.subscription_id());
        self.deps.operations.new_operation(
            &mut tx,
            ctx,
            OperationRequest::RequestCredential,
            id,
            Some(credential_id),
        )?;
        tx.execute().await?;
        Ok(())
    }

    /// Revokes every break-glass credential of the cluster and cancels
    /// pending credential requests.
    pub async fn revoke_credentials(&self, ctx: &RequestContext, id: &ResourceId) -> FrontendResult<()> {
        self.leased(id, self.revoke_credentials_unleased(ctx, id)).await
    }

    async fn revoke_credentials_unleased(&self, ctx: &RequestContext, id: &ResourceId) -> FrontendResult<()> {
        let record = self.existing_record(id).await?;
        let id = &record.external_id;
        self.deps
            .conflicts
            .check(
                OperationRequest::RevokeCredentials,
                id,
                Some(record.provisioning_state),
            )
            .await?;
        if self.active_revocations(id).await? > 0 {
            return Err(FrontendError::conflict_retry(
                "Credentials are already being revoked",
                REVOKE_RETRY_AFTER,
            ));
        }

        let cluster = Self::internal_of(&record)?;
        self.deps.control_plane.revoke_break_glass_credentials(&cluster).await?;
        info!(resource_id = %id, "revoking break-glass credentials");

        let subscription_id = id.subscription_id();
        let mut tx = self.deps.store.new_transaction(subscription_id);
        self.deps
            .operations
            .cancel_active_operations(
                &mut tx,
                subscription_id,
                &OperationFilter::for_resource(id).requests(&[OperationRequest::RequestCredential]),
            )
            .await?;
        self.deps.operations.new_operation(
            &mut tx,
            ctx,
            OperationRequest::RevokeCredentials,
            id,
            Some(cluster),
        )?;
        tx.execute().await?;
        Ok(())
    }

    /// Current state of an issued credential, for the operation result.
    pub async fn credential(&self, id: &InternalId) -> FrontendResult<AdminCredential> {
        let credential = self.deps.control_plane.get_break_glass_credential(id).await?;
        Ok(credential_from_cs(&credential))
    }
}
