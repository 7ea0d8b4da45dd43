use super::ServiceDeps;
use super::context::RequestContext;
use crate::cs::{ControlPlaneResult, ControlPlaneStream, internal_id_of};
use crate::errors::{FrontendError, FrontendResult};
use crate::merge::{LocalField, apply_body, overlay_record, requested_tags};
use async_trait::async_trait;
use futures_util::StreamExt;
use hcp_models::{
    FieldError, InternalId, OperationRequest, ProvisioningState, ResourceId, ResourceKind,
    ResourceModel, ResourceRecord, ResourceRecordPatch,
};
use hcp_storage::{ListOptions, OperationFilter, Transaction};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, info, warn};

/// Everything that differs between resource kinds: model defaults,
/// validation and the upstream calls.
#[async_trait]
pub trait KindAdapter: Send + Sync + 'static {
    type Model: ResourceModel + Serialize + DeserializeOwned + 'static;
    type External: Send + 'static;

    fn kind(&self) -> ResourceKind;
    fn local_fields(&self) -> &'static [LocalField];
    fn defaults(&self, id: &ResourceId, location: &str) -> Self::Model;

    /// Fills values derived from the request path on create.
    fn prepare_create(&self, _model: &mut Self::Model) {}

    fn carry_forward(&self, model: &mut Self::Model, old: &Self::Model);
    fn validate_create(&self, model: &Self::Model) -> Vec<FieldError>;
    fn validate_update(&self, model: &Self::Model, old: &Self::Model) -> Vec<FieldError>;

    /// Checks that need upstream state, run only once static validation
    /// passes.
    async fn admit(
        &self,
        _id: &ResourceId,
        _model: &mut Self::Model,
        _parent: Option<&InternalId>,
    ) -> FrontendResult<Vec<FieldError>> {
        Ok(Vec::new())
    }

    fn href(external: &Self::External) -> Option<&str>;
    fn from_external(
        &self,
        id: &ResourceId,
        location: &str,
        external: &Self::External,
    ) -> ControlPlaneResult<Self::Model>;

    async fn get_external(&self, id: &InternalId) -> ControlPlaneResult<Self::External>;
    async fn create_external(
        &self,
        ctx: &RequestContext,
        id: &ResourceId,
        parent: Option<&InternalId>,
        model: &Self::Model,
    ) -> ControlPlaneResult<Self::External>;
    async fn update_external(
        &self,
        id: &InternalId,
        model: &Self::Model,
    ) -> ControlPlaneResult<Self::External>;
    async fn delete_external(&self, id: &InternalId) -> ControlPlaneResult<()>;
    fn list_external(
        &self,
        parent: Option<&InternalId>,
        ids: Vec<InternalId>,
    ) -> ControlPlaneStream<'_, Self::External>;
}

#[derive(Debug, Clone)]
pub enum Written<M> {
    Created(M),
    Updated(M),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deleted {
    NoContent,
    Accepted,
}

#[derive(Debug, Clone)]
pub struct ListPage<M> {
    pub items: Vec<M>,
    pub continuation_token: Option<String>,
}

/// Create, read, update, delete and list for one resource kind.
pub struct ResourceService<A: KindAdapter> {
    pub(crate) adapter: A,
    pub(crate) deps: ServiceDeps,
}

impl<A: KindAdapter> ResourceService<A> {
    pub fn new(adapter: A, deps: ServiceDeps) -> Self {
        Self { adapter, deps }
    }

    fn location(&self) -> &str {
        &self.deps.policy.location
    }

    /// Runs a mutation under the subscription's lease, when leasing is on.
    pub(crate) async fn leased<T, F>(&self, id: &ResourceId, work: F) -> FrontendResult<T>
    where
        F: Future<Output = FrontendResult<T>>,
    {
        match &self.deps.leases {
            Some(leases) => leases.run(id.subscription_id(), work).await,
            None => work.await,
        }
    }

    pub(crate) async fn record(&self, id: &ResourceId) -> FrontendResult<Option<ResourceRecord>> {
        Ok(self.deps.store.get_resource(id).await?)
    }

    pub(crate) async fn existing_record(&self, id: &ResourceId) -> FrontendResult<ResourceRecord> {
        self.record(id)
            .await?
            .ok_or_else(|| FrontendError::resource_not_found(id))
    }

    pub(crate) fn internal_of(record: &ResourceRecord) -> FrontendResult<InternalId> {
        record.internal_id.clone().ok_or_else(|| {
            FrontendError::Internal(format!(
                "resource {} has no control plane id",
                record.external_id
            ))
        })
    }

    /// Upstream id of the cluster a child resource belongs to.
    async fn parent_internal(&self, id: &ResourceId) -> FrontendResult<Option<InternalId>> {
        if self.adapter.kind() == ResourceKind::Cluster {
            return Ok(None);
        }
        let parent = id
            .parent()
            .ok_or_else(|| FrontendError::Internal(format!("resource {id} has no parent")))?;
        let record = self.existing_record(&parent).await?;
        Self::internal_of(&record).map(Some)
    }

    fn render(
        &self,
        record: &ResourceRecord,
        external: &A::External,
    ) -> FrontendResult<A::Model> {
        let mut model = self
            .adapter
            .from_external(&record.external_id, self.location(), external)?;
        overlay_record(&mut model, record, self.adapter.local_fields());
        Ok(model)
    }

    /// Upstream state with the local record laid over it.
    pub(crate) async fn merged(&self, record: &ResourceRecord) -> FrontendResult<A::Model> {
        let internal = Self::internal_of(record)?;
        let external = match self.adapter.get_external(&internal).await {
            Ok(external) => external,
            Err(e) if e.is_not_found() => {
                return Err(FrontendError::resource_not_found(&record.external_id));
            }
            Err(e) => return Err(e.into()),
        };
        self.render(record, &external)
    }

    pub async fn get(&self, id: &ResourceId) -> FrontendResult<A::Model> {
        let record = self.existing_record(id).await?;
        self.merged(&record).await
    }

    /// One page of resources under `scope`. Records the control plane no
    /// longer knows are skipped.
    pub async fn list(
        &self,
        scope: &ResourceId,
        parent: Option<&ResourceId>,
        page_size: Option<usize>,
        continuation_token: Option<String>,
    ) -> FrontendResult<ListPage<A::Model>> {
        let parent_internal = match parent {
            Some(parent) => Some(Self::internal_of(&self.existing_record(parent).await?)?),
            None => None,
        };

        let page = self
            .deps
            .store
            .list_resources(
                scope,
                ListOptions {
                    resource_type: Some(self.adapter.kind().resource_type()),
                    page_size: Some(page_size.unwrap_or(self.deps.policy.list_page_size)),
                    continuation_token,
                },
            )
            .await?;

        let mut by_handle: HashMap<String, ResourceRecord> = HashMap::new();
        let mut ids = Vec::with_capacity(page.items.len());
        for record in page.items {
            if let Some(internal) = &record.internal_id {
                ids.push(internal.clone());
                by_handle.insert(internal.path().to_lowercase(), record);
            }
        }

        let mut items = Vec::with_capacity(ids.len());
        let mut listed = self.adapter.list_external(parent_internal.as_ref(), ids);
        while let Some(external) = listed.next().await {
            let external = external?;
            let Some(href) = A::href(&external) else {
                continue;
            };
            let Some(record) = by_handle.get(&href.to_lowercase()) else {
                debug!(href, "listed object has no local record");
                continue;
            };
            items.push(self.render(record, &external)?);
        }

        Ok(ListPage {
            items,
            continuation_token: page.continuation_token,
        })
    }

    /// PUT: creates the resource or replaces its mutable properties.
    pub async fn create_or_update(
        &self,
        ctx: &RequestContext,
        id: &ResourceId,
        body: &Value,
    ) -> FrontendResult<Written<A::Model>> {
        self.leased(id, async {
            match self.record(id).await? {
                None => self.create(ctx, id, body).await.map(Written::Created),
                Some(record) => {
                    let old = self.merged(&record).await?;
                    self.update(ctx, record, old, body, false)
                        .await
                        .map(Written::Updated)
                }
            }
        })
        .await
    }

    /// PATCH: merges the body onto the current resource.
    pub async fn patch(
        &self,
        ctx: &RequestContext,
        id: &ResourceId,
        body: &Value,
    ) -> FrontendResult<A::Model> {
        self.leased(id, async {
            let record = self.existing_record(id).await?;
            let old = self.merged(&record).await?;
            self.update(ctx, record, old, body, true).await
        })
        .await
    }

    async fn create(
        &self,
        ctx: &RequestContext,
        id: &ResourceId,
        body: &Value,
    ) -> FrontendResult<A::Model> {
        self.deps
            .conflicts
            .check(OperationRequest::Create, id, None)
            .await?;
        let parent = self.parent_internal(id).await?;

        let base = self.adapter.defaults(id, self.location());
        let mut model = apply_body(&base, body, id)?;
        model.resource_mut().system_data = ctx.system_data.clone();
        self.adapter.prepare_create(&mut model);
        self.validate(id, &mut model, None, parent.as_ref()).await?;

        let external = self
            .adapter
            .create_external(ctx, id, parent.as_ref(), &model)
            .await?;
        let internal = internal_id_of(A::href(&external))?;
        info!(resource_id = %id, internal_id = %internal.path(), "created {:?}", self.adapter.kind());

        let mut tx = self.deps.store.new_transaction(id.subscription_id());
        let op_id = self.deps.operations.new_operation(
            &mut tx,
            ctx,
            OperationRequest::Create,
            id,
            Some(internal.clone()),
        )?;
        let mut record = model.to_record(id);
        record.internal_id = Some(internal);
        record.provisioning_state = OperationRequest::Create.initial_status();
        record.active_operation_id = Some(op_id);
        tx.create_resource(record)?;

        let result = tx.execute().await?;
        let stored = result
            .get_resource(id)
            .ok_or_else(|| FrontendError::Internal(format!("resource {id} missing after commit")))?;
        self.render(stored, &external)
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        record: ResourceRecord,
        old: A::Model,
        body: &Value,
        merge: bool,
    ) -> FrontendResult<A::Model> {
        let id = &record.external_id;
        self.deps
            .conflicts
            .check(OperationRequest::Update, id, Some(record.provisioning_state))
            .await?;
        let parent = self.parent_internal(id).await?;

        let mut model = if merge {
            apply_body(&old, body, id)?
        } else {
            let mut model = apply_body(&self.adapter.defaults(id, self.location()), body, id)?;
            self.adapter.carry_forward(&mut model, &old);
            model
        };
        self.validate(id, &mut model, Some(&old), parent.as_ref())
            .await?;

        let internal = Self::internal_of(&record)?;
        let external = match self.adapter.update_external(&internal, &model).await {
            Ok(external) => external,
            Err(e) if e.is_not_found() => {
                self.clean_up_missing(id).await;
                return Err(FrontendError::resource_not_found(id));
            }
            Err(e) => return Err(e.into()),
        };

        let mut tx = self.deps.store.new_transaction(id.subscription_id());
        let op_id = self.deps.operations.new_operation(
            &mut tx,
            ctx,
            OperationRequest::Update,
            id,
            Some(internal),
        )?;
        let mut patch = ResourceRecordPatch::new()
            .provisioning_state(OperationRequest::Update.initial_status())
            .active_operation_id(Some(op_id));
        if let Some(tags) = requested_tags(body)? {
            patch = patch.tags(tags);
        }
        if let Some(system_data) = &ctx.system_data {
            patch = patch.system_data(system_data.clone());
        }
        if let Some(identity) = model.identity() {
            patch = patch.identity(Some(identity.to_local()));
        }
        tx.patch_resource(id, patch)?;

        let result = tx.execute().await?;
        let stored = result
            .get_resource(id)
            .ok_or_else(|| FrontendError::Internal(format!("resource {id} missing after commit")))?;
        self.render(stored, &external)
    }

    async fn validate(
        &self,
        id: &ResourceId,
        model: &mut A::Model,
        old: Option<&A::Model>,
        parent: Option<&InternalId>,
    ) -> FrontendResult<()> {
        let mut errors = match old {
            Some(old) => self.adapter.validate_update(model, old),
            None => self.adapter.validate_create(model),
        };
        if errors.is_empty() {
            errors = self.adapter.admit(id, model, parent).await?;
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(FrontendError::Validation(errors))
        }
    }

    /// DELETE: removes the upstream object and marks the resource and its
    /// descendants as deleting. Superseded operations are canceled.
    pub async fn delete(&self, ctx: &RequestContext, id: &ResourceId) -> FrontendResult<Deleted> {
        self.leased(id, self.delete_unleased(ctx, id)).await
    }

    async fn delete_unleased(&self, ctx: &RequestContext, id: &ResourceId) -> FrontendResult<Deleted> {
        let Some(record) = self.record(id).await? else {
            return Ok(Deleted::NoContent);
        };
        let id = &record.external_id;
        self.deps
            .conflicts
            .check(OperationRequest::Delete, id, Some(record.provisioning_state))
            .await?;

        let mut tx = self.deps.store.new_transaction(id.subscription_id());
        self.stage_delete(&mut tx, ctx, &record).await?;
        tx.execute().await?;
        Ok(Deleted::Accepted)
    }

    /// Deletes the upstream object, then stages the cancellation of
    /// superseded operations and the move of the resource and its
    /// descendants to `Deleting` into `tx`.
    pub(crate) async fn stage_delete(
        &self,
        tx: &mut Transaction,
        ctx: &RequestContext,
        record: &ResourceRecord,
    ) -> FrontendResult<()> {
        let id = &record.external_id;
        if let Some(internal) = &record.internal_id {
            match self.adapter.delete_external(internal).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    info!(resource_id = %id, "{:?} missing, trying to clean up", self.adapter.kind());
                }
                Err(e) => return Err(e.into()),
            }
        }

        let subscription_id = id.subscription_id();
        self.deps
            .operations
            .cancel_active_operations(
                tx,
                subscription_id,
                &OperationFilter::for_resource(id).with_descendants(),
            )
            .await?;

        let op_id = self.deps.operations.new_operation(
            tx,
            ctx,
            OperationRequest::Delete,
            id,
            record.internal_id.clone(),
        )?;
        tx.patch_resource(id, deleting(op_id))?;

        for child in self.descendants(id).await? {
            let op_id = self.deps.operations.new_internal_operation(
                tx,
                ctx,
                OperationRequest::Delete,
                &child.external_id,
                child.internal_id.clone(),
            )?;
            tx.patch_resource(&child.external_id, deleting(op_id))?;
        }
        Ok(())
    }

    pub(crate) async fn descendants(&self, id: &ResourceId) -> FrontendResult<Vec<ResourceRecord>> {
        let page = self
            .deps
            .store
            .list_resources(id, ListOptions::default())
            .await?;
        Ok(page.items)
    }

    /// Drops local records for a resource the control plane no longer has.
    async fn clean_up_missing(&self, id: &ResourceId) {
        warn!(resource_id = %id, "{:?} missing upstream, removing local records", self.adapter.kind());
        let mut tx = self.deps.store.new_transaction(id.subscription_id());
        let children = match self.descendants(id).await {
            Ok(children) => children,
            Err(e) => {
                warn!(resource_id = %id, error = %e, "failed to list descendants for cleanup");
                return;
            }
        };
        for child in children {
            if let Err(e) = tx.delete_resource(&child.external_id) {
                warn!(resource_id = %child.external_id, error = %e, "cleanup skipped");
            }
        }
        if let Err(e) = tx.delete_resource(id) {
            warn!(resource_id = %id, error = %e, "cleanup skipped");
            return;
        }
        if let Err(e) = tx.execute().await {
            warn!(resource_id = %id, error = %e, "cleanup failed");
        }
    }
}

fn deleting(op_id: String) -> ResourceRecordPatch {
    ResourceRecordPatch::new()
        .provisioning_state(ProvisioningState::Deleting)
        .active_operation_id(Some(op_id))
}
