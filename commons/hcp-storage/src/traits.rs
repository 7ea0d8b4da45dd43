use crate::error::StorageError;
use crate::lock::LockClient;
use crate::transaction::Transaction;
use async_trait::async_trait;
use hcp_models::{
    CloudErrorBody, OperationRecord, OperationRequest, ProvisioningState,
    ResourceId, ResourceRecord, ResourceRecordPatch, ResourceType, Subscription,
};
use std::time::Duration;

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait StorageHealth: Send + Sync {
    /// Lightweight connectivity check to the backing store.
    /// Should return Ok(()) if the backend is reachable and responding.
    async fn health(&self) -> StorageResult<()>;
}

/// Selects non-terminal operations.
#[derive(Debug, Clone, Default)]
pub struct OperationFilter {
    pub resource_id: Option<ResourceId>,
    /// Also match operations on resources nested under `resource_id`.
    pub include_descendants: bool,
    /// Empty matches every request kind.
    pub requests: Vec<OperationRequest>,
}

impl OperationFilter {
    pub fn for_resource(resource_id: &ResourceId) -> Self {
        Self {
            resource_id: Some(resource_id.clone()),
            ..Default::default()
        }
    }

    pub fn with_descendants(mut self) -> Self {
        self.include_descendants = true;
        self
    }

    pub fn requests(mut self, requests: &[OperationRequest]) -> Self {
        self.requests = requests.to_vec();
        self
    }

    pub fn matches(&self, op: &OperationRecord) -> bool {
        if op.status.is_terminal() {
            return false;
        }
        if !self.requests.is_empty() && !self.requests.contains(&op.request) {
            return false;
        }
        match &self.resource_id {
            None => true,
            Some(id) => {
                op.external_id == *id
                    || (self.include_descendants && op.external_id.is_descendant_of(id))
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub resource_type: Option<ResourceType>,
    /// `None` returns everything in one page.
    pub page_size: Option<usize>,
    pub continuation_token: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ResourcePage {
    pub items: Vec<ResourceRecord>,
    pub continuation_token: Option<String>,
}

#[async_trait]
pub trait OperationStorage: Send + Sync + StorageHealth {
    async fn get_operation(
        &self,
        subscription_id: &str,
        operation_id: &str,
    ) -> StorageResult<Option<OperationRecord>>;

    async fn list_active_operations(
        &self,
        subscription_id: &str,
        filter: &OperationFilter,
    ) -> StorageResult<Vec<OperationRecord>>;

    async fn patch_operation(
        &self,
        subscription_id: &str,
        operation_id: &str,
        status: ProvisioningState,
        error: Option<CloudErrorBody>,
    ) -> StorageResult<OperationRecord>;
}

#[async_trait]
pub trait ResourceStorage: Send + Sync + StorageHealth {
    async fn get_resource(&self, id: &ResourceId) -> StorageResult<Option<ResourceRecord>>;

    /// Records nested under `scope`, ordered by lowercased path.
    async fn list_resources(
        &self,
        scope: &ResourceId,
        options: ListOptions,
    ) -> StorageResult<ResourcePage>;

    async fn patch_resource(
        &self,
        id: &ResourceId,
        patch: &ResourceRecordPatch,
    ) -> StorageResult<ResourceRecord>;

    async fn delete_resource(&self, id: &ResourceId) -> StorageResult<()>;
}

#[async_trait]
pub trait SubscriptionStorage: Send + Sync + StorageHealth {
    async fn get_subscription(&self, subscription_id: &str) -> StorageResult<Option<Subscription>>;

    async fn put_subscription(
        &self,
        subscription_id: &str,
        subscription: &Subscription,
    ) -> StorageResult<()>;
}

/// Everything the frontend needs from the document store.
pub trait DocumentStore: OperationStorage + ResourceStorage + SubscriptionStorage {
    /// Starts a batch scoped to one subscription partition.
    fn new_transaction(&self, partition_key: &str) -> Transaction;
}

pub trait StorageFactory {
    type Store: DocumentStore + 'static;
    type Locks: LockClient + 'static;

    fn create_store(&self) -> Self::Store;
    fn create_lock_client(&self, ttl: Duration) -> Self::Locks;
}
