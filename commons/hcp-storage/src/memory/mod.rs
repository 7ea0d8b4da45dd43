mod lock;

pub use lock::MemoryLockClient;

use crate::error::StorageError;
use crate::traits::*;
use crate::transaction::{
    Transaction, TransactionCommitter, TransactionResult, TransactionStep,
};
use async_trait::async_trait;
use hcp_models::{
    CloudErrorBody, OperationRecord, ProvisioningState, ResourceId, ResourceRecord,
    ResourceRecordPatch, Subscription,
};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
struct Partition {
    operations: HashMap<String, OperationRecord>,
    /// Keyed by lowercased resource path so range scans follow the hierarchy.
    resources: BTreeMap<String, ResourceRecord>,
}

#[derive(Debug, Default)]
struct MemoryState {
    partitions: HashMap<String, Partition>,
    subscriptions: HashMap<String, Subscription>,
}

/// In-process document store. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    state: Arc<RwLock<MemoryState>>,
    failing_commits: Arc<AtomicUsize>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` transaction commits fail without writing anything.
    pub fn fail_next_commits(&self, count: usize) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Writes a record directly, bypassing transactions. Test seeding only.
    pub async fn insert_resource(&self, record: ResourceRecord) {
        let mut state = self.state.write().await;
        let partition = state
            .partitions
            .entry(partition_of(&record.external_id))
            .or_default();
        partition.resources.insert(record.external_id.key(), record);
    }

    /// Writes an operation directly, bypassing transactions. Test seeding only.
    pub async fn insert_operation(&self, op: OperationRecord) {
        let mut state = self.state.write().await;
        let partition = state
            .partitions
            .entry(partition_of(&op.external_id))
            .or_default();
        partition.operations.insert(op.id.clone(), op);
    }

    pub async fn operation_count(&self, subscription_id: &str) -> usize {
        let state = self.state.read().await;
        state
            .partitions
            .get(&subscription_id.to_lowercase())
            .map(|p| p.operations.len())
            .unwrap_or(0)
    }

    pub async fn resource_count(&self, subscription_id: &str) -> usize {
        let state = self.state.read().await;
        state
            .partitions
            .get(&subscription_id.to_lowercase())
            .map(|p| p.resources.len())
            .unwrap_or(0)
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn partition_of(id: &ResourceId) -> String {
    id.subscription_id().to_lowercase()
}

fn apply_step(
    partition: &mut Partition,
    step: TransactionStep,
    result: &mut TransactionResult,
) -> StorageResult<()> {
    match step {
        TransactionStep::CreateOperation(op) => {
            if partition.operations.contains_key(&op.id) {
                return Err(StorageError::AlreadyExists(op.id));
            }
            result.record_operation(op.clone());
            partition.operations.insert(op.id.clone(), op);
        }
        TransactionStep::CreateResource(record) => {
            let key = record.external_id.key();
            if partition.resources.contains_key(&key) {
                return Err(StorageError::AlreadyExists(record.external_id.to_string()));
            }
            result.record_resource(record.clone());
            partition.resources.insert(key, record);
        }
        TransactionStep::PatchResource { id, patch } => {
            let record = partition
                .resources
                .get_mut(&id.key())
                .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
            patch.apply(record);
            result.record_resource(record.clone());
        }
        TransactionStep::PatchOperation {
            operation_id,
            status,
            error,
        } => {
            if let Some(op) = partition.operations.get_mut(&operation_id) {
                op.update_status(status, error);
                result.record_operation(op.clone());
            }
        }
        TransactionStep::DeleteResource(id) => {
            partition.resources.remove(&id.key());
            result.forget_resource(&id);
        }
    }
    Ok(())
}

#[async_trait]
impl TransactionCommitter for MemoryDocumentStore {
    async fn commit(
        &self,
        partition_key: &str,
        steps: Vec<TransactionStep>,
    ) -> StorageResult<TransactionResult> {
        if self.take_injected_failure() {
            return Err(StorageError::CommitFailed(format!(
                "injected failure for partition {partition_key}"
            )));
        }
        let mut state = self.state.write().await;
        // Stage on a copy so a failing step leaves the partition untouched.
        let mut staged = state
            .partitions
            .get(partition_key)
            .cloned()
            .unwrap_or_default();
        let mut result = TransactionResult::default();
        for step in steps {
            apply_step(&mut staged, step, &mut result)?;
        }
        state.partitions.insert(partition_key.to_string(), staged);
        Ok(result)
    }
}

#[async_trait]
impl StorageHealth for MemoryDocumentStore {
    async fn health(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[async_trait]
impl OperationStorage for MemoryDocumentStore {
    async fn get_operation(
        &self,
        subscription_id: &str,
        operation_id: &str,
    ) -> StorageResult<Option<OperationRecord>> {
        let state = self.state.read().await;
        Ok(state
            .partitions
            .get(&subscription_id.to_lowercase())
            .and_then(|p| p.operations.get(operation_id))
            .cloned())
    }

    async fn list_active_operations(
        &self,
        subscription_id: &str,
        filter: &OperationFilter,
    ) -> StorageResult<Vec<OperationRecord>> {
        let state = self.state.read().await;
        let Some(partition) = state.partitions.get(&subscription_id.to_lowercase()) else {
            return Ok(Vec::new());
        };
        let mut ops: Vec<OperationRecord> = partition
            .operations
            .values()
            .filter(|op| filter.matches(op))
            .cloned()
            .collect();
        ops.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        Ok(ops)
    }

    async fn patch_operation(
        &self,
        subscription_id: &str,
        operation_id: &str,
        status: ProvisioningState,
        error: Option<CloudErrorBody>,
    ) -> StorageResult<OperationRecord> {
        let mut state = self.state.write().await;
        let op = state
            .partitions
            .get_mut(&subscription_id.to_lowercase())
            .and_then(|p| p.operations.get_mut(operation_id))
            .ok_or_else(|| StorageError::NotFound(operation_id.to_string()))?;
        op.update_status(status, error);
        Ok(op.clone())
    }
}

#[async_trait]
impl ResourceStorage for MemoryDocumentStore {
    async fn get_resource(&self, id: &ResourceId) -> StorageResult<Option<ResourceRecord>> {
        let state = self.state.read().await;
        Ok(state
            .partitions
            .get(&partition_of(id))
            .and_then(|p| p.resources.get(&id.key()))
            .cloned())
    }

    async fn list_resources(
        &self,
        scope: &ResourceId,
        options: ListOptions,
    ) -> StorageResult<ResourcePage> {
        let state = self.state.read().await;
        let Some(partition) = state.partitions.get(&partition_of(scope)) else {
            return Ok(ResourcePage::default());
        };
        let start = match &options.continuation_token {
            Some(token) => Bound::Excluded(token.clone()),
            None => Bound::Unbounded,
        };
        let limit = options.page_size.unwrap_or(usize::MAX);

        let mut matching = partition
            .resources
            .range((start, Bound::Unbounded))
            .map(|(_, record)| record)
            .filter(|record| record.external_id.is_descendant_of(scope))
            .filter(|record| match &options.resource_type {
                Some(rt) => record.external_id.resource_type() == *rt,
                None => true,
            });

        let items: Vec<ResourceRecord> = matching.by_ref().take(limit).cloned().collect();
        let continuation_token = match (items.last(), matching.next()) {
            (Some(last), Some(_)) => Some(last.external_id.key()),
            _ => None,
        };
        Ok(ResourcePage {
            items,
            continuation_token,
        })
    }

    async fn patch_resource(
        &self,
        id: &ResourceId,
        patch: &ResourceRecordPatch,
    ) -> StorageResult<ResourceRecord> {
        let mut state = self.state.write().await;
        let record = state
            .partitions
            .get_mut(&partition_of(id))
            .and_then(|p| p.resources.get_mut(&id.key()))
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        patch.apply(record);
        Ok(record.clone())
    }

    async fn delete_resource(&self, id: &ResourceId) -> StorageResult<()> {
        let mut state = self.state.write().await;
        let removed = state
            .partitions
            .get_mut(&partition_of(id))
            .and_then(|p| p.resources.remove(&id.key()));
        match removed {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(id.to_string())),
        }
    }
}

#[async_trait]
impl SubscriptionStorage for MemoryDocumentStore {
    async fn get_subscription(&self, subscription_id: &str) -> StorageResult<Option<Subscription>> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .get(&subscription_id.to_lowercase())
            .cloned())
    }

    async fn put_subscription(
        &self,
        subscription_id: &str,
        subscription: &Subscription,
    ) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state
            .subscriptions
            .insert(subscription_id.to_lowercase(), subscription.clone());
        Ok(())
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn new_transaction(&self, partition_key: &str) -> Transaction {
        Transaction::new(partition_key, Arc::new(self.clone()))
    }
}

pub struct MemoryStorageFactory;

impl StorageFactory for MemoryStorageFactory {
    type Store = MemoryDocumentStore;
    type Locks = MemoryLockClient;

    fn create_store(&self) -> Self::Store {
        MemoryDocumentStore::new()
    }

    fn create_lock_client(&self, ttl: Duration) -> Self::Locks {
        MemoryLockClient::new(ttl)
    }
}
