use crate::error::StorageError;
use crate::traits::StorageResult;
use async_trait::async_trait;
use hcp_models::{
    CloudErrorBody, OperationRecord, ProvisioningState, ResourceId, ResourceRecord,
    ResourceRecordPatch,
};
use std::collections::HashMap;
use std::sync::Arc;

/// One write enqueued in a [`Transaction`].
#[derive(Debug, Clone)]
pub enum TransactionStep {
    CreateOperation(OperationRecord),
    CreateResource(ResourceRecord),
    PatchResource {
        id: ResourceId,
        patch: ResourceRecordPatch,
    },
    /// A missing operation is skipped rather than failing the batch.
    PatchOperation {
        operation_id: String,
        status: ProvisioningState,
        error: Option<CloudErrorBody>,
    },
    DeleteResource(ResourceId),
}

/// Final state of every item a committed transaction touched.
#[derive(Debug, Clone, Default)]
pub struct TransactionResult {
    operations: HashMap<String, OperationRecord>,
    resources: HashMap<String, ResourceRecord>,
}

impl TransactionResult {
    pub fn record_operation(&mut self, op: OperationRecord) {
        self.operations.insert(op.id.clone(), op);
    }

    pub fn record_resource(&mut self, record: ResourceRecord) {
        self.resources.insert(record.external_id.key(), record);
    }

    pub fn forget_resource(&mut self, id: &ResourceId) {
        self.resources.remove(&id.key());
    }

    pub fn get_operation(&self, operation_id: &str) -> Option<&OperationRecord> {
        self.operations.get(operation_id)
    }

    pub fn get_resource(&self, id: &ResourceId) -> Option<&ResourceRecord> {
        self.resources.get(&id.key())
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }
}

/// Backend hook that applies a batch of steps atomically.
#[async_trait]
pub trait TransactionCommitter: Send + Sync {
    async fn commit(
        &self,
        partition_key: &str,
        steps: Vec<TransactionStep>,
    ) -> StorageResult<TransactionResult>;
}

pub type OnSuccess = Box<dyn FnOnce(&TransactionResult) + Send>;

/// Partition-scoped batch of writes. Either every step lands or none do;
/// `on_success` callbacks run after commit, in registration order.
pub struct Transaction {
    partition_key: String,
    steps: Vec<TransactionStep>,
    on_success: Vec<OnSuccess>,
    committer: Arc<dyn TransactionCommitter>,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("partition_key", &self.partition_key)
            .field("steps", &self.steps)
            .field("on_success", &self.on_success.len())
            .finish()
    }
}

impl Transaction {
    pub fn new(partition_key: &str, committer: Arc<dyn TransactionCommitter>) -> Self {
        Self {
            partition_key: partition_key.to_lowercase(),
            steps: Vec::new(),
            on_success: Vec::new(),
            committer,
        }
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub fn steps(&self) -> &[TransactionStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn check_partition(&self, id: &ResourceId) -> StorageResult<()> {
        if id.subscription_id().eq_ignore_ascii_case(&self.partition_key) {
            Ok(())
        } else {
            Err(StorageError::WrongPartition {
                partition: self.partition_key.clone(),
                item: id.to_string(),
            })
        }
    }

    /// Returns the new operation's id.
    pub fn create_operation(&mut self, op: OperationRecord) -> StorageResult<String> {
        self.check_partition(&op.external_id)?;
        let id = op.id.clone();
        self.steps.push(TransactionStep::CreateOperation(op));
        Ok(id)
    }

    pub fn create_resource(&mut self, record: ResourceRecord) -> StorageResult<()> {
        self.check_partition(&record.external_id)?;
        self.steps.push(TransactionStep::CreateResource(record));
        Ok(())
    }

    pub fn patch_resource(
        &mut self,
        id: &ResourceId,
        patch: ResourceRecordPatch,
    ) -> StorageResult<()> {
        self.check_partition(id)?;
        if !patch.is_empty() {
            self.steps.push(TransactionStep::PatchResource {
                id: id.clone(),
                patch,
            });
        }
        Ok(())
    }

    pub fn patch_operation(
        &mut self,
        operation_id: &str,
        status: ProvisioningState,
        error: Option<CloudErrorBody>,
    ) {
        self.steps.push(TransactionStep::PatchOperation {
            operation_id: operation_id.to_string(),
            status,
            error,
        });
    }

    pub fn delete_resource(&mut self, id: &ResourceId) -> StorageResult<()> {
        self.check_partition(id)?;
        self.steps.push(TransactionStep::DeleteResource(id.clone()));
        Ok(())
    }

    pub fn on_success<F>(&mut self, callback: F)
    where
        F: FnOnce(&TransactionResult) + Send + 'static,
    {
        self.on_success.push(Box::new(callback));
    }

    pub async fn execute(self) -> StorageResult<TransactionResult> {
        tracing::debug!(
            partition = %self.partition_key,
            steps = self.steps.len(),
            "committing transaction"
        );
        let result = self
            .committer
            .commit(&self.partition_key, self.steps)
            .await?;
        for callback in self.on_success {
            callback(&result);
        }
        Ok(result)
    }
}
