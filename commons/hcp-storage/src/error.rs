#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Item already exists: {0}")]
    AlreadyExists(String),

    #[error("Item {item} does not belong to partition {partition}")]
    WrongPartition { partition: String, item: String },

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Transaction commit failed: {0}")]
    CommitFailed(String),

    #[error("Lock unavailable: {0}")]
    LockUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}
