use crate::config::{StorageConfig, StorageType};
use anyhow::Result;
use hcp_storage::memory::MemoryStorageFactory;
use tracing::info;

pub async fn create_storage_factory(config: &StorageConfig) -> Result<MemoryStorageFactory> {
    match config.storage_type {
        StorageType::Memory => {
            info!("Using in-memory document store");
            Ok(MemoryStorageFactory)
        }
    }
}
