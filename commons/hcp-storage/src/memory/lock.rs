use crate::error::StorageError;
use crate::lock::{Lease, LeaseTicket, LockClient};
use crate::traits::StorageResult;
use async_trait::async_trait;
use scc::hash_map::Entry;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct LeaseEntry {
    token: String,
    expires_at: Instant,
}

/// Lease table held in process memory.
#[derive(Clone)]
pub struct MemoryLockClient {
    table: Arc<scc::HashMap<String, LeaseEntry>>,
    ttl: Duration,
}

impl MemoryLockClient {
    pub fn new(ttl: Duration) -> Self {
        Self {
            table: Arc::new(scc::HashMap::new()),
            ttl,
        }
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.table
            .read(&key.to_lowercase(), |_, entry| entry.expires_at > Instant::now())
            .unwrap_or(false)
    }

    fn lease(&self, key: String, token: String) -> Lease {
        let table = self.table.clone();
        let owned = (key.clone(), token.clone());
        Lease::new(
            &key,
            &token,
            Box::new(move || {
                table.remove_if(&owned.0, |entry| entry.token == owned.1);
            }),
        )
    }
}

#[async_trait]
impl LockClient for MemoryLockClient {
    fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn try_acquire(&self, key: &str) -> StorageResult<Option<Lease>> {
        let key = key.to_lowercase();
        let token = uuid::Uuid::new_v4().to_string();
        let now = Instant::now();
        let fresh = LeaseEntry {
            token: token.clone(),
            expires_at: now + self.ttl,
        };
        match self.table.entry_async(key.clone()).await {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at > now {
                    return Ok(None);
                }
                tracing::debug!(key = %key, "taking over expired lease");
                *occupied.get_mut() = fresh;
            }
            Entry::Vacant(vacant) => {
                vacant.insert_entry(fresh);
            }
        }
        Ok(Some(self.lease(key, token)))
    }

    async fn renew(&self, ticket: &LeaseTicket) -> StorageResult<()> {
        let now = Instant::now();
        let ttl = self.ttl;
        let renewed = self
            .table
            .update_async(&ticket.key, |_, entry| {
                if entry.token == ticket.token && entry.expires_at > now {
                    entry.expires_at = now + ttl;
                    true
                } else {
                    false
                }
            })
            .await
            .unwrap_or(false);
        if renewed {
            Ok(())
        } else {
            Err(StorageError::LockUnavailable(ticket.key.clone()))
        }
    }
}
