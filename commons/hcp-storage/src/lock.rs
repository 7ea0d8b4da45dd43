use crate::error::StorageError;
use crate::traits::StorageResult;
use async_trait::async_trait;
use std::time::Duration;

const RETRY_INTERVAL: Duration = Duration::from_secs(1);

type Releaser = Box<dyn FnOnce() + Send + Sync>;

/// Held advisory lease. Dropping it releases the lease.
pub struct Lease {
    key: String,
    token: String,
    release: Option<Releaser>,
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("key", &self.key)
            .field("token", &self.token)
            .finish()
    }
}

impl Lease {
    pub fn new(key: &str, token: &str, release: Releaser) -> Self {
        Self {
            key: key.to_string(),
            token: token.to_string(),
            release: Some(release),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Identity of this lease, usable for renewal without owning the guard.
    pub fn ticket(&self) -> LeaseTicket {
        LeaseTicket {
            key: self.key.clone(),
            token: self.token.clone(),
        }
    }
}

/// Key and token of a held lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseTicket {
    pub key: String,
    pub token: String,
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
            tracing::trace!(key = %self.key, "lease released");
        }
    }
}

/// Time-boxed, best-effort mutual exclusion keyed by an arbitrary string
/// (in practice the subscription id).
#[async_trait]
pub trait LockClient: Send + Sync {
    fn ttl(&self) -> Duration;

    /// `Ok(None)` when another holder has an unexpired lease.
    async fn try_acquire(&self, key: &str) -> StorageResult<Option<Lease>>;

    /// Extends the lease by another TTL. Fails if it was lost to expiry.
    async fn renew(&self, ticket: &LeaseTicket) -> StorageResult<()>;

    /// Retries once per interval until `timeout` elapses.
    async fn acquire(&self, key: &str, timeout: Duration) -> StorageResult<Lease> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(lease) = self.try_acquire(key).await? {
                return Ok(lease);
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(StorageError::LockUnavailable(key.to_string()));
            }
            tokio::time::sleep(RETRY_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn release(&self, lease: Lease) {
        drop(lease);
    }
}
