use crate::config::LockPolicy;
use crate::errors::{FrontendError, FrontendResult};
use hcp_storage::{Lease, LeaseTicket, LockClient, StorageError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Per-subscription advisory lease taken around mutating requests.
#[derive(Clone)]
pub struct SubscriptionLeases {
    client: Arc<dyn LockClient>,
    policy: LockPolicy,
}

impl SubscriptionLeases {
    pub fn new(client: Arc<dyn LockClient>, policy: LockPolicy) -> Self {
        Self { client, policy }
    }

    fn retry_after(&self) -> u64 {
        self.client.ttl().as_secs().max(1)
    }

    /// Waits up to the configured timeout, then keeps the lease alive
    /// until the returned guard drops.
    pub async fn hold(&self, subscription_id: &str) -> FrontendResult<SubscriptionLease> {
        let key = subscription_id.to_lowercase();
        let lease = match self.client.acquire(&key, self.policy.timeout).await {
            Ok(lease) => lease,
            Err(StorageError::LockUnavailable(_)) => {
                return Err(FrontendError::conflict_retry(
                    format!(
                        "Another request is modifying subscription '{subscription_id}'; retry later"
                    ),
                    self.retry_after(),
                ));
            }
            Err(e) => {
                error!(subscription_id, error = %e, "failed to acquire subscription lease");
                return Err(e.into());
            }
        };
        debug!(subscription_id, "subscription lease acquired");

        let (lost_tx, lost_rx) = watch::channel(false);
        let renewer = tokio::spawn(keep_alive(
            self.client.clone(),
            lease.ticket(),
            renew_interval(self.client.ttl()),
            lost_tx,
        ));
        Ok(SubscriptionLease {
            lease,
            lost: lost_rx,
            renewer,
            retry_after: self.retry_after(),
        })
    }

    /// Runs `work` while holding the subscription's lease. Losing the
    /// lease abandons the work with a retryable conflict.
    pub async fn run<T, F>(&self, subscription_id: &str, work: F) -> FrontendResult<T>
    where
        F: Future<Output = FrontendResult<T>>,
    {
        self.hold(subscription_id).await?.run(work).await
    }
}

/// Renew one second before expiry, or halfway for very short TTLs.
fn renew_interval(ttl: Duration) -> Duration {
    if ttl > Duration::from_secs(2) {
        ttl - Duration::from_secs(1)
    } else {
        ttl / 2
    }
}

async fn keep_alive(
    client: Arc<dyn LockClient>,
    ticket: LeaseTicket,
    every: Duration,
    lost: watch::Sender<bool>,
) {
    loop {
        tokio::time::sleep(every).await;
        match client.renew(&ticket).await {
            Ok(()) => debug!(key = %ticket.key, "subscription lease renewed"),
            Err(e) => {
                warn!(key = %ticket.key, error = %e, "subscription lease lost");
                let _ = lost.send(true);
                return;
            }
        }
    }
}

/// A held subscription lease. Dropping it stops renewal and releases
/// the lease.
pub struct SubscriptionLease {
    lease: Lease,
    lost: watch::Receiver<bool>,
    renewer: JoinHandle<()>,
    retry_after: u64,
}

impl std::fmt::Debug for SubscriptionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionLease")
            .field("retry_after", &self.retry_after)
            .finish_non_exhaustive()
    }
}

impl SubscriptionLease {
    pub fn is_held(&self) -> bool {
        !*self.lost.borrow()
    }

    fn lost_error(&self) -> FrontendError {
        FrontendError::conflict_retry(
            format!(
                "Lost the lease on subscription '{}' while processing the request; retry later",
                self.lease.key()
            ),
            self.retry_after,
        )
    }

    /// Races `work` against loss of the lease.
    pub async fn run<T, F>(mut self, work: F) -> FrontendResult<T>
    where
        F: Future<Output = FrontendResult<T>>,
    {
        let lost_error = self.lost_error();
        let lost = &mut self.lost;
        tokio::select! {
            result = work => result,
            () = wait_lost(lost) => Err(lost_error),
        }
    }
}

async fn wait_lost(lost: &mut watch::Receiver<bool>) {
    while !*lost.borrow_and_update() {
        if lost.changed().await.is_err() {
            // Renewal ended without reporting a loss.
            std::future::pending::<()>().await;
        }
    }
}

impl Drop for SubscriptionLease {
    fn drop(&mut self) {
        self.renewer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hcp_storage::memory::MemoryLockClient;
    use hcp_storage::StorageResult;

    fn leases(client: Arc<dyn LockClient>, timeout: Duration) -> SubscriptionLeases {
        let ttl = client.ttl();
        SubscriptionLeases::new(client, LockPolicy { ttl, timeout })
    }

    #[tokio::test(start_paused = true)]
    async fn busy_subscription_is_a_retryable_conflict() {
        let leases = leases(
            Arc::new(MemoryLockClient::new(Duration::from_secs(30))),
            Duration::from_secs(2),
        );
        let held = leases.hold("SUB").await.unwrap();
        let err = leases.hold("sub").await.unwrap_err();
        assert!(matches!(
            err,
            FrontendError::Conflict {
                retry_after: Some(30),
                ..
            }
        ));

        drop(held);
        leases.hold("sub").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn lease_outlives_its_ttl_while_held() {
        let locks = MemoryLockClient::new(Duration::from_secs(10));
        let leases = leases(Arc::new(locks.clone()), Duration::from_secs(2));
        let held = leases.hold("sub").await.unwrap();

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(held.is_held());
        assert!(locks.is_held("sub"));
        let err = leases.hold("sub").await.unwrap_err();
        assert!(matches!(err, FrontendError::Conflict { .. }));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(locks.is_held("sub"));
        drop(held);
        assert!(!locks.is_held("sub"));
        leases.hold("sub").await.unwrap();
    }

    /// Grants leases but refuses every renewal.
    struct NoRenewals(MemoryLockClient);

    #[async_trait]
    impl LockClient for NoRenewals {
        fn ttl(&self) -> Duration {
            self.0.ttl()
        }

        async fn try_acquire(&self, key: &str) -> StorageResult<Option<Lease>> {
            self.0.try_acquire(key).await
        }

        async fn renew(&self, ticket: &LeaseTicket) -> StorageResult<()> {
            Err(StorageError::LockUnavailable(ticket.key.clone()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn losing_the_lease_abandons_the_work() {
        let leases = leases(
            Arc::new(NoRenewals(MemoryLockClient::new(Duration::from_secs(10)))),
            Duration::from_secs(2),
        );
        let result: FrontendResult<()> = leases
            .run("sub", async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;
        assert!(matches!(
            result,
            Err(FrontendError::Conflict {
                retry_after: Some(10),
                ..
            })
        ));

        let quick = leases.run("sub", async { Ok(7) }).await.unwrap();
        assert_eq!(quick, 7);
    }

    #[test]
    fn renewal_lands_before_expiry() {
        assert_eq!(renew_interval(Duration::from_secs(10)), Duration::from_secs(9));
        assert_eq!(renew_interval(Duration::from_secs(2)), Duration::from_secs(1));
    }
}
