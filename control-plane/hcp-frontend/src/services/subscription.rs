use super::cluster::ClusterService;
use super::context::RequestContext;
use crate::errors::{FrontendError, FrontendResult};
use axum::http::Method;
use hcp_models::{ProvisioningState, ResourceId, ResourceType, Subscription, SubscriptionState};
use hcp_storage::{DocumentStore, ListOptions, ResourceStorage, SubscriptionStorage};
use std::sync::Arc;
use tracing::{error, info};

/// Subscription registrations pushed by the resource manager, and the
/// gate that checks them on every resource request.
pub struct SubscriptionService {
    store: Arc<dyn DocumentStore>,
    clusters: Arc<ClusterService>,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn DocumentStore>, clusters: Arc<ClusterService>) -> Self {
        Self { store, clusters }
    }

    pub async fn get(&self, subscription_id: &str) -> FrontendResult<Subscription> {
        self.store
            .get_subscription(subscription_id)
            .await?
            .ok_or_else(|| FrontendError::NotFound {
                message: format!("Subscription '{subscription_id}' is not registered"),
                target: subscription_id.to_string(),
            })
    }

    /// Stores the registration. A subscription moving to `Deleted` takes
    /// all of its clusters with it.
    pub async fn put(
        &self,
        ctx: &RequestContext,
        subscription_id: &str,
        subscription: Subscription,
    ) -> FrontendResult<Subscription> {
        self.store
            .put_subscription(subscription_id, &subscription)
            .await?;
        info!(subscription_id, state = %subscription.state, "subscription registered");

        if subscription.state == SubscriptionState::Deleted {
            self.delete_all_resources(ctx, subscription_id).await?;
        }
        Ok(subscription)
    }

    /// Deletes every cluster in the subscription through the cascading
    /// delete path, committing all of them in one transaction. Clusters
    /// already deleting are left alone.
    pub async fn delete_all_resources(
        &self,
        ctx: &RequestContext,
        subscription_id: &str,
    ) -> FrontendResult<usize> {
        let scope = ResourceId::subscription(subscription_id);
        self.clusters
            .leased(&scope, self.delete_all_unleased(ctx, &scope))
            .await
    }

    async fn delete_all_unleased(&self, ctx: &RequestContext, scope: &ResourceId) -> FrontendResult<usize> {
        let subscription_id = scope.subscription_id();
        let page = self
            .store
            .list_resources(
                scope,
                ListOptions {
                    resource_type: Some(ResourceType::cluster()),
                    ..Default::default()
                },
            )
            .await?;

        // Deletes run under their own context so their polling headers do
        // not end up on the subscription response.
        let mut delete_ctx = RequestContext::new(Method::DELETE, &ctx.api_version);
        delete_ctx.correlation = ctx.correlation.clone();

        let mut tx = self.store.new_transaction(subscription_id);
        let mut deleted = 0;
        for record in page
            .items
            .iter()
            .filter(|r| r.provisioning_state != ProvisioningState::Deleting)
        {
            if let Err(e) = self.clusters.stage_delete(&mut tx, &delete_ctx, record).await {
                error!(
                    resource_id = %record.external_id,
                    error = %e,
                    "failed to delete cluster of deleted subscription"
                );
                return Err(e);
            }
            deleted += 1;
        }
        if deleted > 0 {
            tx.execute().await?;
        }
        info!(subscription_id, deleted, "deleted clusters of deleted subscription");
        Ok(deleted)
    }

    /// Admits or rejects a resource request based on the subscription's
    /// registration state.
    pub async fn gate(&self, subscription_id: &str, method: &Method) -> FrontendResult<()> {
        let Some(subscription) = self.store.get_subscription(subscription_id).await? else {
            return Err(FrontendError::SubscriptionState {
                message: format!("Subscription '{subscription_id}' is not registered"),
                conflict: false,
            });
        };
        let rejected = |conflict| FrontendError::SubscriptionState {
            message: format!(
                "Request is not allowed in subscription in state '{}'",
                subscription.state
            ),
            conflict,
        };
        match subscription.state {
            SubscriptionState::Registered => Ok(()),
            SubscriptionState::Unregistered | SubscriptionState::Deleted => Err(rejected(false)),
            SubscriptionState::Warned | SubscriptionState::Suspended => {
                if matches!(*method, Method::GET | Method::DELETE) {
                    Ok(())
                } else {
                    Err(rejected(true))
                }
            }
        }
    }
}
