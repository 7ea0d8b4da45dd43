use crate::errors::{FrontendError, FrontendResult};
use crate::metrics::FrontendMetrics;
use hcp_models::{OperationRequest, ProvisioningState, ResourceId};
use hcp_storage::DocumentStore;
use std::sync::Arc;
use tracing::{debug, error};

/// Decides whether `request` may proceed given the target's current state
/// and the states of its same-namespace ancestors (nearest first).
///
/// A parent still in `Accepted` does not block its children; the control
/// plane has the final say in that window.
pub fn check_conflict(
    request: OperationRequest,
    target_state: Option<ProvisioningState>,
    ancestor_states: &[ProvisioningState],
) -> FrontendResult<()> {
    if let Some(state) = target_state {
        match request {
            OperationRequest::Create => {}
            OperationRequest::Delete => {
                if state == ProvisioningState::Deleting {
                    return Err(FrontendError::conflict("Resource is already deleting"));
                }
            }
            OperationRequest::Update
            | OperationRequest::RequestCredential
            | OperationRequest::RevokeCredentials => {
                if !state.is_terminal() {
                    return Err(FrontendError::conflict(format!(
                        "Cannot {} resource while resource is \"{}\"",
                        request.verb(),
                        state.as_str().to_lowercase()
                    )));
                }
            }
        }
    }

    for state in ancestor_states {
        if matches!(
            state,
            ProvisioningState::Provisioning | ProvisioningState::Deleting
        ) {
            return Err(FrontendError::conflict(format!(
                "Cannot {} resource while parent resource is {}",
                request.verb(),
                state.as_str().to_lowercase()
            )));
        }
    }
    Ok(())
}

pub struct ConflictChecker {
    store: Arc<dyn DocumentStore>,
    metrics: FrontendMetrics,
}

impl ConflictChecker {
    pub fn new(store: Arc<dyn DocumentStore>, metrics: FrontendMetrics) -> Self {
        Self { store, metrics }
    }

    /// Looks up every ancestor in the same provider namespace and applies
    /// [`check_conflict`]. Store failures surface as internal errors.
    pub async fn check(
        &self,
        request: OperationRequest,
        id: &ResourceId,
        state: Option<ProvisioningState>,
    ) -> FrontendResult<()> {
        let ancestor_states = self.ancestor_states(id).await?;
        let result = check_conflict(request, state, &ancestor_states);
        if result.is_err() {
            debug!(resource_id = %id, request = %request, "provisioning state conflict");
            self.metrics.conflict(request);
        }
        result
    }

    async fn ancestor_states(&self, id: &ResourceId) -> FrontendResult<Vec<ProvisioningState>> {
        let mut states = Vec::new();
        let mut parent = id.parent();
        while let Some(current) = parent {
            if !current
                .provider_namespace()
                .eq_ignore_ascii_case(id.provider_namespace())
            {
                break;
            }
            match self.store.get_resource(&current).await {
                Ok(Some(record)) => states.push(record.provisioning_state),
                Ok(None) => return Err(FrontendError::resource_not_found(&current)),
                Err(e) => {
                    error!(resource_id = %current, error = %e, "failed to read parent resource");
                    return Err(FrontendError::Internal(format!(
                        "failed to read parent resource {current}: {e}"
                    )));
                }
            }
            parent = current.parent();
        }
        Ok(states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hcp_models::ResourceRecord;
    use hcp_storage::memory::MemoryDocumentStore;

    const MUTATING: [OperationRequest; 3] = [
        OperationRequest::Update,
        OperationRequest::RequestCredential,
        OperationRequest::RevokeCredentials,
    ];

    #[test]
    fn updates_conflict_exactly_on_non_terminal_states() {
        for request in MUTATING {
            for state in ProvisioningState::ALL {
                let result = check_conflict(request, Some(state), &[]);
                assert_eq!(result.is_err(), !state.is_terminal(), "{request} on {state}");
            }
        }
    }

    #[test]
    fn delete_conflicts_only_when_already_deleting() {
        for state in ProvisioningState::ALL {
            let result = check_conflict(OperationRequest::Delete, Some(state), &[]);
            assert_eq!(result.is_err(), state == ProvisioningState::Deleting);
        }
        let err = check_conflict(
            OperationRequest::Delete,
            Some(ProvisioningState::Deleting),
            &[],
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Resource is already deleting");
    }

    #[test]
    fn create_never_conflicts_on_target() {
        for state in ProvisioningState::ALL {
            assert!(check_conflict(OperationRequest::Create, Some(state), &[]).is_ok());
        }
    }

    #[test]
    fn busy_ancestor_blocks_any_child_request() {
        let all_requests = [
            OperationRequest::Create,
            OperationRequest::Update,
            OperationRequest::Delete,
            OperationRequest::RequestCredential,
            OperationRequest::RevokeCredentials,
        ];
        for request in all_requests {
            for parent in ProvisioningState::ALL {
                let blocking = matches!(
                    parent,
                    ProvisioningState::Provisioning | ProvisioningState::Deleting
                );
                let result =
                    check_conflict(request, Some(ProvisioningState::Succeeded), &[parent]);
                assert_eq!(result.is_err(), blocking, "{request} under {parent}");
            }
        }
    }

    #[test]
    fn message_names_the_target_state() {
        let err = check_conflict(
            OperationRequest::Update,
            Some(ProvisioningState::Provisioning),
            &[],
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot update resource while resource is \"provisioning\""
        );
    }

    #[tokio::test]
    async fn checker_walks_to_the_cluster() {
        let store = MemoryDocumentStore::new();
        let cluster = ResourceId::cluster("sub", "rg", "c1");
        let mut record = ResourceRecord::new(cluster.clone());
        record.provisioning_state = ProvisioningState::Deleting;
        store.insert_resource(record).await;

        let meter = hcp_observability::local_metrics("test").meter();
        let checker = ConflictChecker::new(Arc::new(store), FrontendMetrics::new(&meter));
        let pool = cluster.child("nodePools", "np1");
        let err = checker
            .check(OperationRequest::Create, &pool, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("parent resource is deleting"));

        // The cluster itself has no same-namespace ancestor.
        checker
            .check(OperationRequest::Create, &cluster, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_parent_is_not_found() {
        let meter = hcp_observability::local_metrics("test").meter();
        let checker = ConflictChecker::new(
            Arc::new(MemoryDocumentStore::new()),
            FrontendMetrics::new(&meter),
        );
        let pool = ResourceId::cluster("sub", "rg", "gone").child("nodePools", "np1");
        let err = checker
            .check(OperationRequest::Create, &pool, None)
            .await
            .unwrap_err();
        assert!(matches!(err, FrontendError::NotFound { .. }));
    }
}
