pub mod cluster;
pub mod context;
pub mod engine;
pub mod external_auth;
pub mod lease;
pub mod node_pool;
pub mod operations;
pub mod preflight;
pub mod subscription;
pub mod versions;

pub use cluster::{ClusterAdapter, ClusterService};
pub use context::{RequestContext, ResponseHeaders};
pub use engine::{Deleted, KindAdapter, ListPage, ResourceService, Written};
pub use external_auth::{ExternalAuthAdapter, ExternalAuthService};
pub use lease::SubscriptionLeases;
pub use node_pool::{NodePoolAdapter, NodePoolService};
pub use operations::{OperationOutcome, OperationService};
pub use preflight::{PreflightRequest, PreflightResponse, PreflightService, PreflightStatus};
pub use subscription::SubscriptionService;
pub use versions::OpenShiftVersionService;

use crate::config::FrontendPolicy;
use crate::conflict::ConflictChecker;
use crate::cs::ControlPlaneClient;
use hcp_storage::DocumentStore;
use std::sync::Arc;

/// Collaborators shared by every resource service.
#[derive(Clone)]
pub struct ServiceDeps {
    pub store: Arc<dyn DocumentStore>,
    pub control_plane: Arc<dyn ControlPlaneClient>,
    pub conflicts: Arc<ConflictChecker>,
    pub operations: Arc<OperationService>,
    pub leases: Option<SubscriptionLeases>,
    pub policy: FrontendPolicy,
}
