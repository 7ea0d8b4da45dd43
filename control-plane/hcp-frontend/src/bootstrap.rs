use anyhow::{Result, anyhow};
use opentelemetry::metrics::Meter;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    api_version::ApiVersionRegistry,
    config::{AppConfig, ControlPlaneConfig, FrontendPolicy},
    conflict::ConflictChecker,
    cs::{ControlPlaneClient, HttpControlPlaneClient, MemoryControlPlane},
    metrics::FrontendMetrics,
    server::{ApiServer, AppState},
    services::{
        ClusterService, ExternalAuthService, NodePoolService, OpenShiftVersionService,
        OperationService, PreflightService, ServiceDeps, SubscriptionLeases, SubscriptionService,
    },
    storage::create_storage_factory,
};
use hcp_observability::{MetricsHandle, OtelMetrics, build_metrics};
use hcp_storage::{DocumentStore, LockClient, StorageFactory};

/// Backends the frontend runs against.
pub struct Collaborators {
    pub store: Arc<dyn DocumentStore>,
    /// `None` disables the per-subscription lease.
    pub locks: Option<Arc<dyn LockClient>>,
    pub control_plane: Arc<dyn ControlPlaneClient>,
    pub meter: Meter,
}

/// Wires every service over the given backends.
pub fn build_app_state(
    policy: FrontendPolicy,
    versions: ApiVersionRegistry,
    collaborators: Collaborators,
) -> AppState {
    let Collaborators {
        store,
        locks,
        control_plane,
        meter,
    } = collaborators;
    let metrics = FrontendMetrics::new(&meter);

    let leases = match (locks, policy.lock) {
        (Some(client), Some(lock)) => Some(SubscriptionLeases::new(client, lock)),
        _ => None,
    };
    let operations = Arc::new(OperationService::new(
        store.clone(),
        &policy.location,
        metrics.clone(),
    ));
    let openshift_versions = Arc::new(OpenShiftVersionService::new(control_plane.clone()));
    let deps = ServiceDeps {
        store: store.clone(),
        control_plane,
        conflicts: Arc::new(ConflictChecker::new(store.clone(), metrics)),
        operations: operations.clone(),
        leases,
        policy: policy.clone(),
    };

    let clusters = Arc::new(ClusterService::for_clusters(deps.clone()));
    let versions = Arc::new(versions);
    AppState {
        node_pools: Arc::new(NodePoolService::for_node_pools(deps.clone())),
        external_auths: Arc::new(ExternalAuthService::for_external_auths(deps)),
        subscriptions: Arc::new(SubscriptionService::new(store.clone(), clusters.clone())),
        preflight: Arc::new(PreflightService::new(versions.clone(), &policy.location)),
        clusters,
        operations,
        versions,
        openshift_versions,
        store,
    }
}

/// HTTP client when a URL is configured, the in-process control plane
/// otherwise.
pub fn create_control_plane(config: &ControlPlaneConfig) -> Result<Arc<dyn ControlPlaneClient>> {
    match &config.url {
        Some(url) => {
            info!("Using control plane at {}", url);
            Ok(Arc::new(HttpControlPlaneClient::new(config)?))
        }
        None => {
            warn!("CONTROL_PLANE_URL not set, using in-memory control plane");
            Ok(Arc::new(MemoryControlPlane::new()))
        }
    }
}

/// A wired server and the meter provider it records into. Shut the
/// provider down after the server stops to flush pending exports.
pub struct Frontend {
    pub server: ApiServer,
    pub metrics: MetricsHandle,
}

/// Build a fully-wired ApiServer from environment variables.
pub async fn build_api_server_from_env() -> Result<Frontend> {
    let config = AppConfig::load_from_env()?;
    let observability = config.observability();
    let policy = config.frontend_policy();

    let storage_factory = create_storage_factory(&config.storage()).await?;
    let store: Arc<dyn DocumentStore> = Arc::new(storage_factory.create_store());
    let locks = policy.lock.map(|lock| {
        Arc::new(storage_factory.create_lock_client(lock.ttl)) as Arc<dyn LockClient>
    });

    let metrics = build_metrics("hcp-frontend", observability.otlp_endpoint.as_deref())
        .map_err(|e| anyhow!("failed to build metrics provider: {e}"))?;
    let http_metrics = observability
        .metrics_enabled
        .then(|| Arc::new(OtelMetrics::new(&metrics.meter())));

    let state = build_app_state(
        policy,
        ApiVersionRegistry::default(),
        Collaborators {
            store,
            locks,
            control_plane: create_control_plane(&config.control_plane())?,
            meter: metrics.meter(),
        },
    );

    Ok(Frontend {
        server: ApiServer::new(state, config.server(), http_metrics),
        metrics,
    })
}
