use crate::{
    api::{create_middleware_stack, handlers, request_id, subscription_gate},
    api_version::ApiVersionRegistry,
    config::ServerConfig,
    services::{
        ClusterService, ExternalAuthService, NodePoolService, OpenShiftVersionService,
        OperationService, PreflightService, SubscriptionService,
    },
};
use axum::{
    Extension, Json, Router,
    extract::State,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use hcp_models::{
    CLUSTER_TYPE_NAME, EXTERNAL_AUTH_TYPE_NAME, LOCATIONS_TYPE_NAME, NODE_POOL_TYPE_NAME,
    OPERATION_RESULT_TYPE_NAME, OPERATION_STATUS_TYPE_NAME, PROVIDER_NAMESPACE, VERSION_TYPE_NAME,
};
use hcp_observability::{HealthCheck, HealthReport, OtelMetrics, otel_metrics_middleware};
use hcp_storage::{DocumentStore, StorageHealth};
use std::{net::SocketAddr, sync::Arc};
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub clusters: Arc<ClusterService>,
    pub node_pools: Arc<NodePoolService>,
    pub external_auths: Arc<ExternalAuthService>,
    pub operations: Arc<OperationService>,
    pub subscriptions: Arc<SubscriptionService>,
    pub preflight: Arc<PreflightService>,
    pub versions: Arc<ApiVersionRegistry>,
    pub openshift_versions: Arc<OpenShiftVersionService>,
    pub store: Arc<dyn DocumentStore>,
}

pub struct ApiServer {
    app: Router,
    config: ServerConfig,
}

impl ApiServer {
    pub fn new(state: AppState, config: ServerConfig, metrics: Option<Arc<OtelMetrics>>) -> Self {
        let subscription = "/subscriptions/{subscription_id}";
        let provider = format!("{subscription}/providers/{PROVIDER_NAMESPACE}");
        let resource_group =
            format!("{subscription}/resourceGroups/{{resource_group}}/providers/{PROVIDER_NAMESPACE}");
        let clusters = format!("{resource_group}/{CLUSTER_TYPE_NAME}");
        let cluster = format!("{clusters}/{{cluster}}");
        let node_pools = format!("{cluster}/{NODE_POOL_TYPE_NAME}");
        let external_auths = format!("{cluster}/{EXTERNAL_AUTH_TYPE_NAME}");
        let location = format!("{provider}/{LOCATIONS_TYPE_NAME}/{{location}}");
        let openshift_versions = format!("{location}/{VERSION_TYPE_NAME}");

        let gated = Router::new()
            // Clusters
            .route(&format!("{provider}/{CLUSTER_TYPE_NAME}"), get(handlers::list_clusters_by_subscription))
            .route(&clusters, get(handlers::list_clusters_by_resource_group))
            .route(
                &cluster,
                get(handlers::get_cluster)
                    .put(handlers::put_cluster)
                    .patch(handlers::patch_cluster)
                    .delete(handlers::delete_cluster),
            )
            .route(
                &format!("{cluster}/requestadmincredential"),
                post(handlers::request_admin_credential),
            )
            .route(
                &format!("{cluster}/revokecredentials"),
                post(handlers::revoke_credentials),
            )
            // Node pools
            .route(&node_pools, get(handlers::list_node_pools))
            .route(
                &format!("{node_pools}/{{node_pool}}"),
                get(handlers::get_node_pool)
                    .put(handlers::put_node_pool)
                    .patch(handlers::patch_node_pool)
                    .delete(handlers::delete_node_pool),
            )
            // External auths
            .route(&external_auths, get(handlers::list_external_auths))
            .route(
                &format!("{external_auths}/{{external_auth}}"),
                get(handlers::get_external_auth)
                    .put(handlers::put_external_auth)
                    .patch(handlers::patch_external_auth)
                    .delete(handlers::delete_external_auth),
            )
            // Operations
            .route(
                &format!("{location}/{OPERATION_STATUS_TYPE_NAME}/{{operation_id}}"),
                get(handlers::get_operation_status),
            )
            .route(
                &format!("{location}/{OPERATION_RESULT_TYPE_NAME}/{{operation_id}}"),
                get(handlers::get_operation_result),
            )
            // OpenShift versions catalogue
            .route(&openshift_versions, get(handlers::list_openshift_versions))
            .route(
                &format!("{openshift_versions}/{{version}}"),
                get(handlers::get_openshift_version),
            )
            // Deployment preflight
            .route(
                &format!("{resource_group}/deployments/{{deployment}}/preflight"),
                post(handlers::deployment_preflight),
            )
            .route_layer(from_fn_with_state(state.clone(), subscription_gate));

        let mut app = Router::new()
            .merge(gated)
            // Subscription lifecycle
            .route(
                subscription,
                get(handlers::get_subscription).put(handlers::put_subscription),
            )
            // Health check endpoint
            .route("/health", get(health_check))
            .layer(from_fn(request_id));

        if let Some(metrics) = metrics {
            app = app
                .layer(from_fn(otel_metrics_middleware))
                .layer(Extension(metrics));
        }

        let app = app.layer(create_middleware_stack()).with_state(state);

        Self { app, config }
    }

    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error>> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("HCP frontend listening on {}", addr);
        info!("Health check available at: http://{}/health", addr);

        axum::serve(listener, self.app).await?;

        Ok(())
    }

    /// Consume and return the underlying Axum Router so callers can serve it themselves
    /// (e.g., on an ephemeral port in tests) and discover the bound address.
    pub fn into_router(self) -> Router {
        self.app
    }
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let report =
        HealthReport::default().with("storage", HealthCheck::from_result(state.store.health().await));
    Json(serde_json::json!({
        "status": report.overall_status().as_str(),
        "service": "hcp-frontend",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "components": report.components,
    }))
}
