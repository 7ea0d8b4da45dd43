use super::resource;
use crate::{api::extractors::Arm, errors::ApiError, server::AppState};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::Uri,
    response::Response,
};
use hcp_models::{NODE_POOL_TYPE_NAME, ResourceId};
use tracing::info;

type NodePoolPath = Path<(String, String, String, String)>;

fn node_pool_id(Path((subscription_id, resource_group, cluster, name)): NodePoolPath) -> ResourceId {
    ResourceId::cluster(&subscription_id, &resource_group, &cluster).child(NODE_POOL_TYPE_NAME, &name)
}

pub async fn get_node_pool(
    State(state): State<AppState>,
    path: NodePoolPath,
    Arm(ctx): Arm,
) -> Result<Response, ApiError> {
    let id = node_pool_id(path);
    info!("API: Getting node pool: {}", id);
    resource::get(&state.node_pools, &ctx, &id).await
}

pub async fn put_node_pool(
    State(state): State<AppState>,
    path: NodePoolPath,
    Arm(ctx): Arm,
    body: Bytes,
) -> Result<Response, ApiError> {
    let id = node_pool_id(path);
    info!("API: Creating or updating node pool: {}", id);
    resource::put(&state.node_pools, &ctx, &id, &body).await
}

pub async fn patch_node_pool(
    State(state): State<AppState>,
    path: NodePoolPath,
    Arm(ctx): Arm,
    body: Bytes,
) -> Result<Response, ApiError> {
    let id = node_pool_id(path);
    info!("API: Patching node pool: {}", id);
    resource::patch(&state.node_pools, &ctx, &id, &body).await
}

pub async fn delete_node_pool(
    State(state): State<AppState>,
    path: NodePoolPath,
    Arm(ctx): Arm,
) -> Result<Response, ApiError> {
    let id = node_pool_id(path);
    info!("API: Deleting node pool: {}", id);
    resource::delete(&state.node_pools, &ctx, &id).await
}

pub async fn list_node_pools(
    State(state): State<AppState>,
    Path((subscription_id, resource_group, cluster)): Path<(String, String, String)>,
    Arm(ctx): Arm,
    uri: Uri,
) -> Result<Response, ApiError> {
    let cluster_id = ResourceId::cluster(&subscription_id, &resource_group, &cluster);
    info!("API: Listing node pools of cluster: {}", cluster_id);
    resource::list(&state.node_pools, &ctx, &uri, &cluster_id, Some(&cluster_id)).await
}
