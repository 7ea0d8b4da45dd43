use super::resource;
use crate::{
    api::{extractors::Arm, views::respond_empty},
    errors::ApiError,
    server::AppState,
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, Uri},
    response::Response,
};
use hcp_models::ResourceId;
use tracing::info;

pub async fn get_cluster(
    State(state): State<AppState>,
    Path((subscription_id, resource_group, name)): Path<(String, String, String)>,
    Arm(ctx): Arm,
) -> Result<Response, ApiError> {
    let id = ResourceId::cluster(&subscription_id, &resource_group, &name);
    info!("API: Getting cluster: {}", id);
    resource::get(&state.clusters, &ctx, &id).await
}

pub async fn put_cluster(
    State(state): State<AppState>,
    Path((subscription_id, resource_group, name)): Path<(String, String, String)>,
    Arm(ctx): Arm,
    body: Bytes,
) -> Result<Response, ApiError> {
    let id = ResourceId::cluster(&subscription_id, &resource_group, &name);
    info!("API: Creating or updating cluster: {}", id);
    resource::put(&state.clusters, &ctx, &id, &body).await
}

pub async fn patch_cluster(
    State(state): State<AppState>,
    Path((subscription_id, resource_group, name)): Path<(String, String, String)>,
    Arm(ctx): Arm,
    body: Bytes,
) -> Result<Response, ApiError> {
    let id = ResourceId::cluster(&subscription_id, &resource_group, &name);
    info!("API: Patching cluster: {}", id);
    resource::patch(&state.clusters, &ctx, &id, &body).await
}

pub async fn delete_cluster(
    State(state): State<AppState>,
    Path((subscription_id, resource_group, name)): Path<(String, String, String)>,
    Arm(ctx): Arm,
) -> Result<Response, ApiError> {
    let id = ResourceId::cluster(&subscription_id, &resource_group, &name);
    info!("API: Deleting cluster: {}", id);
    resource::delete(&state.clusters, &ctx, &id).await
}

pub async fn list_clusters_by_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
    Arm(ctx): Arm,
    uri: Uri,
) -> Result<Response, ApiError> {
    info!("API: Listing clusters in subscription: {}", subscription_id);
    let scope = ResourceId::subscription(&subscription_id);
    resource::list(&state.clusters, &ctx, &uri, &scope, None).await
}

pub async fn list_clusters_by_resource_group(
    State(state): State<AppState>,
    Path((subscription_id, resource_group)): Path<(String, String)>,
    Arm(ctx): Arm,
    uri: Uri,
) -> Result<Response, ApiError> {
    info!(
        "API: Listing clusters in resource group: {}/{}",
        subscription_id, resource_group
    );
    let scope = ResourceId::resource_group(&subscription_id, &resource_group);
    resource::list(&state.clusters, &ctx, &uri, &scope, None).await
}

pub async fn request_admin_credential(
    State(state): State<AppState>,
    Path((subscription_id, resource_group, name)): Path<(String, String, String)>,
    Arm(ctx): Arm,
) -> Result<Response, ApiError> {
    let id = ResourceId::cluster(&subscription_id, &resource_group, &name);
    info!("API: Requesting admin credential for cluster: {}", id);
    state.clusters.request_credential(&ctx, &id).await?;
    Ok(respond_empty(&ctx, StatusCode::ACCEPTED))
}

pub async fn revoke_credentials(
    State(state): State<AppState>,
    Path((subscription_id, resource_group, name)): Path<(String, String, String)>,
    Arm(ctx): Arm,
) -> Result<Response, ApiError> {
    let id = ResourceId::cluster(&subscription_id, &resource_group, &name);
    info!("API: Revoking credentials for cluster: {}", id);
    state.clusters.revoke_credentials(&ctx, &id).await?;
    Ok(respond_empty(&ctx, StatusCode::ACCEPTED))
}
