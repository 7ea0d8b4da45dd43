use super::resource;
use crate::{api::extractors::Arm, errors::ApiError, server::AppState};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::Uri,
    response::Response,
};
use hcp_models::{EXTERNAL_AUTH_TYPE_NAME, ResourceId};
use tracing::info;

type ExternalAuthPath = Path<(String, String, String, String)>;

fn external_auth_id(
    Path((subscription_id, resource_group, cluster, name)): ExternalAuthPath,
) -> ResourceId {
    ResourceId::cluster(&subscription_id, &resource_group, &cluster)
        .child(EXTERNAL_AUTH_TYPE_NAME, &name)
}

pub async fn get_external_auth(
    State(state): State<AppState>,
    path: ExternalAuthPath,
    Arm(ctx): Arm,
) -> Result<Response, ApiError> {
    let id = external_auth_id(path);
    info!("API: Getting external auth: {}", id);
    resource::get(&state.external_auths, &ctx, &id).await
}

pub async fn put_external_auth(
    State(state): State<AppState>,
    path: ExternalAuthPath,
    Arm(ctx): Arm,
    body: Bytes,
) -> Result<Response, ApiError> {
    let id = external_auth_id(path);
    info!("API: Creating or updating external auth: {}", id);
    resource::put(&state.external_auths, &ctx, &id, &body).await
}

pub async fn patch_external_auth(
    State(state): State<AppState>,
    path: ExternalAuthPath,
    Arm(ctx): Arm,
    body: Bytes,
) -> Result<Response, ApiError> {
    let id = external_auth_id(path);
    info!("API: Patching external auth: {}", id);
    resource::patch(&state.external_auths, &ctx, &id, &body).await
}

pub async fn delete_external_auth(
    State(state): State<AppState>,
    path: ExternalAuthPath,
    Arm(ctx): Arm,
) -> Result<Response, ApiError> {
    let id = external_auth_id(path);
    info!("API: Deleting external auth: {}", id);
    resource::delete(&state.external_auths, &ctx, &id).await
}

pub async fn list_external_auths(
    State(state): State<AppState>,
    Path((subscription_id, resource_group, cluster)): Path<(String, String, String)>,
    Arm(ctx): Arm,
    uri: Uri,
) -> Result<Response, ApiError> {
    let cluster_id = ResourceId::cluster(&subscription_id, &resource_group, &cluster);
    info!("API: Listing external auths of cluster: {}", cluster_id);
    resource::list(&state.external_auths, &ctx, &uri, &cluster_id, Some(&cluster_id)).await
}
