use crate::{
    api::{
        extractors::Arm,
        views::{ResourceList, respond},
    },
    errors::ApiError,
    server::AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use hcp_models::ResourceId;
use tracing::info;

/// The whole catalogue fits one page.
pub async fn list_openshift_versions(
    State(state): State<AppState>,
    Path((subscription_id, location)): Path<(String, String)>,
    Arm(ctx): Arm,
) -> Result<Response, ApiError> {
    info!("API: Listing OpenShift versions in {}", location);
    let value = state
        .openshift_versions
        .list(&subscription_id, &location)
        .await?;
    let body = ResourceList {
        value,
        next_link: None,
    };
    Ok(respond(&ctx, StatusCode::OK, Some(&body)))
}

pub async fn get_openshift_version(
    State(state): State<AppState>,
    Path((subscription_id, location, version)): Path<(String, String, String)>,
    Arm(ctx): Arm,
) -> Result<Response, ApiError> {
    let id = ResourceId::openshift_version(&subscription_id, &location, &version);
    info!("API: Getting OpenShift version: {}", id);
    let body = state.openshift_versions.get(&id).await?;
    Ok(respond(&ctx, StatusCode::OK, Some(&body)))
}
