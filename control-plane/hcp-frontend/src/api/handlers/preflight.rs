use crate::{
    api::{
        extractors::{Arm, json_body},
        views::respond,
    },
    errors::ApiError,
    server::AppState,
    services::PreflightRequest,
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use tracing::info;

pub async fn deployment_preflight(
    State(state): State<AppState>,
    Path((subscription_id, resource_group, deployment)): Path<(String, String, String)>,
    Arm(ctx): Arm,
    body: Bytes,
) -> Result<Response, ApiError> {
    info!(
        "API: Preflight for deployment {} in {}/{}",
        deployment, subscription_id, resource_group
    );
    let request: PreflightRequest = json_body(&body)?;
    let response = state
        .preflight
        .validate(&subscription_id, &resource_group, &request);
    Ok(respond(&ctx, StatusCode::OK, Some(&response)))
}
