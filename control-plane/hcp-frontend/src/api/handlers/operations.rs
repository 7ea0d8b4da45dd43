use crate::{
    api::{
        extractors::Arm,
        views::{respond, respond_empty},
    },
    errors::{ApiError, FrontendError},
    server::AppState,
    services::OperationOutcome,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use hcp_models::{OperationRequest, ResourceId, ResourceKind};
use serde_json::Value;
use tracing::info;

type OperationPath = Path<(String, String, String)>;

pub async fn get_operation_status(
    State(state): State<AppState>,
    Path((subscription_id, _location, operation_id)): OperationPath,
    Arm(ctx): Arm,
) -> Result<Response, ApiError> {
    info!("API: Getting operation status: {}", operation_id);
    let status = state
        .operations
        .status(&ctx, &subscription_id, &operation_id)
        .await?;
    Ok(respond(&ctx, StatusCode::OK, Some(&status)))
}

/// Responds the way the original request would have, had it completed
/// synchronously.
pub async fn get_operation_result(
    State(state): State<AppState>,
    Path((subscription_id, _location, operation_id)): OperationPath,
    Arm(ctx): Arm,
) -> Result<Response, ApiError> {
    info!("API: Getting operation result: {}", operation_id);
    let op = match state
        .operations
        .result(&ctx, &subscription_id, &operation_id)
        .await?
    {
        OperationOutcome::InProgress => return Ok(respond_empty(&ctx, StatusCode::ACCEPTED)),
        OperationOutcome::Finished(op) => op,
    };

    match op.request {
        OperationRequest::Create => {
            let body = current_resource(&state, &op.external_id).await?;
            Ok(respond(&ctx, StatusCode::CREATED, Some(&body)))
        }
        OperationRequest::Update => {
            let body = current_resource(&state, &op.external_id).await?;
            Ok(respond(&ctx, StatusCode::OK, Some(&body)))
        }
        OperationRequest::Delete | OperationRequest::RevokeCredentials => {
            Ok(respond_empty(&ctx, StatusCode::NO_CONTENT))
        }
        OperationRequest::RequestCredential => {
            let credential_id = op.internal_id.as_ref().ok_or_else(|| {
                FrontendError::Internal(format!("operation {} has no credential id", op.id))
            })?;
            let credential = state.clusters.credential(credential_id).await?;
            Ok(respond(&ctx, StatusCode::OK, Some(&credential)))
        }
    }
}

async fn current_resource(state: &AppState, id: &ResourceId) -> Result<Value, FrontendError> {
    let encoded = match id.kind() {
        Some(ResourceKind::Cluster) => serde_json::to_value(state.clusters.get(id).await?),
        Some(ResourceKind::NodePool) => serde_json::to_value(state.node_pools.get(id).await?),
        Some(ResourceKind::ExternalAuth) => {
            serde_json::to_value(state.external_auths.get(id).await?)
        }
        None => {
            return Err(FrontendError::Internal(format!(
                "operation targets unknown resource type {}",
                id.resource_type()
            )));
        }
    };
    encoded.map_err(|e| FrontendError::Internal(format!("failed to encode {id}: {e}")))
}
