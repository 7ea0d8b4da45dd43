use crate::{
    api::{
        extractors::{Lifecycle, json_body},
        views::respond,
    },
    errors::ApiError,
    server::AppState,
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use hcp_models::Subscription;
use tracing::info;

pub async fn put_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
    Lifecycle(ctx): Lifecycle,
    body: Bytes,
) -> Result<Response, ApiError> {
    let subscription: Subscription = json_body(&body)?;
    info!(
        "API: Registering subscription {} as {}",
        subscription_id, subscription.state
    );
    let stored = state
        .subscriptions
        .put(&ctx, &subscription_id, subscription)
        .await?;
    Ok(respond(&ctx, StatusCode::OK, Some(&stored)))
}

pub async fn get_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
    Lifecycle(ctx): Lifecycle,
) -> Result<Response, ApiError> {
    info!("API: Getting subscription: {}", subscription_id);
    let subscription = state.subscriptions.get(&subscription_id).await?;
    Ok(respond(&ctx, StatusCode::OK, Some(&subscription)))
}
