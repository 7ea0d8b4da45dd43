use super::context::RequestContext;
use crate::errors::{FrontendError, FrontendResult};
use crate::metrics::FrontendMetrics;
use axum::http::{HeaderName, HeaderValue, Method, header::LOCATION};
use hcp_models::{
    CloudErrorBody, InternalId, OPERATION_RESULT_TYPE_NAME, OperationRecord, OperationRequest,
    OperationStatusView, PROVIDER_NAMESPACE, ProvisioningState, ResourceId, ResourceRecordPatch,
};
use hcp_storage::{DocumentStore, OperationFilter, ResourceStorage, Transaction};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

pub const ASYNC_OPERATION_HEADER: HeaderName = HeaderName::from_static("azure-asyncoperation");
pub const ASYNC_NOTIFICATION_HEADER: HeaderName =
    HeaderName::from_static("azure-asyncnotification");

/// Where a polled operation stands.
#[derive(Debug, Clone)]
pub enum OperationOutcome {
    InProgress,
    Finished(OperationRecord),
}

/// Creates, exposes and projects operation records.
pub struct OperationService {
    store: Arc<dyn DocumentStore>,
    location: String,
    metrics: FrontendMetrics,
}

impl OperationService {
    pub fn new(store: Arc<dyn DocumentStore>, location: &str, metrics: FrontendMetrics) -> Self {
        Self {
            store,
            location: location.to_string(),
            metrics,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Enqueues a pollable operation and the response headers that point
    /// at it. Returns the new operation's id.
    pub fn new_operation(
        &self,
        tx: &mut Transaction,
        ctx: &RequestContext,
        request: OperationRequest,
        external_id: &ResourceId,
        internal_id: Option<InternalId>,
    ) -> FrontendResult<String> {
        let op = OperationRecord::new(
            request,
            external_id.clone(),
            internal_id,
            Some(ctx.correlation.clone()),
        )
        .expose(
            &self.location,
            &ctx.tenant_id,
            &ctx.client_id,
            &ctx.notification_uri,
        );
        let op_id = tx.create_operation(op)?;
        self.add_response_headers(tx, ctx, &op_id);

        let metrics = self.metrics.clone();
        tx.on_success(move |_| metrics.operation_created(request));
        Ok(op_id)
    }

    /// Enqueues an operation nobody polls, used for cascaded child deletes.
    pub fn new_internal_operation(
        &self,
        tx: &mut Transaction,
        ctx: &RequestContext,
        request: OperationRequest,
        external_id: &ResourceId,
        internal_id: Option<InternalId>,
    ) -> FrontendResult<String> {
        let op = OperationRecord::new(
            request,
            external_id.clone(),
            internal_id,
            Some(ctx.correlation.clone()),
        );
        Ok(tx.create_operation(op)?)
    }

    /// Registers a post-commit callback that sets the polling headers for
    /// `op_id` according to the request method.
    pub fn add_response_headers(&self, tx: &mut Transaction, ctx: &RequestContext, op_id: &str) {
        let op_id = op_id.to_string();
        let headers = ctx.headers.clone();
        let method = ctx.method.clone();
        let referer = ctx.referer.clone();
        let api_version = ctx.api_version.clone();
        let location = self.location.clone();

        tx.on_success(move |result| {
            let Some(op) = result.get_operation(&op_id) else {
                return;
            };
            let Some(status_path) = &op.operation_id else {
                return;
            };
            if !op.notification_uri.is_empty() {
                headers.insert(ASYNC_NOTIFICATION_HEADER, HeaderValue::from_static("Enabled"));
            }
            let set = |name: HeaderName, path: &str| {
                let url = polling_url(referer.as_deref(), path, &api_version);
                match HeaderValue::from_str(&url) {
                    Ok(value) => headers.insert(name, value),
                    Err(e) => warn!(error = %e, "unusable polling URL {}", url),
                }
            };
            if matches!(method, Method::DELETE | Method::PATCH | Method::POST) {
                let result_path = operation_result_path(
                    op.external_id.subscription_id(),
                    &location,
                    &op.id,
                );
                set(LOCATION, &result_path);
            }
            set(ASYNC_OPERATION_HEADER, status_path.as_str());
        });
    }

    async fn load_visible(
        &self,
        ctx: &RequestContext,
        subscription_id: &str,
        operation_id: &str,
    ) -> FrontendResult<OperationRecord> {
        let op = self
            .store
            .get_operation(subscription_id, operation_id)
            .await?
            .ok_or_else(|| FrontendError::operation_not_found(operation_id))?;
        if !is_visible(&op, ctx, subscription_id) {
            debug!(operation_id, "operation not visible to caller");
            return Err(FrontendError::operation_not_found(operation_id));
        }
        Ok(op)
    }

    pub async fn status(
        &self,
        ctx: &RequestContext,
        subscription_id: &str,
        operation_id: &str,
    ) -> FrontendResult<OperationStatusView> {
        let op = self.load_visible(ctx, subscription_id, operation_id).await?;
        Ok(op.to_status())
    }

    /// Non-terminal operations re-expose their polling headers. Failed or
    /// canceled operations are reported as internal errors.
    pub async fn result(
        &self,
        ctx: &RequestContext,
        subscription_id: &str,
        operation_id: &str,
    ) -> FrontendResult<OperationOutcome> {
        let op = self.load_visible(ctx, subscription_id, operation_id).await?;
        match op.status {
            ProvisioningState::Succeeded => Ok(OperationOutcome::Finished(op)),
            ProvisioningState::Failed | ProvisioningState::Canceled => {
                Err(FrontendError::Internal(format!(
                    "operation {} ended {}",
                    op.id, op.status
                )))
            }
            _ => {
                let result_path =
                    operation_result_path(subscription_id, &self.location, &op.id);
                let url = polling_url(ctx.referer.as_deref(), &result_path, &ctx.api_version);
                if let Ok(value) = HeaderValue::from_str(&url) {
                    ctx.headers.insert(LOCATION, value);
                }
                Ok(OperationOutcome::InProgress)
            }
        }
    }

    /// Cancels every active operation matching `filter`, in `tx`.
    ///
    /// A resource whose active operation is canceled is marked `Canceled`.
    /// Enqueue this before the writes of the superseding request.
    pub async fn cancel_active_operations(
        &self,
        tx: &mut Transaction,
        subscription_id: &str,
        filter: &OperationFilter,
    ) -> FrontendResult<usize> {
        let active = self
            .store
            .list_active_operations(subscription_id, filter)
            .await?;
        for mut op in active.iter().cloned() {
            op.cancel();
            tx.patch_operation(&op.id, op.status, op.error.clone());

            let Some(record) = self.store.get_resource(&op.external_id).await? else {
                continue;
            };
            if record.active_operation_id.as_deref() == Some(op.id.as_str()) {
                tx.patch_resource(
                    &op.external_id,
                    ResourceRecordPatch::new().provisioning_state(ProvisioningState::Canceled),
                )?;
            }
        }
        let count = active.len();
        if count > 0 {
            info!(count, subscription_id, "canceling superseded operations");
            let metrics = self.metrics.clone();
            tx.on_success(move |_| metrics.operations_canceled(count));
        }
        Ok(count)
    }

    /// Advances an operation, and the resource it drives when that
    /// resource still points at it. A succeeded delete removes the record.
    pub async fn update_operation_status(
        &self,
        subscription_id: &str,
        operation_id: &str,
        status: ProvisioningState,
        error: Option<CloudErrorBody>,
    ) -> FrontendResult<OperationRecord> {
        let op = self
            .store
            .get_operation(subscription_id, operation_id)
            .await?
            .ok_or_else(|| FrontendError::operation_not_found(operation_id))?;

        let mut tx = self.store.new_transaction(subscription_id);
        tx.patch_operation(&op.id, status, error);
        if let Some(record) = self.store.get_resource(&op.external_id).await? {
            if record.active_operation_id.as_deref() == Some(op.id.as_str()) {
                if op.request == OperationRequest::Delete && status == ProvisioningState::Succeeded {
                    tx.delete_resource(&op.external_id)?;
                } else {
                    let mut patch = ResourceRecordPatch::new().provisioning_state(status);
                    if status.is_terminal() {
                        patch = patch.active_operation_id(None);
                    }
                    tx.patch_resource(&op.external_id, patch)?;
                }
            }
        }
        let result = tx.execute().await?;
        result
            .get_operation(&op.id)
            .cloned()
            .ok_or_else(|| FrontendError::operation_not_found(operation_id))
    }
}

/// An operation is visible to the subscription it lives in and to the
/// tenant and client that started it.
pub fn is_visible(op: &OperationRecord, ctx: &RequestContext, subscription_id: &str) -> bool {
    let owner_matches =
        |stored: &str, requested: &str| stored.is_empty() || stored.eq_ignore_ascii_case(requested);
    op.operation_id.is_some()
        && owner_matches(&op.tenant_id, &ctx.tenant_id)
        && owner_matches(&op.client_id, &ctx.client_id)
        && op
            .external_id
            .subscription_id()
            .eq_ignore_ascii_case(subscription_id)
}

pub fn operation_result_path(subscription_id: &str, location: &str, operation_id: &str) -> String {
    format!(
        "/subscriptions/{subscription_id}/providers/{PROVIDER_NAMESPACE}/locations/{location}/{OPERATION_RESULT_TYPE_NAME}/{operation_id}"
    )
}

/// Absolute URL on the referer's scheme and host when one is known,
/// otherwise a path. Always carries the request's `api-version`.
pub fn polling_url(referer: Option<&str>, path: &str, api_version: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("api-version", api_version)
        .finish();
    match referer.and_then(|r| Url::parse(r).ok()) {
        Some(mut url) => {
            url.set_path(path);
            url.set_query(Some(&query));
            url.set_fragment(None);
            url.to_string()
        }
        None => format!("{path}?{query}"),
    }
}
