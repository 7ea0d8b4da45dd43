use super::middleware::RequestId;
use crate::api_version::DEFAULT_API_VERSION;
use crate::errors::ApiError;
use crate::server::AppState;
use crate::services::RequestContext;
use axum::{
    body::Bytes,
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use hcp_models::{CorrelationData, SystemData, codes};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::warn;

pub const API_VERSION_PARAM: &str = "api-version";

const HOME_TENANT_HEADER: &str = "x-ms-home-tenant-id";
const CLIENT_OBJECT_HEADER: &str = "x-ms-client-object-id";
const NOTIFICATION_URI_HEADER: &str = "azure-asyncnotificationuri";
const CLIENT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";
const CORRELATION_REQUEST_ID_HEADER: &str = "x-ms-correlation-request-id";
const SYSTEM_DATA_HEADER: &str = "x-ms-arm-resource-system-data";

/// Query parameters, decoded once.
#[derive(Debug, Clone, Default)]
pub struct QueryParams(HashMap<String, String>);

impl QueryParams {
    pub fn parse(query: Option<&str>) -> Self {
        Self(
            url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
                .into_owned()
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Request context for resource manager requests. Rejects requests whose
/// `api-version` is missing or unknown.
pub struct Arm(pub RequestContext);

impl FromRequestParts<AppState> for Arm {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let query = QueryParams::parse(parts.uri.query());
        let api_version = match query.get(API_VERSION_PARAM) {
            Some(version) if !version.is_empty() => version.to_string(),
            _ => {
                return Err(ApiError::bad_request(
                    codes::INVALID_PARAMETER,
                    "The api-version query parameter is required",
                ));
            }
        };
        if !state.versions.is_supported(&api_version) {
            return Err(ApiError::bad_request(
                codes::INVALID_RESOURCE_TYPE,
                format!(
                    "The resource type could not be found for api version '{api_version}'"
                ),
            ));
        }
        Ok(Arm(build_context(parts, &api_version)))
    }
}

/// Request context for subscription lifecycle calls, which use the
/// resource manager's own api-version rather than the provider's.
pub struct Lifecycle(pub RequestContext);

impl<S: Send + Sync> FromRequestParts<S> for Lifecycle {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let query = QueryParams::parse(parts.uri.query());
        let api_version = query.get(API_VERSION_PARAM).unwrap_or(DEFAULT_API_VERSION).to_string();
        Ok(Lifecycle(build_context(parts, &api_version)))
    }
}

fn build_context(parts: &Parts, api_version: &str) -> RequestContext {
    let headers = &parts.headers;
    let mut ctx = RequestContext::new(parts.method.clone(), api_version)
        .with_tenant(header(headers, HOME_TENANT_HEADER))
        .with_client(header(headers, CLIENT_OBJECT_HEADER))
        .with_notification_uri(header(headers, NOTIFICATION_URI_HEADER));
    if let Some(referer) = headers
        .get(axum::http::header::REFERER)
        .and_then(|v| v.to_str().ok())
    {
        ctx = ctx.with_referer(referer);
    }

    let mut correlation = CorrelationData::new(
        header(headers, CLIENT_REQUEST_ID_HEADER),
        header(headers, CORRELATION_REQUEST_ID_HEADER),
    );
    if let Some(RequestId(id)) = parts.extensions.get::<RequestId>() {
        correlation.request_id = id.clone();
    }
    ctx.correlation = correlation;
    ctx.system_data = system_data(headers);
    ctx
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn system_data(headers: &HeaderMap) -> Option<SystemData> {
    let raw = header(headers, SYSTEM_DATA_HEADER);
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str(raw) {
        Ok(data) => Some(data),
        Err(e) => {
            warn!(error = %e, "ignoring malformed {} header", SYSTEM_DATA_HEADER);
            None
        }
    }
}

/// Decodes a JSON request body into a cloud error on failure.
pub fn json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        ApiError::bad_request(
            codes::INVALID_REQUEST_CONTENT,
            format!("Failed to parse request body: {e}"),
        )
    })
}
