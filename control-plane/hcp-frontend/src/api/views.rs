use crate::errors::ApiError;
use crate::services::RequestContext;
use axum::{
    Json,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;
use url::Url;

pub const SKIP_TOKEN_PARAM: &str = "$skipToken";
pub const TOP_PARAM: &str = "$top";

/// One page of a collection in the resource manager's list envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceList<T> {
    pub value: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_link: Option<String>,
}

/// Builds a response carrying the headers collected on `ctx`.
pub fn respond<T: Serialize>(ctx: &RequestContext, status: StatusCode, body: Option<&T>) -> Response {
    let mut response = match body {
        Some(body) => match serde_json::to_value(body) {
            Ok(value) => (status, Json(value)).into_response(),
            Err(e) => {
                error!(error = %e, "failed to encode response body");
                return ApiError::internal().into_response();
            }
        },
        None => status.into_response(),
    };
    response.headers_mut().extend(ctx.headers.snapshot());
    response
}

pub fn respond_empty(ctx: &RequestContext, status: StatusCode) -> Response {
    respond::<()>(ctx, status, None)
}

/// The request URL with `$skipToken` set to `token`. Built on the referer
/// when the resource manager supplied one.
pub fn next_link(ctx: &RequestContext, uri: &Uri, token: &str) -> String {
    let base = ctx
        .referer
        .as_deref()
        .and_then(|r| Url::parse(r).ok())
        .or_else(|| Url::parse(&format!("http://localhost{uri}")).ok());
    let Some(mut url) = base else {
        return format!("{}?{}={}", uri.path(), SKIP_TOKEN_PARAM, token);
    };
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !key.eq_ignore_ascii_case(SKIP_TOKEN_PARAM))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(SKIP_TOKEN_PARAM, token);

    if ctx.referer.is_some() {
        url.to_string()
    } else {
        match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        }
    }
}
