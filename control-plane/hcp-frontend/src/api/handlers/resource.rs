//! Verb handlers shared by every resource kind.

use crate::api::extractors::{QueryParams, json_body};
use crate::api::views::{ResourceList, SKIP_TOKEN_PARAM, TOP_PARAM, next_link, respond, respond_empty};
use crate::errors::ApiError;
use crate::services::{Deleted, KindAdapter, RequestContext, ResourceService, Written};
use axum::{
    body::Bytes,
    http::{StatusCode, Uri},
    response::Response,
};
use hcp_models::ResourceId;
use serde_json::Value;

pub(crate) async fn get<A: KindAdapter>(
    service: &ResourceService<A>,
    ctx: &RequestContext,
    id: &ResourceId,
) -> Result<Response, ApiError> {
    let model = service.get(id).await?;
    Ok(respond(ctx, StatusCode::OK, Some(&model)))
}

pub(crate) async fn put<A: KindAdapter>(
    service: &ResourceService<A>,
    ctx: &RequestContext,
    id: &ResourceId,
    body: &Bytes,
) -> Result<Response, ApiError> {
    let body: Value = json_body(body)?;
    let response = match service.create_or_update(ctx, id, &body).await? {
        Written::Created(model) => respond(ctx, StatusCode::CREATED, Some(&model)),
        Written::Updated(model) => respond(ctx, StatusCode::OK, Some(&model)),
    };
    Ok(response)
}

pub(crate) async fn patch<A: KindAdapter>(
    service: &ResourceService<A>,
    ctx: &RequestContext,
    id: &ResourceId,
    body: &Bytes,
) -> Result<Response, ApiError> {
    let body: Value = json_body(body)?;
    let model = service.patch(ctx, id, &body).await?;
    Ok(respond(ctx, StatusCode::ACCEPTED, Some(&model)))
}

pub(crate) async fn delete<A: KindAdapter>(
    service: &ResourceService<A>,
    ctx: &RequestContext,
    id: &ResourceId,
) -> Result<Response, ApiError> {
    let status = match service.delete(ctx, id).await? {
        Deleted::Accepted => StatusCode::ACCEPTED,
        Deleted::NoContent => StatusCode::NO_CONTENT,
    };
    Ok(respond_empty(ctx, status))
}

/// `$top` only applies when continuing from a `$skipToken`.
pub(crate) async fn list<A: KindAdapter>(
    service: &ResourceService<A>,
    ctx: &RequestContext,
    uri: &Uri,
    scope: &ResourceId,
    parent: Option<&ResourceId>,
) -> Result<Response, ApiError> {
    let query = QueryParams::parse(uri.query());
    let skip_token = query.get(SKIP_TOKEN_PARAM).map(str::to_string);
    let top = skip_token
        .as_ref()
        .and_then(|_| query.get(TOP_PARAM))
        .and_then(|top| top.parse::<usize>().ok())
        .filter(|top| *top > 0);

    let page = service.list(scope, parent, top, skip_token).await?;
    let body = ResourceList {
        value: page.items,
        next_link: page
            .continuation_token
            .map(|token| next_link(ctx, uri, &token)),
    };
    Ok(respond(ctx, StatusCode::OK, Some(&body)))
}
