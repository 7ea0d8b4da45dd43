use crate::errors::ApiError;
use crate::server::AppState;
use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower::ServiceBuilder;
use tower_http::{
    classify::ServerErrorsAsFailures, classify::SharedClassifier, cors::CorsLayer,
    trace::TraceLayer,
};

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-ms-request-id");

/// Id assigned to the request on arrival; echoed as `x-ms-request-id`.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

pub fn create_middleware_stack() -> ServiceBuilder<
    tower::layer::util::Stack<
        CorsLayer,
        tower::layer::util::Stack<
            TraceLayer<SharedClassifier<ServerErrorsAsFailures>>,
            tower::layer::util::Identity,
        >,
    >,
> {
    ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = uuid::Uuid::new_v4().to_string();
    req.extensions_mut().insert(RequestId(id.clone()));
    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Rejects resource requests the subscription's registration state does
/// not allow.
pub async fn subscription_gate(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(subscription_id) = subscription_of(req.uri().path()) else {
        return next.run(req).await;
    };
    match state
        .subscriptions
        .gate(&subscription_id, req.method())
        .await
    {
        Ok(()) => next.run(req).await,
        Err(e) => ApiError::from(e).into_response(),
    }
}

fn subscription_of(path: &str) -> Option<String> {
    let mut segments = path.trim_start_matches('/').split('/');
    match (segments.next(), segments.next()) {
        (Some(first), Some(id)) if first.eq_ignore_ascii_case("subscriptions") && !id.is_empty() => {
            Some(id.to_string())
        }
        _ => None,
    }
}
