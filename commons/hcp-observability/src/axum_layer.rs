//! Axum middleware recording OpenTelemetry request metrics for the
//! resource provider API.
//!
//! ```ignore
//! let metrics = Arc::new(OtelMetrics::new(&meter));
//! let app = router
//!     .layer(axum::middleware::from_fn(otel_metrics_middleware))
//!     .layer(Extension(metrics));
//! ```

use axum::{
    body::Body,
    extract::{Extension, MatchedPath},
    http::Request,
    middleware::Next,
    response::Response,
};
use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, Meter, UpDownCounter},
};
use std::{sync::Arc, time::Instant};

/// Response header carrying the cloud error code.
const ERROR_CODE_HEADER: &str = "x-ms-error-code";

#[derive(Clone)]
pub struct OtelMetrics {
    requests: Counter<u64>,
    latency: Histogram<f64>,
    in_flight: UpDownCounter<i64>,
    failures: Counter<u64>,
}

impl OtelMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            requests: meter
                .u64_counter("rp_http_requests")
                .with_description("Requests received by the resource provider")
                .build(),
            latency: meter
                .f64_histogram("rp_http_request_seconds")
                .with_description("Request latency in seconds")
                .with_unit("s")
                .build(),
            in_flight: meter
                .i64_up_down_counter("rp_http_in_flight")
                .with_description("Requests currently being served")
                .build(),
            failures: meter
                .u64_counter("rp_http_failures")
                .with_description("Responses with a 4xx or 5xx status, by error code")
                .build(),
        }
    }
}

fn api_version(req: &Request<Body>) -> String {
    req.uri()
        .query()
        .and_then(|q| {
            q.split('&')
                .find_map(|pair| pair.strip_prefix("api-version="))
        })
        .unwrap_or("none")
        .to_string()
}

/// Labels every request by method, route template and api-version.
/// Failures additionally carry the status and the `x-ms-error-code`.
pub async fn otel_metrics_middleware(
    Extension(metrics): Extension<Arc<OtelMetrics>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    // Unmatched paths share one label to keep cardinality bounded.
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let labels = [
        KeyValue::new("http.method", req.method().as_str().to_string()),
        KeyValue::new("http.route", route),
        KeyValue::new("api_version", api_version(&req)),
    ];

    metrics.in_flight.add(1, &labels);
    let started = Instant::now();
    let response = next.run(req).await;
    metrics.in_flight.add(-1, &labels);

    let status = response.status();
    let mut outcome = labels.to_vec();
    outcome.push(KeyValue::new("http.status_code", i64::from(status.as_u16())));
    metrics.requests.add(1, &outcome);
    metrics
        .latency
        .record(started.elapsed().as_secs_f64(), &outcome);

    if status.is_client_error() || status.is_server_error() {
        let code = response
            .headers()
            .get(ERROR_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        outcome.push(KeyValue::new("error_code", code));
        metrics.failures.add(1, &outcome);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_metrics;
    use axum::{Router, http::StatusCode, routing::get};
    use tower::ServiceExt;

    #[test]
    fn api_version_is_read_from_the_query() {
        let req = Request::get("/x?foo=1&api-version=2024-06-10-preview")
            .body(Body::empty())
            .unwrap();
        assert_eq!(api_version(&req), "2024-06-10-preview");
        let req = Request::get("/x").body(Body::empty()).unwrap();
        assert_eq!(api_version(&req), "none");
    }

    #[tokio::test]
    async fn responses_pass_through_unchanged() {
        let handle = local_metrics("test-service");
        let metrics = Arc::new(OtelMetrics::new(&handle.meter()));
        let app = Router::new()
            .route("/ok", get(|| async { "ok" }))
            .route(
                "/conflict",
                get(|| async { (StatusCode::CONFLICT, [(ERROR_CODE_HEADER, "Conflict")]) }),
            )
            .layer(axum::middleware::from_fn(otel_metrics_middleware))
            .layer(Extension(metrics));

        let ok = app
            .clone()
            .oneshot(Request::get("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);

        let conflict = app
            .oneshot(Request::get("/conflict").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        assert_eq!(conflict.headers()[ERROR_CODE_HEADER], "Conflict");
    }
}
