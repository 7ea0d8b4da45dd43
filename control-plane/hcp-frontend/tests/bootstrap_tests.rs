use anyhow::Result;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use hcp_frontend::{
    bootstrap::{Frontend, create_control_plane},
    build_api_server_from_env,
    config::ControlPlaneConfig,
    cs::ControlPlaneClient,
};
use hcp_models::InternalId;
use hcp_test_utils::Env;
use serial_test::serial;
use tower::ServiceExt;

#[tokio::test]
#[serial]
async fn server_builds_from_environment() -> Result<()> {
    let _env = Env::new()
        .unset("CONTROL_PLANE_URL")
        .unset("OTEL_EXPORTER_OTLP_ENDPOINT")
        .set("STORAGE_TYPE", "memory")
        .set("METRICS_ENABLED", "true")
        .set("LOCK_ENABLED", "true");

    let Frontend { server, metrics } = build_api_server_from_env().await?;
    let response = server
        .into_router()
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let health: serde_json::Value = serde_json::from_slice(&body)?;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["components"]["storage"]["status"], "Healthy");
    metrics.shutdown();
    Ok(())
}

#[tokio::test]
#[serial]
async fn lifecycle_routes_work_with_the_lease_enabled() -> Result<()> {
    let _env = Env::new()
        .unset("CONTROL_PLANE_URL")
        .unset("OTEL_EXPORTER_OTLP_ENDPOINT")
        .set("LOCK_ENABLED", "true")
        .set("METRICS_ENABLED", "false");
    let Frontend { server, metrics } = build_api_server_from_env().await?;
    let router = server.into_router();

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/subscriptions/sub1")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"state":"Registered"}"#))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let cluster = "/subscriptions/sub1/resourceGroups/rg/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/dev?api-version=2024-06-10-preview";
    for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri(cluster)
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"location":"eastus"}"#))?,
            )
            .await?;
        assert_eq!(response.status(), expected);
    }
    metrics.shutdown();
    Ok(())
}

#[tokio::test]
async fn control_plane_selection_follows_the_url() -> Result<()> {
    let memory = create_control_plane(&ControlPlaneConfig::default())?;
    let err = memory
        .get_cluster(&InternalId::cluster("missing"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let http = create_control_plane(&ControlPlaneConfig {
        url: Some("http://127.0.0.1:1".to_string()),
        timeout_seconds: 1,
        token: None,
    });
    assert!(http.is_ok());
    Ok(())
}
