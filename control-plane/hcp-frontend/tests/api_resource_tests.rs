// Resource CRUD through the router: clusters, node pools, external auths.
mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use common::*;
use hcp_frontend::cs::{CallKind, CallVerb};
use hcp_models::{NODE_POOL_TYPE_NAME, ProvisioningState, codes};
use hcp_storage::OperationStorage;
use serde_json::json;

#[tokio::test]
async fn health_endpoint() -> Result<()> {
    let app = TestApp::new();
    let reply = app.send(Method::GET, "/health", None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "healthy");
    assert_eq!(reply.body["service"], "hcp-frontend");
    assert!(reply.body["timestamp"].is_string());
    assert!(reply.header("x-ms-request-id").is_some());
    Ok(())
}

#[tokio::test]
async fn create_persists_record_and_operation() -> Result<()> {
    let app = TestApp::registered().await?;
    let id = cluster_id("dev");

    let reply = app
        .send_with(
            Method::PUT,
            &versioned(id.as_str()),
            Some(json!({ "location": LOCATION, "tags": { "env": "dev" } })),
            &[("x-ms-home-tenant-id", "tenant-a")],
        )
        .await?;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["name"], "dev");
    assert_eq!(reply.body["properties"]["provisioningState"], "Accepted");
    assert_eq!(reply.body["properties"]["versionId"], "4.19");
    assert!(reply.body["properties"]["apiUrl"].is_string());
    assert!(reply.header("azure-asyncoperation").is_some());
    assert!(reply.header("location").is_none());

    let record = app.record(&id).await?.expect("resource record");
    let op_id = record.active_operation_id.clone().expect("active operation");
    let op = app
        .store
        .get_operation(SUB, &op_id)
        .await?
        .expect("operation record");
    assert_eq!(record.provisioning_state, op.status);
    assert_eq!(op.status, ProvisioningState::Accepted);
    assert_eq!(op.tenant_id, "tenant-a");
    assert_eq!(record.tags.unwrap()["env"], "dev");
    assert!(record.internal_id.is_some());
    Ok(())
}

#[tokio::test]
async fn api_version_is_required_and_checked() -> Result<()> {
    let app = TestApp::registered().await?;
    let id = cluster_id("dev");

    let reply = app.send(Method::GET, id.as_str(), None).await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.error_code(), codes::INVALID_PARAMETER);

    let reply = app
        .send(Method::GET, &format!("{}?api-version=1999-01-01", id.as_str()), None)
        .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.error_code(), codes::INVALID_RESOURCE_TYPE);
    assert_eq!(reply.header("x-ms-error-code"), Some(codes::INVALID_RESOURCE_TYPE));
    Ok(())
}

#[tokio::test]
async fn get_returns_merged_state() -> Result<()> {
    let app = TestApp::registered().await?;
    let id = app.create_cluster("dev").await?;

    let reply = app.send(Method::GET, &versioned(id.as_str()), None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["id"], id.as_str());
    assert_eq!(reply.body["location"], LOCATION);
    assert_eq!(reply.body["properties"]["channelGroup"], "stable");

    let missing = app
        .send(Method::GET, &versioned(cluster_id("nope").as_str()), None)
        .await?;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.error_code(), codes::RESOURCE_NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn patch_while_provisioning_conflicts() -> Result<()> {
    let app = TestApp::registered().await?;
    let id = app.create_cluster("dev").await?;
    let op_id = app.record(&id).await?.unwrap().active_operation_id.unwrap();
    app.state
        .operations
        .update_operation_status(SUB, &op_id, ProvisioningState::Provisioning, None)
        .await?;

    let reply = app
        .send(
            Method::PATCH,
            &versioned(id.as_str()),
            Some(json!({ "properties": { "nodeDrainTimeoutMinutes": 5 } })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.error_code(), codes::CONFLICT);
    let message = reply.body["error"]["message"].as_str().unwrap();
    assert!(message.contains("provisioning"), "{message}");
    assert_eq!(app.control_plane.count_calls(CallKind::Cluster, CallVerb::Update), 0);
    Ok(())
}

#[tokio::test]
async fn tags_are_kept_unless_sent() -> Result<()> {
    let app = TestApp::registered().await?;
    let id = cluster_id("dev");
    app.send(
        Method::PUT,
        &versioned(id.as_str()),
        Some(json!({ "location": LOCATION, "tags": { "env": "dev" } })),
    )
    .await?;
    app.complete(&id).await?;

    let reply = app
        .send(
            Method::PATCH,
            &versioned(id.as_str()),
            Some(json!({ "properties": { "nodeDrainTimeoutMinutes": 5 } })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::ACCEPTED);
    assert_eq!(reply.body["tags"]["env"], "dev");
    assert!(reply.header("location").is_some());
    assert_eq!(
        app.record(&id).await?.unwrap().provisioning_state,
        ProvisioningState::Accepted
    );
    app.complete(&id).await?;

    let reply = app
        .send(Method::PATCH, &versioned(id.as_str()), Some(json!({ "tags": {} })))
        .await?;
    assert_eq!(reply.status, StatusCode::ACCEPTED);
    let record = app.record(&id).await?.unwrap();
    assert!(record.tags.unwrap_or_default().is_empty());
    Ok(())
}

#[tokio::test]
async fn put_on_existing_resource_updates_it() -> Result<()> {
    let app = TestApp::registered().await?;
    let id = app.create_cluster("dev").await?;
    app.complete(&id).await?;
    let before = app.send(Method::GET, &versioned(id.as_str()), None).await?;

    let reply = app
        .send(
            Method::PUT,
            &versioned(id.as_str()),
            Some(json!({ "location": LOCATION, "properties": { "nodeDrainTimeoutMinutes": 30 } })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["properties"]["nodeDrainTimeoutMinutes"], 30);
    assert_eq!(
        reply.body["properties"]["managedResourceGroup"],
        before.body["properties"]["managedResourceGroup"]
    );
    assert_eq!(app.control_plane.count_calls(CallKind::Autoscaler, CallVerb::Update), 1);
    Ok(())
}

#[tokio::test]
async fn immutable_fields_fail_validation() -> Result<()> {
    let app = TestApp::registered().await?;
    let id = app.create_cluster("dev").await?;
    app.complete(&id).await?;

    let reply = app
        .send(
            Method::PATCH,
            &versioned(id.as_str()),
            Some(json!({ "properties": { "serviceCidr": "172.31.0.0/16" } })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"]["target"], "properties.serviceCidr");
    Ok(())
}

#[tokio::test]
async fn invalid_create_reports_every_field() -> Result<()> {
    let app = TestApp::registered().await?;
    let id = cluster_id("dev");

    let reply = app
        .send(
            Method::PUT,
            &versioned(id.as_str()),
            Some(json!({
                "location": LOCATION,
                "properties": { "podCidr": "nope", "apiVisibility": "Hidden" }
            })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.error_code(), codes::MULTIPLE_ERRORS_OCCURRED);
    assert_eq!(reply.body["error"]["details"].as_array().unwrap().len(), 2);
    assert!(app.record(&id).await?.is_none());
    assert_eq!(app.control_plane.cluster_count(), 0);
    Ok(())
}

#[tokio::test]
async fn body_name_must_match_path() -> Result<()> {
    let app = TestApp::registered().await?;
    let reply = app
        .send(
            Method::PUT,
            &versioned(cluster_id("dev").as_str()),
            Some(json!({ "name": "other", "location": LOCATION })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn upstream_rejection_passes_through() -> Result<()> {
    let app = TestApp::registered().await?;
    app.control_plane
        .fail(CallKind::Cluster, CallVerb::Create, 400, "Version is not available");

    let id = cluster_id("dev");
    let reply = app
        .send(Method::PUT, &versioned(id.as_str()), Some(json!({ "location": LOCATION })))
        .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"]["message"], "Version is not available");
    assert!(app.record(&id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn delete_of_missing_resource_is_no_content() -> Result<()> {
    let app = TestApp::registered().await?;
    let reply = app
        .send(Method::DELETE, &versioned(cluster_id("ghost").as_str()), None)
        .await?;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    assert!(reply.body.is_null());
    assert_eq!(app.store.operation_count(SUB).await, 0);
    assert_eq!(app.store.resource_count(SUB).await, 0);
    Ok(())
}

#[tokio::test]
async fn delete_twice_conflicts() -> Result<()> {
    let app = TestApp::registered().await?;
    let id = app.create_cluster("dev").await?;

    let reply = app.send(Method::DELETE, &versioned(id.as_str()), None).await?;
    assert_eq!(reply.status, StatusCode::ACCEPTED);
    assert!(reply.header("location").is_some());
    assert!(reply.header("azure-asyncoperation").is_some());

    let reply = app.send(Method::DELETE, &versioned(id.as_str()), None).await?;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn update_of_resource_missing_upstream_cleans_up() -> Result<()> {
    let app = TestApp::registered().await?;
    let id = app.create_cluster("dev").await?;
    let pool = app.create_node_pool(&id, "np1").await?;
    app.complete(&id).await?;
    app.control_plane
        .fail(CallKind::Cluster, CallVerb::Update, 404, "Cluster not found");

    let reply = app
        .send(
            Method::PATCH,
            &versioned(id.as_str()),
            Some(json!({ "properties": { "nodeDrainTimeoutMinutes": 5 } })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert!(app.record(&id).await?.is_none());
    assert!(app.record(&pool).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn delete_of_resource_missing_upstream_still_proceeds() -> Result<()> {
    let app = TestApp::registered().await?;
    let id = app.create_cluster("dev").await?;
    let internal = app.record(&id).await?.unwrap().internal_id.unwrap();
    app.control_plane.remove(&internal);

    let reply = app.send(Method::DELETE, &versioned(id.as_str()), None).await?;
    assert_eq!(reply.status, StatusCode::ACCEPTED);
    assert_eq!(
        app.record(&id).await?.unwrap().provisioning_state,
        ProvisioningState::Deleting
    );
    Ok(())
}

#[tokio::test]
async fn list_pages_follow_the_continuation_token() -> Result<()> {
    let app = TestApp::with_policy(hcp_frontend::config::FrontendPolicy {
        list_page_size: 2,
        ..Default::default()
    });
    app.register(SUB, "Registered").await?;
    for i in 0..5 {
        app.create_cluster(&format!("cluster{i}")).await?;
    }

    let uri = versioned(&format!(
        "/subscriptions/{SUB}/resourceGroups/{RG}/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters"
    ));
    let first = app.send(Method::GET, &uri, None).await?;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["value"].as_array().unwrap().len(), 2);
    let next = first.body["nextLink"].as_str().expect("next link").to_string();
    assert!(next.contains("%24skipToken=") || next.contains("$skipToken="));

    let second = app.send(Method::GET, &next, None).await?;
    assert_eq!(second.status, StatusCode::OK);
    let mut names: Vec<&str> = second.body["value"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["cluster2", "cluster3"]);
    assert!(second.body["nextLink"].is_string());

    let third = app
        .send(Method::GET, second.body["nextLink"].as_str().unwrap(), None)
        .await?;
    assert_eq!(third.body["value"].as_array().unwrap().len(), 1);
    assert!(third.body.get("nextLink").is_none());
    Ok(())
}

#[tokio::test]
async fn list_by_subscription_spans_resource_groups() -> Result<()> {
    let app = TestApp::registered().await?;
    app.create_cluster("dev").await?;
    let other = hcp_models::ResourceId::cluster(SUB, "other-rg", "prod");
    app.send(Method::PUT, &versioned(other.as_str()), Some(json!({ "location": LOCATION })))
        .await?;

    let reply = app
        .send(
            Method::GET,
            &versioned(&format!(
                "/subscriptions/{SUB}/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters"
            )),
            None,
        )
        .await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["value"].as_array().unwrap().len(), 2);
    Ok(())
}

#[tokio::test]
async fn node_pool_lifecycle() -> Result<()> {
    let app = TestApp::registered().await?;
    let cluster = app.create_cluster("dev").await?;
    let pool = app.create_node_pool(&cluster, "np1").await?;

    let reply = app.send(Method::GET, &versioned(pool.as_str()), None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["properties"]["versionId"], "4.19.0");
    assert_eq!(reply.body["properties"]["osDiskSizeGib"], 64);

    let list = app
        .send(
            Method::GET,
            &versioned(&format!("{}/{NODE_POOL_TYPE_NAME}", cluster.as_str())),
            None,
        )
        .await?;
    assert_eq!(list.body["value"].as_array().unwrap().len(), 1);

    let reply = app.send(Method::DELETE, &versioned(pool.as_str()), None).await?;
    assert_eq!(reply.status, StatusCode::ACCEPTED);
    Ok(())
}

#[tokio::test]
async fn node_pool_admission_checks_the_cluster() -> Result<()> {
    let app = TestApp::registered().await?;
    let cluster = app.create_cluster("dev").await?;
    let pool = cluster.child(NODE_POOL_TYPE_NAME, "np1");

    let reply = app
        .send(
            Method::PUT,
            &versioned(pool.as_str()),
            Some(json!({
                "location": LOCATION,
                "properties": { "vmSize": "Standard_D8s_v3", "channelGroup": "candidate" }
            })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.control_plane.count_calls(CallKind::NodePool, CallVerb::Create), 0);
    Ok(())
}

#[tokio::test]
async fn child_of_missing_cluster_is_not_found() -> Result<()> {
    let app = TestApp::registered().await?;
    let pool = cluster_id("ghost").child(NODE_POOL_TYPE_NAME, "np1");
    let reply = app
        .send(
            Method::PUT,
            &versioned(pool.as_str()),
            Some(json!({ "properties": { "vmSize": "Standard_D8s_v3" } })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn children_conflict_while_cluster_is_deleting() -> Result<()> {
    let app = TestApp::registered().await?;
    let cluster = app.create_cluster("dev").await?;
    app.send(Method::DELETE, &versioned(cluster.as_str()), None).await?;

    let pool = cluster.child(NODE_POOL_TYPE_NAME, "np1");
    let reply = app
        .send(
            Method::PUT,
            &versioned(pool.as_str()),
            Some(json!({ "properties": { "vmSize": "Standard_D8s_v3" } })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert!(
        reply.body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("parent resource is deleting")
    );
    Ok(())
}

#[tokio::test]
async fn external_auth_lifecycle() -> Result<()> {
    let app = TestApp::registered().await?;
    let cluster = app.create_cluster("dev").await?;
    let auth = app.create_external_auth(&cluster, "entra").await?;
    app.complete(&auth).await?;

    let reply = app
        .send(
            Method::PATCH,
            &versioned(auth.as_str()),
            Some(json!({ "properties": { "usernameClaim": "sub" } })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::ACCEPTED, "{}", reply.body);
    assert_eq!(reply.body["properties"]["usernameClaim"], "sub");

    let reply = app.send(Method::DELETE, &versioned(auth.as_str()), None).await?;
    assert_eq!(reply.status, StatusCode::ACCEPTED);
    Ok(())
}
