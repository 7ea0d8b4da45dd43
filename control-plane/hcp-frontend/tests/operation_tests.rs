// Operation polling, cascading deletes and credential actions.
mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use common::*;
use hcp_frontend::cs::{CallKind, CallVerb};
use hcp_models::{ProvisioningState, codes};
use hcp_storage::{OperationFilter, OperationStorage};

#[tokio::test]
async fn status_polling_follows_the_operation() -> Result<()> {
    let app = TestApp::registered().await?;
    let id = cluster_id("dev");
    let created = app
        .send(Method::PUT, &versioned(id.as_str()), Some(serde_json::json!({ "location": LOCATION })))
        .await?;
    let status_url = relative(created.header("azure-asyncoperation").expect("status header"));

    let reply = app.send(Method::GET, &status_url, None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "Accepted");
    assert!(reply.body.get("endTime").is_none());

    let op_id = app.complete(&id).await?;
    let reply = app.send(Method::GET, &status_url, None).await?;
    assert_eq!(reply.body["status"], "Succeeded");
    assert_eq!(reply.body["name"], op_id.as_str());
    assert!(reply.body["endTime"].is_string());
    assert_eq!(
        app.record(&id).await?.unwrap().provisioning_state,
        ProvisioningState::Succeeded
    );
    Ok(())
}

#[tokio::test]
async fn result_reports_progress_then_the_resource() -> Result<()> {
    let app = TestApp::registered().await?;
    let id = app.create_cluster("dev").await?;
    let op_id = app.record(&id).await?.unwrap().active_operation_id.unwrap();

    let reply = app.send(Method::GET, &result_path(&op_id), None).await?;
    assert_eq!(reply.status, StatusCode::ACCEPTED);
    assert!(reply.header("location").is_some());

    app.complete(&id).await?;
    let reply = app.send(Method::GET, &result_path(&op_id), None).await?;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["name"], "dev");
    assert_eq!(reply.body["properties"]["provisioningState"], "Succeeded");
    Ok(())
}

#[tokio::test]
async fn result_of_delete_has_no_body() -> Result<()> {
    let app = TestApp::registered().await?;
    let id = app.create_cluster("dev").await?;
    let deleted = app.send(Method::DELETE, &versioned(id.as_str()), None).await?;
    let result_url = relative(deleted.header("location").expect("result header"));

    let op_id = app.complete(&id).await?;
    assert!(app.record(&id).await?.is_none());
    let reply = app.send(Method::GET, &result_url, None).await?;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    assert!(reply.body.is_null());
    assert!(result_url.contains(&op_id));
    Ok(())
}

#[tokio::test]
async fn operations_are_private_to_their_tenant() -> Result<()> {
    let app = TestApp::registered().await?;
    let id = cluster_id("dev");
    let tenant_a = [("x-ms-home-tenant-id", "tenant-a")];
    app.send_with(
        Method::PUT,
        &versioned(id.as_str()),
        Some(serde_json::json!({ "location": LOCATION })),
        &tenant_a,
    )
    .await?;
    let op_id = app.complete(&id).await?;

    let reply = app
        .send_with(
            Method::GET,
            &result_path(&op_id),
            None,
            &[("x-ms-home-tenant-id", "tenant-b")],
        )
        .await?;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = app
        .send_with(Method::GET, &result_path(&op_id), None, &[("x-ms-home-tenant-id", "TENANT-A")])
        .await?;
    assert_eq!(reply.status, StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn unknown_operation_is_not_found() -> Result<()> {
    let app = TestApp::registered().await?;
    let reply = app.send(Method::GET, &result_path("missing"), None).await?;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn cascading_delete_is_atomic() -> Result<()> {
    let app = TestApp::registered().await?;
    let cluster = app.create_cluster("dev").await?;
    let pool = app.create_node_pool(&cluster, "np1").await?;
    let auth = app.create_external_auth(&cluster, "entra").await?;

    let mut superseded = Vec::new();
    for id in [&cluster, &pool, &auth] {
        superseded.push(app.record(id).await?.unwrap().active_operation_id.unwrap());
    }
    assert_eq!(app.store.operation_count(SUB).await, 3);

    app.store.fail_next_commits(1);
    let reply = app.send(Method::DELETE, &versioned(cluster.as_str()), None).await?;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.error_code(), codes::INTERNAL_SERVER_ERROR);
    assert_eq!(app.store.operation_count(SUB).await, 3);
    for id in [&cluster, &pool, &auth] {
        assert_eq!(
            app.record(id).await?.unwrap().provisioning_state,
            ProvisioningState::Accepted
        );
    }
    for op_id in &superseded {
        let op = app.store.get_operation(SUB, op_id).await?.unwrap();
        assert_eq!(op.status, ProvisioningState::Accepted);
    }

    // The upstream delete already happened; the retry proceeds past the 404.
    let reply = app.send(Method::DELETE, &versioned(cluster.as_str()), None).await?;
    assert_eq!(reply.status, StatusCode::ACCEPTED);
    assert_eq!(app.control_plane.count_calls(CallKind::Cluster, CallVerb::Delete), 2);

    assert_eq!(app.store.operation_count(SUB).await, 3 + 3);
    for op_id in &superseded {
        let op = app.store.get_operation(SUB, op_id).await?.unwrap();
        assert_eq!(op.status, ProvisioningState::Canceled);
        assert_eq!(op.error.unwrap().code, codes::CANCELED);
    }
    let active = app
        .store
        .list_active_operations(SUB, &OperationFilter::default())
        .await?;
    assert_eq!(active.len(), 3);
    for id in [&cluster, &pool, &auth] {
        let record = app.record(id).await?.unwrap();
        assert_eq!(record.provisioning_state, ProvisioningState::Deleting);
        let op_id = record.active_operation_id.unwrap();
        assert!(active.iter().any(|op| op.id == op_id && op.external_id == *id));
    }
    let exposed = active.iter().filter(|op| op.operation_id.is_some()).count();
    assert_eq!(exposed, 1);
    Ok(())
}

#[tokio::test]
async fn child_delete_cancels_only_its_own_operation() -> Result<()> {
    let app = TestApp::registered().await?;
    let id = app.create_cluster("dev").await?;
    let pool = app.create_node_pool(&id, "np1").await?;
    let create_op = app.record(&pool).await?.unwrap().active_operation_id.unwrap();

    let reply = app.send(Method::DELETE, &versioned(pool.as_str()), None).await?;
    assert_eq!(reply.status, StatusCode::ACCEPTED);
    let op = app.store.get_operation(SUB, &create_op).await?.unwrap();
    assert_eq!(op.status, ProvisioningState::Canceled);
    // The cluster's own operation is untouched.
    let cluster_op = app.record(&id).await?.unwrap().active_operation_id.unwrap();
    let op = app.store.get_operation(SUB, &cluster_op).await?.unwrap();
    assert_eq!(op.status, ProvisioningState::Accepted);
    Ok(())
}

fn action(cluster: &hcp_models::ResourceId, name: &str) -> String {
    versioned(&format!("{}/{name}", cluster.as_str()))
}

#[tokio::test]
async fn credential_request_and_result() -> Result<()> {
    let app = TestApp::registered().await?;
    let cluster = app.create_cluster("dev").await?;

    let reply = app
        .send(Method::POST, &action(&cluster, "requestadmincredential"), None)
        .await?;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    app.complete(&cluster).await?;
    let reply = app
        .send(Method::POST, &action(&cluster, "requestadmincredential"), None)
        .await?;
    assert_eq!(reply.status, StatusCode::ACCEPTED);
    let result_url = relative(reply.header("location").expect("result header"));
    let record = app.record(&cluster).await?.unwrap();
    assert_eq!(record.provisioning_state, ProvisioningState::Succeeded);
    assert!(record.active_operation_id.is_none());

    let pending = app.send(Method::GET, &result_url, None).await?;
    assert_eq!(pending.status, StatusCode::ACCEPTED);

    let op_id = result_url
        .split('?')
        .next()
        .and_then(|path| path.rsplit('/').next())
        .unwrap()
        .to_string();
    app.state
        .operations
        .update_operation_status(SUB, &op_id, ProvisioningState::Succeeded, None)
        .await?;
    let reply = app.send(Method::GET, &result_url, None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body["kubeconfig"].as_str().unwrap().contains("kind: Config"));
    assert!(reply.body["expirationTimestamp"].is_string());
    Ok(())
}

#[tokio::test]
async fn revocation_blocks_new_credentials() -> Result<()> {
    let app = TestApp::registered().await?;
    let cluster = app.create_cluster("dev").await?;
    app.complete(&cluster).await?;

    let requested = app
        .send(Method::POST, &action(&cluster, "requestadmincredential"), None)
        .await?;
    assert_eq!(requested.status, StatusCode::ACCEPTED);

    let reply = app
        .send(Method::POST, &action(&cluster, "revokecredentials"), None)
        .await?;
    assert_eq!(reply.status, StatusCode::ACCEPTED);
    assert_eq!(
        app.control_plane.count_calls(CallKind::BreakGlass, CallVerb::Delete),
        1
    );
    let pending_requests = app
        .store
        .list_active_operations(
            SUB,
            &OperationFilter::for_resource(&cluster)
                .requests(&[hcp_models::OperationRequest::RequestCredential]),
        )
        .await?;
    assert!(pending_requests.is_empty());

    let reply = app
        .send(Method::POST, &action(&cluster, "requestadmincredential"), None)
        .await?;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.header("retry-after"), Some("10"));
    assert_eq!(
        reply.body["error"]["message"],
        "Cannot request credential while credentials are being revoked"
    );

    let reply = app
        .send(Method::POST, &action(&cluster, "revokecredentials"), None)
        .await?;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(
        reply.body["error"]["message"],
        "Credentials are already being revoked"
    );
    Ok(())
}
