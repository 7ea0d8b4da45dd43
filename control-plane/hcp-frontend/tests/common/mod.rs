#![allow(dead_code)]

use anyhow::Result;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
};
use hcp_frontend::{
    api_version::{ApiVersionRegistry, DEFAULT_API_VERSION},
    bootstrap::{Collaborators, build_app_state},
    config::{FrontendPolicy, ServerConfig},
    cs::MemoryControlPlane,
    server::{ApiServer, AppState},
};
use hcp_models::{
    EXTERNAL_AUTH_TYPE_NAME, NODE_POOL_TYPE_NAME, OPERATION_RESULT_TYPE_NAME, PROVIDER_NAMESPACE,
    ResourceId, ResourceRecord,
};
use hcp_observability::build_metrics;
use hcp_storage::{ResourceStorage, memory::MemoryDocumentStore};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

pub const SUB: &str = "00000000-0000-0000-0000-000000000001";
pub const RG: &str = "rg";
pub const LOCATION: &str = "eastus";

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Reply {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn error_code(&self) -> &str {
        self.body["error"]["code"].as_str().unwrap_or_default()
    }
}

/// Router over in-memory backends, with handles on both backends for
/// inspection and fault injection.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: MemoryDocumentStore,
    pub control_plane: MemoryControlPlane,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_policy(FrontendPolicy::default())
    }

    pub fn with_policy(policy: FrontendPolicy) -> Self {
        let store = MemoryDocumentStore::new();
        let control_plane = MemoryControlPlane::new();
        let metrics = build_metrics("hcp-frontend-test", None).expect("local meter provider");
        let state = build_app_state(
            policy,
            ApiVersionRegistry::default(),
            Collaborators {
                store: Arc::new(store.clone()),
                locks: None,
                control_plane: Arc::new(control_plane.clone()),
                meter: metrics.meter(),
            },
        );
        let server = ApiServer::new(
            state.clone(),
            ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            None,
        );
        Self {
            router: server.into_router(),
            state,
            store,
            control_plane,
        }
    }

    /// Starts with `SUB` registered.
    pub async fn registered() -> Result<Self> {
        let app = Self::new();
        app.register(SUB, "Registered").await?;
        Ok(app)
    }

    pub async fn register(&self, subscription_id: &str, state: &str) -> Result<()> {
        let reply = self
            .send(
                Method::PUT,
                &format!("/subscriptions/{subscription_id}"),
                Some(json!({ "state": state })),
            )
            .await?;
        assert_eq!(reply.status, StatusCode::OK);
        Ok(())
    }

    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> Result<Reply> {
        self.send_with(method, uri, body, &[]).await
    }

    pub async fn send_with(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Result<Reply> {
        let mut request = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => request.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok(Reply {
            status,
            headers,
            body,
        })
    }

    pub async fn record(&self, id: &ResourceId) -> Result<Option<ResourceRecord>> {
        Ok(self.store.get_resource(id).await?)
    }

    /// Creates a cluster and returns its id.
    pub async fn create_cluster(&self, name: &str) -> Result<ResourceId> {
        let id = cluster_id(name);
        let reply = self
            .send(Method::PUT, &versioned(id.as_str()), Some(json!({ "location": LOCATION })))
            .await?;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        Ok(id)
    }

    pub async fn create_node_pool(&self, cluster: &ResourceId, name: &str) -> Result<ResourceId> {
        let id = cluster.child(NODE_POOL_TYPE_NAME, name);
        let reply = self
            .send(
                Method::PUT,
                &versioned(id.as_str()),
                Some(json!({ "location": LOCATION, "properties": { "vmSize": "Standard_D8s_v3" } })),
            )
            .await?;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        Ok(id)
    }

    pub async fn create_external_auth(&self, cluster: &ResourceId, name: &str) -> Result<ResourceId> {
        let id = cluster.child(EXTERNAL_AUTH_TYPE_NAME, name);
        let reply = self
            .send(
                Method::PUT,
                &versioned(id.as_str()),
                Some(json!({
                    "properties": {
                        "issuerUrl": "https://issuer.example.com",
                        "issuerAudiences": ["openshift"],
                        "usernameClaim": "email"
                    }
                })),
            )
            .await?;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        Ok(id)
    }

    /// Marks the resource's active operation as finished.
    pub async fn complete(&self, id: &ResourceId) -> Result<String> {
        let record = self.record(id).await?.expect("resource record");
        let op_id = record.active_operation_id.expect("active operation");
        self.state
            .operations
            .update_operation_status(
                id.subscription_id(),
                &op_id,
                hcp_models::ProvisioningState::Succeeded,
                None,
            )
            .await?;
        Ok(op_id)
    }
}

pub fn cluster_id(name: &str) -> ResourceId {
    ResourceId::cluster(SUB, RG, name)
}

pub fn versioned(path: &str) -> String {
    format!("{path}?api-version={DEFAULT_API_VERSION}")
}

pub fn result_path(operation_id: &str) -> String {
    versioned(&format!(
        "/subscriptions/{SUB}/providers/{PROVIDER_NAMESPACE}/locations/{LOCATION}/{OPERATION_RESULT_TYPE_NAME}/{operation_id}"
    ))
}

/// Path and query of a polling URL.
pub fn relative(url: &str) -> String {
    match url.find("/subscriptions/") {
        Some(start) => url[start..].to_string(),
        None => url.to_string(),
    }
}
