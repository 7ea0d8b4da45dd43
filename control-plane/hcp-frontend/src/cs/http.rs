use super::*;
use crate::config::ControlPlaneConfig;
use futures_util::{StreamExt, TryStreamExt, stream};
use hcp_models::{ARO_HCP_PREFIX, CLUSTERS_MGMT_PREFIX};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{debug, warn};

const VERSIONS_PAGE_SIZE: usize = 100;

/// REST client for the upstream clusters service.
pub struct HttpControlPlaneClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpControlPlaneClient {
    pub fn new(config: &ControlPlaneConfig) -> ControlPlaneResult<Self> {
        let base_url = config.url.clone().ok_or_else(|| {
            ControlPlaneError::Configuration("control plane URL not configured".to_string())
        })?;
        let client = Client::builder()
            .user_agent(concat!("hcp-frontend/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.timeout_seconds.min(10)))
            .build()?;
        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ControlPlaneResult<T> {
        let response = self.authorize(request).send().await?;
        let response = check_status(response).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn send_empty(&self, request: RequestBuilder) -> ControlPlaneResult<()> {
        let response = self.authorize(request).send().await?;
        check_status(response).await.map(|_| ())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ControlPlaneResult<T> {
        debug!(path, "GET control plane object");
        self.send(self.client.get(self.url(path))).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ControlPlaneResult<T> {
        debug!(path, "POST control plane object");
        self.send(self.client.post(self.url(path)).json(body)).await
    }

    async fn patch<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ControlPlaneResult<T> {
        debug!(path, "PATCH control plane object");
        self.send(self.client.patch(self.url(path)).json(body)).await
    }

    async fn delete(&self, path: &str) -> ControlPlaneResult<()> {
        debug!(path, "DELETE control plane object");
        self.send_empty(self.client.delete(self.url(path))).await
    }

    /// Pages through `collection`, restricted to the given ids.
    fn list<T>(&self, collection: String, ids: Vec<InternalId>) -> ControlPlaneStream<'_, T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        if ids.is_empty() {
            return stream::empty().boxed();
        }
        let search = format!(
            "id in ({})",
            ids.iter()
                .map(|id| format!("'{}'", id.id()))
                .collect::<Vec<_>>()
                .join(",")
        );
        let size = ids.len();
        self.pages(collection, Some(search), size)
    }

    fn pages<T>(&self, collection: String, search: Option<String>, size: usize) -> ControlPlaneStream<'_, T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = self.url(&collection);

        stream::try_unfold(Some(1usize), move |page| {
            let request = page.map(|page| {
                let mut query = vec![("page", page.to_string()), ("size", size.to_string())];
                if let Some(search) = &search {
                    query.push(("search", search.clone()));
                }
                self.client.get(&url).query(&query)
            });
            async move {
                let (Some(page), Some(request)) = (page, request) else {
                    return Ok::<_, ControlPlaneError>(None);
                };
                let list: CsList<T> = self.send(request).await?;
                let more = !list.items.is_empty() && page * size < list.total;
                let items = stream::iter(list.items.into_iter().map(Ok));
                Ok(Some((items, more.then_some(page + 1))))
            }
        })
        .try_flatten()
        .boxed()
    }
}

async fn check_status(response: Response) -> ControlPlaneResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let error = match serde_json::from_str::<CsErrorBody>(&text) {
        Ok(body) => ControlPlaneError::status(status.as_u16(), body.code, body.reason),
        Err(_) => ControlPlaneError::status(
            status.as_u16(),
            format!("CLUSTERS-MGMT-{}", status.as_u16()),
            text,
        ),
    };
    if !status.is_client_error() {
        warn!(status = status.as_u16(), "control plane returned {}", error);
    }
    Err(error)
}

fn clusters_path() -> String {
    format!("{ARO_HCP_PREFIX}/clusters")
}

fn versions_path() -> String {
    format!("{ARO_HCP_PREFIX}/versions")
}

fn break_glass_path(cluster: &InternalId) -> String {
    format!(
        "{CLUSTERS_MGMT_PREFIX}/clusters/{}/break_glass_credentials",
        cluster.cluster_id()
    )
}

#[async_trait]
impl ControlPlaneClient for HttpControlPlaneClient {
    async fn get_cluster(&self, id: &InternalId) -> ControlPlaneResult<CsCluster> {
        self.get(id.path()).await
    }

    async fn create_cluster(&self, cluster: &CsCluster) -> ControlPlaneResult<CsCluster> {
        self.post(&clusters_path(), cluster).await
    }

    async fn update_cluster(&self, id: &InternalId, cluster: &CsCluster) -> ControlPlaneResult<CsCluster> {
        self.patch(id.path(), cluster).await
    }

    async fn update_cluster_autoscaler(
        &self,
        id: &InternalId,
        autoscaler: &CsClusterAutoscaler,
    ) -> ControlPlaneResult<CsClusterAutoscaler> {
        self.patch(&format!("{}/autoscaler", id.path()), autoscaler).await
    }

    async fn delete_cluster(&self, id: &InternalId) -> ControlPlaneResult<()> {
        self.delete(id.path()).await
    }

    fn list_clusters(&self, ids: Vec<InternalId>) -> ControlPlaneStream<'_, CsCluster> {
        self.list(clusters_path(), ids)
    }

    async fn get_node_pool(&self, id: &InternalId) -> ControlPlaneResult<CsNodePool> {
        self.get(id.path()).await
    }

    async fn create_node_pool(&self, cluster: &InternalId, node_pool: &CsNodePool) -> ControlPlaneResult<CsNodePool> {
        self.post(&format!("{}/node_pools", cluster.path()), node_pool).await
    }

    async fn update_node_pool(&self, id: &InternalId, node_pool: &CsNodePool) -> ControlPlaneResult<CsNodePool> {
        self.patch(id.path(), node_pool).await
    }

    async fn delete_node_pool(&self, id: &InternalId) -> ControlPlaneResult<()> {
        self.delete(id.path()).await
    }

    fn list_node_pools(&self, cluster: &InternalId, ids: Vec<InternalId>) -> ControlPlaneStream<'_, CsNodePool> {
        self.list(format!("{}/node_pools", cluster.path()), ids)
    }

    async fn get_external_auth(&self, id: &InternalId) -> ControlPlaneResult<CsExternalAuth> {
        self.get(id.path()).await
    }

    async fn create_external_auth(
        &self,
        cluster: &InternalId,
        external_auth: &CsExternalAuth,
    ) -> ControlPlaneResult<CsExternalAuth> {
        self.post(
            &format!("{}/external_auth_config/external_auths", cluster.path()),
            external_auth,
        )
        .await
    }

    async fn update_external_auth(
        &self,
        id: &InternalId,
        external_auth: &CsExternalAuth,
    ) -> ControlPlaneResult<CsExternalAuth> {
        self.patch(id.path(), external_auth).await
    }

    async fn delete_external_auth(&self, id: &InternalId) -> ControlPlaneResult<()> {
        self.delete(id.path()).await
    }

    fn list_external_auths(
        &self,
        cluster: &InternalId,
        ids: Vec<InternalId>,
    ) -> ControlPlaneStream<'_, CsExternalAuth> {
        self.list(
            format!("{}/external_auth_config/external_auths", cluster.path()),
            ids,
        )
    }

    async fn issue_break_glass_credential(&self, cluster: &InternalId) -> ControlPlaneResult<CsBreakGlassCredential> {
        self.post(&break_glass_path(cluster), &serde_json::json!({})).await
    }

    async fn get_break_glass_credential(&self, id: &InternalId) -> ControlPlaneResult<CsBreakGlassCredential> {
        self.get(id.path()).await
    }

    async fn revoke_break_glass_credentials(&self, cluster: &InternalId) -> ControlPlaneResult<()> {
        self.delete(&break_glass_path(cluster)).await
    }

    async fn get_version(&self, name: &str) -> ControlPlaneResult<CsVersion> {
        self.get(&format!("{}/{}", versions_path(), convert::version_name_to_cs(name)))
            .await
    }

    fn list_versions(&self) -> ControlPlaneStream<'_, CsVersion> {
        self.pages(versions_path(), None, VERSIONS_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::{Path, Query},
        http::StatusCode,
        routing::get,
    };
    use std::collections::HashMap;

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(url: String) -> HttpControlPlaneClient {
        HttpControlPlaneClient::new(&ControlPlaneConfig {
            url: Some(url),
            timeout_seconds: 5,
            token: Some("secret".into()),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn upstream_errors_are_classified() {
        let app = Router::new().route(
            "/api/aro_hcp/v1alpha1/clusters/{id}",
            get(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(serde_json::json!({
                        "kind": "Error",
                        "code": "CLUSTERS-MGMT-404",
                        "reason": "Cluster 'abc' not found"
                    })),
                )
            }),
        );
        let cp = client(spawn(app).await);
        let err = cp.get_cluster(&InternalId::cluster("abc")).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("Cluster 'abc' not found"));
    }

    #[tokio::test]
    async fn list_follows_pages() {
        let app = Router::new().route(
            "/api/aro_hcp/v1alpha1/clusters",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(q["search"], "id in ('a','b','c')");
                let page: usize = q["page"].parse().unwrap();
                let items: Vec<CsCluster> = match page {
                    1 => vec![
                        CsCluster { id: Some("a".into()), ..Default::default() },
                        CsCluster { id: Some("b".into()), ..Default::default() },
                    ],
                    _ => vec![],
                };
                Json(serde_json::json!({
                    "page": page,
                    "size": items.len(),
                    "total": 2,
                    "items": items,
                }))
            }),
        );
        let cp = client(spawn(app).await);
        let ids = ["a", "b", "c"].map(InternalId::cluster).to_vec();
        let listed: Vec<CsCluster> = cp.list_clusters(ids).try_collect().await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn versions_are_listed_without_a_search() {
        let app = Router::new()
            .route(
                "/api/aro_hcp/v1alpha1/versions",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    assert!(!q.contains_key("search"));
                    assert_eq!(q["page"], "1");
                    Json(serde_json::json!({
                        "page": 1,
                        "size": 1,
                        "total": 1,
                        "items": [{"id": "openshift-v4.19.0", "enabled": true}],
                    }))
                }),
            )
            .route(
                "/api/aro_hcp/v1alpha1/versions/{id}",
                get(|Path(id): Path<String>| async move {
                    Json(serde_json::json!({"id": id, "channel_group": "stable"}))
                }),
            );
        let cp = client(spawn(app).await);
        let listed: Vec<CsVersion> = cp.list_versions().try_collect().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].enabled, Some(true));

        let one = cp.get_version("4.19.0").await.unwrap();
        assert_eq!(one.id.as_deref(), Some("openshift-v4.19.0"));
    }

    #[test]
    fn missing_url_is_a_configuration_error() {
        let err = HttpControlPlaneClient::new(&ControlPlaneConfig::default()).err().unwrap();
        assert!(matches!(err, ControlPlaneError::Configuration(_)));
    }
}
