use super::*;
use crate::merge::merge_patch;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures_util::{StreamExt, stream};
use hcp_models::{ARO_HCP_PREFIX, CLUSTERS_MGMT_PREFIX, InternalId};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const ID_ALPHABET: [char; 36] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r',
    's', 't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Cluster,
    Autoscaler,
    NodePool,
    ExternalAuth,
    BreakGlass,
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallVerb {
    Get,
    Create,
    Update,
    Delete,
    List,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub kind: CallKind,
    pub verb: CallVerb,
    pub target: String,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    status: u16,
    reason: String,
}

#[derive(Debug, Default)]
struct State {
    clusters: BTreeMap<String, CsCluster>,
    node_pools: BTreeMap<String, CsNodePool>,
    external_auths: BTreeMap<String, CsExternalAuth>,
    credentials: BTreeMap<String, CsBreakGlassCredential>,
    versions: BTreeMap<String, CsVersion>,
    failures: HashMap<(CallKind, CallVerb), InjectedFailure>,
    list_failure_after: Option<usize>,
    calls: Vec<Call>,
}

/// In-process control plane. Clones share state.
///
/// Objects are keyed by their `href`. Failures can be injected per kind and
/// verb, and objects can be removed behind the frontend's back to simulate
/// drift between the two systems.
#[derive(Debug, Clone, Default)]
pub struct MemoryControlPlane {
    state: Arc<Mutex<State>>,
}

impl MemoryControlPlane {
    /// Starts with a small versions catalogue and no other objects.
    pub fn new() -> Self {
        let cp = Self::default();
        cp.add_version("4.19.0", "stable", true, None);
        cp.add_version("4.18.2", "stable", true, None);
        cp.add_version("4.20.0", "candidate", true, None);
        cp.add_version(
            "4.16.9",
            "stable",
            false,
            Some(Utc::now() - ChronoDuration::days(30)),
        );
        cp
    }

    pub fn add_version(
        &self,
        name: &str,
        channel_group: &str,
        enabled: bool,
        end_of_life: Option<DateTime<Utc>>,
    ) {
        let id = convert::version_name_to_cs(name);
        let version = CsVersion {
            href: Some(format!("{ARO_HCP_PREFIX}/versions/{id}")),
            id: Some(id.clone()),
            channel_group: Some(channel_group.to_string()),
            enabled: Some(enabled),
            end_of_life_timestamp: end_of_life,
        };
        self.state().versions.insert(id, version);
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes every call of `kind`/`verb` fail with `status` until cleared.
    pub fn fail(&self, kind: CallKind, verb: CallVerb, status: u16, reason: &str) {
        self.state().failures.insert(
            (kind, verb),
            InjectedFailure {
                status,
                reason: reason.to_string(),
            },
        );
    }

    /// Makes list streams yield an error after `count` items.
    pub fn fail_lists_after(&self, count: usize) {
        self.state().list_failure_after = Some(count);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.failures.clear();
        state.list_failure_after = None;
    }

    /// Drops an object without telling the frontend.
    pub fn remove(&self, id: &InternalId) {
        let mut state = self.state();
        let path = id.path().to_string();
        state.clusters.remove(&path);
        state.node_pools.remove(&path);
        state.external_auths.remove(&path);
        state.credentials.remove(&path);
    }

    pub fn cluster(&self, id: &InternalId) -> Option<CsCluster> {
        self.state().clusters.get(id.path()).cloned()
    }

    pub fn node_pool(&self, id: &InternalId) -> Option<CsNodePool> {
        self.state().node_pools.get(id.path()).cloned()
    }

    pub fn cluster_count(&self) -> usize {
        self.state().clusters.len()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn count_calls(&self, kind: CallKind, verb: CallVerb) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.kind == kind && c.verb == verb)
            .count()
    }

    /// Records the call and returns the injected failure for it, if any.
    fn enter(&self, kind: CallKind, verb: CallVerb, target: &str) -> ControlPlaneResult<MutexGuard<'_, State>> {
        let mut state = self.state();
        debug!(?kind, ?verb, target, "memory control plane call");
        state.calls.push(Call {
            kind,
            verb,
            target: target.to_string(),
        });
        match state.failures.get(&(kind, verb)) {
            Some(failure) => Err(ControlPlaneError::status(
                failure.status,
                format!("CLUSTERS-MGMT-{}", failure.status),
                failure.reason.clone(),
            )),
            None => Ok(state),
        }
    }

    fn list_stream<T: Send + 'static>(
        &self,
        kind: CallKind,
        target: &str,
        items: impl FnOnce(&State) -> Vec<T>,
    ) -> ControlPlaneStream<'_, T> {
        let (items, fail_after) = match self.enter(kind, CallVerb::List, target) {
            Ok(state) => (items(&state), state.list_failure_after),
            Err(e) => return stream::iter(vec![Err(e)]).boxed(),
        };
        let mut results: Vec<ControlPlaneResult<T>> = items.into_iter().map(Ok).collect();
        if let Some(n) = fail_after {
            results.truncate(n);
            results.push(Err(ControlPlaneError::status(
                500,
                "CLUSTERS-MGMT-500",
                "list interrupted",
            )));
        }
        stream::iter(results).boxed()
    }
}

fn new_id() -> String {
    nanoid::nanoid!(16, &ID_ALPHABET)
}

fn not_found(id: &InternalId) -> ControlPlaneError {
    ControlPlaneError::not_found(format!("Object '{}' not found", id.path()))
}

fn merged<T: Serialize + DeserializeOwned>(current: &T, update: &T) -> ControlPlaneResult<T> {
    let mut value = serde_json::to_value(current)?;
    merge_patch(&mut value, &serde_json::to_value(update)?);
    Ok(serde_json::from_value(value)?)
}

fn in_set(href: &Option<String>, ids: &[InternalId]) -> bool {
    href.as_deref()
        .is_some_and(|h| ids.iter().any(|id| id.path().eq_ignore_ascii_case(h)))
}

fn fill_identity(identity: &mut CsManagedIdentity) {
    identity
        .client_id
        .get_or_insert_with(|| uuid::Uuid::new_v4().to_string());
    identity
        .principal_id
        .get_or_insert_with(|| uuid::Uuid::new_v4().to_string());
}

#[async_trait]
impl ControlPlaneClient for MemoryControlPlane {
    async fn get_cluster(&self, id: &InternalId) -> ControlPlaneResult<CsCluster> {
        let state = self.enter(CallKind::Cluster, CallVerb::Get, id.path())?;
        state.clusters.get(id.path()).cloned().ok_or_else(|| not_found(id))
    }

    async fn create_cluster(&self, cluster: &CsCluster) -> ControlPlaneResult<CsCluster> {
        let name = cluster.name.clone().unwrap_or_default();
        let mut state = self.enter(CallKind::Cluster, CallVerb::Create, &name)?;
        let id = InternalId::cluster(&new_id());
        let region = cluster
            .region
            .as_ref()
            .map(|r| r.id.clone())
            .unwrap_or_default();
        let prefix = cluster.domain_prefix.clone().unwrap_or_else(|| name.clone());
        let base_domain = format!("{}.{region}.aroapp.example.com", &id.id()[..4]);

        let mut created = cluster.clone();
        created.id = Some(id.id().to_string());
        created.href = Some(id.path().to_string());
        created.state = Some("installing".to_string());
        created.dns = Some(CsDns {
            base_domain: Some(base_domain.clone()),
        });
        created.console = Some(CsUrl {
            url: Some(format!("https://console-openshift-console.apps.{prefix}.{base_domain}")),
        });
        let api = created.api.get_or_insert_with(Default::default);
        api.url = Some(format!("https://api.{prefix}.{base_domain}:443"));
        if let Some(managed) = created
            .azure
            .as_mut()
            .and_then(|a| a.operators_authentication.as_mut())
            .and_then(|a| a.managed_identities.as_mut())
        {
            managed
                .control_plane_operators_managed_identities
                .values_mut()
                .chain(managed.data_plane_operators_managed_identities.values_mut())
                .chain(managed.service_managed_identity.iter_mut())
                .for_each(fill_identity);
        }

        state.clusters.insert(id.path().to_string(), created.clone());
        Ok(created)
    }

    async fn update_cluster(&self, id: &InternalId, cluster: &CsCluster) -> ControlPlaneResult<CsCluster> {
        let mut state = self.enter(CallKind::Cluster, CallVerb::Update, id.path())?;
        let current = state.clusters.get(id.path()).ok_or_else(|| not_found(id))?;
        let updated = merged(current, cluster)?;
        state.clusters.insert(id.path().to_string(), updated.clone());
        Ok(updated)
    }

    async fn update_cluster_autoscaler(
        &self,
        id: &InternalId,
        autoscaler: &CsClusterAutoscaler,
    ) -> ControlPlaneResult<CsClusterAutoscaler> {
        let mut state = self.enter(CallKind::Autoscaler, CallVerb::Update, id.path())?;
        let cluster = state.clusters.get_mut(id.path()).ok_or_else(|| not_found(id))?;
        let current = cluster.autoscaler.clone().unwrap_or_default();
        let updated = merged(&current, autoscaler)?;
        cluster.autoscaler = Some(updated.clone());
        Ok(updated)
    }

    async fn delete_cluster(&self, id: &InternalId) -> ControlPlaneResult<()> {
        let mut state = self.enter(CallKind::Cluster, CallVerb::Delete, id.path())?;
        if state.clusters.remove(id.path()).is_none() {
            return Err(not_found(id));
        }
        let children = format!("{}/", id.path());
        state.node_pools.retain(|path, _| !path.starts_with(&children));
        state.external_auths.retain(|path, _| !path.starts_with(&children));
        Ok(())
    }

    fn list_clusters(&self, ids: Vec<InternalId>) -> ControlPlaneStream<'_, CsCluster> {
        if ids.is_empty() {
            return stream::empty().boxed();
        }
        self.list_stream(CallKind::Cluster, "clusters", |state| {
            state
                .clusters
                .values()
                .filter(|c| in_set(&c.href, &ids))
                .cloned()
                .collect()
        })
    }

    async fn get_node_pool(&self, id: &InternalId) -> ControlPlaneResult<CsNodePool> {
        let state = self.enter(CallKind::NodePool, CallVerb::Get, id.path())?;
        state.node_pools.get(id.path()).cloned().ok_or_else(|| not_found(id))
    }

    async fn create_node_pool(&self, cluster: &InternalId, node_pool: &CsNodePool) -> ControlPlaneResult<CsNodePool> {
        let mut state = self.enter(CallKind::NodePool, CallVerb::Create, cluster.path())?;
        if !state.clusters.contains_key(cluster.path()) {
            return Err(not_found(cluster));
        }
        let id = node_pool.id.clone().unwrap_or_else(new_id);
        let href = format!("{}/node_pools/{id}", cluster.path());
        if state.node_pools.contains_key(&href) {
            return Err(ControlPlaneError::status(
                409,
                "CLUSTERS-MGMT-409",
                format!("Node pool '{id}' already exists"),
            ));
        }
        let mut created = node_pool.clone();
        created.id = Some(id);
        created.href = Some(href.clone());
        state.node_pools.insert(href, created.clone());
        Ok(created)
    }

    async fn update_node_pool(&self, id: &InternalId, node_pool: &CsNodePool) -> ControlPlaneResult<CsNodePool> {
        let mut state = self.enter(CallKind::NodePool, CallVerb::Update, id.path())?;
        let current = state.node_pools.get(id.path()).ok_or_else(|| not_found(id))?;
        let mut updated = merged(current, node_pool)?;
        // Lists replace rather than merge.
        if node_pool.taints.is_some() {
            updated.taints = node_pool.taints.clone();
        }
        if node_pool.autoscaling.is_some() {
            updated.replicas = None;
        } else if node_pool.replicas.is_some() {
            updated.autoscaling = None;
        }
        state.node_pools.insert(id.path().to_string(), updated.clone());
        Ok(updated)
    }

    async fn delete_node_pool(&self, id: &InternalId) -> ControlPlaneResult<()> {
        let mut state = self.enter(CallKind::NodePool, CallVerb::Delete, id.path())?;
        state
            .node_pools
            .remove(id.path())
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }

    fn list_node_pools(&self, cluster: &InternalId, ids: Vec<InternalId>) -> ControlPlaneStream<'_, CsNodePool> {
        if ids.is_empty() {
            return stream::empty().boxed();
        }
        let prefix = format!("{}/", cluster.path());
        self.list_stream(CallKind::NodePool, cluster.path(), move |state| {
            state
                .node_pools
                .iter()
                .filter(|(path, np)| path.starts_with(&prefix) && in_set(&np.href, &ids))
                .map(|(_, np)| np.clone())
                .collect()
        })
    }

    async fn get_external_auth(&self, id: &InternalId) -> ControlPlaneResult<CsExternalAuth> {
        let state = self.enter(CallKind::ExternalAuth, CallVerb::Get, id.path())?;
        state.external_auths.get(id.path()).cloned().ok_or_else(|| not_found(id))
    }

    async fn create_external_auth(
        &self,
        cluster: &InternalId,
        external_auth: &CsExternalAuth,
    ) -> ControlPlaneResult<CsExternalAuth> {
        let mut state = self.enter(CallKind::ExternalAuth, CallVerb::Create, cluster.path())?;
        if !state.clusters.contains_key(cluster.path()) {
            return Err(not_found(cluster));
        }
        let id = external_auth.id.clone().unwrap_or_else(new_id);
        let href = format!("{}/external_auth_config/external_auths/{id}", cluster.path());
        if state.external_auths.contains_key(&href) {
            return Err(ControlPlaneError::status(
                409,
                "CLUSTERS-MGMT-409",
                format!("External auth '{id}' already exists"),
            ));
        }
        let mut created = external_auth.clone();
        created.id = Some(id);
        created.href = Some(href.clone());
        state.external_auths.insert(href, created.clone());
        Ok(created)
    }

    async fn update_external_auth(
        &self,
        id: &InternalId,
        external_auth: &CsExternalAuth,
    ) -> ControlPlaneResult<CsExternalAuth> {
        let mut state = self.enter(CallKind::ExternalAuth, CallVerb::Update, id.path())?;
        let current = state.external_auths.get(id.path()).ok_or_else(|| not_found(id))?;
        let mut updated = merged(current, external_auth)?;
        if external_auth.clients.is_some() {
            updated.clients = external_auth.clients.clone();
        }
        state.external_auths.insert(id.path().to_string(), updated.clone());
        Ok(updated)
    }

    async fn delete_external_auth(&self, id: &InternalId) -> ControlPlaneResult<()> {
        let mut state = self.enter(CallKind::ExternalAuth, CallVerb::Delete, id.path())?;
        state
            .external_auths
            .remove(id.path())
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }

    fn list_external_auths(
        &self,
        cluster: &InternalId,
        ids: Vec<InternalId>,
    ) -> ControlPlaneStream<'_, CsExternalAuth> {
        if ids.is_empty() {
            return stream::empty().boxed();
        }
        let prefix = format!("{}/", cluster.path());
        self.list_stream(CallKind::ExternalAuth, cluster.path(), move |state| {
            state
                .external_auths
                .iter()
                .filter(|(path, ea)| path.starts_with(&prefix) && in_set(&ea.href, &ids))
                .map(|(_, ea)| ea.clone())
                .collect()
        })
    }

    async fn issue_break_glass_credential(&self, cluster: &InternalId) -> ControlPlaneResult<CsBreakGlassCredential> {
        let mut state = self.enter(CallKind::BreakGlass, CallVerb::Create, cluster.path())?;
        if !state.clusters.contains_key(cluster.path()) {
            return Err(not_found(cluster));
        }
        let id = new_id();
        let href = format!(
            "{CLUSTERS_MGMT_PREFIX}/clusters/{}/break_glass_credentials/{id}",
            cluster.cluster_id()
        );
        let credential = CsBreakGlassCredential {
            id: Some(id.clone()),
            href: Some(href.clone()),
            kubeconfig: Some(format!(
                "apiVersion: v1\nkind: Config\ncurrent-context: {id}\nusers:\n- name: {id}\n"
            )),
            expiration_timestamp: Some(Utc::now() + ChronoDuration::hours(24)),
            status: Some("issued".to_string()),
        };
        state.credentials.insert(href, credential.clone());
        Ok(credential)
    }

    async fn get_break_glass_credential(&self, id: &InternalId) -> ControlPlaneResult<CsBreakGlassCredential> {
        let state = self.enter(CallKind::BreakGlass, CallVerb::Get, id.path())?;
        state.credentials.get(id.path()).cloned().ok_or_else(|| not_found(id))
    }

    async fn revoke_break_glass_credentials(&self, cluster: &InternalId) -> ControlPlaneResult<()> {
        let mut state = self.enter(CallKind::BreakGlass, CallVerb::Delete, cluster.path())?;
        if !state.clusters.contains_key(cluster.path()) {
            return Err(not_found(cluster));
        }
        let owned = format!("/clusters/{}/break_glass_credentials/", cluster.cluster_id());
        state.credentials.retain(|path, _| !path.contains(&owned));
        Ok(())
    }

    async fn get_version(&self, name: &str) -> ControlPlaneResult<CsVersion> {
        let id = convert::version_name_to_cs(name);
        let state = self.enter(CallKind::Version, CallVerb::Get, &id)?;
        state.versions.get(&id).cloned().ok_or_else(|| {
            ControlPlaneError::not_found(format!("Version '{id}' not found"))
        })
    }

    fn list_versions(&self) -> ControlPlaneStream<'_, CsVersion> {
        self.list_stream(CallKind::Version, "versions", |state| {
            state.versions.values().cloned().collect()
        })
    }
}
